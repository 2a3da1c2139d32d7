use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The part of the pipeline an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    FileLoader,
    CatalogStore,
    TranslationService,
    SafeMerger,
    Orchestrator,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::FileLoader => "File Loader",
            Component::CatalogStore => "Catalog Store",
            Component::TranslationService => "Translation Service",
            Component::SafeMerger => "Safe Merger",
            Component::Orchestrator => "Orchestrator",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LocalizeError {
    #[error("failed to load {what}: file not found")]
    MissingFile { what: &'static str, path: PathBuf },

    #[error("failed to parse {what}: invalid JSON at line {line}, column {column}")]
    MalformedDocument {
        what: &'static str,
        path: PathBuf,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("invalid {what} structure: {reason}")]
    InvalidSchema {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to read {what}: {source}")]
    Io {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("translation capability unavailable: {reason}")]
    TranslationCapabilityUnavailable { reason: String },

    #[error("refusing to serialize invalid {what}: {reason}")]
    InvalidOutput { what: &'static str, reason: String },

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("merge failed: {reason}")]
    Merge {
        path: PathBuf,
        reason: String,
        restored: bool,
    },

    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("interrupted before any file was written")]
    Interrupted,
}

impl LocalizeError {
    pub fn component(&self) -> Component {
        match self {
            LocalizeError::MissingFile { .. }
            | LocalizeError::MalformedDocument { .. }
            | LocalizeError::InvalidSchema { .. }
            | LocalizeError::Io { .. } => Component::FileLoader,
            LocalizeError::TranslationCapabilityUnavailable { .. } => {
                Component::TranslationService
            }
            LocalizeError::InvalidOutput { .. } | LocalizeError::Write { .. } => {
                Component::CatalogStore
            }
            LocalizeError::Merge { .. } | LocalizeError::InvalidState { .. } => {
                Component::SafeMerger
            }
            LocalizeError::Interrupted => Component::Orchestrator,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            LocalizeError::MissingFile { path, .. }
            | LocalizeError::MalformedDocument { path, .. }
            | LocalizeError::InvalidSchema { path, .. }
            | LocalizeError::Io { path, .. }
            | LocalizeError::Write { path, .. }
            | LocalizeError::Merge { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Underlying reason, separate from the one-line description.
    pub fn reason(&self) -> String {
        match self {
            LocalizeError::MissingFile { .. } => "File not found".to_string(),
            LocalizeError::MalformedDocument { reason, .. } => reason.clone(),
            LocalizeError::InvalidSchema { reason, .. } => reason.clone(),
            LocalizeError::Io { source, .. } => source.to_string(),
            LocalizeError::TranslationCapabilityUnavailable { reason } => reason.clone(),
            LocalizeError::InvalidOutput { reason, .. } => reason.clone(),
            LocalizeError::Write { reason, .. } => reason.clone(),
            LocalizeError::Merge {
                reason, restored, ..
            } => {
                if *restored {
                    format!("{} (catalog restored from backup)", reason)
                } else {
                    reason.clone()
                }
            }
            LocalizeError::InvalidState { state, .. } => format!("current state is {}", state),
            LocalizeError::Interrupted => "interrupted by user".to_string(),
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            LocalizeError::MissingFile { .. } => "Ensure the file exists at the specified path",
            LocalizeError::MalformedDocument { .. } => "Fix the JSON syntax error in the file",
            LocalizeError::InvalidSchema { .. } => {
                "Ensure the file contains all required fields with valid values"
            }
            LocalizeError::Io { .. } => "Check file permissions and try again",
            LocalizeError::TranslationCapabilityUnavailable { .. } => {
                "Check the translator command in the settings and that it runs on this machine"
            }
            LocalizeError::InvalidOutput { .. } => {
                "Inspect the input files for invalid locale codes or missing fields"
            }
            LocalizeError::Write { .. } => "Check free disk space and directory permissions",
            LocalizeError::Merge { restored: true, .. } => {
                "The catalog was restored; fix the reported problem and run again"
            }
            LocalizeError::Merge { .. } => {
                "Restore the catalog manually from the backup file before running again"
            }
            LocalizeError::InvalidState { .. } => "Run the full analysis before merging",
            LocalizeError::Interrupted => "Run the tool again to completion",
        }
    }

    /// Multi-line report for the terminal.
    pub fn report(&self) -> String {
        let mut lines = vec![format!("ERROR: {} - {}", self.component(), self)];
        if let Some(path) = self.path() {
            lines.push(format!("  File: {}", path.display()));
        }
        lines.push(format!("  Reason: {}", self.reason()));
        lines.push(format!("  Action: {}", self.suggested_action()));
        lines.join("\n")
    }
}
