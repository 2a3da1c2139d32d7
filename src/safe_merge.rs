//! Folding the staging catalog into the live catalog file.
//!
//! `Idle -> Analyzed -> BackedUp -> Merged | RolledBack`. Once a backup exists,
//! any failure in `merge` or `commit` restores the catalog file from it before
//! the error is returned, so the file is either fully merged or the original.

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::backup;
use crate::catalog::Catalog;
use crate::error::LocalizeError;
use crate::merge;
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Idle,
    Analyzed,
    BackedUp,
    Merged,
    RolledBack,
}

impl MergeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeState::Idle => "idle",
            MergeState::Analyzed => "analyzed",
            MergeState::BackedUp => "backed-up",
            MergeState::Merged => "merged",
            MergeState::RolledBack => "rolled-back",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub keys_added: usize,
    pub keys_merged: usize,
    pub translations_added: usize,
}

#[derive(Debug)]
pub struct SafeMerger {
    catalog_path: PathBuf,
    backup_path: PathBuf,
    dry_run: bool,
    state: MergeState,
    backup_taken: bool,
    merged: bool,
}

impl SafeMerger {
    pub fn new(
        catalog_path: impl Into<PathBuf>,
        backup_path: impl Into<PathBuf>,
        dry_run: bool,
    ) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            backup_path: backup_path.into(),
            dry_run,
            state: MergeState::Idle,
            backup_taken: false,
            merged: false,
        }
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Marks the analysis pipeline as complete; merging is refused before this.
    pub fn mark_analyzed(&mut self) -> Result<(), LocalizeError> {
        self.expect_state(MergeState::Idle, "analysis")?;
        self.state = MergeState::Analyzed;
        Ok(())
    }

    pub fn backup(&mut self) -> Result<(), LocalizeError> {
        self.expect_state(MergeState::Analyzed, "backup")?;
        if self.dry_run {
            info!(
                "dry run: would back up {} to {}",
                self.catalog_path.display(),
                self.backup_path.display()
            );
        } else {
            let bytes = backup::backup_file(&self.catalog_path, &self.backup_path).map_err(|err| {
                LocalizeError::Merge {
                    path: self.backup_path.clone(),
                    reason: format!("{:#}", err),
                    restored: false,
                }
            })?;
            self.backup_taken = true;
            info!(
                "backed up {} ({} bytes) to {}",
                self.catalog_path.display(),
                bytes,
                self.backup_path.display()
            );
        }
        self.state = MergeState::BackedUp;
        Ok(())
    }

    /// Adds every staging key to `catalog`. Keys that already exist are merged
    /// locale by locale without replacing existing translations. `catalog` is
    /// only changed when the whole merge succeeds.
    pub fn merge(
        &mut self,
        catalog: &mut Catalog,
        staging: &Catalog,
    ) -> Result<MergeStats, LocalizeError> {
        self.expect_state(MergeState::BackedUp, "merge")?;
        if self.merged {
            return Err(LocalizeError::InvalidState {
                operation: "merge",
                state: "merged-in-memory",
            });
        }
        match merge_catalogs(catalog, staging) {
            Ok((merged, stats)) => {
                *catalog = merged;
                self.merged = true;
                info!(
                    "merged {} new keys ({} existing keys updated, {} translations added)",
                    stats.keys_added, stats.keys_merged, stats.translations_added
                );
                Ok(stats)
            }
            Err(reason) => Err(self.rollback(reason)),
        }
    }

    pub fn commit(&mut self, catalog: &Catalog) -> Result<(), LocalizeError> {
        self.expect_state(MergeState::BackedUp, "commit")?;
        if !self.merged {
            return Err(LocalizeError::InvalidState {
                operation: "commit",
                state: "backed-up without merge",
            });
        }
        let bytes = match store::serialize_catalog(catalog) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.rollback(err.to_string())),
        };
        if self.dry_run {
            info!(
                "dry run: would write {} bytes to {}",
                bytes.len(),
                self.catalog_path.display()
            );
        } else if let Err(err) = store::write_atomic(&self.catalog_path, &bytes) {
            return Err(self.rollback(err.to_string()));
        } else {
            info!("wrote merged catalog to {}", self.catalog_path.display());
        }
        self.state = MergeState::Merged;
        Ok(())
    }

    /// backup, merge and commit in sequence.
    pub fn run(
        &mut self,
        catalog: &mut Catalog,
        staging: &Catalog,
    ) -> Result<MergeStats, LocalizeError> {
        self.backup()?;
        let stats = self.merge(catalog, staging)?;
        self.commit(catalog)?;
        Ok(stats)
    }

    fn rollback(&mut self, reason: String) -> LocalizeError {
        self.state = MergeState::RolledBack;
        if !self.backup_taken {
            return LocalizeError::Merge {
                path: self.catalog_path.clone(),
                reason,
                restored: false,
            };
        }
        match backup::restore_file(&self.backup_path, &self.catalog_path) {
            Ok(()) => {
                info!(
                    "restored {} from {}",
                    self.catalog_path.display(),
                    self.backup_path.display()
                );
                LocalizeError::Merge {
                    path: self.catalog_path.clone(),
                    reason,
                    restored: true,
                }
            }
            Err(err) => {
                error!("failed to restore catalog from backup: {:#}", err);
                LocalizeError::Merge {
                    path: self.catalog_path.clone(),
                    reason: format!("{}; restore also failed: {:#}", reason, err),
                    restored: false,
                }
            }
        }
    }

    fn expect_state(
        &self,
        expected: MergeState,
        operation: &'static str,
    ) -> Result<(), LocalizeError> {
        if self.state == expected {
            return Ok(());
        }
        Err(LocalizeError::InvalidState {
            operation,
            state: self.state.as_str(),
        })
    }
}

fn merge_catalogs(live: &Catalog, staging: &Catalog) -> Result<(Catalog, MergeStats), String> {
    if staging.source_language != live.source_language {
        return Err(format!(
            "staging source language '{}' does not match catalog source language '{}'",
            staging.source_language, live.source_language
        ));
    }
    let mut merged = live.clone();
    let mut stats = MergeStats::default();
    for (key, incoming) in &staging.strings {
        match merged.strings.get_mut(key) {
            Some(existing) => {
                stats.keys_merged += 1;
                stats.translations_added += merge::merge_entry(existing, incoming);
            }
            None => {
                stats.keys_added += 1;
                stats.translations_added += incoming.translation_count();
                merged.strings.insert(key.clone(), incoming.clone());
            }
        }
    }
    Ok((merged, stats))
}
