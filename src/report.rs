use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::Catalog;
use crate::coverage::MissingTranslations;
use crate::error::LocalizeError;
use crate::store;
use crate::translator::{FailureKind, TranslationFailure};

const SAMPLE_KEYS: usize = 5;
const SAMPLE_LOCALES: usize = 5;
const MAX_KEY_DISPLAY: usize = 40;

/// Counters for one run. Exact at completion regardless of request ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub keys_processed: usize,
    pub locales: usize,
    pub keys_with_missing: usize,
    pub missing_translations: usize,
    pub translations_inserted: usize,
    pub translations_failed: usize,
    pub specifier_rejections: usize,
    pub skipped_do_not_translate: usize,
    pub new_keys_found: usize,
    pub staging_translations: usize,
    pub unavailable_by_locale: BTreeMap<String, usize>,
}

impl RunStats {
    pub fn record_failure(&mut self, locale: &str, failure: &TranslationFailure) {
        self.translations_failed += 1;
        match failure.kind {
            FailureKind::UnsupportedLocale => {
                *self
                    .unavailable_by_locale
                    .entry(locale.to_string())
                    .or_default() += 1;
            }
            FailureKind::SpecifierMismatch => self.specifier_rejections += 1,
            FailureKind::Failed => {}
        }
    }
}

/// Where the staging catalog ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingOutput {
    Written(PathBuf),
    /// Dry run: the serialized staging catalog, for the report instead of the disk.
    Preview(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    dry_run: bool,
    verbose: bool,
}

impl Reporter {
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self { dry_run, verbose }
    }

    /// Serializes the staging catalog and writes it to `path`, or returns it as a
    /// preview in dry-run mode. Nothing is written when validation fails.
    pub fn emit_staging(
        &self,
        staging: &Catalog,
        path: &Path,
    ) -> Result<StagingOutput, LocalizeError> {
        let bytes = store::serialize_catalog(staging)?;
        if self.dry_run {
            info!("dry run: would write {} new keys to {}", staging.len(), path.display());
            return Ok(StagingOutput::Preview(String::from_utf8_lossy(&bytes).to_string()));
        }
        store::write_atomic(path, &bytes)?;
        info!("wrote {} new keys to {}", staging.len(), path.display());
        Ok(StagingOutput::Written(path.to_path_buf()))
    }

    pub fn summary(
        &self,
        stats: &RunStats,
        missing: &MissingTranslations,
        mode: &str,
        outcome: &[String],
    ) -> String {
        let mut lines = Vec::new();
        let suffix = if self.dry_run { ", dry run" } else { "" };
        lines.push(format!("Localization summary ({}{})", mode, suffix));
        lines.push(format!("  Keys processed: {}", stats.keys_processed));
        lines.push(format!("  Supported locales: {}", stats.locales));
        lines.push(format!("  Keys with missing translations: {}", stats.keys_with_missing));
        lines.push(format!("  Missing translations: {}", stats.missing_translations));
        lines.push(format!("  Translations inserted: {}", stats.translations_inserted));
        lines.push(format!("  Translation failures: {}", stats.translations_failed));
        lines.push(format!("  Rejected for format specifiers: {}", stats.specifier_rejections));
        if stats.skipped_do_not_translate > 0 {
            lines.push(format!(
                "  Skipped (shouldTranslate = false): {}",
                stats.skipped_do_not_translate
            ));
        }
        lines.push(format!("  New keys found: {}", stats.new_keys_found));
        lines.push(format!("  Staging translations: {}", stats.staging_translations));
        if !stats.unavailable_by_locale.is_empty() {
            let unavailable = stats
                .unavailable_by_locale
                .iter()
                .map(|(locale, count)| format!("{} ({})", locale, count))
                .collect::<Vec<_>>();
            lines.push(format!("  Unavailable languages: {}", unavailable.join(", ")));
        }
        for line in outcome {
            lines.push(format!("  {}", line));
        }
        if self.verbose {
            lines.extend(sample_lines(missing));
        }
        lines.join("\n")
    }
}

fn sample_lines(missing: &MissingTranslations) -> Vec<String> {
    let samples = missing
        .iter()
        .filter(|(_, locales)| !locales.is_empty())
        .take(SAMPLE_KEYS)
        .collect::<Vec<_>>();
    if samples.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Sample keys with missing translations:".to_string()];
    for (key, locales) in samples {
        let shown = locales
            .iter()
            .take(SAMPLE_LOCALES)
            .map(String::as_str)
            .collect::<Vec<_>>();
        let more = if locales.len() > SAMPLE_LOCALES { "..." } else { "" };
        lines.push(format!(
            "  '{}' - missing {} languages: {}{}",
            display_key(key),
            locales.len(),
            shown.join(", "),
            more
        ));
    }
    lines
}

fn display_key(key: &str) -> String {
    if key.chars().count() <= MAX_KEY_DISPLAY {
        return key.to_string();
    }
    let head = key.chars().take(MAX_KEY_DISPLAY - 3).collect::<String>();
    format!("{}...", head)
}
