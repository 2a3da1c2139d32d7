use anyhow::Result;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub mod backup;
pub mod catalog;
pub mod coverage;
pub mod error;
pub mod languages;
pub mod logging;
pub mod manifest;
pub mod merge;
pub mod new_keys;
pub mod providers;
pub mod report;
pub mod safe_merge;
pub mod settings;
pub mod specifiers;
pub mod store;
pub mod translator;
pub mod website;

#[cfg(test)]
mod test_util;

pub use catalog::{Catalog, Entry, Localization, StringUnit, TranslationState};
pub use error::{Component, LocalizeError};
pub use providers::{CommandProvider, Provider, ProviderError, ProviderFuture, TranslationRequest};
pub use report::{RunStats, StagingOutput};
pub use safe_merge::{MergeState, SafeMerger};
pub use settings::Settings;
pub use translator::TranslationService;

use coverage::MissingTranslations;
use report::Reporter;
use translator::TranslationOutcome;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub dry_run: bool,
    pub auto_merge: bool,
    pub verbose: bool,
    pub settings_path: Option<String>,
    pub catalog: Option<String>,
    pub languages: Option<String>,
    pub keys: Option<String>,
    pub staging: Option<String>,
    pub backup: Option<String>,
    pub translator: Option<String>,
    pub concurrency: Option<usize>,
    pub website: Option<String>,
}

/// Everything a pipeline run produced. `catalog` is the in-memory catalog after
/// insertion (and merge, in auto-merge mode).
#[derive(Debug)]
pub struct RunReport {
    pub summary: String,
    pub staging_preview: Option<String>,
    pub stats: RunStats,
    pub missing: MissingTranslations,
    pub catalog: Catalog,
    pub staging: Catalog,
    pub merge_state: Option<MergeState>,
}

impl RunReport {
    /// Summary followed by the dry-run staging preview, if any.
    pub fn render(&self) -> String {
        match &self.staging_preview {
            Some(preview) => format!("{}\n\n{}", self.summary, preview),
            None => self.summary.clone(),
        }
    }
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = apply_overrides(settings::load_settings(settings_path)?, &config);
    let provider = build_provider(&settings);

    if let Some(source) = config.website.as_deref() {
        return run_website(Path::new(source), &settings, provider, config.dry_run).await;
    }

    let report = run_pipeline(&config, &settings, provider).await?;
    Ok(report.render())
}

pub fn apply_overrides(mut settings: Settings, config: &Config) -> Settings {
    if let Some(path) = non_empty(config.catalog.as_deref()) {
        settings.catalog_path = PathBuf::from(path);
    }
    if let Some(path) = non_empty(config.languages.as_deref()) {
        settings.languages_path = PathBuf::from(path);
    }
    if let Some(path) = non_empty(config.keys.as_deref()) {
        settings.keys_path = PathBuf::from(path);
    }
    if let Some(path) = non_empty(config.staging.as_deref()) {
        settings.staging_path = PathBuf::from(path);
    }
    if let Some(path) = non_empty(config.backup.as_deref()) {
        settings.backup_path = Some(PathBuf::from(path));
    }
    if let Some(command) = non_empty(config.translator.as_deref()) {
        settings.translator_command = command.to_string();
    }
    if let Some(concurrency) = config.concurrency.filter(|value| *value > 0) {
        settings.concurrency = concurrency;
    }
    settings
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn build_provider(settings: &Settings) -> CommandProvider {
    CommandProvider::new(settings.translator_command.clone())
        .with_args(settings.translator_args.clone())
        .with_check_args(settings.translator_check_args.clone())
        .with_timeout(settings.translator_timeout)
}

struct Analysis {
    catalog: Catalog,
    missing: MissingTranslations,
    staging: Catalog,
    stats: RunStats,
}

/// Detection, generation, insertion and new-key tracking, then either the
/// staging artifact (analysis mode) or a safe merge into the catalog file.
pub async fn run_pipeline<P: Provider>(
    config: &Config,
    settings: &Settings,
    provider: P,
) -> Result<RunReport, LocalizeError> {
    let reporter = Reporter::new(config.dry_run, config.verbose);
    let Analysis {
        mut catalog,
        missing,
        staging,
        stats,
    } = interruptible(analyze(settings, provider)).await?;

    let mut outcome = Vec::new();
    let mut staging_preview = None;
    let mut merge_state = None;

    if config.auto_merge {
        let backup_path = settings.resolved_backup_path();
        let mut merger = SafeMerger::new(&settings.catalog_path, &backup_path, config.dry_run);
        merger.mark_analyzed()?;
        let result = merger.run(&mut catalog, &staging);
        merge_state = Some(merger.state());
        let merged = result?;
        outcome.push(format!(
            "Merge: {} ({} keys added, {} keys merged, {} translations added)",
            merger.state().as_str(),
            merged.keys_added,
            merged.keys_merged,
            merged.translations_added
        ));
        if config.dry_run {
            outcome.push(format!("Backup: would be written to {}", backup_path.display()));
        } else {
            outcome.push(format!("Backup: {}", backup_path.display()));
        }
    } else {
        match reporter.emit_staging(&staging, &settings.staging_path) {
            Ok(StagingOutput::Written(path)) => {
                outcome.push(format!("Staging catalog: {}", path.display()));
            }
            Ok(StagingOutput::Preview(preview)) => {
                outcome.push("Staging catalog: printed below (dry run)".to_string());
                staging_preview = Some(preview);
            }
            Err(err) => {
                error!("{}", err.report());
                outcome.push(format!("Staging catalog: not written ({})", err));
            }
        }
        outcome.push("Catalog: unchanged (run with --auto-merge to apply)".to_string());
    }

    let mode = if config.auto_merge { "auto-merge" } else { "analysis" };
    let summary = reporter.summary(&stats, &missing, mode, &outcome);
    Ok(RunReport {
        summary,
        staging_preview,
        stats,
        missing,
        catalog,
        staging,
        merge_state,
    })
}

async fn analyze<P: Provider>(settings: &Settings, provider: P) -> Result<Analysis, LocalizeError> {
    let mut catalog = store::load_catalog(&settings.catalog_path)?;
    info!(
        "loaded {} keys from {}",
        catalog.len(),
        settings.catalog_path.display()
    );
    let locales = store::load_locale_set(&settings.languages_path)?;
    info!("loaded {} supported languages", locales.len());
    let manifest = store::load_key_manifest(&settings.keys_path)?;
    info!("loaded {} tracked keys", manifest.len());
    if manifest.source_language != catalog.source_language {
        warn!(
            "key list source language '{}' differs from catalog source language '{}'",
            manifest.source_language, catalog.source_language
        );
    }

    let service = TranslationService::new(provider, catalog.source_language.clone())
        .with_concurrency(settings.concurrency)
        .with_max_retries(settings.translator_retries);
    service.ensure_available().await?;
    info!("translation service '{}' is available", service.provider().name());

    let missing = coverage::find_missing(&catalog, &locales);
    let mut stats = RunStats {
        keys_processed: missing.len(),
        locales: locales.len(),
        keys_with_missing: coverage::keys_with_missing(&missing),
        missing_translations: coverage::total_missing(&missing),
        ..RunStats::default()
    };
    info!(
        "{} of {} keys are missing {} translations",
        stats.keys_with_missing, stats.keys_processed, stats.missing_translations
    );

    // Decided on the catalog as loaded: manifest keys without any translation
    // go to staging, everything else is filled in place.
    let mut new_keys = new_keys::find_new_keys(&catalog, &manifest);
    new_keys.retain(|key| catalog.entry(key).is_none_or(Entry::should_translate));
    stats.new_keys_found = new_keys.len();
    info!("found {} new keys", new_keys.len());

    let mut pairs = Vec::new();
    for (key, absent) in &missing {
        if absent.is_empty() || new_keys.contains(key) {
            continue;
        }
        if catalog.entry(key).is_some_and(|entry| !entry.should_translate()) {
            stats.skipped_do_not_translate += absent.len();
            continue;
        }
        pairs.extend(absent.iter().map(|locale| (key.clone(), locale.clone())));
    }
    for pair in service.translate_pairs(pairs).await {
        match &pair.outcome {
            TranslationOutcome::Translated(text) => {
                if merge::insert(&mut catalog, &pair.key, &pair.locale, text)
                    == merge::InsertOutcome::Inserted
                {
                    stats.translations_inserted += 1;
                }
            }
            TranslationOutcome::Failed(failure) => stats.record_failure(&pair.locale, failure),
        }
    }
    info!("inserted {} translations", stats.translations_inserted);

    let staging =
        new_keys::build_staging_catalog(&new_keys, &locales, &service, &catalog, &mut stats).await;

    let unsupported = service.unsupported_locales();
    if !unsupported.is_empty() {
        warn!(
            "language support missing for: {}",
            unsupported.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    Ok(Analysis {
        catalog,
        missing,
        staging,
        stats,
    })
}

/// Translates the website's `en.json` into every supported locale.
pub async fn run_website<P: Provider>(
    source: &Path,
    settings: &Settings,
    provider: P,
    dry_run: bool,
) -> Result<String> {
    let locales = store::load_locale_set(&settings.languages_path)?;
    let source_locale = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("en")
        .to_string();
    let service = TranslationService::new(provider, source_locale)
        .with_concurrency(settings.concurrency)
        .with_max_retries(settings.translator_retries);

    let report = interruptible(async {
        service.ensure_available().await?;
        website::generate_website_locales(source, &locales, &service, dry_run).await
    })
    .await?;

    let mut lines = vec![format!(
        "Website translations{}",
        if dry_run { " (dry run)" } else { "" }
    )];
    lines.push(format!("  Strings: {}", report.strings));
    lines.push(format!("  Kept source text: {}", report.fallbacks));
    let verb = if dry_run { "Would write" } else { "Wrote" };
    for path in &report.files {
        lines.push(format!("  {}: {}", verb, path.display()));
    }
    Ok(lines.join("\n"))
}

/// Runs `work` unless Ctrl-C arrives first.
async fn interruptible<F, T, E>(work: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<LocalizeError>,
{
    until_signal(work, tokio::signal::ctrl_c()).await
}

/// Drops `work` when `signal` fires. A signal that fails to install is ignored.
async fn until_signal<F, S, T, E>(work: F, signal: S) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    S: Future<Output = std::io::Result<()>>,
    E: From<LocalizeError>,
{
    tokio::select! {
        result = work => result,
        Ok(()) = signal => {
            warn!("interrupted; nothing was written");
            Err(LocalizeError::Interrupted.into())
        }
    }
}
