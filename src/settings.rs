use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backup;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../localize.toml");
const MAX_DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub catalog_path: PathBuf,
    pub languages_path: PathBuf,
    pub keys_path: PathBuf,
    pub staging_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub translator_command: String,
    pub translator_args: Vec<String>,
    pub translator_check_args: Vec<String>,
    pub translator_timeout: Duration,
    pub translator_retries: usize,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("Localizable.xcstrings"),
            languages_path: PathBuf::from("languages.json"),
            keys_path: PathBuf::from("keys.json"),
            staging_path: PathBuf::from("new_keys.xcstrings"),
            backup_path: None,
            translator_command: "translate-bridge".to_string(),
            translator_args: Vec::new(),
            translator_check_args: Vec::new(),
            translator_timeout: Duration::from_secs(30),
            translator_retries: 2,
            concurrency: num_cpus::get().clamp(1, MAX_DEFAULT_CONCURRENCY),
        }
    }
}

impl Settings {
    /// The configured backup path, or `<catalog>.backup`.
    pub fn resolved_backup_path(&self) -> PathBuf {
        self.backup_path
            .clone()
            .unwrap_or_else(|| backup::default_backup_path(&self.catalog_path))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    paths: Option<PathSettings>,
    translator: Option<TranslatorSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct PathSettings {
    catalog: Option<String>,
    languages: Option<String>,
    keys: Option<String>,
    staging: Option<String>,
    backup: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSettings {
    command: Option<String>,
    args: Option<Vec<String>>,
    check_args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    retries: Option<usize>,
    concurrency: Option<usize>,
}

/// Layers the embedded defaults, `localize.toml`, `localize.local.toml` and an
/// optional explicit file (which must exist). Never writes anything.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings
        .merge_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse default settings")?;

    let mut ordered_paths = vec![
        PathBuf::from("localize.toml"),
        PathBuf::from("localize.local.toml"),
    ];
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub(crate) fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(paths) = incoming.paths {
            if let Some(path) = non_empty(paths.catalog) {
                self.catalog_path = PathBuf::from(path);
            }
            if let Some(path) = non_empty(paths.languages) {
                self.languages_path = PathBuf::from(path);
            }
            if let Some(path) = non_empty(paths.keys) {
                self.keys_path = PathBuf::from(path);
            }
            if let Some(path) = non_empty(paths.staging) {
                self.staging_path = PathBuf::from(path);
            }
            if let Some(path) = non_empty(paths.backup) {
                self.backup_path = Some(PathBuf::from(path));
            }
        }
        if let Some(translator) = incoming.translator {
            if let Some(command) = non_empty(translator.command) {
                self.translator_command = command;
            }
            if let Some(args) = translator.args {
                self.translator_args = args;
            }
            if let Some(args) = translator.check_args {
                self.translator_check_args = args;
            }
            if let Some(secs) = translator.timeout_secs {
                if secs > 0 {
                    self.translator_timeout = Duration::from_secs(secs);
                }
            }
            if let Some(retries) = translator.retries {
                self.translator_retries = retries;
            }
            if let Some(concurrency) = translator.concurrency {
                if concurrency > 0 {
                    self.concurrency = concurrency;
                }
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
