use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use catalog_localizer::{
    Config, LocalizeError, Localization, MergeState, Provider, ProviderError, ProviderFuture,
    Settings, TranslationRequest, TranslationState, run_pipeline, store,
};
use tempfile::{TempDir, tempdir};

#[derive(Debug, Clone, Default)]
struct EchoProvider {
    unavailable: bool,
    unsupported: BTreeSet<String>,
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl EchoProvider {
    fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn check_available(&self) -> ProviderFuture<()> {
        let unavailable = self.unavailable;
        Box::pin(async move {
            if unavailable {
                Err(ProviderError::Failed("bridge not found".to_string()))
            } else {
                Ok(())
            }
        })
    }

    fn translate(&self, request: TranslationRequest) -> ProviderFuture<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let result = if self.unsupported.contains(&request.target_locale) {
            Err(ProviderError::UnsupportedLocale {
                locale: request.target_locale.clone(),
            })
        } else {
            Ok(format!("{} ({})", request.text, request.target_locale))
        };
        Box::pin(async move { result })
    }
}

struct Workspace {
    _dir: TempDir,
    settings: Settings,
}

impl Workspace {
    fn new(catalog: &str, languages: &str, keys: &str) -> Self {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        fs::write(root.join("Localizable.xcstrings"), catalog).expect("catalog");
        fs::write(root.join("languages.json"), languages).expect("languages");
        fs::write(root.join("keys.json"), keys).expect("keys");
        let settings = Settings {
            catalog_path: root.join("Localizable.xcstrings"),
            languages_path: root.join("languages.json"),
            keys_path: root.join("keys.json"),
            staging_path: root.join("new_keys.xcstrings"),
            backup_path: None,
            concurrency: 4,
            translator_retries: 0,
            ..Settings::default()
        };
        Self {
            _dir: dir,
            settings,
        }
    }

    fn catalog_path(&self) -> &Path {
        &self.settings.catalog_path
    }

    fn backup_path(&self) -> PathBuf {
        self.settings.resolved_backup_path()
    }
}

const ES_FR: &str = r#"{
  "es": {"lastUpdated": "2025-01-01T00:00:00Z"},
  "fr": {"lastUpdated": "2025-01-01T00:00:00Z"}
}"#;

const DE_ES_FR: &str = r#"{
  "de": {"lastUpdated": "2025-01-01T00:00:00Z"},
  "es": {"lastUpdated": "2025-01-01T00:00:00Z"},
  "fr": {"lastUpdated": "2025-01-01T00:00:00Z"}
}"#;

const NO_KEYS: &str = r#"{"sourceLanguage": "en", "strings": {}}"#;

fn analysis() -> Config {
    Config::default()
}

fn auto_merge() -> Config {
    Config {
        auto_merge: true,
        ..Config::default()
    }
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .expect("mtime")
}

#[tokio::test]
async fn missing_locales_are_generated_and_inserted() {
    let ws = Workspace::new(
        r#"{"sourceLocale": "en", "entries": {"Hello": {}}, "formatVersion": "1.0"}"#,
        ES_FR,
        NO_KEYS,
    );

    let report = run_pipeline(&analysis(), &ws.settings, EchoProvider::default())
        .await
        .expect("run");

    let expected: BTreeSet<String> = ["es", "fr"].iter().map(|s| s.to_string()).collect();
    assert_eq!(report.missing.get("Hello"), Some(&expected));
    for locale in ["es", "fr"] {
        let translation = report
            .catalog
            .translation("Hello", locale)
            .expect("translation");
        assert_eq!(translation.state(), Some(&TranslationState::Translated));
        assert_eq!(
            translation.value().map(str::to_string),
            Some(format!("Hello ({})", locale))
        );
    }
    assert_eq!(report.stats.keys_processed, 1);
    assert_eq!(report.stats.translations_inserted, 2);
}

#[tokio::test]
async fn existing_translations_are_neither_changed_nor_requested() {
    let catalog = r#"{
  "sourceLanguage" : "en",
  "strings" : {
    "%lld words" : {
      "localizations" : {
        "de" : {
          "stringUnit" : {
            "state" : "translated",
            "value" : "%lld Wörter"
          }
        }
      }
    }
  },
  "version" : "1.0"
}"#;
    let ws = Workspace::new(catalog, DE_ES_FR, NO_KEYS);
    let provider = EchoProvider::default();

    let report = run_pipeline(&analysis(), &ws.settings, provider.clone())
        .await
        .expect("run");

    assert_eq!(
        report
            .catalog
            .translation("%lld words", "de")
            .and_then(Localization::value),
        Some("%lld Wörter")
    );
    assert!(
        provider
            .requests()
            .iter()
            .all(|request| request.target_locale != "de")
    );
    assert_eq!(report.stats.translations_inserted, 2);
    assert_eq!(
        fs::read_to_string(ws.catalog_path()).expect("read"),
        catalog
    );
}

#[tokio::test]
async fn auto_merge_adds_new_key_and_keeps_backup() {
    let catalog = r#"{"sourceLanguage": "en", "strings": {}, "version": "1.0"}"#;
    let ws = Workspace::new(
        catalog,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Brand New Key": {"lastUpdated": "2025-01-01T00:00:00Z"}}}"#,
    );

    let report = run_pipeline(&auto_merge(), &ws.settings, EchoProvider::default())
        .await
        .expect("run");

    assert_eq!(report.merge_state, Some(MergeState::Merged));
    assert_eq!(report.stats.new_keys_found, 1);
    let merged = store::load_catalog(ws.catalog_path()).expect("reload");
    let entry = merged.entry("Brand New Key").expect("merged key");
    assert_eq!(entry.translation_count(), 2);
    assert!(entry.has_locale("es"));
    assert!(entry.has_locale("fr"));
    assert_eq!(
        fs::read_to_string(ws.backup_path()).expect("backup"),
        catalog
    );
    assert!(!ws.settings.staging_path.exists());
}

#[tokio::test]
async fn analysis_mode_writes_staging_and_leaves_catalog_alone() {
    let catalog = r#"{"sourceLanguage": "en", "strings": {"Cancel": {}}, "version": "1.0"}"#;
    let ws = Workspace::new(
        catalog,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Export PDF": {"lastUpdated": "2025-01-01T00:00:00Z"}}}"#,
    );

    let report = run_pipeline(&analysis(), &ws.settings, EchoProvider::default())
        .await
        .expect("run");

    assert_eq!(report.merge_state, None);
    assert_eq!(
        fs::read_to_string(ws.catalog_path()).expect("read"),
        catalog
    );
    let staging = store::load_catalog(&ws.settings.staging_path).expect("staging");
    assert_eq!(staging.len(), 1);
    assert_eq!(
        staging
            .translation("Export PDF", "fr")
            .and_then(Localization::value),
        Some("Export PDF (fr)")
    );
    assert!(report.summary.contains("New keys found: 1"));
}

#[tokio::test]
async fn dry_run_leaves_the_filesystem_untouched() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {"Hello": {}}, "version": "1.0"}"#,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Brand New Key": {"lastUpdated": "2025-01-01T00:00:00Z"}}}"#,
    );
    let before = fs::read(ws.catalog_path()).expect("read");
    let modified = mtime(ws.catalog_path());

    for config in [analysis(), auto_merge()] {
        let config = Config {
            dry_run: true,
            ..config
        };
        let report = run_pipeline(&config, &ws.settings, EchoProvider::default())
            .await
            .expect("run");
        assert!(report.summary.contains("dry run"));
        assert_eq!(fs::read(ws.catalog_path()).expect("read"), before);
        assert_eq!(mtime(ws.catalog_path()), modified);
        assert!(!ws.backup_path().exists());
        assert!(!ws.settings.staging_path.exists());
    }
}

#[tokio::test]
async fn dry_run_analysis_previews_staging() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {}, "version": "1.0"}"#,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Brand New Key": {}}}"#,
    );
    let config = Config {
        dry_run: true,
        ..Config::default()
    };

    let report = run_pipeline(&config, &ws.settings, EchoProvider::default())
        .await
        .expect("run");

    let preview = report.staging_preview.as_deref().expect("preview");
    assert!(preview.contains("\"Brand New Key\" : {"));
    assert!(report.render().ends_with(preview));
}

#[tokio::test]
async fn unsupported_locale_is_reported_not_fatal() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {"Hello": {}, "Goodbye": {}}, "version": "1.0"}"#,
        DE_ES_FR,
        NO_KEYS,
    );
    let provider = EchoProvider {
        unsupported: ["fr".to_string()].into_iter().collect(),
        ..EchoProvider::default()
    };

    let report = run_pipeline(&analysis(), &ws.settings, provider)
        .await
        .expect("run");

    assert_eq!(report.stats.translations_inserted, 4);
    assert_eq!(report.stats.unavailable_by_locale.get("fr"), Some(&2));
    assert!(report.catalog.translation("Hello", "fr").is_none());
    assert!(report.summary.contains("Unavailable languages: fr (2)"));
}

#[tokio::test]
async fn unavailable_translator_fails_before_any_work() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {"Hello": {}}, "version": "1.0"}"#,
        ES_FR,
        NO_KEYS,
    );
    let provider = EchoProvider {
        unavailable: true,
        ..EchoProvider::default()
    };

    let err = run_pipeline(&auto_merge(), &ws.settings, provider.clone())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LocalizeError::TranslationCapabilityUnavailable { .. }
    ));
    assert!(provider.requests().is_empty());
    assert!(!ws.backup_path().exists());
}

#[tokio::test]
async fn missing_input_file_is_fatal_with_path() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {}, "version": "1.0"}"#,
        ES_FR,
        NO_KEYS,
    );
    let mut settings = ws.settings.clone();
    settings.keys_path = settings.keys_path.with_file_name("absent.json");

    let err = run_pipeline(&analysis(), &settings, EchoProvider::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LocalizeError::MissingFile { .. }));
    assert_eq!(err.path(), Some(settings.keys_path.as_path()));
    assert!(err.report().contains("Action:"));
}

#[tokio::test]
async fn catalog_without_version_is_rejected() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {}}"#,
        ES_FR,
        NO_KEYS,
    );

    let err = run_pipeline(&analysis(), &ws.settings, EchoProvider::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LocalizeError::InvalidSchema { .. }));
}

#[tokio::test]
async fn tracked_key_without_translations_goes_to_staging() {
    let catalog = r#"{"sourceLanguage": "en", "strings": {"Hello": {}}, "version": "1.0"}"#;
    let ws = Workspace::new(
        catalog,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Hello": {}}}"#,
    );
    let provider = EchoProvider::default();

    let report = run_pipeline(&analysis(), &ws.settings, provider.clone())
        .await
        .expect("run");

    assert_eq!(report.stats.new_keys_found, 1);
    assert_eq!(provider.requests().len(), 2);
    let staging = store::load_catalog(&ws.settings.staging_path).expect("staging");
    let entry = staging.entry("Hello").expect("staged key");
    assert!(entry.has_locale("es"));
    assert!(entry.has_locale("fr"));
    assert_eq!(
        fs::read_to_string(ws.catalog_path()).expect("read"),
        catalog
    );
}

#[tokio::test]
async fn tracked_key_without_translations_is_merged_in_place() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {"Hello": {"comment": "Greeting"}}, "version": "1.0"}"#,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Hello": {}}}"#,
    );

    let report = run_pipeline(&auto_merge(), &ws.settings, EchoProvider::default())
        .await
        .expect("run");

    assert_eq!(report.merge_state, Some(MergeState::Merged));
    let merged = store::load_catalog(ws.catalog_path()).expect("reload");
    let entry = merged.entry("Hello").expect("entry");
    assert_eq!(entry.translation_count(), 2);
    assert_eq!(entry.extra.get("comment"), Some(&serde_json::json!("Greeting")));
}

#[tokio::test]
async fn do_not_translate_entries_are_reported_but_never_sent() {
    let ws = Workspace::new(
        r#"{"sourceLanguage": "en", "strings": {"Markdown": {"shouldTranslate": false}, "Hello": {}}, "version": "1.0"}"#,
        ES_FR,
        r#"{"sourceLanguage": "en", "strings": {"Markdown": {}}}"#,
    );
    let provider = EchoProvider::default();

    let report = run_pipeline(&analysis(), &ws.settings, provider.clone())
        .await
        .expect("run");

    let expected: BTreeSet<String> = ["es", "fr"].iter().map(|s| s.to_string()).collect();
    assert_eq!(report.missing.get("Markdown"), Some(&expected));
    assert!(
        provider
            .requests()
            .iter()
            .all(|request| request.text != "Markdown")
    );
    assert_eq!(report.stats.skipped_do_not_translate, 2);
    assert_eq!(report.stats.new_keys_found, 0);
    assert!(report.staging.entry("Markdown").is_none());
    assert!(report.catalog.translation("Markdown", "es").is_none());
    assert!(report.catalog.translation("Hello", "es").is_some());
}
