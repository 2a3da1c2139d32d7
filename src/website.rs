//! Locale files for the marketing website: every string leaf of `<dir>/en.json`
//! is translated into `<dir>/<locale>.json`.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::languages::LocaleSet;
use crate::providers::Provider;
use crate::store;
use crate::translator::{TranslationOutcome, TranslationService};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteReport {
    pub files: Vec<PathBuf>,
    pub strings: usize,
    /// Leaves that kept the source text because translation failed.
    pub fallbacks: usize,
}

pub async fn generate_website_locales<P: Provider>(
    source: &Path,
    locales: &LocaleSet,
    service: &TranslationService<P>,
    dry_run: bool,
) -> Result<WebsiteReport> {
    let content = fs::read_to_string(source)
        .with_context(|| format!("failed to read website source: {}", source.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse website source: {}", source.display()))?;
    let dir = source
        .parent()
        .ok_or_else(|| anyhow!("website source has no parent directory: {}", source.display()))?;
    let source_stem = source.file_stem().and_then(|stem| stem.to_str()).unwrap_or("");

    let mut texts = BTreeSet::new();
    collect_strings(&document, &mut texts);
    let texts = texts.into_iter().collect::<Vec<_>>();
    info!(
        "generating website translations for {} languages ({} strings)",
        locales.len(),
        texts.len()
    );

    let mut rendered = Vec::new();
    let mut report = WebsiteReport {
        strings: texts.len(),
        ..WebsiteReport::default()
    };
    for locale in locales.codes() {
        if locale == service.source_locale() || locale == source_stem {
            info!("skipping {} (source language)", locale);
            continue;
        }
        let outcomes = service.translate_texts(&texts, locale).await;
        let translated = translate_value(&document, &outcomes, &mut report.fallbacks);
        let mut bytes = serde_json::to_vec_pretty(&translated)
            .with_context(|| format!("failed to serialize {}.json", locale))?;
        bytes.push(b'\n');
        rendered.push((dir.join(format!("{}.json", locale)), bytes));
    }

    for (path, bytes) in rendered {
        if dry_run {
            info!("dry run: would write {}", path.display());
        } else {
            store::write_atomic(&path, &bytes)?;
            info!("created {}", path.display());
        }
        report.files.push(path);
    }
    if report.fallbacks > 0 {
        warn!(
            "{} website strings kept their source text after failed translations",
            report.fallbacks
        );
    }
    Ok(report)
}

fn collect_strings(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(text) => {
            out.insert(text.clone());
        }
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn translate_value(
    value: &Value,
    outcomes: &BTreeMap<String, TranslationOutcome>,
    fallbacks: &mut usize,
) -> Value {
    match value {
        Value::String(text) => match outcomes.get(text).and_then(TranslationOutcome::text) {
            Some(translated) => Value::String(translated.to_string()),
            None => {
                *fallbacks += 1;
                Value::String(text.clone())
            }
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| translate_value(item, outcomes, fallbacks))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), translate_value(item, outcomes, fallbacks)))
                .collect(),
        ),
        other => other.clone(),
    }
}
