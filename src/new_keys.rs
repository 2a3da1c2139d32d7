use std::collections::BTreeSet;
use tracing::info;

use crate::catalog::Catalog;
use crate::languages::LocaleSet;
use crate::manifest::KeyManifest;
use crate::merge;
use crate::providers::Provider;
use crate::report::RunStats;
use crate::translator::{TranslationOutcome, TranslationService};

/// Manifest keys that are absent from the catalog or present with zero translations.
///
/// Keys with at least one translation belong to the coverage path and are excluded.
pub fn find_new_keys(catalog: &Catalog, manifest: &KeyManifest) -> BTreeSet<String> {
    manifest
        .keys()
        .filter(|key| {
            catalog
                .entry(key)
                .is_none_or(|entry| !entry.has_translations())
        })
        .map(str::to_string)
        .collect()
}

/// Builds a fresh catalog holding only `new_keys`, each translated into every
/// locale of `locales`. The live catalog is only used for its source language
/// and version.
pub async fn build_staging_catalog<P: Provider>(
    new_keys: &BTreeSet<String>,
    locales: &LocaleSet,
    service: &TranslationService<P>,
    live: &Catalog,
    stats: &mut RunStats,
) -> Catalog {
    let mut staging = live.empty_like();
    for key in new_keys {
        staging.strings.entry(key.clone()).or_default();
    }

    let pairs = new_keys
        .iter()
        .flat_map(|key| locales.codes().map(move |locale| (key.clone(), locale.to_string())))
        .collect::<Vec<_>>();
    info!(
        "translating {} new keys into {} locales ({} requests)",
        new_keys.len(),
        locales.len(),
        pairs.len()
    );

    for pair in service.translate_pairs(pairs).await {
        match &pair.outcome {
            TranslationOutcome::Translated(text) => {
                if merge::insert(&mut staging, &pair.key, &pair.locale, text)
                    == merge::InsertOutcome::Inserted
                {
                    stats.staging_translations += 1;
                }
            }
            TranslationOutcome::Failed(failure) => stats.record_failure(&pair.locale, failure),
        }
    }
    staging
}
