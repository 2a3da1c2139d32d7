use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::Catalog;
use crate::languages::LocaleSet;

/// Key -> locales that have no translation for it. Every catalog key is present,
/// including keys that are fully translated (with an empty set).
pub type MissingTranslations = BTreeMap<String, BTreeSet<String>>;

pub fn find_missing(catalog: &Catalog, locales: &LocaleSet) -> MissingTranslations {
    catalog
        .strings
        .iter()
        .map(|(key, entry)| {
            let missing = locales
                .codes()
                .filter(|locale| !entry.has_locale(locale))
                .map(str::to_string)
                .collect::<BTreeSet<_>>();
            (key.clone(), missing)
        })
        .collect()
}

pub fn total_missing(missing: &MissingTranslations) -> usize {
    missing.values().map(BTreeSet::len).sum()
}

pub fn keys_with_missing(missing: &MissingTranslations) -> usize {
    missing.values().filter(|locales| !locales.is_empty()).count()
}
