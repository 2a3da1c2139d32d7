use crate::catalog::{Catalog, Entry, Localization};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A translation already existed and was left untouched.
    AlreadyPresent,
}

/// Inserts a `translated` unit for (key, locale) unless one already exists.
///
/// Existing translations are never modified, whatever their state or value.
/// A missing entry or `localizations` map is created; nothing else in the
/// catalog is touched.
pub fn insert(catalog: &mut Catalog, key: &str, locale: &str, text: &str) -> InsertOutcome {
    let entry = catalog.strings.entry(key.to_string()).or_default();
    insert_localization(entry, locale, Localization::translated(text))
}

/// Folds `incoming` into `target` locale by locale with the same rule as [`insert`].
/// Returns how many localizations were added.
pub fn merge_entry(target: &mut Entry, incoming: &Entry) -> usize {
    let Some(localizations) = incoming.localizations.as_ref() else {
        return 0;
    };
    let mut added = 0;
    for (locale, localization) in localizations {
        if insert_localization(target, locale, localization.clone()) == InsertOutcome::Inserted {
            added += 1;
        }
    }
    added
}

fn insert_localization(
    entry: &mut Entry,
    locale: &str,
    localization: Localization,
) -> InsertOutcome {
    let localizations = entry.localizations.get_or_insert_default();
    if localizations.contains_key(locale) {
        return InsertOutcome::AlreadyPresent;
    }
    localizations.insert(locale.to_string(), localization);
    InsertOutcome::Inserted
}
