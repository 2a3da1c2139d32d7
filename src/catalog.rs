use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// In-memory form of a String Catalog (`Localizable.xcstrings`).
///
/// Fields the pipeline does not understand are kept in `extra` maps at every
/// level so that a load/serialize cycle does not drop them.
///
/// Read and write documents through [`Catalog::from_json_value`] and
/// [`Catalog::to_json_value`], which keep the field names and translation
/// shape of the original file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "sourceLanguage")]
    pub source_language: String,
    pub strings: BTreeMap<String, Entry>,
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub layout: CatalogLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localizations: Option<BTreeMap<String, Localization>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Localization {
    #[serde(
        rename = "stringUnit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub string_unit: Option<StringUnit>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringUnit {
    pub state: TranslationState,
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranslationState {
    New,
    Translated,
    NeedsReview,
    Stale,
    Other(String),
}

impl TranslationState {
    pub fn as_str(&self) -> &str {
        match self {
            TranslationState::New => "new",
            TranslationState::Translated => "translated",
            TranslationState::NeedsReview => "needs_review",
            TranslationState::Stale => "stale",
            TranslationState::Other(value) => value,
        }
    }
}

impl From<String> for TranslationState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "new" => TranslationState::New,
            "translated" => TranslationState::Translated,
            "needs_review" => TranslationState::NeedsReview,
            "stale" => TranslationState::Stale,
            _ => TranslationState::Other(value),
        }
    }
}

impl From<TranslationState> for String {
    fn from(value: TranslationState) -> Self {
        value.as_str().to_string()
    }
}

impl Catalog {
    pub fn new(source_language: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            strings: BTreeMap::new(),
            version: version.into(),
            extra: Map::new(),
            layout: CatalogLayout::default(),
        }
    }

    /// An empty catalog sharing this catalog's source language, version and layout.
    pub fn empty_like(&self) -> Self {
        Self {
            layout: self.layout,
            ..Self::new(self.source_language.clone(), self.version.clone())
        }
    }

    /// Parses a catalog document written with either naming, remembering which
    /// one it used.
    pub fn from_json_value(mut value: Value) -> serde_json::Result<Self> {
        let layout = CatalogLayout::detect(&value);
        layout.normalize(&mut value);
        let mut catalog: Catalog = serde_json::from_value(value)?;
        catalog.layout = layout;
        Ok(catalog)
    }

    /// The catalog as a document in the layout it was loaded with.
    pub fn to_json_value(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        self.layout.apply(&mut value);
        Ok(value)
    }

    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.strings.get(key)
    }

    pub fn translation(&self, key: &str, locale: &str) -> Option<&Localization> {
        self.strings
            .get(key)
            .and_then(|entry| entry.localization(locale))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Entry {
    /// Absent and empty `localizations` both count as zero translations.
    pub fn translation_count(&self) -> usize {
        self.localizations.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn has_translations(&self) -> bool {
        self.translation_count() > 0
    }

    pub fn localization(&self, locale: &str) -> Option<&Localization> {
        self.localizations
            .as_ref()
            .and_then(|localizations| localizations.get(locale))
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.localization(locale).is_some()
    }

    /// Xcode marks strings that must stay in the source language with `"shouldTranslate": false`.
    pub fn should_translate(&self) -> bool {
        self.extra
            .get("shouldTranslate")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

impl Localization {
    pub fn translated(value: impl Into<String>) -> Self {
        Self {
            string_unit: Some(StringUnit {
                state: TranslationState::Translated,
                value: value.into(),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.string_unit.as_ref().map(|unit| unit.value.as_str())
    }

    pub fn state(&self) -> Option<&TranslationState> {
        self.string_unit.as_ref().map(|unit| &unit.state)
    }
}

const SOURCE_FIELD: &str = "sourceLanguage";
const ENTRIES_FIELD: &str = "strings";
const VERSION_FIELD: &str = "version";
const TRANSLATIONS_FIELD: &str = "localizations";
const UNIT_FIELD: &str = "stringUnit";

/// Field names and translation shape of a catalog file.
///
/// Xcode writes `sourceLanguage`/`strings`/`version`/`localizations` with
/// translations wrapped in `stringUnit`. The abstract form uses
/// `sourceLocale`/`entries`/`formatVersion`/`translations` and flat
/// `{state, value}` translations. In memory every catalog uses the Xcode form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLayout {
    pub source_field: &'static str,
    pub entries_field: &'static str,
    pub version_field: &'static str,
    pub translations_field: &'static str,
    pub flat_units: bool,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        Self::XCODE
    }
}

impl CatalogLayout {
    pub const XCODE: Self = Self {
        source_field: SOURCE_FIELD,
        entries_field: ENTRIES_FIELD,
        version_field: VERSION_FIELD,
        translations_field: TRANSLATIONS_FIELD,
        flat_units: false,
    };

    pub const ABSTRACT: Self = Self {
        source_field: "sourceLocale",
        entries_field: "entries",
        version_field: "formatVersion",
        translations_field: "translations",
        flat_units: true,
    };

    /// Each name is taken from the document when it uses the abstract one
    /// alone. Without any translation to look at, the translation side
    /// follows the name of the entries field.
    pub fn detect(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            return Self::XCODE;
        };
        let pick = |xcode: &'static str, other: &'static str| {
            if !root.contains_key(xcode) && root.contains_key(other) {
                other
            } else {
                xcode
            }
        };
        let entries_field = pick(ENTRIES_FIELD, Self::ABSTRACT.entries_field);
        let mut layout = Self {
            source_field: pick(SOURCE_FIELD, Self::ABSTRACT.source_field),
            entries_field,
            version_field: pick(VERSION_FIELD, Self::ABSTRACT.version_field),
            ..Self::XCODE
        };

        let mut xcode_maps = false;
        let mut abstract_maps = false;
        let mut wrapped = false;
        let mut flat = false;
        let entries = root.get(entries_field).and_then(Value::as_object);
        for entry in entries.into_iter().flat_map(|map| map.values()) {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            for field in [TRANSLATIONS_FIELD, Self::ABSTRACT.translations_field] {
                let Some(translations) = entry.get(field).and_then(Value::as_object) else {
                    continue;
                };
                if field == TRANSLATIONS_FIELD {
                    xcode_maps = true;
                } else {
                    abstract_maps = true;
                }
                for unit in translations.values().filter_map(Value::as_object) {
                    if unit.contains_key(UNIT_FIELD) {
                        wrapped = true;
                    } else if is_flat_unit(unit) {
                        flat = true;
                    }
                }
            }
        }

        let abstract_entries = entries_field == Self::ABSTRACT.entries_field;
        if !xcode_maps && (abstract_maps || abstract_entries) {
            layout.translations_field = Self::ABSTRACT.translations_field;
        }
        layout.flat_units = if flat || wrapped {
            flat && !wrapped
        } else {
            abstract_entries
        };
        layout
    }

    /// Rewrites a document in this layout into the Xcode form.
    pub(crate) fn normalize(&self, value: &mut Value) {
        let Some(root) = value.as_object_mut() else {
            return;
        };
        rename_field(root, self.source_field, SOURCE_FIELD);
        rename_field(root, self.entries_field, ENTRIES_FIELD);
        rename_field(root, self.version_field, VERSION_FIELD);
        for entry in entry_objects(root) {
            rename_field(entry, self.translations_field, TRANSLATIONS_FIELD);
            if !self.flat_units {
                continue;
            }
            for unit in unit_objects(entry) {
                if is_flat_unit(unit) {
                    let mut wrapped = Map::new();
                    for field in ["state", "value"] {
                        if let Some(field_value) = unit.remove(field) {
                            wrapped.insert(field.to_string(), field_value);
                        }
                    }
                    unit.insert(UNIT_FIELD.to_string(), Value::Object(wrapped));
                }
            }
        }
    }

    /// Rewrites an Xcode-form document into this layout.
    pub(crate) fn apply(&self, value: &mut Value) {
        let Some(root) = value.as_object_mut() else {
            return;
        };
        for entry in entry_objects(root) {
            if self.flat_units {
                for unit in unit_objects(entry) {
                    if let Some(Value::Object(wrapped)) = unit.remove(UNIT_FIELD) {
                        for (field, field_value) in wrapped {
                            unit.entry(field).or_insert(field_value);
                        }
                    }
                }
            }
            rename_field(entry, TRANSLATIONS_FIELD, self.translations_field);
        }
        rename_field(root, SOURCE_FIELD, self.source_field);
        rename_field(root, ENTRIES_FIELD, self.entries_field);
        rename_field(root, VERSION_FIELD, self.version_field);
    }
}

fn is_flat_unit(unit: &Map<String, Value>) -> bool {
    !unit.contains_key(UNIT_FIELD) && unit.contains_key("state") && unit.contains_key("value")
}

fn rename_field(map: &mut Map<String, Value>, from: &str, to: &str) {
    if from == to || map.contains_key(to) {
        return;
    }
    if let Some(value) = map.remove(from) {
        map.insert(to.to_string(), value);
    }
}

fn entry_objects(
    root: &mut Map<String, Value>,
) -> impl Iterator<Item = &mut Map<String, Value>> {
    root.get_mut(ENTRIES_FIELD)
        .and_then(Value::as_object_mut)
        .into_iter()
        .flat_map(|entries| entries.values_mut())
        .filter_map(Value::as_object_mut)
}

fn unit_objects(
    entry: &mut Map<String, Value>,
) -> impl Iterator<Item = &mut Map<String, Value>> {
    entry
        .get_mut(TRANSLATIONS_FIELD)
        .and_then(Value::as_object_mut)
        .into_iter()
        .flat_map(|translations| translations.values_mut())
        .filter_map(Value::as_object_mut)
}
