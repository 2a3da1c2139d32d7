use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Authoritative list of keys that should eventually exist in the catalog (`keys.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyManifest {
    #[serde(rename = "sourceLanguage", alias = "sourceLocale")]
    pub source_language: String,
    pub strings: BTreeMap<String, KeyMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMeta {
    #[serde(
        rename = "lastUpdated",
        alias = "last_updated",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KeyManifest {
    pub fn new(source_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            strings: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.strings.insert(key.into(), KeyMeta::default());
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.strings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
