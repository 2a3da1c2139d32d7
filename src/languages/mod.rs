use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static LOCALE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{2,8})*$").expect("locale code pattern")
});

/// Supported locale codes, read from `languages.json`. Never mutated by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleSet {
    locales: BTreeMap<String, LocaleMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocaleMeta {
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

impl LocaleSet {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locales: codes
                .into_iter()
                .map(|code| (code.into(), LocaleMeta::default()))
                .collect(),
        }
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.locales.keys().cloned().collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.locales.contains_key(code)
    }

    pub fn meta(&self, code: &str) -> Option<&LocaleMeta> {
        self.locales.get(code)
    }

    pub fn len(&self) -> usize {
        self.locales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    pub(crate) fn invalid_codes(&self) -> Vec<&str> {
        self.codes()
            .filter(|code| !is_valid_locale_code(code))
            .collect()
    }
}

pub fn is_valid_locale_code(code: &str) -> bool {
    LOCALE_CODE.is_match(code)
}

/// Comparison form of a locale code: `pt_BR`, `pt-br` and `pt-BR` all collide.
pub fn normalize_code(code: &str) -> String {
    code.trim().replace('_', "-").to_lowercase()
}
