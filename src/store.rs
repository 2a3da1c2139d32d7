//! Loading, validating and writing the catalog and its reference files.
//!
//! Writes never truncate the destination in place: bytes go to a temporary file
//! in the destination directory which is then renamed over the target. The
//! temporary file is removed when anything fails before the rename.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::ser::Formatter;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::LocalizeError;
use crate::languages::{self, LocaleSet};
use crate::manifest::KeyManifest;

// Each required field with the alternative names it may appear under.
const CATALOG_FIELDS: &[&[&str]] = &[
    &["sourceLanguage", "sourceLocale"],
    &["strings", "entries"],
    &["version", "formatVersion"],
];
const MANIFEST_FIELDS: &[&[&str]] = &[&["sourceLanguage", "sourceLocale"], &["strings"]];

pub fn load_catalog(path: &Path) -> Result<Catalog, LocalizeError> {
    let what = "Localizable.xcstrings";
    let value = read_document(path, what)?;
    require_fields(&value, path, what, CATALOG_FIELDS)?;
    let catalog = Catalog::from_json_value(value).map_err(|err| LocalizeError::InvalidSchema {
        what,
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    validate_catalog(&catalog).map_err(|reason| LocalizeError::InvalidSchema {
        what,
        path: path.to_path_buf(),
        reason,
    })?;
    info!(
        "validated {} structure (sourceLanguage: {}, version: {})",
        what, catalog.source_language, catalog.version
    );
    Ok(catalog)
}

pub fn load_locale_set(path: &Path) -> Result<LocaleSet, LocalizeError> {
    let what = "languages.json";
    let value = read_document(path, what)?;
    if !value.is_object() {
        return Err(LocalizeError::InvalidSchema {
            what,
            path: path.to_path_buf(),
            reason: "expected an object mapping locale codes to metadata".to_string(),
        });
    }
    let locales: LocaleSet = from_value(value, path, what)?;
    let invalid = locales.invalid_codes();
    if !invalid.is_empty() {
        return Err(LocalizeError::InvalidSchema {
            what,
            path: path.to_path_buf(),
            reason: format!("invalid locale codes: {}", invalid.join(", ")),
        });
    }
    Ok(locales)
}

pub fn load_key_manifest(path: &Path) -> Result<KeyManifest, LocalizeError> {
    let what = "keys.json";
    let value = read_document(path, what)?;
    require_fields(&value, path, what, MANIFEST_FIELDS)?;
    from_value(value, path, what)
}

fn read_document(path: &Path, what: &'static str) -> Result<Value, LocalizeError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(LocalizeError::MissingFile {
                what,
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(LocalizeError::Io {
                what,
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let value = serde_json::from_str(&content).map_err(|err| LocalizeError::MalformedDocument {
        what,
        path: path.to_path_buf(),
        line: err.line(),
        column: err.column(),
        reason: err.to_string(),
    })?;
    info!("loaded {} from {}", what, path.display());
    Ok(value)
}

fn require_fields(
    value: &Value,
    path: &Path,
    what: &'static str,
    fields: &[&[&str]],
) -> Result<(), LocalizeError> {
    let missing = fields
        .iter()
        .filter(|names| {
            value
                .as_object()
                .is_none_or(|object| !names.iter().any(|name| object.contains_key(*name)))
        })
        .map(|names| names[0])
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return Ok(());
    }
    Err(LocalizeError::InvalidSchema {
        what,
        path: path.to_path_buf(),
        reason: format!("missing required fields: {}", missing.join(", ")),
    })
}

fn from_value<T: DeserializeOwned>(
    value: Value,
    path: &Path,
    what: &'static str,
) -> Result<T, LocalizeError> {
    serde_json::from_value(value).map_err(|err| LocalizeError::InvalidSchema {
        what,
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Structural checks shared by loading and serialization.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), String> {
    if catalog.source_language.trim().is_empty() {
        return Err("sourceLanguage is empty".to_string());
    }
    if catalog.version.trim().is_empty() {
        return Err("version is empty".to_string());
    }
    for (key, entry) in &catalog.strings {
        if key.is_empty() {
            return Err("catalog contains an empty key".to_string());
        }
        let Some(localizations) = entry.localizations.as_ref() else {
            continue;
        };
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for locale in localizations.keys() {
            if !languages::is_valid_locale_code(locale) {
                return Err(format!("key '{}' has invalid locale code '{}'", key, locale));
            }
            if let Some(previous) = seen.insert(languages::normalize_code(locale), locale) {
                return Err(format!(
                    "key '{}' has colliding locale codes '{}' and '{}'",
                    key, previous, locale
                ));
            }
        }
    }
    Ok(())
}

/// Validates and renders a catalog in Xcode's layout. Produces no bytes when invalid.
pub fn serialize_catalog(catalog: &Catalog) -> Result<Vec<u8>, LocalizeError> {
    validate_catalog(catalog).map_err(|reason| LocalizeError::InvalidOutput {
        what: "catalog",
        reason,
    })?;
    catalog
        .to_json_value()
        .and_then(|document| to_xcode_json(&document))
        .map_err(|err| LocalizeError::InvalidOutput {
            what: "catalog",
            reason: err.to_string(),
        })
}

pub fn to_xcode_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, XcodeFormatter::new());
    value.serialize(&mut serializer)?;
    Ok(out)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LocalizeError> {
    let write_err = |reason: String| LocalizeError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .map_err(|err| write_err(format!("failed to create {}: {}", dir.display(), err)))?;

    let mut file = tempfile::Builder::new()
        .prefix(".catalog-localizer-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| write_err(format!("failed to create temp file: {}", err)))?;
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|err| write_err(format!("failed to write temp file: {}", err)))?;
    if let Ok(metadata) = fs::metadata(path) {
        if let Err(err) = fs::set_permissions(file.path(), metadata.permissions()) {
            warn!("failed to copy permissions of {}: {}", path.display(), err);
        }
    }
    file.persist(path)
        .map_err(|err| write_err(format!("failed to rename temp file: {}", err.error)))?;
    Ok(())
}

const INDENT: &[u8] = b"  ";

/// Two-space indentation with `"key" : value` separators, as Xcode writes catalogs.
/// Empty objects keep Xcode's blank line: `{\n\n<indent>}`.
#[derive(Default)]
struct XcodeFormatter {
    current_indent: usize,
    has_value: bool,
}

impl XcodeFormatter {
    fn new() -> Self {
        Self::default()
    }

    fn open<W: ?Sized + Write>(&mut self, writer: &mut W, bracket: &[u8]) -> io::Result<()> {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(bracket)
    }

    fn next_item<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if !first {
            writer.write_all(b",")?;
        }
        writer.write_all(b"\n")?;
        indent(writer, self.current_indent)
    }
}

fn indent<W: ?Sized + Write>(writer: &mut W, depth: usize) -> io::Result<()> {
    for _ in 0..depth {
        writer.write_all(INDENT)?;
    }
    Ok(())
}

impl Formatter for XcodeFormatter {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"[")
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent -= 1;
        if self.has_value {
            writer.write_all(b"\n")?;
            indent(writer, self.current_indent)?;
        }
        writer.write_all(b"]")
    }

    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.next_item(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"{")
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent -= 1;
        writer.write_all(if self.has_value { b"\n".as_slice() } else { b"\n\n" })?;
        indent(writer, self.current_indent)?;
        writer.write_all(b"}")
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.next_item(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b" : ")
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Entry, Localization};
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("Localizable.xcstrings");
        let err = load_catalog(&path).unwrap_err();
        assert!(matches!(err, LocalizeError::MissingFile { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn malformed_json_reports_line() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "languages.json", "{\n  \"es\": {,\n}");
        match load_locale_set(&path).unwrap_err() {
            LocalizeError::MalformedDocument { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_catalog_fields_are_listed() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "Localizable.xcstrings", r#"{"strings": {}}"#);
        match load_catalog(&path).unwrap_err() {
            LocalizeError::InvalidSchema { reason, .. } => {
                assert_eq!(reason, "missing required fields: sourceLanguage, version");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn manifest_requires_strings() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "keys.json", r#"{"sourceLanguage": "en"}"#);
        assert!(matches!(
            load_key_manifest(&path).unwrap_err(),
            LocalizeError::InvalidSchema { .. }
        ));
    }

    #[test]
    fn locale_set_rejects_invalid_codes() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "languages.json", r#"{"es": {}, "Spanish!": {}}"#);
        assert!(matches!(
            load_locale_set(&path).unwrap_err(),
            LocalizeError::InvalidSchema { .. }
        ));
    }

    #[test]
    fn serializes_in_xcode_layout() {
        let mut catalog = Catalog::new("en", "1.0");
        let mut entry = Entry::default();
        entry.localizations = Some(
            [("es".to_string(), Localization::translated("Hola"))]
                .into_iter()
                .collect(),
        );
        catalog.strings.insert("Hello".to_string(), entry);
        catalog.strings.insert("Later".to_string(), Entry::default());

        let bytes = serialize_catalog(&catalog).expect("serialize");
        let text = String::from_utf8(bytes).expect("utf8");
        insta::assert_snapshot!(text, @r###"
        {
          "sourceLanguage" : "en",
          "strings" : {
            "Hello" : {
              "localizations" : {
                "es" : {
                  "stringUnit" : {
                    "state" : "translated",
                    "value" : "Hola"
                  }
                }
              }
            },
            "Later" : {

            }
          },
          "version" : "1.0"
        }
        "###);
    }

    #[test]
    fn colliding_locales_produce_no_bytes() {
        let mut catalog = Catalog::new("en", "1.0");
        let mut entry = Entry::default();
        entry.localizations = Some(
            [
                ("pt-BR".to_string(), Localization::translated("Olá")),
                ("pt_br".to_string(), Localization::translated("Oi")),
            ]
            .into_iter()
            .collect(),
        );
        catalog.strings.insert("Hello".to_string(), entry);
        assert!(matches!(
            serialize_catalog(&catalog).unwrap_err(),
            LocalizeError::InvalidOutput { .. }
        ));
    }

    #[test]
    fn empty_source_language_is_invalid() {
        let catalog = Catalog::new("", "1.0");
        assert!(serialize_catalog(&catalog).is_err());
    }

    #[test]
    fn write_atomic_replaces_content_and_leaves_no_temp_files() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "Localizable.xcstrings", "old");
        write_atomic(&path, b"new").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "new");
        let names = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect::<Vec<_>>();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn write_atomic_creates_missing_parent_dirs() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out").join("new_keys.xcstrings");
        write_atomic(&path, b"{}").expect("write");
        assert!(path.exists());
    }

    #[test]
    fn empty_entries_keep_xcode_blank_line() {
        let dir = tempdir().expect("tempdir");
        let original = "{\n  \"sourceLanguage\" : \"en\",\n  \"strings\" : {\n    \"Hello\" : {\n\n    },\n    \"Save\" : {\n      \"localizations\" : {\n        \"de\" : {\n          \"stringUnit\" : {\n            \"state\" : \"translated\",\n            \"value\" : \"Sichern\"\n          }\n        }\n      }\n    }\n  },\n  \"version\" : \"1.0\"\n}";
        let path = write(dir.path(), "Localizable.xcstrings", original);
        let catalog = load_catalog(&path).expect("load");
        let bytes = serialize_catalog(&catalog).expect("serialize");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), original);
    }

    #[test]
    fn abstract_file_round_trips_byte_for_byte() {
        let dir = tempdir().expect("tempdir");
        let original = "{\n  \"entries\" : {\n    \"Hi\" : {\n      \"translations\" : {\n        \"es\" : {\n          \"state\" : \"translated\",\n          \"value\" : \"Hola\"\n        }\n      }\n    }\n  },\n  \"formatVersion\" : \"1.0\",\n  \"sourceLocale\" : \"en\"\n}";
        let path = write(dir.path(), "Localizable.xcstrings", original);
        let catalog = load_catalog(&path).expect("load");
        let bytes = serialize_catalog(&catalog).expect("serialize");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), original);
    }

    #[test]
    fn load_then_serialize_round_trips_xcode_file() {
        let dir = tempdir().expect("tempdir");
        let original = "{\n  \"sourceLanguage\" : \"en\",\n  \"strings\" : {\n    \"Open\" : {\n      \"comment\" : \"Menu item\",\n      \"extractionState\" : \"manual\"\n    }\n  },\n  \"version\" : \"1.0\"\n}";
        let path = write(dir.path(), "Localizable.xcstrings", original);
        let catalog = load_catalog(&path).expect("load");
        let bytes = serialize_catalog(&catalog).expect("serialize");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), original);
    }
}
