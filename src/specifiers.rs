use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

// printf conversions as used in Apple string catalogs: optional positional
// index, flags (no space flag, so "50% off" is plain text), width, precision,
// length modifier and conversion. `%%` is matched so it can be skipped.
static SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"%(?:%|(?:[1-9][0-9]*\$)?[-+#0']*(?:[0-9]+|\*)?(?:\.(?:[0-9]+|\*))?(?:hh|h|ll|l|q|L|z|t|j)?[@dDiuUxXoOfFeEgGcCsSpaA])",
    )
    .expect("format specifier pattern")
});

/// Format specifiers of `text` in order of appearance.
pub fn extract(text: &str) -> Vec<&str> {
    SPECIFIER
        .find_iter(text)
        .filter(|token| !runs_into_word(text, token.as_str(), token.end()))
        .map(|token| token.as_str())
        .filter(|token| *token != "%%")
        .collect()
}

// A bare letter conversion glued to more letters is prose: "50%off", "100%sure".
fn runs_into_word(text: &str, token: &str, end: usize) -> bool {
    token.len() == 2
        && token.ends_with(|c: char| c.is_ascii_alphabetic())
        && text[end..].starts_with(|c: char| c.is_ascii_alphabetic())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierMismatch {
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

impl fmt::Display for SpecifierMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "format specifiers changed: expected [{}], found [{}]",
            self.expected.join(" "),
            self.found.join(" ")
        )
    }
}

/// The translation must carry the same specifiers as the source, in the same order.
pub fn verify(source: &str, translated: &str) -> Result<(), SpecifierMismatch> {
    let expected = extract(source);
    let found = extract(translated);
    if expected == found {
        return Ok(());
    }
    Err(SpecifierMismatch {
        expected: expected.into_iter().map(str::to_string).collect(),
        found: found.into_iter().map(str::to_string).collect(),
    })
}
