//! Field normalization and TSV escaping.

use unicode_normalization::UnicodeNormalization;

/// Canonical apostrophe (U+2019) used in every stored key and field.
pub const APOSTROPHE: char = '\u{2019}';

/// Trim, compose to NFC, and unify apostrophes.
///
/// Straight (`'`) and left-curly (`‘`) quotes become [`APOSTROPHE`] so keys
/// match regardless of the source's quoting habits. Blank input yields `""`.
pub fn normalize(text: &str) -> String {
    text.trim()
        .nfc()
        .map(|c| match c {
            '\'' | '\u{2018}' => APOSTROPHE,
            other => other,
        })
        .collect()
}

/// Escape a value for single-line tab-separated storage.
///
/// The backslash is handled first so escape sequences produced for tab,
/// newline and carriage return are never escaped again.
pub fn escape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_field`]. Unknown sequences are kept verbatim.
pub fn unescape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split a primary-file line into unescaped fields.
pub fn split_fields(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.split('\t').map(unescape_field).collect()
}

/// Index key for a headword: acronyms keep their case, everything else is
/// lowercased.
///
/// An acronym has more than one character, at least one uppercase letter, and
/// no lowercase letters (`"OTAN"`, `"ADN"`).
pub fn fold_key(headword: &str) -> String {
    let is_acronym = headword.chars().nth(1).is_some()
        && headword.chars().any(char::is_uppercase)
        && headword == headword.to_uppercase();
    if is_acronym {
        headword.to_string()
    } else {
        headword.to_lowercase()
    }
}
