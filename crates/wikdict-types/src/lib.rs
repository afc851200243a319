//! Shared types for the wikdict `*.u8` / `*.idx` flat-file pair.
//!
//! A compiled dictionary is two files: a primary file holding one escaped,
//! tab-separated record per line, and an index file mapping each lookup key
//! to the byte offset (and optionally the byte length) of its line. This
//! crate holds the pieces every stage agrees on: the [`CanonicalEntry`]
//! written to the primary file, the [`IndexSlot`] written to the index, the
//! [`Mood`] vocabulary used by conjugation descriptors, and the
//! [`text`] helpers that normalize and escape field values.
//!
//! ```rust
//! use wikdict_types::{CanonicalEntry, IndexSlot, Mood};
//!
//! let entry = CanonicalEntry::new("lis", ["lis", "lire", "indicative;present", "li"]);
//! assert_eq!(entry.to_line(), "lis\tlire\tindicative;present\tli\n");
//!
//! let slot = IndexSlot::parse("lis\t42").unwrap();
//! assert_eq!(slot.offset, 42);
//! assert_eq!(Mood::from_tag("Subjunctive"), Some(Mood::Subjunctive));
//! ```

use std::collections::HashSet;
use std::fmt;

pub mod text;

pub use text::{escape_field, fold_key, normalize, split_fields, unescape_field};

/// Grammatical mood heading a group of tenses in a conjugation descriptor.
///
/// Variant order is the canonical emission order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Mood {
    Indicative,
    Subjunctive,
    Conditional,
    Imperative,
    Participle,
    Gerund,
    Infinitive,
}

impl Mood {
    /// All moods in canonical order.
    pub const ALL: [Mood; 7] = [
        Mood::Indicative,
        Mood::Subjunctive,
        Mood::Conditional,
        Mood::Imperative,
        Mood::Participle,
        Mood::Gerund,
        Mood::Infinitive,
    ];

    /// Recognize a mood tag, ignoring case.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mood| tag.eq_ignore_ascii_case(mood.as_str()))
    }

    /// Tag spelling used in descriptors.
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Indicative => "indicative",
            Mood::Subjunctive => "subjunctive",
            Mood::Conditional => "conditional",
            Mood::Imperative => "imperative",
            Mood::Participle => "participle",
            Mood::Gerund => "gerund",
            Mood::Infinitive => "infinitive",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the primary file.
///
/// `fields` hold raw (unescaped) values; escaping happens in
/// [`CanonicalEntry::to_line`]. `key` is what the index file stores for this
/// line and may differ from the leading field (case folding).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanonicalEntry {
    pub key: String,
    pub fields: Vec<String>,
}

impl CanonicalEntry {
    pub fn new<K, I, S>(key: K, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Leading field, or `""` for an entry without fields.
    pub fn leading_field(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    /// Serialize as one escaped, tab-joined, newline-terminated line.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(self.fields.iter().map(|f| f.len() + 1).sum());
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                line.push('\t');
            }
            line.push_str(&escape_field(field));
        }
        line.push('\n');
        line
    }
}

/// Trusted set of known verb headwords consulted during deduplication.
///
/// Implementors receive the already lowercased, trimmed infinitive. Closures
/// work too, which keeps the merger ignorant of where the set came from.
pub trait VerbReference {
    fn is_known_verb(&self, infinitive: &str) -> bool;
}

impl VerbReference for HashSet<String> {
    fn is_known_verb(&self, infinitive: &str) -> bool {
        self.contains(infinitive)
    }
}

impl<F> VerbReference for F
where
    F: Fn(&str) -> bool,
{
    fn is_known_verb(&self, infinitive: &str) -> bool {
        self(infinitive)
    }
}

/// `(key, offset[, length])` triple of the index file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexSlot {
    pub key: String,
    pub offset: u64,
    pub length: Option<u64>,
}

impl IndexSlot {
    /// Serialize as `key\toffset[\tlength]\n` with the key escaped.
    pub fn to_line(&self) -> String {
        match self.length {
            Some(length) => format!("{}\t{}\t{}\n", escape_field(&self.key), self.offset, length),
            None => format!("{}\t{}\n", escape_field(&self.key), self.offset),
        }
    }

    /// Parse one index line (trailing newline optional).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let mut parts = line.split('\t');
        let key = unescape_field(parts.next()?);
        let offset = parts.next()?.parse().ok()?;
        let length = match parts.next() {
            Some(raw) => Some(raw.parse().ok()?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            key,
            offset,
            length,
        })
    }
}
