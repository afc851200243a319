//! Verb conjugation records for the wikdict conjugation file (`fra.u8`).
//!
//! Records come from Wiktextract JSON lines ([`extract`]), one per inflected
//! form. Several source entries usually produce the same surface form
//! (`lis` is both `je lis` and `tu lis`), so before indexing the records are
//! grouped by form, checked against a trusted verb reference and collapsed
//! into one record whose tense descriptor lists every reading ([`merge`]).
//!
//! The crate never touches the reference's storage; callers hand in anything
//! implementing [`VerbReference`], including a plain closure.
//!
//! # Example
//! ```no_run
//! use std::collections::HashSet;
//!
//! use wikdict_conjugate::{ConjugationFormat, ExtractConfig, extract_file, merge};
//!
//! # fn main() -> anyhow::Result<()> {
//! let extraction = extract_file("fr-extract.jsonl", &ExtractConfig::default())?;
//! let verbs: HashSet<String> = HashSet::from(["lire".to_string()]);
//! let merged = merge(extraction.records, &verbs);
//! for record in &merged.records {
//!     println!("{}", record.to_entry(ConjugationFormat::Merged).to_line());
//! }
//! # Ok(()) }
//! ```

use std::fmt;

use wikdict_types::CanonicalEntry;
pub use wikdict_types::VerbReference;

pub mod extract;
pub mod merge;

pub use extract::{ExtractConfig, ExtractStats, Extraction, SkipReason, extract, extract_file};
pub use merge::{
    GroupOutcome, MergeStats, Merged, PARTICIPLE_PAST, completeness, merge, merge_group,
    merge_tenses, select_base,
};

/// One inflected form of a verb.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConjugationRecord {
    /// Indexed surface form, without any leading pronoun (`lis`).
    pub conjugated_form: String,
    pub infinitive: String,
    /// Flat `;`-joined tags, or a merged mood descriptor after [`merge`].
    pub tenses: String,
    pub ipa: String,
    /// Form as listed in the source, pronoun included (`je lis`).
    pub full_form: String,
}

impl ConjugationRecord {
    /// Case-insensitive grouping key used by the merger.
    pub fn group_key(&self) -> String {
        self.conjugated_form.to_lowercase()
    }

    /// Primary-file entry for the given layout. The index key is the
    /// conjugated form itself, so it always equals the line's leading field.
    pub fn to_entry(&self, format: ConjugationFormat) -> CanonicalEntry {
        let mut fields = vec![
            self.conjugated_form.clone(),
            self.infinitive.clone(),
            self.tenses.clone(),
            self.ipa.clone(),
        ];
        if format == ConjugationFormat::Raw {
            fields.push(self.full_form.clone());
        }
        CanonicalEntry {
            key: self.conjugated_form.clone(),
            fields,
        }
    }
}

/// Layout of the conjugation file pair.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConjugationFormat {
    /// Deduplicated against the verb reference, one line per form with a
    /// merged mood descriptor: `form, infinitive, descriptor, ipa`.
    #[default]
    Merged,
    /// Every extracted form, no reference check, flat tags plus the source
    /// form: `form, infinitive, tags, ipa, full_form`.
    Raw,
}

impl ConjugationFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "merged" => Some(ConjugationFormat::Merged),
            "raw" => Some(ConjugationFormat::Raw),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConjugationFormat::Merged => "merged",
            ConjugationFormat::Raw => "raw",
        }
    }
}

impl fmt::Display for ConjugationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order entries by index key so identical keys form contiguous runs.
///
/// The sort is stable: records sharing a form keep their extraction order.
pub fn sort_for_index(records: &mut [ConjugationRecord]) {
    records.sort_by(|a, b| a.conjugated_form.cmp(&b.conjugated_form));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ConjugationRecord {
        ConjugationRecord {
            conjugated_form: "lis".into(),
            infinitive: "lire".into(),
            tenses: "indicative;present".into(),
            ipa: "li".into(),
            full_form: "je lis".into(),
        }
    }

    #[test]
    fn layouts_differ_only_in_full_form() {
        let merged = record().to_entry(ConjugationFormat::Merged);
        assert_eq!(merged.key, "lis");
        assert_eq!(merged.to_line(), "lis\tlire\tindicative;present\tli\n");

        let raw = record().to_entry(ConjugationFormat::Raw);
        assert_eq!(raw.to_line(), "lis\tlire\tindicative;present\tli\tje lis\n");
    }

    #[test]
    fn parses_formats() {
        assert_eq!(ConjugationFormat::parse("RAW"), Some(ConjugationFormat::Raw));
        assert_eq!(ConjugationFormat::parse("merged"), Some(ConjugationFormat::Merged));
        assert_eq!(ConjugationFormat::parse("v3"), None);
        assert_eq!(ConjugationFormat::default().to_string(), "merged");
    }

    #[test]
    fn sorting_keeps_runs_in_input_order() {
        let mut records = vec![
            ConjugationRecord {
                conjugated_form: "lit".into(),
                ..record()
            },
            ConjugationRecord {
                full_form: "tu lis".into(),
                ..record()
            },
            record(),
        ];
        sort_for_index(&mut records);
        let full: Vec<&str> = records.iter().map(|r| r.full_form.as_str()).collect();
        assert_eq!(full, vec!["tu lis", "je lis", "je lis"]);
        assert_eq!(records[2].conjugated_form, "lit");
    }
}
