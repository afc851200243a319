//! Wiktextract JSON lines to [`ConjugationRecord`]s.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use wikdict_types::normalize;

use crate::ConjugationRecord;

const PROGRESS_EVERY: usize = 100_000;
const MULTIWORD_TAG: &str = "multiword-construction";
const LIAISON: char = '‿';

/// Which source entries are in scope.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractConfig {
    pub lang_code: String,
    pub pos: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            lang_code: "fr".to_string(),
            pos: "verb".to_string(),
        }
    }
}

/// Why a source line produced no records.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("line {line}: malformed JSON: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: not an in-scope entry with forms")]
    OutOfScope { line: usize },
    #[error("line {line}: empty headword")]
    MissingHeadword { line: usize },
}

/// Diagnostic counters for one extraction run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExtractStats {
    pub lines: usize,
    pub malformed: usize,
    pub out_of_scope: usize,
    pub missing_headword: usize,
    pub verbs: usize,
    pub forms_extracted: usize,
    pub forms_filtered: usize,
}

impl ExtractStats {
    fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::Malformed { .. } => self.malformed += 1,
            SkipReason::OutOfScope { .. } => self.out_of_scope += 1,
            SkipReason::MissingHeadword { .. } => self.missing_headword += 1,
        }
    }
}

/// Records extracted from one source, in source order.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub records: Vec<ConjugationRecord>,
    pub stats: ExtractStats,
}

#[derive(Deserialize)]
struct SourceEntry {
    lang_code: Option<String>,
    pos: Option<String>,
    word: Option<String>,
    // Decoded one by one so a single odd form does not sink the entry.
    forms: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct SourceForm {
    form: Option<String>,
    tags: Option<Vec<String>>,
    ipas: Option<Vec<String>>,
}

/// Open and extract a JSON lines file.
pub fn extract_file(path: impl AsRef<Path>, config: &ExtractConfig) -> Result<Extraction> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let extraction = extract(BufReader::new(file), config)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(extraction)
}

/// Extract records from a JSON lines stream.
///
/// Bad lines, including lines that are not UTF-8, are counted and skipped;
/// only I/O failures are errors.
pub fn extract<R: BufRead>(reader: R, config: &ExtractConfig) -> Result<Extraction> {
    let mut out = Extraction::default();

    for (lineno, line) in reader.split(b'\n').enumerate() {
        let line_no = lineno + 1;
        let line = line.with_context(|| format!("line {line_no}"))?;
        out.stats.lines += 1;
        if line_no % PROGRESS_EVERY == 0 {
            info!(
                "processed {} lines, {} verbs, {} forms",
                line_no, out.stats.verbs, out.stats.forms_extracted
            );
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match parse_line(line_no, &line, config) {
            Ok((infinitive, forms)) => {
                out.stats.verbs += 1;
                for form in forms {
                    let form = match serde_json::from_value::<SourceForm>(form) {
                        Ok(form) => form,
                        Err(err) => {
                            debug!("line {line_no}: skipping form of {infinitive:?}: {err}");
                            out.stats.forms_filtered += 1;
                            continue;
                        }
                    };
                    match form_record(&infinitive, form) {
                        Some(record) => {
                            out.stats.forms_extracted += 1;
                            out.records.push(record);
                        }
                        None => out.stats.forms_filtered += 1,
                    }
                }
            }
            Err(reason) => {
                debug!("{reason}");
                out.stats.record_skip(&reason);
            }
        }
    }

    info!(
        "extracted {} forms from {} verbs ({} lines, {} malformed, {} out of scope)",
        out.stats.forms_extracted,
        out.stats.verbs,
        out.stats.lines,
        out.stats.malformed,
        out.stats.out_of_scope
    );
    Ok(out)
}

fn parse_line(
    line_no: usize,
    line: &[u8],
    config: &ExtractConfig,
) -> Result<(String, Vec<serde_json::Value>), SkipReason> {
    let entry: SourceEntry = serde_json::from_slice(line).map_err(|source| SkipReason::Malformed {
        line: line_no,
        source,
    })?;

    let in_scope = entry.lang_code.as_deref() == Some(config.lang_code.as_str())
        && entry.pos.as_deref() == Some(config.pos.as_str());
    let Some(forms) = entry.forms.filter(|_| in_scope) else {
        return Err(SkipReason::OutOfScope { line: line_no });
    };

    let infinitive = normalize(entry.word.as_deref().unwrap_or_default());
    if infinitive.is_empty() {
        return Err(SkipReason::MissingHeadword { line: line_no });
    }
    Ok((infinitive, forms))
}

fn form_record(infinitive: &str, form: SourceForm) -> Option<ConjugationRecord> {
    let raw_form = form.form.unwrap_or_default();
    if raw_form.trim().is_empty() {
        return None;
    }
    let tags = form.tags.unwrap_or_default();
    if !is_conjugated(&tags) {
        return None;
    }

    // "je lis" is indexed under "lis".
    let surface = if raw_form.contains(' ') {
        raw_form.split_whitespace().last().unwrap_or_default()
    } else {
        raw_form.as_str()
    };

    let ipa = form
        .ipas
        .as_deref()
        .and_then(<[String]>::first)
        .map(|ipa| final_ipa_segment(ipa))
        .unwrap_or_default();

    Some(ConjugationRecord {
        conjugated_form: normalize(surface),
        infinitive: infinitive.to_string(),
        tenses: tags.join(";"),
        ipa,
        full_form: normalize(&raw_form),
    })
}

/// Periphrastic constructions and bare infinitive citations are not indexed.
fn is_conjugated(tags: &[String]) -> bool {
    if tags.iter().any(|t| t == MULTIWORD_TAG) {
        return false;
    }
    let is_pair = |a: &str, b: &str| {
        tags.len() == 2 && tags.iter().any(|t| t == a) && tags.iter().any(|t| t == b)
    };
    !(is_pair("infinitive", "present") || is_pair("infinitive", "past"))
}

/// Pronunciation of the verb alone: `\ʒə li\` becomes `li`.
fn final_ipa_segment(ipa: &str) -> String {
    ipa.trim_matches('\\')
        .split(|c: char| c.is_whitespace() || c == LIAISON)
        .filter(|part| !part.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}
