//! Re-read a finished pair and check that the index really addresses the
//! primary file.

use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;
use wikdict_types::{IndexSlot, fold_key, unescape_field};

use crate::{LoadMode, load_file, strip_cr};

/// How an index key relates to the leading field of its line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyPolicy {
    /// Key equals the leading field (conjugation files).
    Verbatim,
    /// Key is the acronym-preserving case fold of the leading field
    /// (bilingual dictionary files).
    FoldCase,
}

impl KeyPolicy {
    pub fn key_for(self, leading_field: &str) -> String {
        match self {
            KeyPolicy::Verbatim => leading_field.to_string(),
            KeyPolicy::FoldCase => fold_key(leading_field),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("index line {line} is malformed")]
    MalformedIndexLine { line: usize },
    #[error("index line {line} mixes slots with and without lengths")]
    MixedLayout { line: usize },
    #[error("index line {line} out of order: {prev:?} followed by {key:?}")]
    Unsorted {
        line: usize,
        prev: String,
        key: String,
    },
    #[error("offset {offset} for {key:?} is beyond the primary file ({len} bytes)")]
    OffsetOutOfRange { key: String, offset: u64, len: usize },
    #[error("offset {offset} for {key:?} does not start a line")]
    NotLineStart { key: String, offset: u64 },
    #[error("line at offset {offset} maps to {found:?}, index says {key:?}")]
    KeyMismatch {
        key: String,
        offset: u64,
        found: String,
    },
    #[error("record {key:?} at offset {offset} with length {length} does not end on its newline")]
    BadLength { key: String, offset: u64, length: u64 },
}

/// Summary of a successful verification.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VerifyReport {
    pub slots: usize,
    pub distinct_keys: usize,
    pub with_length: bool,
}

/// Check every index slot against the primary bytes.
///
/// Index keys must be ordered by bytes: strictly for offset-only indexes, and
/// non-decreasing (ties ordered by offset) for indexes carrying lengths,
/// where every record has its own slot.
pub fn verify_pair(
    primary: &[u8],
    index: &[u8],
    policy: KeyPolicy,
) -> Result<VerifyReport, VerifyError> {
    let mut report = VerifyReport::default();
    let mut prev: Option<IndexSlot> = None;

    for (lineno, raw_line) in index.split(|b| *b == b'\n').enumerate() {
        let line_no = lineno + 1;
        let raw_line = strip_cr(raw_line);
        if raw_line.is_empty() {
            continue;
        }
        let slot = std::str::from_utf8(raw_line)
            .ok()
            .and_then(IndexSlot::parse)
            .ok_or(VerifyError::MalformedIndexLine { line: line_no })?;

        match &prev {
            None => report.with_length = slot.length.is_some(),
            Some(_) if report.with_length != slot.length.is_some() => {
                return Err(VerifyError::MixedLayout { line: line_no });
            }
            Some(p) => {
                let ordered = match p.key.as_bytes().cmp(slot.key.as_bytes()) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Equal => report.with_length && p.offset < slot.offset,
                    std::cmp::Ordering::Greater => false,
                };
                if !ordered {
                    return Err(VerifyError::Unsorted {
                        line: line_no,
                        prev: p.key.clone(),
                        key: slot.key,
                    });
                }
            }
        }

        check_slot(primary, &slot, policy)?;

        report.slots += 1;
        if prev.as_ref().map(|p| p.key != slot.key).unwrap_or(true) {
            report.distinct_keys += 1;
        }
        prev = Some(slot);
    }

    Ok(report)
}

fn check_slot(primary: &[u8], slot: &IndexSlot, policy: KeyPolicy) -> Result<(), VerifyError> {
    let start = usize::try_from(slot.offset)
        .ok()
        .filter(|start| *start < primary.len())
        .ok_or_else(|| VerifyError::OffsetOutOfRange {
            key: slot.key.clone(),
            offset: slot.offset,
            len: primary.len(),
        })?;
    if start > 0 && primary[start - 1] != b'\n' {
        return Err(VerifyError::NotLineStart {
            key: slot.key.clone(),
            offset: slot.offset,
        });
    }

    let rest = &primary[start..];
    let line_len = rest.iter().position(|b| *b == b'\n').map(|p| p + 1);
    if let Some(length) = slot.length
        && line_len != Some(length as usize)
    {
        return Err(VerifyError::BadLength {
            key: slot.key.clone(),
            offset: slot.offset,
            length,
        });
    }

    let line = &rest[..line_len.unwrap_or(rest.len())];
    let leading = line
        .split(|b| *b == b'\t' || *b == b'\n')
        .next()
        .unwrap_or_default();
    let leading = unescape_field(&String::from_utf8_lossy(leading));
    let found = policy.key_for(&leading);
    if found != slot.key {
        return Err(VerifyError::KeyMismatch {
            key: slot.key.clone(),
            offset: slot.offset,
            found,
        });
    }
    Ok(())
}

/// Load a pair from disk and verify it.
pub fn verify_files(
    primary_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
    policy: KeyPolicy,
    mode: LoadMode,
) -> Result<VerifyReport> {
    let primary_path = primary_path.as_ref();
    let index_path = index_path.as_ref();
    let primary = load_file(primary_path, mode)?;
    let index = load_file(index_path, mode)?;
    verify_pair(primary.as_slice(), index.as_slice(), policy).with_context(|| {
        format!(
            "verify {} against {}",
            index_path.display(),
            primary_path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: &str = "Chat\tn\tm\n\
                           OTAN\tprop\t\n\
                           chat\tv\t\n";

    #[test]
    fn accepts_dictionary_pair_with_duplicate_keys() {
        let index = "OTAN\t9\t11\nchat\t0\t9\nchat\t20\t8\n";
        let report = verify_pair(PRIMARY.as_bytes(), index.as_bytes(), KeyPolicy::FoldCase)
            .expect("valid pair");
        assert_eq!(report.slots, 3);
        assert_eq!(report.distinct_keys, 2);
        assert!(report.with_length);
    }

    #[test]
    fn rejects_length_that_overruns_the_line() {
        let index = "OTAN\t9\t12\n";
        let err = verify_pair(PRIMARY.as_bytes(), index.as_bytes(), KeyPolicy::FoldCase)
            .unwrap_err();
        assert!(matches!(err, VerifyError::BadLength { .. }));
    }

    #[test]
    fn rejects_offset_inside_a_line() {
        let err = verify_pair(PRIMARY.as_bytes(), b"hat\t1\n", KeyPolicy::Verbatim).unwrap_err();
        assert!(matches!(err, VerifyError::NotLineStart { .. }));
    }

    #[test]
    fn rejects_key_mismatch_and_unsorted() {
        let err =
            verify_pair(PRIMARY.as_bytes(), b"chat\t0\n", KeyPolicy::Verbatim).unwrap_err();
        assert!(matches!(err, VerifyError::KeyMismatch { .. }));

        let err = verify_pair(
            PRIMARY.as_bytes(),
            b"chat\t20\nOTAN\t9\n",
            KeyPolicy::Verbatim,
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::Unsorted { line: 2, .. }));
    }

    #[test]
    fn offset_only_index_requires_distinct_keys() {
        let primary = "lis\tlire\n";
        let err = verify_pair(
            primary.as_bytes(),
            b"lis\t0\nlis\t0\n",
            KeyPolicy::Verbatim,
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::Unsorted { .. }));
    }

    #[test]
    fn rejects_out_of_range_and_malformed_lines() {
        let err = verify_pair(PRIMARY.as_bytes(), b"x\t999\n", KeyPolicy::Verbatim).unwrap_err();
        assert!(matches!(err, VerifyError::OffsetOutOfRange { .. }));

        let err = verify_pair(PRIMARY.as_bytes(), b"x\n", KeyPolicy::Verbatim).unwrap_err();
        assert_eq!(err, VerifyError::MalformedIndexLine { line: 1 });

        let err = verify_pair(
            PRIMARY.as_bytes(),
            b"OTAN\t9\t11\nchat\t20\n",
            KeyPolicy::FoldCase,
        )
        .unwrap_err();
        assert_eq!(err, VerifyError::MixedLayout { line: 2 });
    }
}
