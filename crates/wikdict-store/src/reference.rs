//! Trusted verb headwords taken from a compiled bilingual dictionary.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use wikdict_types::{VerbReference, unescape_field};

use crate::{LoadMode, load_file, strip_cr};

/// Lowercased headwords whose part of speech is `v` or `verb`.
///
/// Built from a dictionary primary file (`fra-eng.u8`), whose first two
/// columns are headword and part of speech.
#[derive(Clone, Debug, Default)]
pub struct VerbLexicon {
    verbs: HashSet<String>,
}

impl VerbLexicon {
    /// Load from a dictionary primary file, memory-mapped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_mode(path, LoadMode::Mmap)
    }

    pub fn load_with_mode(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref();
        let buffer = load_file(path, mode)?;
        let lexicon = Self::from_primary(buffer.as_slice())
            .with_context(|| format!("parse verb reference {}", path.display()))?;
        info!(
            "loaded {} verb headwords from {}",
            lexicon.len(),
            path.display()
        );
        Ok(lexicon)
    }

    /// Parse primary-file bytes. Lines with fewer than two columns are
    /// ignored; invalid UTF-8 is an error.
    pub fn from_primary(bytes: &[u8]) -> Result<Self> {
        let mut verbs = HashSet::new();
        for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = strip_cr(raw_line);
            if line.is_empty() {
                continue;
            }
            let line = std::str::from_utf8(line)
                .with_context(|| format!("line {} is not valid UTF-8", lineno + 1))?;
            let mut columns = line.split('\t');
            let (Some(headword), Some(pos)) = (columns.next(), columns.next()) else {
                continue;
            };
            let headword = unescape_field(headword).trim().to_lowercase();
            let pos = unescape_field(pos).trim().to_lowercase();
            if !headword.is_empty() && (pos == "v" || pos == "verb") {
                verbs.insert(headword);
            }
        }
        Ok(Self { verbs })
    }

    pub fn contains(&self, infinitive: &str) -> bool {
        self.verbs.contains(infinitive)
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }
}

impl VerbReference for VerbLexicon {
    fn is_known_verb(&self, infinitive: &str) -> bool {
        self.contains(infinitive)
    }
}

impl FromIterator<String> for VerbLexicon {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            verbs: iter.into_iter().map(|v| v.trim().to_lowercase()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_verbs_lowercased() {
        let bytes = "Lire\tv\t\tliʁ\tto read\t\n\
                     chat\tn\tm\tʃa\tcat\t\n\
                     dire\tverb\t\t\tto say\t\r\n\
                     \n\
                     orphan\n";
        let lex = VerbLexicon::from_primary(bytes.as_bytes()).unwrap();
        assert_eq!(lex.len(), 2);
        assert!(lex.contains("lire"));
        assert!(lex.contains("dire"));
        assert!(!lex.contains("chat"));
        assert!(!lex.contains("Lire"));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = VerbLexicon::from_primary(b"ok\tv\n\xff\xfe\tv\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn loads_from_disk_in_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fra-eng.u8");
        std::fs::write(&path, "lire\tv\t\t\tto read\t\n").unwrap();
        for mode in [LoadMode::Mmap, LoadMode::Owned] {
            let lex = VerbLexicon::load_with_mode(&path, mode).unwrap();
            assert!(lex.is_known_verb("lire"));
        }
    }
}
