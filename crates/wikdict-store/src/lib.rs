//! Write and check wikdict `*.u8` / `*.idx` file pairs.
//!
//! The primary file is written in one linear pass; while writing, the byte
//! offset of every line start is captured so the index can point straight at
//! it. Once the primary file is complete the captured slots are sorted by key
//! bytes and written as the index. A reader can then binary-search the index
//! and `seek` into the primary file without loading it.
//!
//! Besides the writer this crate loads the trusted verb reference used to
//! validate conjugations ([`VerbLexicon`]) and re-checks finished pairs
//! ([`verify_pair`]). Input files can be memory-mapped or read into owned
//! buffers, chosen at runtime through [`LoadMode`].
//!
//! # Example
//! ```no_run
//! use wikdict_store::{OffsetPolicy, write_pair};
//! use wikdict_types::CanonicalEntry;
//!
//! # fn main() -> anyhow::Result<()> {
//! let entries = vec![
//!     CanonicalEntry::new("chat", ["Chat", "n", "m", "ʃa", "cat", ""]),
//!     CanonicalEntry::new("OTAN", ["OTAN", "prop", "f", "", "NATO", ""]),
//! ];
//! let stats = write_pair("fra-eng.u8", "fra-eng.idx", entries, OffsetPolicy::PerEntry)?;
//! println!("{} lines, {} index slots", stats.lines, stats.slots);
//! # Ok(()) }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

pub mod reference;
pub mod verify;
pub mod writer;

pub use reference::VerbLexicon;
pub use verify::{KeyPolicy, VerifyError, VerifyReport, verify_files, verify_pair};
pub use writer::{
    IndexWriter, OffsetPolicy, PairStats, build, try_write_pair, write_index, write_pair,
};

/// Strategy for loading input files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, zero-copy).
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

impl LoadMode {
    /// Parse `mmap` / `owned`, ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mmap" => Some(LoadMode::Mmap),
            "owned" => Some(LoadMode::Owned),
            _ => None,
        }
    }
}

pub(crate) enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

pub(crate) fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    match mode {
        // Mapping an empty file fails on some platforms.
        LoadMode::Mmap if file.metadata().map(|m| m.len() > 0).unwrap_or(false) => {
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        _ => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

pub(crate) fn strip_cr(line: &[u8]) -> &[u8] {
    if line.ends_with(b"\r") {
        &line[..line.len() - 1]
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_modes() {
        assert_eq!(LoadMode::parse("MMAP"), Some(LoadMode::Mmap));
        assert_eq!(LoadMode::parse("owned"), Some(LoadMode::Owned));
        assert_eq!(LoadMode::parse("lazy"), None);
    }

    #[test]
    fn loads_empty_file_in_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.u8");
        std::fs::write(&path, b"").unwrap();
        for mode in [LoadMode::Mmap, LoadMode::Owned] {
            let buf = load_file(&path, mode).expect("load empty");
            assert!(buf.as_slice().is_empty());
        }
    }

    #[test]
    fn missing_file_names_path() {
        let err = match load_file(Path::new("/nonexistent/fra-eng.u8"), LoadMode::Owned) {
            Ok(_) => panic!("expected failure"),
            Err(err) => err,
        };
        assert!(format!("{err:#}").contains("fra-eng.u8"));
    }
}
