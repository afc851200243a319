use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use wikdict_types::{CanonicalEntry, IndexSlot};

/// Which lines of the primary file get an index slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OffsetPolicy {
    /// Every line gets `(key, offset, length)`. Duplicate keys produce
    /// duplicate slots, ordered by offset.
    PerEntry,
    /// Only the first line of each run of identical consecutive keys gets
    /// `(key, offset)`. The primary file must be written in key order so a
    /// run is the whole block of lines for that key.
    FirstOfRun,
}

impl OffsetPolicy {
    pub fn records_length(self) -> bool {
        matches!(self, OffsetPolicy::PerEntry)
    }
}

/// Size summary of a written pair.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PairStats {
    pub lines: usize,
    pub slots: usize,
    pub primary_bytes: u64,
    pub index_bytes: u64,
}

/// Primary-file writer that captures the byte offset of every line it
/// writes.
pub struct IndexWriter<W: Write> {
    sink: BufWriter<W>,
    policy: OffsetPolicy,
    cursor: u64,
    lines: usize,
    last_key: Option<String>,
    slots: Vec<IndexSlot>,
}

impl<W: Write> IndexWriter<W> {
    pub fn new(sink: W, policy: OffsetPolicy) -> Self {
        Self {
            sink: BufWriter::new(sink),
            policy,
            cursor: 0,
            lines: 0,
            last_key: None,
            slots: Vec::new(),
        }
    }

    /// Append one entry as a line and record its slot.
    pub fn push(&mut self, entry: &CanonicalEntry) -> io::Result<()> {
        let offset = self.cursor;
        let line = entry.to_line();
        self.sink.write_all(line.as_bytes())?;
        self.cursor += line.len() as u64;
        self.lines += 1;

        match self.policy {
            OffsetPolicy::PerEntry => self.slots.push(IndexSlot {
                key: entry.key.clone(),
                offset,
                length: Some(self.cursor - offset),
            }),
            OffsetPolicy::FirstOfRun => {
                let same_run = self.last_key.as_deref() == Some(entry.key.as_str());
                if !same_run {
                    if let Some(prev) = &self.last_key
                        && prev.as_str() > entry.key.as_str()
                    {
                        warn!(
                            "primary written out of key order: {:?} after {:?}",
                            entry.key, prev
                        );
                    }
                    self.slots.push(IndexSlot {
                        key: entry.key.clone(),
                        offset,
                        length: None,
                    });
                    self.last_key = Some(entry.key.clone());
                }
            }
        }
        Ok(())
    }

    /// Byte position the next line will start at.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush the primary file and return the sink with the slots sorted by
    /// key bytes. The sort is stable, so equal keys stay in offset order.
    pub fn finish(self) -> io::Result<(W, Vec<IndexSlot>)> {
        let sink = self.sink.into_inner().map_err(|e| e.into_error())?;
        let mut slots = self.slots;
        slots.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
        Ok((sink, slots))
    }
}

/// Serialize sorted slots, one line each. Returns the bytes written.
pub fn write_index<W: Write>(slots: &[IndexSlot], sink: W) -> io::Result<u64> {
    let mut out = BufWriter::new(sink);
    let mut written = 0u64;
    for slot in slots {
        let line = slot.to_line();
        out.write_all(line.as_bytes())?;
        written += line.len() as u64;
    }
    out.flush()?;
    Ok(written)
}

/// In-memory build: the primary bytes and the sorted index slots.
pub fn build<I>(entries: I, policy: OffsetPolicy) -> io::Result<(Vec<u8>, Vec<IndexSlot>)>
where
    I: IntoIterator<Item = CanonicalEntry>,
{
    let mut writer = IndexWriter::new(Vec::new(), policy);
    for entry in entries {
        writer.push(&entry)?;
    }
    writer.finish()
}

/// Write a primary/index pair to disk.
///
/// Both files are first written to temporary siblings and only moved into
/// place once both are complete, so a failed run never leaves a primary file
/// paired with a stale index.
pub fn write_pair<I>(
    primary_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
    entries: I,
    policy: OffsetPolicy,
) -> Result<PairStats>
where
    I: IntoIterator<Item = CanonicalEntry>,
{
    try_write_pair(primary_path, index_path, entries.into_iter().map(Ok), policy)
}

/// [`write_pair`] for entry streams that can fail midway (streaming
/// parsers). The first error aborts the run before anything is persisted.
pub fn try_write_pair<I>(
    primary_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
    entries: I,
    policy: OffsetPolicy,
) -> Result<PairStats>
where
    I: IntoIterator<Item = Result<CanonicalEntry>>,
{
    let primary_path = primary_path.as_ref();
    let index_path = index_path.as_ref();

    let mut primary_tmp = temp_sibling(primary_path)?;
    let mut writer = IndexWriter::new(primary_tmp.as_file_mut(), policy);
    for entry in entries {
        let entry = entry?;
        writer
            .push(&entry)
            .with_context(|| format!("write {}", primary_path.display()))?;
    }
    let lines = writer.lines();
    let primary_bytes = writer.cursor();
    let (_, slots) = writer
        .finish()
        .with_context(|| format!("flush {}", primary_path.display()))?;

    let mut index_tmp = temp_sibling(index_path)?;
    let index_bytes = write_index(&slots, index_tmp.as_file_mut())
        .with_context(|| format!("write {}", index_path.display()))?;

    primary_tmp
        .persist(primary_path)
        .with_context(|| format!("persist {}", primary_path.display()))?;
    index_tmp
        .persist(index_path)
        .with_context(|| format!("persist {}", index_path.display()))?;

    let stats = PairStats {
        lines,
        slots: slots.len(),
        primary_bytes,
        index_bytes,
    };
    info!(
        "wrote {} ({} lines, {} bytes) and {} ({} slots, {} bytes)",
        primary_path.display(),
        stats.lines,
        stats.primary_bytes,
        index_path.display(),
        stats.slots,
        stats.index_bytes
    );
    Ok(stats)
}

fn temp_sibling(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file next to {}", path.display()))
}
