//! Stream `<entry>` elements out of FreeDict / WikDict TEI dictionaries.
//!
//! [`TeiEntries`] is a pull iterator over a `quick-xml` event stream. Only the
//! entry currently being read is held in memory; once it is yielded (or
//! dropped for lacking a headword or translation) its state is discarded, so
//! arbitrarily large dictionaries are read in bounded memory.
//!
//! Fields are located by local element name, so both prefixed and default
//! TEI namespaces work:
//!
//! | field | element |
//! |---|---|
//! | headword | first `orth` |
//! | pronunciation | first `pron` directly under a `form` |
//! | part of speech | first `pos` |
//! | gender | first `gen` |
//! | translations | every `quote` under `sense/cit[@type="trans"]` |
//! | definitions | every `def` directly under a `sense` |
//!
//! # Example
//! ```no_run
//! use wikdict_tei::TeiEntries;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut entries = TeiEntries::open("fra-eng.tei")?;
//! for entry in &mut entries {
//!     let entry = entry?;
//!     print!("{}", entry.to_entry().to_line());
//! }
//! println!("{:?}", entries.stats());
//! # Ok(()) }
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;
use wikdict_types::{CanonicalEntry, fold_key, normalize};

/// One dictionary entry with at least a headword and a translation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeiEntry {
    pub headword: String,
    pub pos: String,
    pub gender: String,
    pub pronunciation: String,
    /// Unique translations, sorted.
    pub translations: BTreeSet<String>,
    /// Definitions in source order.
    pub definitions: Vec<String>,
}

impl TeiEntry {
    /// Lookup key: lowercased headword, acronyms kept as is.
    pub fn index_key(&self) -> String {
        fold_key(&self.headword)
    }

    pub fn translations_field(&self) -> String {
        self.translations
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn definition_field(&self) -> String {
        self.definitions.join(" | ")
    }

    /// `headword, pos, gender, pronunciation, translations, definition`.
    pub fn to_entry(&self) -> CanonicalEntry {
        CanonicalEntry::new(
            self.index_key(),
            [
                self.headword.clone(),
                self.pos.clone(),
                self.gender.clone(),
                self.pronunciation.clone(),
                self.translations_field(),
                self.definition_field(),
            ],
        )
    }
}

/// Short gender code: `m`, `f`, `n`, or the first character of anything
/// else.
pub fn map_gender(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "masc" | "masculine" => "m".to_string(),
        "fem" | "feminine" => "f".to_string(),
        "neut" | "neuter" => "n".to_string(),
        _ => raw.chars().next().map(String::from).unwrap_or_default(),
    }
}

/// Counters for one TEI stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TeiStats {
    pub entries_seen: usize,
    pub entries_emitted: usize,
    pub dropped_no_headword: usize,
    pub dropped_no_translation: usize,
}

/// Lazy, non-restartable sequence of [`TeiEntry`] values.
///
/// Malformed XML ends the sequence with an error; entries lacking a headword
/// or translation are skipped and counted in [`TeiEntries::stats`].
pub struct TeiEntries<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    parser: Parser,
    done: bool,
}

impl TeiEntries<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TeiEntries<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            parser: Parser::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> TeiStats {
        self.parser.stats
    }
}

impl<R: BufRead> Iterator for TeiEntries<R> {
    type Item = Result<TeiEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => self.parser.feed(event),
                Err(err) => Err(err.into()),
            };
            self.buf.clear();

            match step {
                Ok(Step::Continue) => continue,
                Ok(Step::Entry(entry)) => return Some(Ok(entry)),
                Ok(Step::Eof) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    let position = self.reader.buffer_position();
                    return Some(Err(err.context(format!("TEI parse error near byte {position}"))));
                }
            }
        }
    }
}

enum Step {
    Continue,
    Entry(TeiEntry),
    Eof,
}

#[derive(Default)]
struct Parser {
    current: Option<EntryBuilder>,
    stats: TeiStats,
}

impl Parser {
    fn feed(&mut self, event: Event<'_>) -> Result<Step> {
        match event {
            Event::Start(e) => self.start(&e)?,
            Event::Empty(e) => {
                self.start(&e)?;
                return Ok(self.end());
            }
            Event::End(_) => return Ok(self.end()),
            Event::Text(e) => {
                if let Some(builder) = &mut self.current {
                    builder.text(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(builder) = &mut self.current {
                    builder.text(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => {
                if self.current.is_some() {
                    bail!("input ended inside an <entry>");
                }
                return Ok(Step::Eof);
            }
            _ => {}
        }
        Ok(Step::Continue)
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match &mut self.current {
            Some(builder) => builder.open(e)?,
            None if e.local_name().as_ref() == b"entry" => {
                self.current = Some(EntryBuilder::default());
            }
            None => {}
        }
        Ok(())
    }

    fn end(&mut self) -> Step {
        let Some(builder) = &mut self.current else {
            return Step::Continue;
        };
        if !builder.stack.is_empty() {
            builder.close();
            return Step::Continue;
        }

        // The entry element itself closed.
        let Some(builder) = self.current.take() else {
            return Step::Continue;
        };
        self.stats.entries_seen += 1;
        match builder.build() {
            Ok(entry) => {
                self.stats.entries_emitted += 1;
                Step::Entry(entry)
            }
            Err(Dropped::NoHeadword) => {
                debug!("dropping entry {} without headword", self.stats.entries_seen);
                self.stats.dropped_no_headword += 1;
                Step::Continue
            }
            Err(Dropped::NoTranslation(headword)) => {
                debug!("dropping {headword:?}: no translation");
                self.stats.dropped_no_translation += 1;
                Step::Continue
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Tag {
    Form,
    Sense,
    TransCit,
    Other,
}

#[derive(Clone, Copy, Debug)]
enum Field {
    Headword,
    Pronunciation,
    Pos,
    Gender,
    Translation,
    Definition,
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

enum Dropped {
    NoHeadword,
    NoTranslation(String),
}

/// State of the entry being read. `stack` holds the elements opened below
/// `<entry>`.
#[derive(Default)]
struct EntryBuilder {
    stack: Vec<Tag>,
    capture: Option<Capture>,
    headword: Option<String>,
    pronunciation: Option<String>,
    pos: Option<String>,
    gender: Option<String>,
    translations: BTreeSet<String>,
    definitions: Vec<String>,
}

impl EntryBuilder {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = e.local_name();
        let name = name.as_ref();
        let parent = self.stack.last().copied();
        let grandparent = self
            .stack
            .len()
            .checked_sub(2)
            .and_then(|idx| self.stack.get(idx))
            .copied();

        let tag = match name {
            b"form" => Tag::Form,
            b"sense" => Tag::Sense,
            b"cit" if is_translation(e)? => Tag::TransCit,
            _ => Tag::Other,
        };
        self.stack.push(tag);

        if self.capture.is_some() {
            return Ok(());
        }
        let field = match name {
            b"orth" if self.headword.is_none() => Some(Field::Headword),
            b"pron" if self.pronunciation.is_none() && parent == Some(Tag::Form) => {
                Some(Field::Pronunciation)
            }
            b"pos" if self.pos.is_none() => Some(Field::Pos),
            b"gen" if self.gender.is_none() => Some(Field::Gender),
            b"quote" if parent == Some(Tag::TransCit) && grandparent == Some(Tag::Sense) => {
                Some(Field::Translation)
            }
            b"def" if parent == Some(Tag::Sense) => Some(Field::Definition),
            _ => None,
        };
        if let Some(field) = field {
            self.capture = Some(Capture {
                field,
                depth: self.stack.len(),
                text: String::new(),
            });
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = &mut self.capture {
            capture.text.push_str(text);
        }
    }

    fn close(&mut self) {
        let depth = self.stack.len();
        if self.capture.as_ref().is_some_and(|c| c.depth == depth)
            && let Some(capture) = self.capture.take()
        {
            self.store(capture);
        }
        self.stack.pop();
    }

    fn store(&mut self, capture: Capture) {
        let value = normalize(&capture.text);
        match capture.field {
            Field::Headword => self.headword = Some(value),
            Field::Pronunciation => self.pronunciation = Some(value),
            Field::Pos => self.pos = Some(value),
            Field::Gender => self.gender = Some(value),
            Field::Translation if !value.is_empty() => {
                self.translations.insert(value);
            }
            Field::Definition if !value.is_empty() => self.definitions.push(value),
            Field::Translation | Field::Definition => {}
        }
    }

    fn build(self) -> Result<TeiEntry, Dropped> {
        let headword = self
            .headword
            .filter(|h| !h.is_empty())
            .ok_or(Dropped::NoHeadword)?;
        if self.translations.is_empty() {
            return Err(Dropped::NoTranslation(headword));
        }
        Ok(TeiEntry {
            headword,
            pos: self.pos.unwrap_or_default(),
            gender: map_gender(&self.gender.unwrap_or_default()),
            pronunciation: self.pronunciation.unwrap_or_default(),
            translations: self.translations,
            definitions: self.definitions,
        })
    }
}

fn is_translation(e: &BytesStart<'_>) -> Result<bool> {
    Ok(e
        .try_get_attribute("type")?
        .is_some_and(|attr| attr.value.as_ref() == b"trans"))
}
