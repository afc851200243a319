//! Pipelines behind the `wikdict-compile` binary.
//!
//! Each pipeline reads its sources, builds canonical entries and hands them
//! to [`wikdict_store`] which writes the primary/index pair. A pair is only
//! written once its source compiled completely.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{error, info, warn};
use wikdict_conjugate::{
    ConjugationFormat, ExtractConfig, ExtractStats, MergeStats, extract_file, merge,
    sort_for_index,
};
use wikdict_store::{
    KeyPolicy, LoadMode, OffsetPolicy, PairStats, VerbLexicon, VerifyReport, try_write_pair,
    verify_files, write_pair,
};
use wikdict_tei::{TeiEntries, TeiStats};

pub const DEFAULT_JSONL: &str = "fr-extract.jsonl";
pub const DEFAULT_REFERENCE: &str = "fra-eng.u8";
pub const DEFAULT_PRIMARY: &str = "fra.u8";
pub const DEFAULT_INDEX: &str = "fra.idx";

const TEI_EXTENSION: &str = "tei";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no .tei files found in {}", .0.display())]
    NoTeiInputs(PathBuf),
    #[error("{} has no file stem to name its outputs after", .0.display())]
    NoStem(PathBuf),
    #[error("{failed} of {total} TEI files failed to compile")]
    TeiFailures { failed: usize, total: usize },
}

/// Inputs and outputs of a conjugation build.
#[derive(Clone, Debug)]
pub struct ConjugationJob {
    pub input: PathBuf,
    /// Dictionary primary file listing the known verbs. Unused by
    /// [`ConjugationFormat::Raw`].
    pub reference: PathBuf,
    pub primary: PathBuf,
    pub index: PathBuf,
    pub format: ConjugationFormat,
    pub extract: ExtractConfig,
    pub load_mode: LoadMode,
}

impl Default for ConjugationJob {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_JSONL),
            reference: PathBuf::from(DEFAULT_REFERENCE),
            primary: PathBuf::from(DEFAULT_PRIMARY),
            index: PathBuf::from(DEFAULT_INDEX),
            format: ConjugationFormat::default(),
            extract: ExtractConfig::default(),
            load_mode: LoadMode::Mmap,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ConjugationSummary {
    pub extract: ExtractStats,
    /// Present for [`ConjugationFormat::Merged`] only.
    pub merge: Option<MergeStats>,
    pub pair: PairStats,
}

/// Extract conjugations, optionally merge them against the verb reference,
/// and write the conjugation pair.
pub fn run_conjugations(job: &ConjugationJob) -> Result<ConjugationSummary> {
    let start = Instant::now();

    // Load the reference before the long extraction so a bad path fails fast.
    let reference = match job.format {
        ConjugationFormat::Merged => {
            let lexicon = VerbLexicon::load_with_mode(&job.reference, job.load_mode)
                .context("load verb reference")?;
            info!(
                "loaded {} reference verbs from {}",
                lexicon.len(),
                job.reference.display()
            );
            if lexicon.is_empty() {
                warn!("verb reference is empty; every conjugation will be dropped");
            }
            Some(lexicon)
        }
        ConjugationFormat::Raw => None,
    };

    let extraction = extract_file(&job.input, &job.extract)?;
    let extract_stats = extraction.stats;

    let (mut records, merge_stats) = match &reference {
        Some(lexicon) => {
            let merged = merge(extraction.records, lexicon);
            (merged.records, Some(merged.stats))
        }
        None => (extraction.records, None),
    };
    sort_for_index(&mut records);

    let entries = records.iter().map(|record| record.to_entry(job.format));
    let pair = write_pair(&job.primary, &job.index, entries, OffsetPolicy::FirstOfRun)?;

    info!(
        "{} conjugations compiled in {} ms",
        job.format,
        start.elapsed().as_millis()
    );
    Ok(ConjugationSummary {
        extract: extract_stats,
        merge: merge_stats,
        pair,
    })
}

/// TEI sources and where their pairs go.
#[derive(Clone, Debug, Default)]
pub struct TeiJob {
    /// Files or directories; directories contribute their `*.tei` files.
    pub inputs: Vec<PathBuf>,
    /// Output directory. Defaults to each input's own directory.
    pub out_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct TeiSummary {
    pub input: PathBuf,
    pub primary: PathBuf,
    pub index: PathBuf,
    pub entries: TeiStats,
    pub pair: PairStats,
}

/// Compile every TEI input into its own dictionary pair.
///
/// A file that fails is logged and skipped; the others are still compiled.
/// The run fails afterwards if any file did.
pub fn run_tei(job: &TeiJob) -> Result<Vec<TeiSummary>> {
    let inputs = tei_inputs(&job.inputs)?;
    let total = inputs.len();
    let mut summaries = Vec::with_capacity(total);
    for input in inputs {
        let compiled = output_paths(&input, job.out_dir.as_deref())
            .and_then(|(primary, index)| compile_tei(&input, &primary, &index));
        match compiled {
            Ok(summary) => summaries.push(summary),
            Err(err) => error!("{}: {err:#}", input.display()),
        }
    }

    info!("TEI files processed: {}/{}", summaries.len(), total);
    let failed = total - summaries.len();
    if failed > 0 {
        return Err(PipelineError::TeiFailures { failed, total }.into());
    }
    Ok(summaries)
}

/// Expand directories to their `*.tei` files, sorted by path. Plain file
/// arguments are kept whatever their extension.
pub fn tei_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("read {}", path.display()))? {
            let entry = entry.with_context(|| format!("read {}", path.display()))?;
            let candidate = entry.path();
            let is_tei = candidate
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(TEI_EXTENSION));
            if is_tei && candidate.is_file() {
                found.push(candidate);
            }
        }
        if found.is_empty() {
            return Err(PipelineError::NoTeiInputs(path.clone()).into());
        }
        found.sort();
        inputs.extend(found);
    }
    Ok(inputs)
}

/// `dir/fra-eng.tei` maps to `out/fra-eng.u8` and `out/fra-eng.idx`.
pub fn output_paths(input: &Path, out_dir: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    let stem = input
        .file_stem()
        .ok_or_else(|| PipelineError::NoStem(input.to_path_buf()))?;
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let base = dir.join(stem);
    Ok((base.with_extension("u8"), base.with_extension("idx")))
}

/// Stream one TEI file into a dictionary pair.
pub fn compile_tei(input: &Path, primary: &Path, index: &Path) -> Result<TeiSummary> {
    let start = Instant::now();
    let mut entries = TeiEntries::open(input)?;
    let pair = try_write_pair(
        primary,
        index,
        entries.by_ref().map(|entry| entry.map(|e| e.to_entry())),
        OffsetPolicy::PerEntry,
    )
    .with_context(|| format!("compile {}", input.display()))?;
    let stats = entries.stats();

    info!(
        "{}: {} entries written, {} without headword, {} without translation ({} ms)",
        input.display(),
        stats.entries_emitted,
        stats.dropped_no_headword,
        stats.dropped_no_translation,
        start.elapsed().as_millis()
    );
    Ok(TeiSummary {
        input: input.to_path_buf(),
        primary: primary.to_path_buf(),
        index: index.to_path_buf(),
        entries: stats,
        pair,
    })
}

/// Re-read a finished pair and check its index.
pub fn run_verify(
    primary: &Path,
    index: &Path,
    policy: KeyPolicy,
    mode: LoadMode,
) -> Result<VerifyReport> {
    let report = verify_files(primary, index, policy, mode)?;
    info!(
        "{} is consistent with {}: {} slots, {} keys",
        index.display(),
        primary.display(),
        report.slots,
        report.distinct_keys
    );
    Ok(report)
}
