use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wikdict_compiler::{
    ConjugationJob, DEFAULT_INDEX, DEFAULT_JSONL, DEFAULT_PRIMARY, DEFAULT_REFERENCE, TeiJob,
    run_conjugations, run_tei, run_verify,
};
use wikdict_conjugate::{ConjugationFormat, ExtractConfig};
use wikdict_store::{KeyPolicy, LoadMode};

#[derive(Parser)]
#[command(name = "wikdict-compile", version)]
#[command(about = "Compile wikdict conjugation and dictionary files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the conjugation pair from Wiktextract JSON lines.
    Conjugations {
        #[arg(long, env = "WIKDICT_JSONL", default_value = DEFAULT_JSONL)]
        input: PathBuf,
        /// Dictionary primary file whose verbs validate conjugations.
        #[arg(long, env = "WIKDICT_REFERENCE", default_value = DEFAULT_REFERENCE)]
        reference: PathBuf,
        #[command(flatten)]
        pair: PairArgs,
        /// `merged` (deduplicated, 4 fields) or `raw` (every form, 5 fields).
        #[arg(long, default_value = "merged", value_parser = parse_format)]
        format: ConjugationFormat,
        #[arg(long, env = "WIKDICT_LANG", default_value = "fr")]
        lang: String,
        #[arg(long, default_value = "verb")]
        pos: String,
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Build one dictionary pair per TEI file.
    Tei {
        /// TEI files or directories containing them.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Check that an index addresses its primary file.
    Verify {
        #[command(flatten)]
        pair: PairArgs,
        /// Keys are case-folded headwords with lengths (TEI output).
        #[arg(long, default_value_t = false)]
        dictionary: bool,
        #[command(flatten)]
        load: LoadArgs,
    },
}

#[derive(Args)]
struct PairArgs {
    #[arg(long, env = "WIKDICT_PRIMARY", default_value = DEFAULT_PRIMARY)]
    primary: PathBuf,
    #[arg(long, env = "WIKDICT_INDEX", default_value = DEFAULT_INDEX)]
    index: PathBuf,
}

#[derive(Args)]
struct LoadArgs {
    /// `mmap` or `owned`.
    #[arg(long, env = "WIKDICT_LOAD_MODE", default_value = "mmap", value_parser = parse_load_mode)]
    load_mode: LoadMode,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Conjugations {
            input,
            reference,
            pair,
            format,
            lang,
            pos,
            load,
        } => {
            let job = ConjugationJob {
                input,
                reference,
                primary: pair.primary,
                index: pair.index,
                format,
                extract: ExtractConfig {
                    lang_code: lang,
                    pos,
                },
                load_mode: load.load_mode,
            };
            info!(
                "compiling {} conjugations from {} (load mode: {:?})",
                job.format,
                job.input.display(),
                job.load_mode
            );
            let summary = run_conjugations(&job)?;
            if let Some(merge) = summary.merge {
                info!(
                    "{} forms, {} emitted, {} unresolved, {} past participles",
                    merge.keys, merge.emitted, merge.unresolved_keys, merge.participle_passthrough
                );
            }
        }
        Commands::Tei { inputs, out_dir } => {
            let summaries = run_tei(&TeiJob { inputs, out_dir })?;
            info!("compiled {} dictionaries", summaries.len());
        }
        Commands::Verify {
            pair,
            dictionary,
            load,
        } => {
            let policy = if dictionary {
                KeyPolicy::FoldCase
            } else {
                KeyPolicy::Verbatim
            };
            let report = run_verify(&pair.primary, &pair.index, policy, load.load_mode)?;
            println!(
                "{} OK: {} slots, {} keys",
                pair.index.display(),
                report.slots,
                report.distinct_keys
            );
        }
    }

    Ok(())
}

fn parse_format(raw: &str) -> Result<ConjugationFormat, String> {
    ConjugationFormat::parse(raw).ok_or_else(|| format!("unknown format {raw:?}"))
}

fn parse_load_mode(raw: &str) -> Result<LoadMode, String> {
    LoadMode::parse(raw).ok_or_else(|| format!("unknown load mode {raw:?}"))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
