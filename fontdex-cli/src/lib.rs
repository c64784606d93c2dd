//! fontdex CLI: walk a font corpus, resolve one preview string per
//! family, subset the sample fonts in parallel, and write the catalog
//! plus the preview collection.
//!
//! Per-family problems (malformed descriptors, corrupt fonts) are
//! logged and counted, never fatal; the process exits non-zero only
//! when an output file cannot be written.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, ValueHint};

use fontdex_core::batch::{run_batch, BatchOutcome, SubsetTask};
use fontdex_core::catalog::{
    compress_catalog, finalize_catalog, write_catalog, MissingPreviewPolicy,
};
use fontdex_core::collection::assemble;
use fontdex_core::corpus::{discover_descriptors, DescriptorRef};
use fontdex_core::descriptor::{DescriptorParser, FamilyRecord, DEFAULT_BASE_URL};
use fontdex_core::langdb::LanguageDb;
use fontdex_core::sample::resolve_sample_text;

/// CLI surface for fontdex.
#[derive(Debug, Parser)]
#[command(
    name = "fontdex",
    about = "Build an offline font catalog and a shaping-correct preview collection"
)]
pub struct Cli {
    /// Path to the root of the font corpus
    #[arg(value_hint = ValueHint::DirPath)]
    corpus_path: PathBuf,

    /// Catalog output path
    #[arg(short = 'o', long = "output", default_value = "fonts.json")]
    output: PathBuf,

    /// Preview collection output path
    #[arg(long = "previews", default_value = "previews.ttc")]
    previews: PathBuf,

    /// Language/script reference data directory (languages/ + scripts/)
    #[arg(long = "lang-data", value_hint = ValueHint::DirPath)]
    lang_data: Option<PathBuf>,

    /// Remote base URL for synthesized font file links
    #[arg(long = "base-url", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Number of parallel subsetting workers (defaults to all cores)
    #[arg(long = "jobs")]
    jobs: Option<usize>,

    /// Also write a brotli-compressed compact catalog next to the JSON
    #[arg(long = "compress", action = ArgAction::SetTrue)]
    compress: bool,

    /// Drop families whose preview subsetting failed instead of
    /// retaining them with a null preview
    #[arg(long = "drop-missing-previews", action = ArgAction::SetTrue)]
    drop_missing_previews: bool,
}

/// Parse CLI args and run the pipeline.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    run_pipeline(&cli)
}

fn run_pipeline(args: &Cli) -> Result<()> {
    let db = match &args.lang_data {
        Some(dir) => LanguageDb::load(dir)?,
        None => LanguageDb::empty(),
    };

    let parser = DescriptorParser::new()?;
    let descriptors = discover_descriptors(&args.corpus_path)?;
    let attempted = descriptors.len();

    let mut records = Vec::new();
    for descriptor in &descriptors {
        match parse_descriptor(&parser, descriptor, &args.base_url) {
            Ok(mut record) => {
                record.preview_string = resolve_sample_text(&record, &db);
                records.push(record);
            }
            Err(err) => eprintln!("skipping {}: {err:#}", descriptor.path.display()),
        }
    }

    let tasks = subset_tasks(&args.corpus_path, &records);
    let submitted = tasks.len();
    let outcome = run_batch(&tasks, args.jobs, &|done, total| {
        eprintln!("{done} of {total} done subsetting");
    })?;

    report_soft_conditions(&outcome);

    let collection = assemble(&outcome.fonts)?;
    fs::write(&args.previews, &collection.bytes)
        .with_context(|| format!("writing preview collection {}", args.previews.display()))?;

    let policy = if args.drop_missing_previews {
        MissingPreviewPolicy::Drop
    } else {
        MissingPreviewPolicy::Retain
    };
    let records = finalize_catalog(records, &collection.families, policy);

    let catalog = fs::File::create(&args.output)
        .with_context(|| format!("writing catalog {}", args.output.display()))?;
    write_catalog(&records, catalog)
        .with_context(|| format!("writing catalog {}", args.output.display()))?;

    if args.compress {
        let path = compressed_path(&args.output);
        let compressed = compress_catalog(&records)?;
        fs::write(&path, compressed)
            .with_context(|| format!("writing compressed catalog {}", path.display()))?;
    }

    println!(
        "Done! Indexed {} of {} families. {} includes {} of {} fonts.",
        records.len(),
        attempted,
        args.previews.display(),
        outcome.fonts.len(),
        submitted,
    );

    Ok(())
}

fn parse_descriptor(
    parser: &DescriptorParser,
    descriptor: &DescriptorRef,
    base_url: &str,
) -> Result<FamilyRecord> {
    let content = fs::read_to_string(&descriptor.path).context("reading descriptor")?;
    let family_dir = descriptor
        .family_dir()
        .ok_or_else(|| anyhow!("descriptor has no family directory"))?;
    parser.parse(&content, descriptor.license, family_dir, base_url)
}

/// One subsetting task per retained family. The family id doubles as
/// the corpus-relative directory path, so the sample file resolves as
/// `corpus/{id}/{filename}`.
fn subset_tasks(corpus: &Path, records: &[FamilyRecord]) -> Vec<SubsetTask> {
    records
        .iter()
        .filter_map(|record| {
            let sample = record.sample_file()?;
            Some(SubsetTask {
                id: record.id.clone(),
                path: corpus.join(&record.id).join(&sample.filename),
                text: record.preview_string.clone(),
            })
        })
        .collect()
}

fn report_soft_conditions(outcome: &BatchOutcome) {
    for gap in &outcome.coverage_gaps {
        eprintln!(
            "warning: {}: preview text has {} unrenderable character(s)",
            gap.id, gap.missing_glyphs
        );
    }

    if !outcome.failures.is_empty() {
        eprintln!("\n{} file(s) failed to subset:", outcome.failures.len());
        for failure in &outcome.failures {
            eprintln!("  {}: {}", failure.path.display(), failure.reason);
        }
    }
}

/// `fonts.json` → `fonts.json.br`.
fn compressed_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".br");
    output.with_file_name(name)
}
