//! Concurrent subsetting with per-family failure containment.
//!
//! One task per family over a bounded worker pool. Tasks share nothing
//! mutable: each receives an immutable `{id, path, text}` descriptor and
//! returns bytes or a failure. Every task body runs under
//! `catch_unwind`, so neither an error nor a panic on one corrupt font
//! can take the batch down. Aggregation happens in a single place after
//! all tasks complete, keyed by id — completion order never reaches the
//! output artifacts.

use std::collections::BTreeMap;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::subset::{subset_preview, PreviewFont};

/// Work descriptor for one family's preview subset.
#[derive(Debug, Clone)]
pub struct SubsetTask {
    pub id: String,
    pub path: PathBuf,
    pub text: String,
}

/// A task that did not produce a preview font.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub id: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Soft condition: the preview text contains characters the sample font
/// cannot render. The subset was still produced.
#[derive(Debug, Clone)]
pub struct CoverageGap {
    pub id: String,
    pub missing_glyphs: usize,
}

/// Everything a batch run produced, keyed and ordered by family id.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub fonts: BTreeMap<String, Vec<u8>>,
    pub failures: Vec<BatchFailure>,
    pub coverage_gaps: Vec<CoverageGap>,
}

/// Subset every task's sample font in parallel. `jobs` bounds the pool
/// (`None` uses rayon's default); `on_progress` fires with
/// `(completed, total)` as tasks drain, in completion order.
pub fn run_batch(
    tasks: &[SubsetTask],
    jobs: Option<usize>,
    on_progress: &(dyn Fn(usize, usize) + Sync),
) -> Result<BatchOutcome> {
    run_batch_with(tasks, jobs, &subset_task, on_progress)
}

fn subset_task(task: &SubsetTask) -> Result<PreviewFont> {
    let data = fs::read(&task.path)?;
    subset_preview(&data, &task.text)
}

fn run_batch_with(
    tasks: &[SubsetTask],
    jobs: Option<usize>,
    worker: &(dyn Fn(&SubsetTask) -> Result<PreviewFont> + Sync),
    on_progress: &(dyn Fn(usize, usize) + Sync),
) -> Result<BatchOutcome> {
    let total = tasks.len();
    let completed = AtomicUsize::new(0);

    let run = || -> Vec<Result<PreviewFont, String>> {
        tasks
            .par_iter()
            .map(|task| {
                let result = match catch_unwind(AssertUnwindSafe(|| worker(task))) {
                    Ok(Ok(font)) => Ok(font),
                    Ok(Err(err)) => Err(format!("{err:#}")),
                    Err(_) => Err("subsetting worker panicked".to_string()),
                };
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(done, total);
                result
            })
            .collect()
    };

    let results = if let Some(jobs) = jobs {
        let pool = ThreadPoolBuilder::new().num_threads(jobs).build()?;
        pool.install(run)
    } else {
        run()
    };

    // The single aggregation point. Results arrive here in task order
    // (rayon's collect restores it), and the id-keyed map plus sorted
    // failure list make the ordering airtight either way.
    let mut outcome = BatchOutcome::default();
    for (task, result) in tasks.iter().zip(results) {
        match result {
            Ok(font) => {
                if font.missing_glyphs > 0 {
                    outcome.coverage_gaps.push(CoverageGap {
                        id: task.id.clone(),
                        missing_glyphs: font.missing_glyphs,
                    });
                }
                outcome.fonts.insert(task.id.clone(), font.bytes);
            }
            Err(reason) => outcome.failures.push(BatchFailure {
                id: task.id.clone(),
                path: task.path.clone(),
                reason,
            }),
        }
    }
    outcome.failures.sort_by(|a, b| a.id.cmp(&b.id));
    outcome.coverage_gaps.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(outcome)
}
