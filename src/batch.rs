use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::codec::LayerCodec;
use crate::processing::layer_spec::LayerKind;
use crate::utils::batch_config::BatchConfig;
use crate::utils::error_handling::{CodecError, CodecResult};
use crate::utils::progress::ProgressSink;

const PLACEHOLDERS: [&str; 4] = ["frame", "cols", "rows", "layer"];

/// One (frame, layer) conversion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchJob {
    pub frame: u32,
    pub kind: LayerKind,
    pub rows: usize,
    pub cols: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<BatchJob>,
    pub failed: Vec<(BatchJob, CodecError)>,
    /// Jobs never started because an earlier one failed with `fail_fast` set
    pub skipped: Vec<BatchJob>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

enum JobOutcome {
    Converted,
    Failed(CodecError),
    Skipped,
}

fn parse_template(template: &str) -> CodecResult<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(CodecError::configuration(format!("unmatched '}}' in name template '{}'", template)));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| CodecError::configuration(format!("unclosed '{{' in name template '{}'", template)))?;
        let name = &after[..close];
        if !PLACEHOLDERS.contains(&name) {
            return Err(CodecError::configuration(format!(
                "unknown placeholder '{{{}}}' in name template '{}' (expected one of {})",
                name,
                template,
                PLACEHOLDERS.join(", ")
            )));
        }
        names.push(name);
        rest = &after[close + 1..];
    }
    Ok(names)
}

pub fn check_template(template: &str) -> CodecResult<()> {
    let names = parse_template(template)?;
    if !names.contains(&"frame") {
        return Err(CodecError::configuration(format!(
            "name template '{}' has no {{frame}} placeholder; every frame would map to the same file",
            template
        )));
    }
    Ok(())
}

/// Substitute `{frame}`, `{cols}`, `{rows}` and `{layer}` (renderer spelling)
pub fn expand_template(template: &str, frame: u32, kind: LayerKind, rows: usize, cols: usize) -> CodecResult<String> {
    parse_template(template)?;
    Ok(template
        .replace("{frame}", &frame.to_string())
        .replace("{cols}", &cols.to_string())
        .replace("{rows}", &rows.to_string())
        .replace("{layer}", kind.source_name()))
}

/// Expand the frame range × layer list into concrete jobs, frame-major
pub fn plan_jobs(config: &BatchConfig) -> CodecResult<Vec<BatchJob>> {
    config.validate()?;

    let mut jobs = Vec::with_capacity(config.frames.len() * config.layers.len());
    let mut destinations = HashSet::new();
    for frame in config.frames.start..config.frames.end {
        for layer in &config.layers {
            let kind: LayerKind = layer.layer.parse()?;
            let name = expand_template(&config.name_template, frame, kind, layer.rows, layer.cols)?;
            let source = config.input_dir.join(&name);
            let destination = config.output_dir().join(&name).with_extension("exr");

            if source == destination {
                return Err(CodecError::configuration(format!(
                    "job for frame {} layer '{}' would overwrite its own source '{}'",
                    frame,
                    kind,
                    source.display()
                )));
            }
            if !destinations.insert(destination.clone()) {
                return Err(CodecError::configuration(format!(
                    "two jobs write to '{}'; make the name template distinguish them",
                    destination.display()
                )));
            }

            jobs.push(BatchJob { frame, kind, rows: layer.rows, cols: layer.cols, source, destination });
        }
    }
    Ok(jobs)
}

fn worker_count(config: &BatchConfig) -> usize {
    config.threads.unwrap_or_else(|| num_cpus::get().saturating_sub(1)).max(1)
}

/// Convert every planned job on a dedicated rayon pool.
///
/// Individual failures are logged and collected in the report; only problems
/// with the batch itself (bad config, output dir, thread pool) return `Err`.
pub fn run_batch(config: &BatchConfig, progress: &dyn ProgressSink) -> Result<BatchReport> {
    let jobs = plan_jobs(config).context("Failed to plan batch")?;
    let codec = LayerCodec::new(config.layer_table().context("Failed to build layer table")?);

    let out_dirs: BTreeSet<PathBuf> = jobs
        .iter()
        .filter_map(|j| j.destination.parent().map(|p| p.to_path_buf()))
        .collect();
    for dir in &out_dirs {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let threads = worker_count(config);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to initialize thread pool")?;

    log::info!(
        "[batch] {} jobs ({} frames x {} layers) on {} threads, revision {:?}",
        jobs.len(),
        config.frames.len(),
        config.layers.len(),
        threads,
        config.revision
    );
    progress.start_indeterminate(Some("Converting raw dumps..."));

    let total = jobs.len().max(1);
    let done = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                if config.fail_fast && stop.load(Ordering::SeqCst) {
                    return JobOutcome::Skipped;
                }
                let outcome = match codec.decode_and_write(job.kind, &job.source, job.rows, job.cols, &job.destination) {
                    Ok(()) => JobOutcome::Converted,
                    Err(e) => {
                        log::error!("[batch] frame {} layer {}: {}", job.frame, job.kind, e);
                        stop.store(true, Ordering::SeqCst);
                        JobOutcome::Failed(e)
                    }
                };
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.set(n as f32 / total as f32, None);
                outcome
            })
            .collect()
    });

    let mut report = BatchReport::default();
    for (job, outcome) in jobs.into_iter().zip(outcomes) {
        match outcome {
            JobOutcome::Converted => report.converted.push(job),
            JobOutcome::Failed(e) => report.failed.push((job, e)),
            JobOutcome::Skipped => report.skipped.push(job),
        }
    }

    let summary = format!(
        "{} converted, {} failed, {} skipped",
        report.converted.len(),
        report.failed.len(),
        report.skipped.len()
    );
    if report.is_success() {
        log::info!("[batch] {}", summary);
    } else {
        log::warn!("[batch] {}", summary);
    }
    progress.finish(Some(&summary));
    Ok(report)
}
