//! Parallel export and classification over many trace files.
//!
//! Each input runs its own load → extract → classify → export pipeline; files
//! share nothing but the read-only decoder registry.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::classifier::{classify, ClassifierParams, Event};
use crate::core::loaders::{load_trace, DecoderRegistry};
use crate::core::writers::{write_signal, ExportFormat};

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No supported input files given")]
    NoInputs,

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process {path}: {reason}")]
    FileFailed { path: PathBuf, reason: String },
}

/// Settings shared by every file of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Baseline-correct each signal before export.
    pub adjust: bool,
    pub format: ExportFormat,
    pub precision: Option<usize>,
    /// Classify each trace when set.
    pub classifier: Option<ClassifierParams>,
    /// Report failed files instead of failing the batch.
    pub continue_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            adjust: false,
            format: ExportFormat::Csv,
            precision: None,
            classifier: None,
            continue_on_error: true,
        }
    }
}

/// Result of processing one input file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub samples: usize,
    pub event: Option<Event>,
    pub error: Option<String>,
}

impl FileOutcome {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes in input order, plus inputs skipped for their extension.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn events_found(&self) -> usize {
        self.outcomes.iter().filter(|o| o.event.is_some()).count()
    }
}

/// Work item for parallel batch processing.
#[derive(Clone)]
struct ExportTask {
    idx: usize,
    src: PathBuf,
    dest: PathBuf,
}

/// Output file for the `idx`-th (1-based) input.
///
/// The index prefix keeps inputs with the same file stem apart.
pub fn output_path_for(input: &Path, output_dir: &Path, idx: usize, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    output_dir.join(format!("{:04}_{}.{}", idx, stem, format.extension()))
}

fn process_file(
    task: &ExportTask,
    registry: &DecoderRegistry,
    options: &BatchOptions,
) -> Result<(usize, Option<Event>)> {
    let mut trace = load_trace(&task.src, registry)
        .with_context(|| format!("loading {}", task.src.display()))?;
    trace.extract_axis(options.adjust);

    let event = match &options.classifier {
        Some(params) => classify(trace.signal(), params)
            .with_context(|| format!("classifying {}", task.src.display()))?,
        None => None,
    };

    write_signal(&task.dest, &trace.series(), options.format, options.precision)
        .with_context(|| format!("writing {}", task.dest.display()))?;

    Ok((trace.len(), event))
}

/// Process `inputs` in parallel, calling `on_done` after each file.
///
/// Inputs whose extension has no registered decoder are skipped with a
/// warning. Outputs are written to `output_dir` as `NNNN_<stem>.<ext>`.
///
/// # Errors
///
/// Fails if no input is supported, the output directory cannot be created, or
/// (with `continue_on_error` unset) any file fails.
pub fn process_batch_with<F>(
    inputs: &[PathBuf],
    output_dir: &Path,
    options: &BatchOptions,
    registry: &DecoderRegistry,
    on_done: F,
) -> std::result::Result<BatchReport, BatchError>
where
    F: Fn(&FileOutcome) + Sync,
{
    let (supported, skipped): (Vec<&PathBuf>, Vec<&PathBuf>) =
        inputs.iter().partition(|p| registry.supports_path(p));

    for path in &skipped {
        warn!("Skipping unsupported file: {}", path.display());
    }

    if supported.is_empty() {
        return Err(BatchError::NoInputs);
    }

    fs::create_dir_all(output_dir).map_err(|e| BatchError::OutputDir {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let tasks: Vec<ExportTask> = supported
        .into_iter()
        .enumerate()
        .map(|(i, src)| ExportTask {
            idx: i + 1,
            src: src.clone(),
            dest: output_path_for(src, output_dir, i + 1, options.format),
        })
        .collect();

    let outcomes: Vec<FileOutcome> = tasks
        .par_iter()
        .map(|task| {
            let outcome = match process_file(task, registry, options) {
                Ok((samples, event)) => {
                    info!(
                        "[{:04}] {} -> {} ({} samples)",
                        task.idx,
                        task.src.display(),
                        task.dest.display(),
                        samples
                    );
                    FileOutcome {
                        input: task.src.clone(),
                        output: task.dest.clone(),
                        samples,
                        event,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("[{:04}] {}: {:#}", task.idx, task.src.display(), e);
                    FileOutcome {
                        input: task.src.clone(),
                        output: task.dest.clone(),
                        samples: 0,
                        event: None,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            on_done(&outcome);
            outcome
        })
        .collect();

    if !options.continue_on_error {
        if let Some(failed) = outcomes.iter().find(|o| !o.is_ok()) {
            return Err(BatchError::FileFailed {
                path: failed.input.clone(),
                reason: failed.error.clone().unwrap_or_default(),
            });
        }
    }

    Ok(BatchReport {
        outcomes,
        skipped: skipped.into_iter().cloned().collect(),
    })
}

/// [`process_batch_with`] without a progress callback.
pub fn process_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    options: &BatchOptions,
    registry: &DecoderRegistry,
) -> std::result::Result<BatchReport, BatchError> {
    process_batch_with(inputs, output_dir, options, registry, |_| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::classifier::ClassificationMode;
    use std::fs::File;
    use std::io::Write as IoWrite;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_trace_csv(dir: &Path, name: &str, peak_at: usize) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for i in 0..10 {
            let y = if i == peak_at { 15.0 } else { 10.0 };
            writeln!(file, "{},{}", i as f64 * 2.5, y).unwrap();
        }
        path
    }

    #[test]
    fn test_output_path_for() {
        let path = output_path_for(Path::new("in/trace_01.sor"), Path::new("out"), 3, ExportFormat::Tsv);
        assert_eq!(path, Path::new("out").join("0003_trace_01.tsv"));
    }

    #[test]
    fn test_process_batch_exports_and_classifies() {
        let temp_dir = TempDir::new().unwrap();
        let a = create_trace_csv(temp_dir.path(), "a.csv", 4);
        let b = create_trace_csv(temp_dir.path(), "b.csv", 7);
        let output_dir = temp_dir.path().join("out");

        let options = BatchOptions {
            adjust: true,
            classifier: Some(ClassifierParams::new(ClassificationMode::EdgeEvent)),
            ..BatchOptions::default()
        };

        let report =
            process_batch(&[a.clone(), b.clone()], &output_dir, &options, &DecoderRegistry::default())
                .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.events_found(), 2);
        assert_eq!(report.outcomes[0].input, a);
        assert_eq!(report.outcomes[1].input, b);

        let first = report.outcomes[0].event.unwrap();
        assert_eq!(first.position, 10.0);
        assert_eq!(first.magnitude, 5.0);
        assert_eq!(report.outcomes[1].event.unwrap().position, 17.5);

        let exported = fs::read_to_string(output_dir.join("0001_a.csv")).unwrap();
        let lines: Vec<&str> = exported.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "0,0");
        assert_eq!(lines[4], "10,5");
        assert!(output_dir.join("0002_b.csv").exists());
    }

    #[test]
    fn test_process_batch_skips_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let a = create_trace_csv(temp_dir.path(), "a.csv", 2);
        let notes = temp_dir.path().join("notes.txt");
        File::create(&notes).unwrap();

        let report = process_batch(
            &[notes.clone(), a],
            &temp_dir.path().join("out"),
            &BatchOptions::default(),
            &DecoderRegistry::default(),
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.skipped, vec![notes]);
        assert!(report.outcomes[0].event.is_none());
    }

    #[test]
    fn test_process_batch_no_inputs() {
        let temp_dir = TempDir::new().unwrap();
        let result = process_batch(
            &[temp_dir.path().join("trace.sor")],
            &temp_dir.path().join("out"),
            &BatchOptions::default(),
            &DecoderRegistry::default(),
        );
        assert!(matches!(result, Err(BatchError::NoInputs)));
    }

    #[test]
    fn test_failed_file_reported() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_trace_csv(temp_dir.path(), "good.csv", 3);
        let missing = temp_dir.path().join("missing.csv");
        let inputs = vec![good, missing.clone()];
        let output_dir = temp_dir.path().join("out");
        let registry = DecoderRegistry::default();

        let report =
            process_batch(&inputs, &output_dir, &BatchOptions::default(), &registry).unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.outcomes[1].error.is_some());

        let strict = BatchOptions {
            continue_on_error: false,
            ..BatchOptions::default()
        };
        let result = process_batch(&inputs, &output_dir, &strict, &registry);
        assert!(matches!(result, Err(BatchError::FileFailed { ref path, .. }) if *path == missing));
    }

    #[test]
    fn test_progress_callback_called_per_file() {
        let temp_dir = TempDir::new().unwrap();
        let inputs: Vec<PathBuf> = (0..5)
            .map(|i| create_trace_csv(temp_dir.path(), &format!("t{i}.csv"), i + 1))
            .collect();
        let counter = AtomicUsize::new(0);

        process_batch_with(
            &inputs,
            &temp_dir.path().join("out"),
            &BatchOptions::default(),
            &DecoderRegistry::default(),
            |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();

        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }
}
