use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use loggerfill_parser::DeviceId;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::normalizer::{normalize, NormalizeError, NormalizeOptions};
use crate::output::{prepare_directory, OutputStager, StageError};
use crate::time_axis::{build_time_axis, AxisError, TimeAxis};

/// Errors that stop the whole run before any file is written.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Axis(#[from] AxisError),
    #[error("input directory '{0}' does not exist or is not a directory")]
    MissingInputDirectory(PathBuf),
    #[error("refusing to reset '{directory}' because it contains the input directory '{input}'")]
    UnsafeDirectory { directory: PathBuf, input: PathBuf },
    #[error("failed to prepare directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid input pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Errors confined to a single input file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to list input: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("failed to read file: {0}")]
    Read(#[source] std::io::Error),
    #[error("file contents were not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("device {device_id} was already written from '{previous}'")]
    DeviceCollision {
        device_id: DeviceId,
        previous: PathBuf,
    },
    #[error(transparent)]
    Stage(#[from] StageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Written,
    Duplicate,
    Failed,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub hash: Option<String>,
    pub status: FileStatus,
    pub device_id: Option<DeviceId>,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl FileReport {
    fn failed(path: PathBuf, hash: Option<String>, err: &FileError) -> Self {
        Self {
            path,
            hash,
            status: FileStatus::Failed,
            device_id: None,
            output_path: None,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    fn count(&self, status: FileStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    pub fn written(&self) -> usize {
        self.count(FileStatus::Written)
    }

    pub fn duplicates(&self) -> usize {
        self.count(FileStatus::Duplicate)
    }

    pub fn failed(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.reports
            .iter()
            .filter(|r| r.status == FileStatus::Failed)
    }
}

/// Builds the study axis from the configured window and frequency.
pub fn build_axis(config: &Config) -> Result<TimeAxis, RunError> {
    let start = config.start()?;
    let end = config.end()?;
    let frequency = config.frequency()?;
    let axis = build_time_axis(start, end, frequency.interval())?;
    info!(
        start = %start,
        end = %end,
        frequency = %config.frequency,
        records = axis.len(),
        "built time axis"
    );
    Ok(axis)
}

/// Full run: axis, directory setup, discovery, then every file in turn.
pub fn run(config: &Config) -> Result<BatchSummary, RunError> {
    let axis = build_axis(config)?;

    if !config.input_directory.is_dir() {
        return Err(RunError::MissingInputDirectory(
            config.input_directory.clone(),
        ));
    }
    for dir in [&config.output_directory, &config.intermediate_directory] {
        ensure_outside_input(dir, &config.input_directory)?;
    }

    let inputs = discover_inputs(&config.input_directory, &config.input_pattern)?;
    info!(
        directory = %config.input_directory.display(),
        files = inputs.len(),
        "discovered input files"
    );

    for dir in [&config.output_directory, &config.intermediate_directory] {
        prepare_directory(dir).map_err(|source| RunError::Io {
            path: dir.clone(),
            source,
        })?;
    }

    let stager = OutputStager::new(&config.intermediate_directory, &config.output_directory);
    let summary = process_inputs(
        inputs,
        &axis,
        &config.normalize_options(),
        &stager,
        &config.output_suffix,
    );

    info!(
        written = summary.written(),
        duplicates = summary.duplicates(),
        failed = summary.failed(),
        "run finished"
    );
    Ok(summary)
}

fn ensure_outside_input(directory: &Path, input: &Path) -> Result<(), RunError> {
    if !directory.exists() {
        return Ok(());
    }
    let canonical = |path: &Path| {
        path.canonicalize().map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    if canonical(input)?.starts_with(canonical(directory)?) {
        return Err(RunError::UnsafeDirectory {
            directory: directory.to_path_buf(),
            input: input.to_path_buf(),
        });
    }
    Ok(())
}

/// Lists the files under `dir` matching `pattern`, sorted by path.
pub fn discover_inputs(
    dir: &Path,
    pattern: &str,
) -> Result<Vec<Result<PathBuf, glob::GlobError>>, RunError> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full_pattern = Path::new(&escaped).join(pattern);
    let full_pattern = full_pattern.to_string_lossy();

    let entries = glob::glob(&full_pattern).map_err(|source| RunError::Pattern {
        pattern: full_pattern.to_string(),
        source,
    })?;

    let mut inputs: Vec<Result<PathBuf, glob::GlobError>> = entries
        .filter(|entry| entry.as_ref().map_or(true, |path| path.is_file()))
        .collect();
    inputs.sort_by(|a, b| entry_path(a).cmp(entry_path(b)));
    Ok(inputs)
}

fn entry_path(entry: &Result<PathBuf, glob::GlobError>) -> &Path {
    match entry {
        Ok(path) => path.as_path(),
        Err(err) => err.path(),
    }
}

/// Normalizes and publishes each input independently. A failing file is
/// recorded in its report and never stops the loop.
pub fn process_inputs(
    inputs: Vec<Result<PathBuf, glob::GlobError>>,
    axis: &TimeAxis,
    options: &NormalizeOptions,
    stager: &OutputStager,
    output_suffix: &str,
) -> BatchSummary {
    let mut reports = Vec::with_capacity(inputs.len());
    let mut seen_hashes: HashMap<String, PathBuf> = HashMap::new();
    let mut written: HashMap<DeviceId, PathBuf> = HashMap::new();

    for entry in inputs {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                let path = err.path().to_path_buf();
                let err = FileError::from(err);
                warn!(path = %path.display(), error = %err, "skipping file");
                reports.push(FileReport::failed(path, None, &err));
                continue;
            }
        };

        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(source) => {
                let err = FileError::Read(source);
                warn!(path = %path.display(), error = %err, "skipping file");
                reports.push(FileReport::failed(path, None, &err));
                continue;
            }
        };

        let hash = compute_hash(&contents);
        if let Some(previous) = seen_hashes.get(&hash) {
            warn!(
                path = %path.display(),
                previous = %previous.display(),
                "identical content already processed"
            );
            reports.push(FileReport {
                path,
                hash: Some(hash),
                status: FileStatus::Duplicate,
                device_id: None,
                output_path: None,
                error: None,
            });
            continue;
        }
        seen_hashes.insert(hash.clone(), path.clone());

        match process_file(&path, &contents, axis, options, stager, output_suffix, &written) {
            Ok((device_id, output_path)) => {
                info!(
                    path = %path.display(),
                    device_id = %device_id,
                    output = %output_path.display(),
                    "wrote gap-filled file"
                );
                written.insert(device_id.clone(), path.clone());
                reports.push(FileReport {
                    path,
                    hash: Some(hash),
                    status: FileStatus::Written,
                    device_id: Some(device_id),
                    output_path: Some(output_path),
                    error: None,
                });
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file");
                reports.push(FileReport::failed(path, Some(hash), &err));
            }
        }
    }

    BatchSummary { reports }
}

fn process_file(
    path: &Path,
    contents: &[u8],
    axis: &TimeAxis,
    options: &NormalizeOptions,
    stager: &OutputStager,
    output_suffix: &str,
    written: &HashMap<DeviceId, PathBuf>,
) -> Result<(DeviceId, PathBuf), FileError> {
    let content = std::str::from_utf8(contents)?;
    let table = normalize(content, axis, options)?;

    for line in &table.duplicate_lines {
        warn!(
            path = %path.display(),
            line = *line,
            "dropped row repeating an earlier timestamp"
        );
    }

    if let Some(previous) = written.get(&table.device_id) {
        return Err(FileError::DeviceCollision {
            device_id: table.device_id.clone(),
            previous: previous.clone(),
        });
    }

    let file_name = format!("{}{}", table.device_id, output_suffix);
    let output_path = stager.commit(&file_name, &table)?;
    Ok((table.device_id, output_path))
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    let hash = hasher.finalize();
    hash.to_hex().to_string()
}
