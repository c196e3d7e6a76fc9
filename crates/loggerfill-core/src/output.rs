use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::normalizer::NormalizedTable;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to write '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to move '{from}' to '{to}': {source}")]
    Publish {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Empties `path` by deleting and recreating it. Safe to call repeatedly.
pub fn prepare_directory(path: &Path) -> io::Result<()> {
    if path.exists() {
        info!(path = %path.display(), "resetting directory");
        fs::remove_dir_all(path)?;
    } else {
        info!(path = %path.display(), "creating directory");
    }
    fs::create_dir_all(path)
}

/// Serializes a normalized table as comma-delimited text.
pub fn write_table<W: io::Write>(writer: W, table: &NormalizedTable) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes finished tables into a scratch directory and then moves them into
/// the output directory, so the output directory only ever holds complete
/// files.
#[derive(Debug, Clone)]
pub struct OutputStager {
    intermediate_dir: PathBuf,
    output_dir: PathBuf,
}

impl OutputStager {
    pub fn new(intermediate_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            intermediate_dir: intermediate_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn commit(&self, file_name: &str, table: &NormalizedTable) -> Result<PathBuf, StageError> {
        let staged = self.intermediate_dir.join(file_name);
        let target = self.output_dir.join(file_name);

        let file = fs::File::create(&staged).map_err(|err| StageError::Csv {
            path: staged.clone(),
            source: err.into(),
        })?;
        write_table(io::BufWriter::new(file), table).map_err(|source| StageError::Csv {
            path: staged.clone(),
            source,
        })?;
        debug!(path = %staged.display(), rows = table.rows.len(), "staged output");

        publish(&staged, &target).map_err(|source| StageError::Publish {
            from: staged.clone(),
            to: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

fn publish(staged: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(staged, target).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(staged, target)?;
    fs::remove_file(staged)
}
