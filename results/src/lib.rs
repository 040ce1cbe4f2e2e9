use std::{
    collections::HashMap,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use csv::Writer;
use thiserror::Error;

pub type ResultWriter = Writer<BufWriter<File>>;

#[derive(Debug, Error)]
pub enum ResultErrors {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("result '{0}' already exists, pick a different name")]
    NameTaken(String),
    #[error("no writer with id {0}")]
    WriterNotFound(u32),
}

/// Owns one csv writer per recorded component of a run.
pub struct ResultManager {
    writers: HashMap<u32, ResultWriter>,
    pub result_path: PathBuf,
    next_id: u32,
}

impl ResultManager {
    pub fn new(result_path: PathBuf) -> Self {
        Self {
            writers: HashMap::new(),
            result_path,
            next_id: 0,
        }
    }

    /// Creates `<path>/<name>.csv` and writes the header row.
    pub fn new_writer(
        &mut self,
        name: &str,
        path: &Path,
        headers: &[&str],
    ) -> Result<u32, ResultErrors> {
        std::fs::create_dir_all(path)?;

        let filename = name.to_string() + ".csv";
        let file = File::create(path.join(filename))?;
        let mut writer = Writer::from_writer(BufWriter::new(file));
        writer.write_record(headers)?;

        let id = self.next_id;
        self.writers.insert(id, writer);
        self.next_id += 1;
        Ok(id)
    }

    pub fn write_record(&mut self, id: u32, content: &[String]) -> Result<(), ResultErrors> {
        let writer = self
            .writers
            .get_mut(&id)
            .ok_or(ResultErrors::WriterNotFound(id))?;
        writer.write_record(content)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ResultErrors> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for ResultManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("failed to flush results in {}: {e}", self.result_path.display());
        }
    }
}

/// Implemented by anything that records a row per simulation step.
pub trait RecordResult {
    /// Creates the writers for this component.
    fn new_result(&mut self, results: &mut ResultManager) -> Result<(), ResultErrors>;
    /// Writes the next entry in the result files.
    fn write_result(&self, results: &mut ResultManager) -> Result<(), ResultErrors>;
}

/// Picks the folder for a new run under `root`. An empty `name` auto-numbers
/// the run as `run<N>` after the highest existing one; a named run must not
/// already exist.
pub fn run_path(root: &Path, name: &str) -> Result<PathBuf, ResultErrors> {
    std::fs::create_dir_all(root)?;

    let mut taken = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if !name.is_empty() && file_name == name {
                return Err(ResultErrors::NameTaken(name.to_string()));
            }
            if let Some(n) = file_name
                .strip_prefix("run")
                .and_then(|token| token.parse::<u64>().ok())
            {
                taken.push(n);
            }
        }
    }

    let name = if name.is_empty() {
        let next = taken.iter().max().map_or(0, |n| n + 1);
        format!("run{next}")
    } else {
        name.to_string()
    };
    Ok(root.join(name))
}
