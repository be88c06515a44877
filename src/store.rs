use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StoreMode;
use crate::error::PersistenceError;
use crate::model::issue::{IssueRecord, STORE_HEADER};

/// CSV file that accumulates collected issues across runs.
///
/// In [`StoreMode::Append`] rows are never deduplicated: collecting the same
/// project twice stores its issues twice. [`StoreMode::Upsert`] keys rows by
/// `(Project, Key)` instead.
pub struct CanonicalStore {
    path: PathBuf,
    mode: StoreMode,
}

impl CanonicalStore {
    pub fn new(path: impl Into<PathBuf>, mode: StoreMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `records` according to the store mode. Returns the number of
    /// rows written or replaced.
    pub fn write(&self, records: &[IssueRecord]) -> Result<usize, PersistenceError> {
        match self.mode {
            StoreMode::Append => self.append(records),
            StoreMode::Upsert => self.upsert(records),
        }
    }

    /// Create the file with a header if it is missing, then add `records`.
    pub fn append(&self, records: &[IssueRecord]) -> Result<usize, PersistenceError> {
        let fresh = !self.path.exists();
        if fresh {
            self.create_parent()?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let mut writer = csv::Writer::from_writer(file);

        if fresh {
            writer
                .write_record(STORE_HEADER)
                .map_err(|e| self.csv_err(e))?;
        }
        for record in records {
            writer
                .write_record(record.store_row())
                .map_err(|e| self.csv_err(e))?;
        }
        writer.flush().map_err(|e| self.io_err(e))?;

        debug!(path = %self.path.display(), rows = records.len(), fresh, "appended rows");
        Ok(records.len())
    }

    /// Replace rows that share `(Project, Key)` with an incoming record and
    /// append the rest. The file is rewritten through a temporary sibling.
    pub fn upsert(&self, records: &[IssueRecord]) -> Result<usize, PersistenceError> {
        let mut rows = if self.path.exists() {
            self.read_all()?
        } else {
            self.create_parent()?;
            Vec::new()
        };

        let mut index: HashMap<(String, String), usize> = rows
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.source.clone(), r.task_id.clone()), i))
            .collect();

        for record in records {
            let key = (record.source.clone(), record.task_id.clone());
            match index.get(&key) {
                Some(&i) => rows[i] = record.clone(),
                None => {
                    index.insert(key, rows.len());
                    rows.push(record.clone());
                }
            }
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp).map_err(|e| self.csv_err(e))?;
            writer
                .write_record(STORE_HEADER)
                .map_err(|e| self.csv_err(e))?;
            for row in &rows {
                writer
                    .write_record(row.store_row())
                    .map_err(|e| self.csv_err(e))?;
            }
            writer.flush().map_err(|e| self.io_err(e))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        debug!(path = %self.path.display(), total = rows.len(), "upserted rows");
        Ok(records.len())
    }

    /// Read every stored row back.
    pub fn read_all(&self) -> Result<Vec<IssueRecord>, PersistenceError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_err(e))?;
        let mut rows = Vec::new();
        for result in reader.records() {
            let row = result.map_err(|e| self.csv_err(e))?;
            if let Some(record) = IssueRecord::from_store_row(&row) {
                rows.push(record);
            }
        }
        Ok(rows)
    }

    fn create_parent(&self) -> Result<(), PersistenceError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))
            }
            _ => Ok(()),
        }
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> PersistenceError {
        PersistenceError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}
