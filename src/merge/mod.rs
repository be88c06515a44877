//! Merge the collected store with sibling spreadsheet exports.
//!
//! Two output shapes exist. Narrow mode keeps one shared column per row plus
//! the source label. Full mode maps each input onto the eight canonical
//! columns through a named column-mapping table.

pub mod mapping;

use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{info, warn};

use crate::error::MergeError;
use crate::model::issue::{IssueRecord, CANONICAL_HEADER};
use mapping::MappingTables;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeMode {
    /// Keep `column` (matched case-insensitively) and tag it with the source.
    Narrow { column: String },
    /// Map every input onto the canonical columns.
    Full,
}

#[derive(Debug, Clone)]
pub struct MergeInput {
    pub path: PathBuf,
    pub label: String,
    /// Column-mapping table used in full mode. When unset, the table whose
    /// columns all appear in the file's header is used.
    pub mapping: Option<String>,
}

impl MergeInput {
    /// Input labelled with its file stem, e.g. `jira_issues` for
    /// `jira_issues.csv`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            label,
            mapping: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn mapping(mut self, mapping: impl Into<String>) -> Self {
        self.mapping = Some(mapping.into());
        self
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Rows read per input label, in input order.
    pub counts: Vec<(String, usize)>,
    pub total: usize,
}

/// Merge `inputs` into `output`, first input's rows first.
///
/// Every input must exist before anything is read; nothing is written unless
/// all inputs parse.
pub fn merge(
    inputs: &[MergeInput],
    output: &Path,
    mode: &MergeMode,
    tables: &MappingTables,
) -> Result<MergeReport, MergeError> {
    if let Some(missing) = inputs.iter().find(|i| !i.path.exists()) {
        return Err(MergeError::InputMissing(missing.path.clone()));
    }

    let mut report = MergeReport::default();
    match mode {
        MergeMode::Narrow { column } => {
            let mut rows = Vec::new();
            for input in inputs {
                info!("Reading {}...", input.path.display());
                let values = read_column(input, column)?;
                report.counts.push((input.label.clone(), values.len()));
                rows.extend(values.into_iter().map(|v| [v, input.label.clone()]));
            }
            let header = column.to_lowercase();
            write_rows(output, [header.as_str(), "source"], &rows)?;
        }
        MergeMode::Full => {
            let mut rows = Vec::new();
            for input in inputs {
                info!("Reading {}...", input.path.display());
                let records = read_mapped(input, tables)?;
                report.counts.push((input.label.clone(), records.len()));
                rows.extend(records);
            }
            write_records(output, &rows)?;
        }
    }

    for (label, count) in &report.counts {
        info!("  Found {count} rows from {label}");
    }
    report.total = report.counts.iter().map(|(_, n)| n).sum();
    info!("Merged {} rows into {}", report.total, output.display());
    Ok(report)
}

fn read_column(input: &MergeInput, column: &str) -> Result<Vec<String>, MergeError> {
    let parse_err = |source| MergeError::Parse {
        path: input.path.clone(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&input.path)
        .map_err(parse_err)?;

    let wanted = column.to_lowercase();
    let index = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').to_lowercase() == wanted);
    if index.is_none() {
        warn!(input = %input.label, column, "column not found, values will be empty");
    }

    let mut values = Vec::new();
    for result in reader.records() {
        let row = result.map_err(parse_err)?;
        let value = index.and_then(|i| row.get(i)).unwrap_or_default();
        values.push(value.to_string());
    }
    Ok(values)
}

fn read_mapped(input: &MergeInput, tables: &MappingTables) -> Result<Vec<IssueRecord>, MergeError> {
    let parse_err = |source| MergeError::Parse {
        path: input.path.clone(),
        source,
    };
    let mut reader = csv::Reader::from_path(&input.path).map_err(parse_err)?;
    let headers: StringRecord = reader.headers().map_err(parse_err)?.clone();

    let mapping = match &input.mapping {
        Some(name) => tables.get(name)?,
        None => {
            let found = tables
                .detect(&headers)
                .ok_or_else(|| MergeError::NoMapping(input.path.clone()))?;
            info!(input = %input.label, mapping = %found.name, "column mapping detected");
            found
        }
    };

    let bound = mapping.bind(&headers);
    let missing = bound.missing();
    if !missing.is_empty() {
        warn!(
            input = %input.label,
            mapping = %mapping.name,
            ?missing,
            "columns not present, filled with empty strings"
        );
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(parse_err)?;
        records.push(bound.apply(&input.label, &row));
    }
    Ok(records)
}

fn write_rows(output: &Path, header: [&str; 2], rows: &[[String; 2]]) -> Result<(), MergeError> {
    let mut writer = open_output(output)?;
    writer
        .write_record(header)
        .map_err(|e| csv_write_err(output, e))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| csv_write_err(output, e))?;
    }
    writer.flush().map_err(|source| MergeError::Io {
        path: output.to_path_buf(),
        source,
    })
}

fn write_records(output: &Path, rows: &[IssueRecord]) -> Result<(), MergeError> {
    let mut writer = open_output(output)?;
    // Written explicitly so an empty merge still carries the header.
    writer
        .write_record(CANONICAL_HEADER)
        .map_err(|e| csv_write_err(output, e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| csv_write_err(output, e))?;
    }
    writer.flush().map_err(|source| MergeError::Io {
        path: output.to_path_buf(),
        source,
    })
}

fn open_output(output: &Path) -> Result<csv::Writer<std::fs::File>, MergeError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| MergeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = std::fs::File::create(output).map_err(|source| MergeError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file))
}

fn csv_write_err(output: &Path, err: csv::Error) -> MergeError {
    MergeError::Io {
        path: output.to_path_buf(),
        source: err.into(),
    }
}
