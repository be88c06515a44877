//! Error types for each pipeline stage.
//!
//! Errors local to one unit of work (one issue entry, one project) are
//! logged and recovered by the caller. Merge errors end the merge run.

use std::path::PathBuf;

use thiserror::Error;

/// Retrieval of one page of issues failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("tracker answered {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("no response from {url} within {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("response from {url} is not a search result: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A single issue entry could not be read.
#[derive(Error, Debug)]
#[error("issue #{index} ({key}): {reason}")]
pub struct ExtractionError {
    pub index: usize,
    pub key: String,
    pub reason: String,
}

/// Writing the collected store failed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("{} not found", .0.display())]
    InputMissing(PathBuf),

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unknown column mapping `{0}`")]
    UnknownMapping(String),

    #[error("no column mapping matches the header of {}; name one explicitly", .0.display())]
    NoMapping(PathBuf),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("cannot prepare {}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read remote {name}: {source}")]
    Remote {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
