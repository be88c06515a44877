use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extract::DEFAULT_IMPROVEMENT_FIELD;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub store: StoreConfig,
    pub merge: MergeConfig,
    pub mirror: Option<MirrorConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub base_url: String,
    pub endpoint: String,
    pub projects: Vec<String>,
    pub page_size: u32,
    pub improvement_field: String,
    /// Follow `startAt` until the query is exhausted. When false only the
    /// first page of each project is read.
    pub paginate: bool,
    pub timeout_secs: u64,
    pub settle_before_ms: u64,
    pub settle_after_ms: u64,
    pub auth: Option<AuthConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jira.seagate.com".into(),
            endpoint: "/jira/rest/api/2/search".into(),
            projects: ["SUMMIT", "MARLINCT", "MBP", "DORADO"]
                .into_iter()
                .map(String::from)
                .collect(),
            page_size: 50,
            improvement_field: DEFAULT_IMPROVEMENT_FIELD.into(),
            paginate: true,
            timeout_secs: 30,
            settle_before_ms: 0,
            settle_after_ms: 0,
            auth: None,
        }
    }
}

impl TrackerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle_before(&self) -> Duration {
        Duration::from_millis(self.settle_before_ms)
    }

    pub fn settle_after(&self) -> Duration {
        Duration::from_millis(self.settle_after_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthConfig {
    Bearer { token: String },
    Basic { username: String, password: String },
    /// Raw `Cookie` header copied from an existing session.
    Cookie { value: String },
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Blind append, rows accumulate across runs.
    #[default]
    Append,
    /// Replace rows with the same `(Project, Key)`.
    Upsert,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub mode: StoreMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("jira_issues.csv"),
            mode: StoreMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeModeName {
    #[default]
    Narrow,
    Full,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub output: PathBuf,
    pub mode: MergeModeName,
    /// Column kept by narrow mode, matched case-insensitively.
    pub column: String,
    pub inputs: Vec<MergeInputConfig>,
    /// Sibling worksheet export merged with the store when no inputs are
    /// configured.
    pub worksheet: PathBuf,
    /// Extra column-mapping tables for full mode, keyed by name.
    pub mappings: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            output: data_dir().join("merged_issues.csv"),
            mode: MergeModeName::default(),
            column: "summary".into(),
            inputs: Vec::new(),
            worksheet: data_dir().join("WW2619.csv"),
            mappings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeInputConfig {
    pub path: PathBuf,
    pub label: Option<String>,
    /// Name of the column-mapping table used in full mode.
    pub mapping: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MirrorConfig {
    pub remote_dir: PathBuf,
    pub local_dir: PathBuf,
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".harvest")
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}
