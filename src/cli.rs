use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use crate::config::{AppConfig, MergeModeName, StoreMode};
use crate::error::MergeError;
use crate::merge::mapping::{MappingTables, TRACKER, WORKSHEET};
use crate::merge::{self, MergeInput, MergeMode};
use crate::mirror::{self, MirrorOutcome, MountedDirectory};
use crate::pipeline::{self, CollectOptions, ProjectOutcome};
use crate::providers;
use crate::store::CanonicalStore;

#[derive(Debug, Default)]
pub struct CollectArgs {
    pub projects: Vec<String>,
    pub store: Option<PathBuf>,
    pub upsert: bool,
    pub single_page: bool,
}

#[derive(Debug, Default)]
pub struct MergeArgs {
    pub mode: Option<MergeModeName>,
    pub inputs: Vec<String>,
    pub output: Option<PathBuf>,
    pub column: Option<String>,
}

/// Fetch every configured project into the store.
pub async fn handle_collect(config: &AppConfig, args: CollectArgs) -> Result<ExitCode> {
    let tracker = &config.tracker;
    let projects = if args.projects.is_empty() {
        tracker.projects.clone()
    } else {
        args.projects
    };
    if projects.is_empty() {
        bail!("No projects configured. Add `projects` under [tracker] or pass --project");
    }

    let mode = if args.upsert {
        StoreMode::Upsert
    } else {
        config.store.mode
    };
    let store = CanonicalStore::new(args.store.unwrap_or_else(|| config.store.path.clone()), mode);
    let source = providers::create_source(tracker)?;

    info!("Accessing {} ({} projects)", tracker.base_url, projects.len());
    let options = CollectOptions {
        projects,
        paginate: tracker.paginate && !args.single_page,
        improvement_field: tracker.improvement_field.clone(),
    };
    let summary = pipeline::collect(source.as_ref(), &store, &options).await;
    for report in &summary.projects {
        match &report.outcome {
            ProjectOutcome::Stored {
                written,
                skipped,
                total,
            } => println!(
                "{}: {written} stored, {skipped} skipped, {total} reported",
                report.project
            ),
            ProjectOutcome::FetchFailed(e) => println!("{}: fetch failed: {e}", report.project),
            ProjectOutcome::StoreFailed(e) => println!("{}: store failed: {e}", report.project),
        }
    }
    info!(
        "Collection completed: {} rows written to {}",
        summary.written(),
        store.path().display()
    );

    if summary.nothing_stored() {
        error!("No project could be fetched and stored");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Merge the store and sibling exports into one table.
pub fn handle_merge(config: &AppConfig, args: MergeArgs) -> Result<ExitCode> {
    let merge_config = &config.merge;

    let inputs: Vec<MergeInput> = if !args.inputs.is_empty() {
        args.inputs
            .iter()
            .map(|s| parse_input_spec(s))
            .collect::<Result<_>>()?
    } else if !merge_config.inputs.is_empty() {
        merge_config
            .inputs
            .iter()
            .map(|i| {
                let mut input = MergeInput::new(&i.path);
                if let Some(label) = &i.label {
                    input = input.label(label);
                }
                if let Some(mapping) = &i.mapping {
                    input = input.mapping(mapping);
                }
                input
            })
            .collect()
    } else {
        default_inputs(config)
    };

    let mode = match args.mode.unwrap_or(merge_config.mode) {
        MergeModeName::Narrow => MergeMode::Narrow {
            column: args.column.unwrap_or_else(|| merge_config.column.clone()),
        },
        MergeModeName::Full => MergeMode::Full,
    };
    let output = args.output.unwrap_or_else(|| merge_config.output.clone());
    let tables = MappingTables::with_extra(&merge_config.mappings);

    match merge::merge(&inputs, &output, &mode, &tables) {
        Ok(report) => {
            let parts: Vec<String> = report
                .counts
                .iter()
                .map(|(label, n)| format!("{n} from {label}"))
                .collect();
            println!(
                "Successfully merged {} rows ({})",
                report.total,
                parts.join(", ")
            );
            println!("Output saved to: {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(MergeError::InputMissing(path)) => {
            error!("Error: {} not found!", path.display());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("Error during merge"),
    }
}

/// The collected store followed by the sibling worksheet export.
fn default_inputs(config: &AppConfig) -> Vec<MergeInput> {
    vec![
        MergeInput::new(&config.store.path).mapping(TRACKER),
        MergeInput::new(&config.merge.worksheet).mapping(WORKSHEET),
    ]
}

/// Mirror the configured remote directory once.
pub fn handle_mirror(config: &AppConfig) -> Result<ExitCode> {
    let Some(cfg) = &config.mirror else {
        bail!("No [mirror] section in config");
    };
    let remote = MountedDirectory::new(&cfg.remote_dir);
    match mirror::mirror_once(&remote, &cfg.local_dir).context("Mirror failed")? {
        MirrorOutcome::Skipped => println!("{} already populated", cfg.local_dir.display()),
        MirrorOutcome::Downloaded(names) => println!(
            "Downloaded {} files into {}",
            names.len(),
            cfg.local_dir.display()
        ),
    }
    Ok(ExitCode::SUCCESS)
}

/// Mirror (best effort) then collect.
pub async fn handle_run(config: &AppConfig) -> Result<ExitCode> {
    info!("[1/2] Mirroring configuration files...");
    if config.mirror.is_none() {
        info!("No [mirror] section in config, skipping");
    } else if let Err(e) = handle_mirror(config) {
        error!("Error during mirror: {e:#}");
    }

    info!("[2/2] Collecting tracker issues...");
    handle_collect(config, CollectArgs::default()).await
}

/// Parse a merge input given as `PATH[=LABEL[:MAPPING]]`.
///
/// Examples:
///   jira_issues.csv
///   jira_issues.csv=jira_issues:tracker
///   exports/WW2619.csv=:worksheet
pub fn parse_input_spec(spec: &str) -> Result<MergeInput> {
    let (path, rest) = match spec.split_once('=') {
        Some((path, rest)) => (path, Some(rest)),
        None => (spec, None),
    };
    if path.trim().is_empty() {
        bail!("Merge input `{spec}` has no path");
    }

    let mut input = MergeInput::new(path);
    if let Some(rest) = rest {
        let (label, mapping) = match rest.split_once(':') {
            Some((label, mapping)) => (label, Some(mapping)),
            None => (rest, None),
        };
        if !label.is_empty() {
            input = input.label(label);
        }
        if let Some(mapping) = mapping {
            if mapping.is_empty() {
                bail!("Missing mapping name after `:` in `{spec}`");
            }
            input = input.mapping(mapping);
        }
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn parse_bare_path() {
        let input = parse_input_spec("data/jira_issues.csv").unwrap();
        assert_eq!(input.path, PathBuf::from("data/jira_issues.csv"));
        assert_eq!(input.label, "jira_issues");
        assert_eq!(input.mapping, None);
    }

    #[test]
    fn parse_label_and_mapping() {
        let input = parse_input_spec("export.csv=WW2619:worksheet").unwrap();
        assert_eq!(input.label, "WW2619");
        assert_eq!(input.mapping.as_deref(), Some("worksheet"));
    }

    #[test]
    fn parse_mapping_without_label_keeps_stem() {
        let input = parse_input_spec("WW2619.csv=:worksheet").unwrap();
        assert_eq!(input.label, "WW2619");
        assert_eq!(input.mapping.as_deref(), Some("worksheet"));
    }

    #[test]
    fn parse_label_only() {
        let input = parse_input_spec("a.csv=alpha").unwrap();
        assert_eq!(input.label, "alpha");
        assert_eq!(input.mapping, None);
    }

    #[test]
    fn parse_empty_path_fails() {
        let err = parse_input_spec("=label").unwrap_err();
        assert!(err.to_string().contains("no path"));
    }

    #[test]
    fn parse_empty_mapping_fails() {
        let err = parse_input_spec("a.csv=alpha:").unwrap_err();
        assert!(err.to_string().contains("Missing mapping"));
    }

    #[test]
    fn merge_with_missing_input_exits_non_zero() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.csv");
        let config = parse_config("").unwrap();
        let args = MergeArgs {
            inputs: vec![dir.path().join("absent.csv").display().to_string()],
            output: Some(output.clone()),
            ..Default::default()
        };

        let code = handle_merge(&config, args).unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert!(!output.exists());
    }

    #[test]
    fn default_merge_requires_worksheet_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("jira_issues.csv");
        std::fs::write(&store, "Project,Key,Summary\nSUMMIT,SUM-1,Fix\n").unwrap();
        let output = dir.path().join("merged.csv");
        let config = parse_config(&format!(
            r#"
            [store]
            path = "{}"

            [merge]
            worksheet = "{}"
            "#,
            store.display(),
            dir.path().join("WW2619.csv").display()
        ))
        .unwrap();
        let args = MergeArgs {
            output: Some(output.clone()),
            ..Default::default()
        };

        let code = handle_merge(&config, args).unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert!(!output.exists());
    }

    #[test]
    fn default_merge_reads_store_then_worksheet() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("jira_issues.csv");
        let ww = dir.path().join("WW2619.csv");
        std::fs::write(&store, "Project,Key,Summary\nSUMMIT,SUM-1,Fix\n").unwrap();
        std::fs::write(&ww, "program,summary\nWW,Calibrate\n").unwrap();
        let output = dir.path().join("merged.csv");
        let config = parse_config(&format!(
            "[store]\npath = \"{}\"\n[merge]\nworksheet = \"{}\"\n",
            store.display(),
            ww.display()
        ))
        .unwrap();
        let args = MergeArgs {
            output: Some(output.clone()),
            ..Default::default()
        };

        let code = handle_merge(&config, args).unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "summary,source\nFix,jira_issues\nCalibrate,WW2619\n"
        );
    }

    #[test]
    fn merge_uses_configured_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let jira = dir.path().join("jira_issues.csv");
        let ww = dir.path().join("WW2619.csv");
        std::fs::write(&jira, "Project,Key,Summary\nSUMMIT,SUM-1,Fix seek\n").unwrap();
        std::fs::write(&ww, "program,task_id,task_name\nWW,WW-9,Calibrate\n").unwrap();
        let output = dir.path().join("merged.csv");

        let config = parse_config(&format!(
            r#"
            [merge]
            mode = "full"
            output = "{}"

            [[merge.inputs]]
            path = "{}"
            mapping = "tracker"

            [[merge.inputs]]
            path = "{}"
            mapping = "worksheet"
            "#,
            output.display(),
            jira.display(),
            ww.display()
        ))
        .unwrap();

        let code = handle_merge(&config, MergeArgs::default()).unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        let merged = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("jira_issues,SUMMIT,SUM-1,"));
        assert!(lines[2].starts_with("WW2619,WW,WW-9,"));
    }
}
