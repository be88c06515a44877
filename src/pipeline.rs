use futures::TryStreamExt;
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::extract::extract;
use crate::model::issue::IssueRecord;
use crate::providers::{pages, IssueSource};
use crate::store::CanonicalStore;

pub struct CollectOptions {
    pub projects: Vec<String>,
    pub paginate: bool,
    pub improvement_field: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProjectOutcome {
    Stored {
        written: usize,
        skipped: usize,
        total: u64,
    },
    FetchFailed(String),
    StoreFailed(String),
}

#[derive(Debug)]
pub struct ProjectReport {
    pub project: String,
    pub outcome: ProjectOutcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub projects: Vec<ProjectReport>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.projects
            .iter()
            .map(|p| match p.outcome {
                ProjectOutcome::Stored { written, .. } => written,
                _ => 0,
            })
            .sum()
    }

    /// True when at least one project was attempted and none reached the
    /// store, whether its fetch or its write failed.
    pub fn nothing_stored(&self) -> bool {
        !self.projects.is_empty()
            && !self
                .projects
                .iter()
                .any(|p| matches!(p.outcome, ProjectOutcome::Stored { .. }))
    }
}

struct Fetched {
    records: Vec<IssueRecord>,
    skipped: usize,
    total: u64,
}

/// Fetch, extract and store every project in order.
///
/// A project whose fetch fails is skipped and nothing of it is stored. A
/// failed write is reported for that project only; later projects still run.
pub async fn collect(
    source: &dyn IssueSource,
    store: &CanonicalStore,
    options: &CollectOptions,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for project in &options.projects {
        info!(source = source.name(), "Processing project: {project}");

        let outcome = match fetch_project(source, project, options).await {
            Err(e) => {
                error!(project = %project, error = %e, "fetch failed, skipping project");
                ProjectOutcome::FetchFailed(e.to_string())
            }
            Ok(fetched) => match store.write(&fetched.records) {
                Ok(written) => {
                    info!(
                        "Data for {project} saved to {} ({written} rows)",
                        store.path().display()
                    );
                    ProjectOutcome::Stored {
                        written,
                        skipped: fetched.skipped,
                        total: fetched.total,
                    }
                }
                Err(e) => {
                    error!(project = %project, error = %e, "could not store issues");
                    ProjectOutcome::StoreFailed(e.to_string())
                }
            },
        };

        summary.projects.push(ProjectReport {
            project: project.clone(),
            outcome,
        });
    }

    summary
}

async fn fetch_project(
    source: &dyn IssueSource,
    project: &str,
    options: &CollectOptions,
) -> Result<Fetched, FetchError> {
    let mut fetched = Fetched {
        records: Vec::new(),
        skipped: 0,
        total: 0,
    };

    let mut stream = pages(source, project, options.paginate);
    while let Some(page) = stream.try_next().await? {
        debug!(project, start_at = page.start_at, issues = page.issues.len(), "page received");
        let extraction = extract(&page, project, &options.improvement_field);
        fetched.total = extraction.total;
        fetched.skipped += extraction.errors.len();
        fetched.records.extend(extraction.records);
    }
    info!("Total issues for {project}: {}", fetched.total);

    let seen = (fetched.records.len() + fetched.skipped) as u64;
    if !options.paginate && fetched.total > seen {
        warn!(
            project,
            total = fetched.total,
            fetched = seen,
            "only the first page was read; enable pagination to collect the rest"
        );
    }

    Ok(fetched)
}
