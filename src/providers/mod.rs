pub mod jira;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::config::TrackerConfig;
use crate::error::FetchError;
use crate::model::raw::RawResponse;

/// Anything that can answer "all issues of one project, newest first" one
/// page at a time.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_page(&self, project: &str, start_at: u64) -> Result<RawResponse, FetchError>;
}

/// Lazily walk every page of a project's issues.
///
/// The stream ends once `startAt` reaches the reported total or a page comes
/// back empty. With `paginate` off it yields only the first page. Calling it
/// again starts over from offset zero.
pub fn pages<'a>(
    source: &'a dyn IssueSource,
    project: &'a str,
    paginate: bool,
) -> BoxStream<'a, Result<RawResponse, FetchError>> {
    stream::try_unfold(Some(0u64), move |next| async move {
        let Some(start_at) = next else {
            return Ok::<_, FetchError>(None);
        };
        let page = source.fetch_page(project, start_at).await?;
        let end = start_at + page.issues.len() as u64;
        let next = (paginate && end > start_at && end < page.total).then_some(end);
        Ok::<_, FetchError>(Some((page, next)))
    })
    .boxed()
}

pub fn create_source(config: &TrackerConfig) -> anyhow::Result<Box<dyn IssueSource>> {
    Ok(Box::new(jira::JiraSource::new(config)?))
}
