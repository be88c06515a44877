use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use super::IssueSource;
use crate::config::{AuthConfig, TrackerConfig};
use crate::error::FetchError;
use crate::model::raw::RawResponse;

pub struct JiraSource {
    base_url: String,
    endpoint: String,
    fields: String,
    page_size: u32,
    auth: Option<(&'static str, String)>,
    timeout: Duration,
    settle_before: Duration,
    settle_after: Duration,
    client: reqwest::Client,
}

impl JiraSource {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoint: config.endpoint.clone(),
            fields: format!(
                "key,summary,status,assignee,created,{}",
                config.improvement_field
            ),
            page_size: config.page_size,
            auth: config.auth.as_ref().map(auth_header),
            timeout: config.timeout(),
            settle_before: config.settle_before(),
            settle_after: config.settle_after(),
            client,
        })
    }

    fn search_url(&self, project: &str, start_at: u64) -> String {
        let jql = format!("project={project} ORDER BY created DESC");
        format!(
            "{}{}?jql={}&fields={}&maxResults={}&startAt={}",
            self.base_url,
            self.endpoint,
            urlencoding::encode(&jql),
            urlencoding::encode(&self.fields),
            self.page_size,
            start_at
        )
    }
}

fn auth_header(auth: &AuthConfig) -> (&'static str, String) {
    match auth {
        AuthConfig::Bearer { token } => ("Authorization", format!("Bearer {token}")),
        AuthConfig::Basic { username, password } => {
            let creds = format!("{username}:{password}");
            let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
            ("Authorization", format!("Basic {encoded}"))
        }
        AuthConfig::Cookie { value } => ("Cookie", value.clone()),
    }
}

#[async_trait]
impl IssueSource for JiraSource {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn fetch_page(&self, project: &str, start_at: u64) -> Result<RawResponse, FetchError> {
        tokio::time::sleep(self.settle_before).await;

        let url = self.search_url(project, start_at);
        debug!(project, start_at, "requesting issue page");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json");
        if let Some((name, value)) = &self.auth {
            request = request.header(*name, value);
        }

        let classify = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.clone(),
                    secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::Http {
                    url: url.clone(),
                    source,
                }
            }
        };

        let resp = request.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }
        let body = resp.bytes().await.map_err(classify)?;
        let page: RawResponse =
            serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                url: url.clone(),
                source,
            })?;

        tokio::time::sleep(self.settle_after).await;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn source(config: &TrackerConfig) -> JiraSource {
        JiraSource::new(config).unwrap()
    }

    /// Serve one connection with `response`, or hold it open without
    /// answering when `response` is `None`.
    async fn tracker(response: Option<&'static str>) -> JiraSource {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            match response {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
        });

        source(&TrackerConfig {
            base_url: format!("http://{addr}"),
            endpoint: "/rest/api/2/search".into(),
            timeout_secs: 1,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn silent_tracker_times_out() {
        let jira = tracker(None).await;
        let err = jira.fetch_page("SUMMIT", 0).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { secs: 1, .. }), "{err}");
    }

    #[tokio::test]
    async fn unauthorized_is_a_status_error() {
        let jira = tracker(Some(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        let err = jira.fetch_page("SUMMIT", 0).await.unwrap_err();
        assert!(
            matches!(err, FetchError::Status { status, .. } if status == reqwest::StatusCode::UNAUTHORIZED),
            "{err}"
        );
    }

    #[tokio::test]
    async fn login_page_is_a_decode_error() {
        let jira = tracker(Some(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 26\r\n\
             Connection: close\r\n\r\n<html>Please log in</html>",
        ))
        .await;
        let err = jira.fetch_page("SUMMIT", 0).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn search_result_is_decoded() {
        let jira = tracker(Some(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 65\r\n\
             Connection: close\r\n\r\n\
             {\"total\":1,\"startAt\":0,\"issues\":[{\"key\":\"SUMMIT-1\",\"fields\":{}}]}",
        ))
        .await;
        let page = jira.fetch_page("SUMMIT", 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.issues.len(), 1);
        assert_eq!(page.issues[0]["key"], "SUMMIT-1");
    }

    #[test]
    fn search_url_encodes_query() {
        let config = TrackerConfig {
            base_url: "https://tracker.example/".into(),
            endpoint: "/rest/api/2/search".into(),
            ..Default::default()
        };
        let url = source(&config).search_url("SUMMIT", 100);
        assert_eq!(
            url,
            "https://tracker.example/rest/api/2/search\
             ?jql=project%3DSUMMIT%20ORDER%20BY%20created%20DESC\
             &fields=key%2Csummary%2Cstatus%2Cassignee%2Ccreated%2Ccustomfield_35600\
             &maxResults=50&startAt=100"
        );
    }

    #[test]
    fn projection_follows_configured_field() {
        let config = TrackerConfig {
            improvement_field: "customfield_1".into(),
            page_size: 10,
            ..Default::default()
        };
        let url = source(&config).search_url("MBP", 0);
        assert!(url.contains("created%2Ccustomfield_1&"));
        assert!(url.ends_with("&maxResults=10&startAt=0"));
    }

    #[test]
    fn basic_auth_is_base64() {
        let (name, value) = auth_header(&AuthConfig::Basic {
            username: "user".into(),
            password: "pass".into(),
        });
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn cookie_auth_is_passed_through() {
        let (name, value) = auth_header(&AuthConfig::Cookie {
            value: "JSESSIONID=abc".into(),
        });
        assert_eq!(name, "Cookie");
        assert_eq!(value, "JSESSIONID=abc");
    }
}
