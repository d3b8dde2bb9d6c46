//! Content sources: where page text comes from.
//!
//! Every source shares one fallback policy ([`fetch_with_fallback`]):
//! candidates are tried in order, and for each candidate the timeout ladder
//! is walked in order. The first success wins; if everything fails the last
//! underlying cause is reported.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{MonitorConfig, SourceKind};
use crate::utils::http_client::build_page_client;

/// Text fetched from one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub text: String,
    /// Endpoint that produced the text.
    pub endpoint: String,
    /// Attempts made, including the successful one.
    pub attempts: usize,
}

/// Every (candidate, timeout) pair failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch failed after {attempts} attempt(s): {last_cause}")]
pub struct FetchFailure {
    pub attempts: usize,
    pub last_cause: String,
}

impl FetchFailure {
    pub fn new(attempts: usize, last_cause: impl Into<String>) -> Self {
        Self {
            attempts,
            last_cause: last_cause.into(),
        }
    }
}

/// Capability to obtain raw page text.
#[async_trait]
pub trait ContentSource: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch text from the first candidate that answers within its timeout ladder.
    async fn fetch(
        &self,
        candidates: &[String],
        timeouts: &[Duration],
    ) -> Result<FetchedContent, FetchFailure>;
}

/// Walk the candidate x timeout ladder with a single-attempt function.
pub async fn fetch_with_fallback<F, Fut>(
    candidates: &[String],
    timeouts: &[Duration],
    mut attempt: F,
) -> Result<FetchedContent, FetchFailure>
where
    F: FnMut(String, Duration) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    if candidates.is_empty() || timeouts.is_empty() {
        return Err(FetchFailure::new(0, "no endpoints configured"));
    }

    let mut attempts = 0usize;
    let mut last_cause = String::new();

    for endpoint in candidates {
        for &timeout in timeouts {
            attempts += 1;
            match attempt(endpoint.clone(), timeout).await {
                Ok(text) => {
                    debug!(
                        endpoint = %endpoint,
                        attempt = attempts,
                        timeout_ms = timeout.as_millis() as u64,
                        "Fetch succeeded"
                    );
                    return Ok(FetchedContent {
                        text,
                        endpoint: endpoint.clone(),
                        attempts,
                    });
                }
                Err(cause) => {
                    debug!(
                        endpoint = %endpoint,
                        attempt = attempts,
                        timeout_ms = timeout.as_millis() as u64,
                        cause = %cause,
                        "Fetch attempt failed"
                    );
                    last_cause = format!("{endpoint}: {cause}");
                }
            }
        }
        warn!(endpoint = %endpoint, "All timeouts exhausted for endpoint");
    }

    Err(FetchFailure::new(attempts, last_cause))
}

/// Largest page body accepted from an HTTP endpoint.
pub const MAX_PAGE_BYTES: usize = 8 * 1024 * 1024;

/// Plain HTTP(S) source.
pub struct HttpContentSource {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpContentSource {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: build_page_client(user_agent),
            max_body_bytes: MAX_PAGE_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    async fn get_once(
        client: reqwest::Client,
        url: String,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<String, String> {
        let mut response = client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| describe_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        if let Some(length) = response.content_length()
            && length > max_body_bytes as u64
        {
            return Err(format!("body of {length} bytes exceeds {max_body_bytes} byte limit"));
        }

        // Content-Length may be absent or wrong, so the limit is enforced while reading too.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| describe_reqwest_error(&e))? {
            if body.len() + chunk.len() > max_body_bytes {
                return Err(format!("body exceeds {max_body_bytes} byte limit"));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn describe_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(
        &self,
        candidates: &[String],
        timeouts: &[Duration],
    ) -> Result<FetchedContent, FetchFailure> {
        fetch_with_fallback(candidates, timeouts, |url, timeout| {
            Self::get_once(self.client.clone(), url, timeout, self.max_body_bytes)
        })
        .await
    }
}

/// Reads candidates as local file paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileContentSource;

impl FileContentSource {
    async fn read_once(path: String, timeout: Duration) -> Result<String, String> {
        let path = PathBuf::from(path);
        match tokio::time::timeout(timeout, tokio::fs::read_to_string(&path)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(format!("cannot read {}: {}", path.display(), e)),
            Err(_) => Err("timed out".to_string()),
        }
    }
}

#[async_trait]
impl ContentSource for FileContentSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(
        &self,
        candidates: &[String],
        timeouts: &[Duration],
    ) -> Result<FetchedContent, FetchFailure> {
        fetch_with_fallback(candidates, timeouts, Self::read_once).await
    }
}

/// Build the source selected by configuration.
pub fn source_from_config(config: &MonitorConfig) -> Box<dyn ContentSource> {
    match config.source_kind {
        SourceKind::Http => Box::new(HttpContentSource::new(&config.user_agent)),
        SourceKind::File => Box::new(FileContentSource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    fn ladder() -> Vec<Duration> {
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    }

    #[tokio::test]
    async fn test_fallback_order_and_short_circuit() {
        let seen = Mutex::new(Vec::new());
        let candidates = vec!["primary".to_string(), "mirror".to_string()];

        let result = fetch_with_fallback(&candidates, &ladder(), |endpoint, timeout| {
            seen.lock().unwrap().push((endpoint.clone(), timeout));
            async move {
                if endpoint == "mirror" && timeout == Duration::from_millis(100) {
                    Ok("<p>ok</p>".to_string())
                } else {
                    Err("refused".to_string())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.endpoint, "mirror");
        assert_eq!(result.attempts, 3);
        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen,
            vec![
                ("primary".to_string(), Duration::from_millis(100)),
                ("primary".to_string(), Duration::from_millis(200)),
                ("mirror".to_string(), Duration::from_millis(100)),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_cause() {
        let candidates = vec!["a".to_string(), "b".to_string()];
        let mut n = 0;
        let failure = fetch_with_fallback(&candidates, &ladder(), |_, _| {
            n += 1;
            let cause = format!("cause {n}");
            async move { Err::<String, _>(cause) }
        })
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.last_cause, "b: cause 4");
    }

    #[tokio::test]
    async fn test_empty_candidates_is_a_failure() {
        let failure = fetch_with_fallback(&[], &ladder(), |_, _| async {
            Ok::<_, String>(String::new())
        })
        .await
        .unwrap_err();
        assert_eq!(failure.attempts, 0);

        let failure = FileContentSource
            .fetch(&["x".to_string()], &[])
            .await
            .unwrap_err();
        assert_eq!(failure.last_cause, "no endpoints configured");
    }

    #[tokio::test]
    async fn test_file_source_falls_back_to_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<button>Buy now</button>").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let candidates = vec!["/nonexistent/page.html".to_string(), path.clone()];
        let fetched = FileContentSource
            .fetch(&candidates, &[Duration::from_secs(1)])
            .await
            .unwrap();

        assert_eq!(fetched.endpoint, path);
        assert_eq!(fetched.text, "<button>Buy now</button>");
        assert_eq!(fetched.attempts, 2);
    }

    #[tokio::test]
    async fn test_http_source_reports_connection_failure() {
        // Port 9 (discard) on localhost is closed on CI machines.
        let source = HttpContentSource::new("stock-sentinel-test");
        let failure = source
            .fetch(
                &["http://127.0.0.1:9/".to_string()],
                &[Duration::from_millis(500)],
            )
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(failure.last_cause.starts_with("http://127.0.0.1:9/"));
    }

    /// Serve `/sized` with a Content-Length and `/streamed` without one.
    async fn serve_pages(body: &'static str) -> String {
        use axum::{Router, body::Body, routing::get};

        let app = Router::new()
            .route("/sized", get(move || async move { body }))
            .route(
                "/streamed",
                get(move || async move {
                    let chunks = body
                        .as_bytes()
                        .chunks(256)
                        .map(|c| Ok::<_, std::io::Error>(axum::body::Bytes::copy_from_slice(c)))
                        .collect::<Vec<_>>();
                    Body::from_stream(futures::stream::iter(chunks))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_source_caps_body_size() {
        static BIG: &str = concat!(
            "<p>", "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            "In stock</p>"
        );
        let base = serve_pages(BIG).await;
        let timeouts = [Duration::from_secs(2)];

        let small = HttpContentSource::new("stock-sentinel-test").with_max_body_bytes(128);
        for path in ["/sized", "/streamed"] {
            let failure = small
                .fetch(&[format!("{base}{path}")], &timeouts)
                .await
                .unwrap_err();
            assert!(failure.last_cause.contains("byte limit"), "{path}: {}", failure.last_cause);
        }

        let roomy = HttpContentSource::new("stock-sentinel-test").with_max_body_bytes(4096);
        for path in ["/sized", "/streamed"] {
            let fetched = roomy.fetch(&[format!("{base}{path}")], &timeouts).await.unwrap();
            assert_eq!(fetched.text, BIG);
        }
    }

    #[test]
    fn test_source_from_config() {
        let config = MonitorConfig {
            source_kind: SourceKind::File,
            ..Default::default()
        };
        assert_eq!(source_from_config(&config).name(), "file");
    }
}
