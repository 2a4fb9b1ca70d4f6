//! Stream availability probing
//!
//! A probe is a single HEAD request. The verdict comes from the response
//! headers alone; no body is transferred and redirects are not followed.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderName};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::{AppError, AppResult};

/// Content-type fragments that indicate a downloadable media resource
const DOWNLOADABLE_CONTENT_TYPES: [&str; 5] = [
    "application/",
    "image/",
    "audio/",
    "video/",
    "octet-stream",
];

/// Reachability check for a single stream link
///
/// Implementations must never fail: any error is reported as `false`.
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn probe(&self, link: &str) -> bool;
}

/// Probe backed by an HTTP HEAD request
#[derive(Debug, Clone)]
pub struct HttpAvailabilityProber {
    client: Client,
}

impl HttpAvailabilityProber {
    /// Fails when the client cannot be built, typically because the user
    /// agent is not a valid header value.
    pub fn new(timeout: Duration, user_agent: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::configuration(format!("Cannot build probe client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl AvailabilityProbe for HttpAvailabilityProber {
    async fn probe(&self, link: &str) -> bool {
        let Some(target) = probe_target(link) else {
            debug!("Probe skipped, not an HTTP(S) URL: {}", link);
            return false;
        };

        match self.client.head(target).send().await {
            Ok(response) => {
                let headers = response.headers();
                let content_type = header_str(headers, CONTENT_TYPE);
                let content_disposition = header_str(headers, CONTENT_DISPOSITION);
                let available = is_downloadable(content_type, content_disposition);
                debug!(
                    "Probed {}: status={} content-type='{}' available={}",
                    link,
                    response.status(),
                    content_type,
                    available
                );
                available
            }
            Err(e) => {
                debug!("Probe failed for {}: {}", link, e);
                false
            }
        }
    }
}

/// Reduce a link to scheme, host and path. Query and fragment are dropped.
pub fn probe_target(link: &str) -> Option<Url> {
    let mut url = Url::parse(link.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}

/// Header-based verdict: an attachment, or a media/binary content type.
pub fn is_downloadable(content_type: &str, content_disposition: &str) -> bool {
    if content_disposition.to_ascii_lowercase().contains("attachment") {
        return true;
    }
    let content_type = content_type.to_ascii_lowercase();
    DOWNLOADABLE_CONTENT_TYPES
        .iter()
        .any(|fragment| content_type.contains(fragment))
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::header, response::IntoResponse, routing::get};

    /// Port that was bound and released, so connecting to it is refused
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn spawn_server(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn prober() -> HttpAvailabilityProber {
        HttpAvailabilityProber::new(Duration::from_secs(2), "test-agent").unwrap()
    }

    #[test]
    fn test_invalid_user_agent_is_a_configuration_error() {
        let result = HttpAvailabilityProber::new(Duration::from_secs(5), "bad\nagent");
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_is_downloadable_rules() {
        assert!(is_downloadable("", "Attachment; filename=\"a.ts\""));
        assert!(is_downloadable("application/vnd.apple.mpegurl", ""));
        assert!(is_downloadable("Video/MP2T", ""));
        assert!(is_downloadable("audio/mpeg", ""));
        assert!(is_downloadable("image/png", ""));
        assert!(is_downloadable("binary/octet-stream", ""));
        assert!(!is_downloadable("text/html; charset=utf-8", "inline"));
        assert!(!is_downloadable("", ""));
    }

    #[test]
    fn test_probe_target_strips_query_and_fragment() {
        let url = probe_target("http://example.com:8000/live/index.m3u8?token=abc#t=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com:8000/live/index.m3u8");
        assert!(probe_target("not a url").is_none());
        assert!(probe_target("rtmp://example.com/live.m3u8").is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let link = format!("http://127.0.0.1:{}/stream.m3u8", closed_port());
        assert!(!prober().probe(&link).await);
    }

    #[tokio::test]
    async fn test_malformed_link_is_unavailable() {
        assert!(!prober().probe("http://[::1/broken.m3u8").await);
        assert!(!prober().probe("").await);
    }

    #[tokio::test]
    async fn test_media_content_type_is_available() {
        let app = Router::new()
            .route(
                "/live.m3u8",
                get(|| async {
                    ([(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")], "#EXTM3U")
                        .into_response()
                }),
            )
            .route(
                "/page.m3u8",
                get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html/>").into_response() }),
            )
            .route(
                "/file.mp3",
                get(|| async {
                    (
                        [
                            (header::CONTENT_TYPE, "text/plain"),
                            (header::CONTENT_DISPOSITION, "attachment; filename=\"file.mp3\""),
                        ],
                        "x",
                    )
                        .into_response()
                }),
            );
        let addr = spawn_server(app).await;
        let prober = prober();

        assert!(prober.probe(&format!("http://{addr}/live.m3u8?session=1")).await);
        assert!(!prober.probe(&format!("http://{addr}/page.m3u8")).await);
        assert!(prober.probe(&format!("http://{addr}/file.mp3")).await);
        // Unknown route answers 404 with no content type
        assert!(!prober.probe(&format!("http://{addr}/missing.m3u8")).await);
    }
}
