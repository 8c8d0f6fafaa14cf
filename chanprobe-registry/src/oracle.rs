//! HTTP form-search registry oracle.

use async_trait::async_trait;
use bitcoin::OutPoint;
use chanprobe_core::RegistryOracle;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Whether a search response confirms `outpoint` as a public channel.
///
/// A hit needs status 200 and the outpoint rendered inside the registry's
/// `selectable` span.
pub fn response_matches(status: StatusCode, body: &str, outpoint: &str) -> bool {
    if status != StatusCode::OK {
        return false;
    }
    let marker = format!("<span class=\"selectable\">{}</span>", outpoint);
    body.contains(&marker)
}

/// Registry oracle backed by a public channel explorer's search form.
pub struct HttpRegistry {
    client: Client,
    config: RegistryConfig,
}

impl HttpRegistry {
    /// Create a registry client.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Search the registry for `funding`, surfacing transport errors.
    pub async fn query(&self, funding: &OutPoint) -> Result<bool> {
        let outpoint = funding.to_string();

        let response = self
            .client
            .post(&self.config.endpoint)
            .form(&[("q", outpoint.as_str()), ("type", "channel")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(response_matches(status, &body, &outpoint))
    }
}

#[async_trait]
impl RegistryOracle for HttpRegistry {
    async fn is_known_public(&self, funding: &OutPoint) -> bool {
        match self.query(funding).await {
            Ok(found) => {
                debug!(%funding, found, "Registry lookup");
                found
            }
            Err(e) => {
                // Counted as private: outages bias the estimate upward.
                warn!(%funding, error = %e, "Registry lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    const OUTPOINT: &str =
        "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b:1";

    fn funding() -> OutPoint {
        OutPoint::from_str(OUTPOINT).unwrap()
    }

    /// Serve one HTTP exchange, handing back the raw request.
    async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/search", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            tx.send(String::from_utf8_lossy(&request).into_owned()).ok();
        });

        (url, rx)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..split]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        text.len() >= split + 4 + length
    }

    #[test]
    fn test_marker_match() {
        let body = format!("<div><span class=\"selectable\">{}</span></div>", OUTPOINT);
        assert!(response_matches(StatusCode::OK, &body, OUTPOINT));
    }

    #[test]
    fn test_marker_requires_ok_status() {
        let body = format!("<span class=\"selectable\">{}</span>", OUTPOINT);
        assert!(!response_matches(StatusCode::NOT_FOUND, &body, OUTPOINT));
    }

    #[test]
    fn test_bare_outpoint_is_not_a_match() {
        let body = format!("No results for {}", OUTPOINT);
        assert!(!response_matches(StatusCode::OK, &body, OUTPOINT));
    }

    #[test]
    fn test_other_outpoint_is_not_a_match() {
        let other = OUTPOINT.replace(":1", ":0");
        let body = format!("<span class=\"selectable\">{}</span>", other);
        assert!(!response_matches(StatusCode::OK, &body, OUTPOINT));
    }

    #[tokio::test]
    async fn test_known_channel_found() {
        let body = format!("<html><span class=\"selectable\">{}</span></html>", OUTPOINT);
        let (url, request) = serve_once("200 OK", body).await;
        let registry = HttpRegistry::new(RegistryConfig::new(url)).unwrap();

        assert!(registry.is_known_public(&funding()).await);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /search"));
        assert!(request.contains("type=channel"));
        assert!(request.contains(&OUTPOINT.replace(':', "%3A")));
    }

    #[tokio::test]
    async fn test_unknown_channel_not_found() {
        let (url, _request) = serve_once("200 OK", "<html>nothing</html>".into()).await;
        let registry = HttpRegistry::new(RegistryConfig::new(url)).unwrap();

        assert!(!registry.is_known_public(&funding()).await);
    }

    #[tokio::test]
    async fn test_error_status_is_not_public() {
        let body = format!("<span class=\"selectable\">{}</span>", OUTPOINT);
        let (url, _request) = serve_once("503 Service Unavailable", body).await;
        let registry = HttpRegistry::new(RegistryConfig::new(url)).unwrap();

        assert!(matches!(
            registry.query(&funding()).await,
            Err(RegistryError::Status(503))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_not_public() {
        let config = RegistryConfig::new("http://127.0.0.1:1/search").with_timeout(2);
        let registry = HttpRegistry::new(config).unwrap();

        assert!(!registry.is_known_public(&funding()).await);
    }
}
