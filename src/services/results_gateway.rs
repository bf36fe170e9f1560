use crate::config::SettlementConfig;
use crate::models::{MatchResult, ResultsSnapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Upstream statuses meaning the final score is in
const FINISHED_STATUSES: [&str; 3] = ["FT", "FINISHED", "CLOSED"];

/// Base delay between fetch attempts; attempt `n` waits `n` times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Results feed errors. Any of them aborts the cycle before state changes.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("results request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("results feed returned HTTP {0}")]
    Status(u16),

    #[error("results body could not be decoded: {0}")]
    Decode(String),

    #[error("results feed reported failure: {0}")]
    Upstream(String),
}

/// Source of match results for a settlement cycle
#[async_trait]
pub trait ResultsGateway: Send + Sync {
    /// Current results keyed by match id. Absent matches are not finished.
    async fn fetch(&self) -> Result<ResultsSnapshot, GatewayError>;
}

/// Response envelope of the results endpoint
#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// One entry of `data`; every field is required
#[derive(Debug, Deserialize)]
struct FeedEntry {
    match_id: MatchId,
    home_score: u32,
    away_score: u32,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchId {
    Text(String),
    Number(u64),
}

impl MatchId {
    fn into_key(self) -> String {
        match self {
            MatchId::Text(s) => s.trim().to_string(),
            MatchId::Number(n) => n.to_string(),
        }
    }
}

fn is_finished(status: &str) -> bool {
    let status = status.trim();
    FINISHED_STATUSES
        .iter()
        .any(|finished| finished.eq_ignore_ascii_case(status))
}

/// Decode a results body into a snapshot. Malformed entries are skipped.
pub fn normalize(body: &str) -> Result<ResultsSnapshot, GatewayError> {
    let response: ResultsResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if let Some(status) = response.status.as_deref() {
        let status = status.trim().to_ascii_lowercase();
        if matches!(status.as_str(), "error" | "fail" | "failed") {
            return Err(GatewayError::Upstream(status));
        }
    }

    let mut snapshot = ResultsSnapshot::new();
    for raw in response.data {
        match serde_json::from_value::<FeedEntry>(raw) {
            Ok(entry) => {
                let match_id = entry.match_id.into_key();
                if match_id.is_empty() {
                    warn!("Skipping result entry with empty match id");
                    continue;
                }
                snapshot.insert(MatchResult {
                    match_id,
                    home_score: entry.home_score,
                    away_score: entry.away_score,
                    finished: is_finished(&entry.status),
                });
            }
            Err(e) => warn!("Skipping malformed result entry: {}", e),
        }
    }

    Ok(snapshot)
}

/// Results gateway over the provider's HTTP endpoint
pub struct HttpResultsGateway {
    client: Client,
    url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpResultsGateway {
    /// Create a gateway from settlement config
    pub fn new(config: &SettlementConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            url: config.results_url.clone(),
            api_key: config.results_api_key.clone(),
            retries: config.fetch_retries,
        })
    }

    async fn fetch_once(&self) -> Result<ResultsSnapshot, GatewayError> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        normalize(&body)
    }
}

#[async_trait]
impl ResultsGateway for HttpResultsGateway {
    async fn fetch(&self) -> Result<ResultsSnapshot, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once().await {
                Ok(snapshot) => {
                    debug!(
                        "Fetched {} results ({} finished)",
                        snapshot.len(),
                        snapshot.finished_count()
                    );
                    return Ok(snapshot);
                }
                // Only transport and 5xx failures are worth another attempt
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!("Results fetch failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(err: &GatewayError) -> bool {
    match err {
        GatewayError::Http(_) => true,
        GatewayError::Status(code) => *code >= 500,
        GatewayError::Decode(_) | GatewayError::Upstream(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_normalize_reads_finished_statuses() {
        let body = r#"{
            "status": "success",
            "data": [
                {"match_id": "101", "home_score": 2, "away_score": 1, "status": "FT"},
                {"match_id": "102", "home_score": 0, "away_score": 0, "status": "Finished"},
                {"match_id": "103", "home_score": 1, "away_score": 1, "status": "closed"},
                {"match_id": "104", "home_score": 1, "away_score": 0, "status": "LIVE"}
            ]
        }"#;

        let snapshot = normalize(body).unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.finished_count(), 3);
        assert!(!snapshot.get("104").unwrap().finished);
    }

    #[test]
    fn test_normalize_accepts_numeric_match_ids() {
        let body = r#"{"data": [{"match_id": 2024, "home_score": 3, "away_score": 0, "status": "FT"}]}"#;

        let snapshot = normalize(body).unwrap();
        assert_eq!(snapshot.get("2024").unwrap().home_score, 3);
    }

    #[test]
    fn test_normalize_skips_malformed_entries() {
        let body = r#"{"data": [
            {"match_id": "1", "home_score": 1, "away_score": 0, "status": "FT"},
            {"match_id": "2", "home_score": "one", "away_score": 0, "status": "FT"},
            {"match_id": "3", "away_score": 0, "status": "FT"},
            {"match_id": "", "home_score": 0, "away_score": 0, "status": "FT"},
            "garbage"
        ]}"#;

        let snapshot = normalize(body).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("1").is_some());
    }

    #[test]
    fn test_normalize_last_duplicate_wins() {
        let body = r#"{"data": [
            {"match_id": "7", "home_score": 0, "away_score": 0, "status": "LIVE"},
            {"match_id": "7", "home_score": 1, "away_score": 0, "status": "FT"}
        ]}"#;

        let result = normalize(body).unwrap().get("7").cloned().unwrap();
        assert!(result.finished);
        assert_eq!(result.home_score, 1);
    }

    #[test]
    fn test_normalize_rejects_bad_bodies() {
        assert!(matches!(normalize("not json"), Err(GatewayError::Decode(_))));
        assert!(matches!(
            normalize(r#"{"status": "error", "data": []}"#),
            Err(GatewayError::Upstream(_))
        ));
    }

    #[test]
    fn test_retry_policy() {
        assert!(is_retryable(&GatewayError::Status(503)));
        assert!(!is_retryable(&GatewayError::Status(404)));
        assert!(!is_retryable(&GatewayError::Decode("eof".to_string())));
    }

    /// Serves one canned response per connection, repeating the last
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            let mut served = 0;
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&buf);
                seen.lock().unwrap().push(request.lines().next().unwrap_or("").to_string());

                let (code, body) = responses[served.min(responses.len() - 1)];
                served += 1;
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    code,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}/v3/results", addr), requests)
    }

    fn gateway(url: String, api_key: Option<&str>) -> HttpResultsGateway {
        let config = SettlementConfig {
            results_url: url,
            results_api_key: api_key.map(str::to_string),
            request_timeout_secs: 5,
            fetch_retries: 2,
            ..SettlementConfig::default()
        };
        HttpResultsGateway::new(&config).unwrap()
    }

    const FINISHED_BODY: &str =
        r#"{"status": "success", "data": [{"match_id": "9", "home_score": 1, "away_score": 0, "status": "FT"}]}"#;

    #[tokio::test]
    async fn test_fetch_retries_server_errors_then_succeeds() {
        let (url, requests) = serve(vec![(503, ""), (200, FINISHED_BODY)]).await;

        let snapshot = gateway(url, Some("secret")).fetch().await.unwrap();

        assert_eq!(snapshot.finished_count(), 1);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /v3/results?key=secret"));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_configured_retries() {
        let (url, requests) = serve(vec![(502, "")]).await;

        let result = gateway(url, None).fetch().await;

        assert!(matches!(result, Err(GatewayError::Status(502))));
        // First attempt plus two retries
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_client_or_upstream_errors() {
        let (url, requests) = serve(vec![(404, "")]).await;
        assert!(matches!(gateway(url, None).fetch().await, Err(GatewayError::Status(404))));
        assert_eq!(requests.lock().unwrap().len(), 1);

        let (url, requests) = serve(vec![(200, r#"{"status": "failed", "data": []}"#)]).await;
        assert!(matches!(gateway(url, None).fetch().await, Err(GatewayError::Upstream(_))));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }
}
