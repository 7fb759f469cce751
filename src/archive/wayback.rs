use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{CaptureSource, DocumentFetcher, RawCapture, RequestGate};
use crate::config::ArchiveSettings;
use crate::error::ArchiveError;
use crate::model::Capture;

const CDX_TIMESTAMP: &str = "%Y%m%d%H%M%S";
const CDX_DAY: &str = "%Y%m%d";
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Internet Archive client: CDX listings and raw (`id_`) captures.
#[derive(Clone)]
pub struct WaybackClient {
    client: reqwest::Client,
    cdx_endpoint: String,
    prefix: String,
    gate: RequestGate,
    max_retries: u32,
    backoff: Duration,
}

impl WaybackClient {
    pub fn new(settings: &ArchiveSettings) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|source| ArchiveError::Transport {
                url: settings.cdx_endpoint.clone(),
                source,
            })?;
        Ok(Self {
            client,
            cdx_endpoint: settings.cdx_endpoint.clone(),
            prefix: settings.wayback_prefix.trim_end_matches('/').to_string(),
            gate: RequestGate::new(Duration::from_millis(settings.min_interval_ms)),
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.backoff_ms),
        })
    }

    /// GET through the gate, retrying 429 and 5xx with exponential backoff.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ArchiveError> {
        let mut attempt = 0u32;
        loop {
            self.gate.wait().await;
            let resp = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|source| ArchiveError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable || attempt >= self.max_retries {
                return Err(ArchiveError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let backoff = retry_delay(self.backoff, attempt);
            warn!(
                "HTTP {} from {} (attempt {}/{}), backing off {:.1}s",
                status.as_u16(),
                url,
                attempt + 1,
                self.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl CaptureSource for WaybackClient {
    async fn list_captures(
        &self,
        url: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<RawCapture>, ArchiveError> {
        let mut query = vec![
            ("url", url.to_string()),
            ("output", "json".to_string()),
            ("fl", "timestamp,original,statuscode".to_string()),
            ("filter", "statuscode:200".to_string()),
            ("collapse", "timestamp:8".to_string()),
        ];
        if let Some(from) = from {
            query.push(("from", from.format(CDX_DAY).to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.format(CDX_DAY).to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let resp = self.get_with_retry(&self.cdx_endpoint, &query).await?;
        let body = resp.text().await.map_err(|source| ArchiveError::Transport {
            url: self.cdx_endpoint.clone(),
            source,
        })?;
        let captures = parse_cdx_rows(&body, &self.prefix)?;
        debug!("CDX listed {} captures for {}", captures.len(), url);
        Ok(captures)
    }
}

#[async_trait]
impl DocumentFetcher for WaybackClient {
    async fn fetch(&self, capture: &Capture) -> Result<String, ArchiveError> {
        let resp = self.get_with_retry(&capture.archived_url, &[]).await?;
        resp.text().await.map_err(|source| ArchiveError::Transport {
            url: capture.archived_url.clone(),
            source,
        })
    }
}

/// Parses a CDX `output=json` body. The first row is the field header; rows that
/// do not fit `timestamp,original,statuscode` are dropped.
pub fn parse_cdx_rows(body: &str, prefix: &str) -> Result<Vec<RawCapture>, ArchiveError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<Vec<String>> =
        serde_json::from_str(body).map_err(|e| ArchiveError::Payload(e.to_string()))?;

    let captures = rows
        .into_iter()
        .skip(1)
        .filter_map(|row| {
            let [timestamp, original, status] = <[String; 3]>::try_from(row).ok()?;
            let Ok(parsed) = NaiveDateTime::parse_from_str(&timestamp, CDX_TIMESTAMP) else {
                debug!("Skipping CDX row with timestamp {:?}", timestamp);
                return None;
            };
            Some(RawCapture {
                timestamp: parsed,
                archived_url: archived_url(prefix, &timestamp, &original),
                original_url: original,
                status_code: status.parse().unwrap_or(200),
            })
        })
        .collect();
    Ok(captures)
}

/// `base * 2^attempt`, saturating and capped at five minutes.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_BACKOFF)
}

/// Replay URL for the unmodified capture, without the archive's toolbar.
pub fn archived_url(prefix: &str, timestamp: &str, original: &str) -> String {
    format!("{prefix}/{timestamp}id_/{original}")
}
