pub mod gate;
pub mod resolver;
pub mod wayback;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::ArchiveError;
use crate::model::Capture;

/// One archive listing entry, before it is matched against a target date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCapture {
    pub timestamp: NaiveDateTime,
    pub original_url: String,
    pub status_code: u16,
    pub archived_url: String,
}

/// Lists the captures an archive holds for a URL.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Both bounds are inclusive. An empty listing is not an error.
    async fn list_captures(
        &self,
        url: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<RawCapture>, ArchiveError>;
}

/// Retrieves the archived document behind a capture.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, capture: &Capture) -> Result<String, ArchiveError>;
}

pub use gate::RequestGate;
pub use resolver::SnapshotResolver;
pub use wayback::WaybackClient;
