#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use pricewatch::archive::{CaptureSource, DocumentFetcher, RawCapture, SnapshotResolver};
use pricewatch::error::ArchiveError;
use pricewatch::parser::ExtractionPipeline;
use pricewatch::{Analyzer, Capture};

pub const URL: &str = "https://example.com/pricing";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// In-memory archive: captures by day, documents by archived URL.
#[derive(Default)]
pub struct FakeArchive {
    captures: Vec<RawCapture>,
    documents: HashMap<String, String>,
    pub listings: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capture at noon on the given day. `None` makes its fetch fail.
    pub fn with_capture(mut self, day: NaiveDate, document: Option<&str>) -> Self {
        let timestamp = day.and_hms_opt(12, 0, 0).unwrap();
        let archived_url = format!(
            "https://web.archive.org/web/{}id_/{}",
            timestamp.format("%Y%m%d%H%M%S"),
            URL
        );
        if let Some(doc) = document {
            self.documents.insert(archived_url.clone(), doc.to_string());
        }
        self.captures.push(RawCapture {
            timestamp,
            original_url: URL.to_string(),
            status_code: 200,
            archived_url,
        });
        self
    }
}

#[async_trait]
impl CaptureSource for FakeArchive {
    async fn list_captures(
        &self,
        _url: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<RawCapture>, ArchiveError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let in_window = self
            .captures
            .iter()
            .filter(|c| from.map_or(true, |f| c.timestamp.date() >= f))
            .filter(|c| to.map_or(true, |t| c.timestamp.date() <= t))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(in_window)
    }
}

#[async_trait]
impl DocumentFetcher for FakeArchive {
    async fn fetch(&self, capture: &Capture) -> Result<String, ArchiveError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(&capture.archived_url)
            .cloned()
            .ok_or_else(|| ArchiveError::Status {
                url: capture.archived_url.clone(),
                status: 503,
            })
    }
}

/// Capture source that is always unreachable.
pub struct DownArchive;

#[async_trait]
impl CaptureSource for DownArchive {
    async fn list_captures(
        &self,
        url: &str,
        _from: Option<NaiveDate>,
        _to: Option<NaiveDate>,
        _limit: Option<usize>,
    ) -> Result<Vec<RawCapture>, ArchiveError> {
        Err(ArchiveError::Status {
            url: url.to_string(),
            status: 502,
        })
    }
}

pub fn analyzer(archive: Arc<FakeArchive>) -> Analyzer {
    Analyzer::new(
        SnapshotResolver::new(archive.clone()),
        archive,
        ExtractionPipeline::default(),
    )
}

pub fn page(body: &str) -> String {
    format!("<html><head><title>Pricing</title></head><body>{body}</body></html>")
}
