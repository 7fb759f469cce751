use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::archive::{DocumentFetcher, SnapshotResolver, WaybackClient};
use crate::config::Settings;
use crate::error::{ArchiveError, Result, ValidationError};
use crate::llm::OllamaClient;
use crate::model::{ExtractionResult, TimeSeries};
use crate::parser::fallback::FallbackExtractor;
use crate::parser::ExtractionPipeline;
use crate::sampling::{self, Interval};
use crate::timeseries;

/// One analysis run over a URL and date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub url: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    pub tolerance_days: u32,
}

impl AnalysisRequest {
    /// Uses the interval's default tolerance.
    pub fn new(
        url: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            url: url.into(),
            start,
            end,
            interval,
            tolerance_days: interval.default_tolerance_days(),
        })
    }

    pub fn with_tolerance(mut self, tolerance_days: u32) -> Self {
        self.tolerance_days = tolerance_days;
        self
    }

    pub fn targets(&self) -> Vec<NaiveDate> {
        sampling::generate(self.start, self.end, self.interval)
    }
}

/// Sampler → resolver → fetch → pipeline → assembler, one target date at a time.
#[derive(Clone)]
pub struct Analyzer {
    resolver: SnapshotResolver,
    fetcher: Arc<dyn DocumentFetcher>,
    pipeline: ExtractionPipeline,
}

impl Analyzer {
    pub fn new(
        resolver: SnapshotResolver,
        fetcher: Arc<dyn DocumentFetcher>,
        pipeline: ExtractionPipeline,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            pipeline,
        }
    }

    /// Wires the Wayback client and, when asked for, the Ollama fallback.
    pub async fn connect(settings: &Settings, use_fallback: bool) -> Result<Self> {
        let wayback = Arc::new(WaybackClient::new(&settings.archive)?);
        let mut pipeline = ExtractionPipeline::from_settings(&settings.extraction);

        if use_fallback {
            let ollama = OllamaClient::new(&settings.inference);
            info!("Fallback extraction via {} ({})", settings.inference.host, ollama.model());
            let fallback = FallbackExtractor::connect(Arc::new(ollama))
                .await
                .with_options(settings.inference.generation_options())
                .with_max_chars(settings.extraction.fallback_max_chars)
                .with_band(settings.extraction.band());
            pipeline = pipeline.with_fallback(fallback);
        }

        Ok(Self::new(SnapshotResolver::new(wayback.clone()), wayback, pipeline))
    }

    pub fn pipeline(&self) -> &ExtractionPipeline {
        &self.pipeline
    }

    pub async fn run(
        &self,
        request: &AnalysisRequest,
        progress: &ProgressBar,
    ) -> Result<TimeSeries, ArchiveError> {
        self.run_until(request, progress, std::future::pending()).await
    }

    /// Like [`Analyzer::run`], but stops at the first step boundary after
    /// `shutdown` completes and returns the series built so far.
    pub async fn run_until<F>(
        &self,
        request: &AnalysisRequest,
        progress: &ProgressBar,
        shutdown: F,
    ) -> Result<TimeSeries, ArchiveError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let targets = request.targets();
        progress.set_length(targets.len() as u64);
        info!(
            "Analyzing {} at {} {} target dates ({} to {}, ±{} days)",
            request.url,
            targets.len(),
            request.interval,
            request.start,
            request.end,
            request.tolerance_days
        );

        let mut seen: HashSet<NaiveDateTime> = HashSet::new();
        let mut results: Vec<ExtractionResult> = Vec::new();

        for target in targets {
            progress.set_message(target.to_string());
            let step = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                outcome = self.step(request, target, &mut seen) => Some(outcome),
            };
            let Some(outcome) = step else {
                warn!("Run interrupted; keeping {} completed results", results.len());
                break;
            };
            results.extend(outcome?);
            progress.inc(1);
        }
        progress.finish_and_clear();

        results.sort_by_key(|r| r.capture.timestamp);
        let total = results.len();
        let series = timeseries::assemble(&request.url, results, request.start, request.end, total);
        info!(
            "Extracted prices from {}/{} snapshots ({:.0}%)",
            series.successful_extractions,
            series.total_snapshots,
            series.success_rate() * 100.0
        );
        Ok(series)
    }

    /// Resolve, fetch and extract one target. `None` when nothing new was resolved.
    async fn step(
        &self,
        request: &AnalysisRequest,
        target: NaiveDate,
        seen: &mut HashSet<NaiveDateTime>,
    ) -> Result<Option<ExtractionResult>, ArchiveError> {
        let Some(capture) = self
            .resolver
            .resolve(&request.url, target, request.tolerance_days)
            .await?
        else {
            debug!("No capture within {} days of {}", request.tolerance_days, target);
            return Ok(None);
        };
        if !seen.insert(capture.timestamp) {
            debug!("{} resolved to already processed capture {}", target, capture.timestamp);
            return Ok(None);
        }

        let markup = match self.fetcher.fetch(&capture).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Fetch failed for {}: {}", capture.archived_url, e);
                return Ok(Some(ExtractionResult::fetch_failed(
                    capture,
                    format!("fetch failed: {e}"),
                )));
            }
        };

        let result = self.pipeline.extract(capture, &markup).await;
        debug!(
            "{}: {} candidates in {:.1}ms",
            result.capture.date(),
            result.candidates.len(),
            result.elapsed_ms
        );
        Ok(Some(result))
    }
}
