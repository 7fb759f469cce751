pub mod fallback;
pub mod pattern;
pub mod structural;
pub mod text;
pub mod vocab;

use std::any::Any;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use scraper::Html;
use tracing::{debug, warn};

use crate::config::ExtractionSettings;
use crate::model::{Capture, ExtractionResult, PriceCandidate, RealismBand};
use fallback::FallbackExtractor;
use pattern::PatternExtractor;
use structural::StructuralExtractor;

/// Candidate-count thresholds that decide whether the costlier stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadePolicy {
    pub structural_below: usize,
    pub fallback_below: usize,
}

impl Default for CascadePolicy {
    fn default() -> Self {
        Self {
            structural_below: 3,
            fallback_below: 2,
        }
    }
}

/// Three-stage cascade: pattern → structural → fallback, then a pure merge.
#[derive(Clone, Default)]
pub struct ExtractionPipeline {
    pattern: PatternExtractor,
    structural: StructuralExtractor,
    fallback: Option<FallbackExtractor>,
    policy: CascadePolicy,
    overrides: Vec<PriceCandidate>,
}

impl ExtractionPipeline {
    pub fn new(band: RealismBand) -> Self {
        Self {
            pattern: PatternExtractor::new(band),
            structural: StructuralExtractor::new(band),
            fallback: None,
            policy: CascadePolicy::default(),
            overrides: Vec::new(),
        }
    }

    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self::new(settings.band()).with_policy(CascadePolicy {
            structural_below: settings.structural_below,
            fallback_below: settings.fallback_below,
        })
    }

    pub fn with_policy(mut self, policy: CascadePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackExtractor) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Caller-supplied prices merged into every result. They do not count toward
    /// the cascade thresholds.
    pub fn with_overrides(mut self, overrides: Vec<PriceCandidate>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback.as_ref().is_some_and(FallbackExtractor::is_available)
    }

    pub async fn extract(&self, capture: Capture, document: &str) -> ExtractionResult {
        let started = Instant::now();
        let mut stages: Vec<Vec<PriceCandidate>> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        // The parsed document stays inside this block; it is not held across the
        // inference call.
        let fallback_input = {
            let doc = Html::parse_document(document);

            run_stage("pattern", &mut stages, &mut errors, || {
                self.pattern.detect_document(&doc)
            });

            if found(&stages) < self.policy.structural_below {
                run_stage("structural", &mut stages, &mut errors, || {
                    self.structural.detect(&doc)
                });
            }

            match &self.fallback {
                Some(fb) if fb.is_available() && found(&stages) < self.policy.fallback_below => {
                    Some(fb.prepare(&doc))
                }
                _ => None,
            }
        };

        if let (Some(fb), Some(text)) = (&self.fallback, fallback_input) {
            match fb.detect(&text).await {
                Ok(prices) => {
                    debug!(stage = "fallback", count = prices.len(), "stage finished");
                    stages.push(prices);
                }
                Err(e) => {
                    warn!("Fallback extraction failed for {}: {}", capture.archived_url, e);
                    errors.push(format!("fallback extraction failed: {e}"));
                }
            }
        }

        let candidates = merge_candidates(
            stages
                .into_iter()
                .flatten()
                .chain(self.overrides.iter().cloned()),
        );

        ExtractionResult {
            capture,
            candidates,
            document_length: document.len(),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            errors,
        }
    }
}

/// Keeps one candidate per value, preferring higher `(confidence, method
/// priority)`, and returns them ascending by value.
pub fn merge_candidates(candidates: impl IntoIterator<Item = PriceCandidate>) -> Vec<PriceCandidate> {
    let mut all: Vec<PriceCandidate> = candidates.into_iter().collect();
    all.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut merged: Vec<PriceCandidate> = Vec::with_capacity(all.len());
    for candidate in all {
        match merged.last_mut() {
            Some(last) if last.value == candidate.value => {
                if candidate.preference(last) == Ordering::Greater {
                    *last = candidate;
                }
            }
            _ => merged.push(candidate),
        }
    }
    merged
}

fn found(stages: &[Vec<PriceCandidate>]) -> usize {
    stages.iter().map(Vec::len).sum()
}

/// Runs a synchronous stage, turning a panic into an error entry.
fn run_stage<F>(name: &str, stages: &mut Vec<Vec<PriceCandidate>>, errors: &mut Vec<String>, stage: F)
where
    F: FnOnce() -> Vec<PriceCandidate>,
{
    match panic::catch_unwind(AssertUnwindSafe(stage)) {
        Ok(prices) => {
            debug!(stage = name, count = prices.len(), "stage finished");
            stages.push(prices);
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            warn!("{} extraction panicked: {}", name, msg);
            errors.push(format!("{name} extraction failed: {msg}"));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
