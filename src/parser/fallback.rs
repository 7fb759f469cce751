use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::Html;
use serde_json::Value;
use tracing::{debug, warn};

use super::text::{self, NON_CONTENT, PAGE_CHROME};
use super::vocab;
use crate::error::InferenceError;
use crate::llm::{GenerationOptions, InferenceBackend};
use crate::model::{BillingPeriod, Currency, ExtractionMethod, PriceCandidate, RealismBand};

pub const DEFAULT_MAX_CHARS: usize = 4000;
const CHUNK_CHARS: usize = 1000;
const CHUNK_STRIDE: usize = 500;
const DEFAULT_CONFIDENCE: f64 = 0.7;

static JSON_ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Asks an inference service to read prices out of page text.
///
/// Availability is decided once, when the extractor is built. A caller that
/// wants a fresh probe builds a new extractor.
#[derive(Clone)]
pub struct FallbackExtractor {
    backend: Arc<dyn InferenceBackend>,
    available: bool,
    options: GenerationOptions,
    max_chars: usize,
    band: RealismBand,
}

impl FallbackExtractor {
    pub fn new(backend: Arc<dyn InferenceBackend>, available: bool) -> Self {
        Self {
            backend,
            available,
            options: GenerationOptions::default(),
            max_chars: DEFAULT_MAX_CHARS,
            band: RealismBand::default(),
        }
    }

    /// Probes the backend once and logs if it cannot be reached.
    pub async fn connect(backend: Arc<dyn InferenceBackend>) -> Self {
        let available = backend.available().await;
        if !available {
            warn!("Inference service unavailable; fallback extraction disabled for this run");
        }
        Self::new(backend, available)
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    pub fn with_band(mut self, band: RealismBand) -> Self {
        self.band = band;
        self
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Content text with page chrome removed, capped to the densest pricing window.
    pub fn prepare(&self, doc: &Html) -> String {
        let skip: Vec<&str> = NON_CONTENT.iter().chain(PAGE_CHROME).copied().collect();
        let text = text::visible_text(doc, &skip);
        focus_window(&text, self.max_chars)
    }

    pub async fn detect(&self, text: &str) -> Result<Vec<PriceCandidate>, InferenceError> {
        if !self.available || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let response = self.backend.generate(&build_prompt(text), &self.options).await?;
        let prices = parse_response(&response, &self.band);
        debug!("Fallback produced {} candidates", prices.len());
        Ok(prices)
    }
}

/// Text longer than `max_chars` is narrowed to the overlapping chunk with the
/// most pricing keywords, or truncated from the start when none score.
pub fn focus_window(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let mut best: Option<(usize, String)> = None;
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_CHARS).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let score = vocab::pricing_density(&chunk);
        if score > best.as_ref().map_or(0, |(s, _)| *s) {
            best = Some((score, chunk));
        }
        start += CHUNK_STRIDE;
    }

    match best {
        Some((_, chunk)) => text::truncate_chars(&chunk, max_chars).to_string(),
        None => text::truncate_chars(text, max_chars).to_string(),
    }
}

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"Extract all pricing information from the following text. Return ONLY a JSON array with this structure:
[
  {{
    "value": 99.99,
    "currency": "USD",
    "type": "monthly",
    "tier": "Professional",
    "confidence": 0.9
  }}
]

Rules:
- Extract only explicit prices (numbers with currency)
- type can be: "monthly", "annual", "one_time", or "unknown"
- currency: "USD", "EUR", "GBP", etc.
- confidence: 0.0 to 1.0
- tier: name of pricing tier if mentioned

Text:
{text}

JSON array:"#
    )
}

/// Reads the first JSON array out of a model response. Anything unusable,
/// whole or per record, is skipped rather than reported.
pub fn parse_response(response: &str, band: &RealismBand) -> Vec<PriceCandidate> {
    let Some(m) = JSON_ARRAY_RE.find(response) else {
        return Vec::new();
    };
    let records: Vec<Value> = match serde_json::from_str(m.as_str()) {
        Ok(records) => records,
        Err(e) => {
            debug!("Unparseable inference payload: {}", e);
            return Vec::new();
        }
    };
    records
        .iter()
        .filter_map(|record| parse_record(record, band))
        .collect()
}

fn parse_record(record: &Value, band: &RealismBand) -> Option<PriceCandidate> {
    let obj = record.as_object()?;
    let value = number(obj.get("value")?)?;

    let currency_raw = obj.get("currency").and_then(Value::as_str);
    let currency = currency_raw
        .and_then(|c| c.parse::<Currency>().ok())
        .filter(|c| *c != Currency::Unknown)
        .unwrap_or(Currency::DEFAULT);
    let period = obj
        .get("type")
        .and_then(Value::as_str)
        .map(BillingPeriod::parse_lenient)
        .unwrap_or(BillingPeriod::Unknown);
    let tier = obj
        .get("tier")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let confidence = match obj.get("confidence") {
        Some(c) => number(c)?,
        None => DEFAULT_CONFIDENCE,
    };

    PriceCandidate::detected(
        band,
        value,
        currency,
        period,
        tier,
        format!("{}{}", currency_raw.unwrap_or("$"), value),
        confidence,
        ExtractionMethod::Fallback,
    )
}

/// Accepts JSON numbers and numeric strings.
fn number(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}
