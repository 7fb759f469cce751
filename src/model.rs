use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Capture ──

/// An archived snapshot of a URL, resolved against a requested date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub url: String,
    pub archived_url: String,
    pub timestamp: NaiveDateTime,
    pub status_code: u16,
    pub is_exact_match: bool,
    pub offset_days: u32,
}

impl Capture {
    /// `is_exact_match` is derived from the offset so the two can never disagree.
    pub fn new(
        url: impl Into<String>,
        archived_url: impl Into<String>,
        timestamp: NaiveDateTime,
        status_code: u16,
        offset_days: u32,
    ) -> Self {
        Self {
            url: url.into(),
            archived_url: archived_url.into(),
            timestamp,
            status_code,
            is_exact_match: offset_days == 0,
            offset_days,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

// ── Enumerations ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Cad,
    Aud,
    Unknown,
}

impl Currency {
    /// Assumed when neither a symbol nor a code identifies the currency.
    pub const DEFAULT: Self = Self::Usd;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "JPY" => Ok(Self::Jpy),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(ValidationError::InvalidCurrency {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Annual,
    OneTime,
    Unknown,
}

impl BillingPeriod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
            Self::OneTime => "one_time",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse used for inference output; anything unrecognized is `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" => Self::Monthly,
            "annual" => Self::Annual,
            "one_time" => Self::OneTime,
            _ => Self::Unknown,
        }
    }
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Manual,
    Structural,
    Pattern,
    Fallback,
}

impl ExtractionMethod {
    /// Total order used to break confidence ties during merging.
    pub const PRIORITY: [(Self, u8); 4] = [
        (Self::Manual, 4),
        (Self::Structural, 3),
        (Self::Pattern, 2),
        (Self::Fallback, 1),
    ];

    pub fn priority(self) -> u8 {
        Self::PRIORITY
            .iter()
            .find(|(method, _)| *method == self)
            .map(|(_, rank)| *rank)
            .unwrap_or(0)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Structural => "structural",
            Self::Pattern => "pattern",
            Self::Fallback => "fallback",
        }
    }
}

impl Display for ExtractionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Price candidates ──

/// Inclusive bounds a detected value must fall within to be kept at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealismBand {
    pub min: f64,
    pub max: f64,
}

impl RealismBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for RealismBand {
    fn default() -> Self {
        Self {
            min: 0.01,
            max: 1_000_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub value: f64,
    pub currency: Currency,
    pub period: BillingPeriod,
    pub tier: Option<String>,
    pub raw_text: String,
    pub confidence: f64,
    pub method: ExtractionMethod,
}

impl PriceCandidate {
    /// Builds a candidate, or `None` when the value falls outside the band.
    /// Confidence is clamped into [0, 1].
    #[allow(clippy::too_many_arguments)]
    pub fn detected(
        band: &RealismBand,
        value: f64,
        currency: Currency,
        period: BillingPeriod,
        tier: Option<String>,
        raw_text: impl Into<String>,
        confidence: f64,
        method: ExtractionMethod,
    ) -> Option<Self> {
        if !band.contains(value) {
            return None;
        }
        Some(Self {
            value,
            currency,
            period,
            tier,
            raw_text: raw_text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        })
    }

    /// Caller-supplied override at full confidence. Outranks every automated
    /// strategy on merge; `None` when the value falls outside the band.
    pub fn manual(
        band: &RealismBand,
        value: f64,
        currency: Currency,
        period: BillingPeriod,
        tier: Option<String>,
    ) -> Option<Self> {
        Self::detected(
            band,
            value,
            currency,
            period,
            tier,
            format!("{currency} {value}"),
            1.0,
            ExtractionMethod::Manual,
        )
    }

    /// Yearly cost in the candidate's own currency.
    pub fn annualized_value(&self) -> f64 {
        match self.period {
            BillingPeriod::Monthly => self.value * 12.0,
            _ => self.value,
        }
    }

    /// Ordering by `(confidence, method priority)`; greater is preferred.
    pub fn preference(&self, other: &Self) -> Ordering {
        self.confidence
            .total_cmp(&other.confidence)
            .then_with(|| self.method.priority().cmp(&other.method.priority()))
    }
}

// ── Extraction results ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub capture: Capture,
    /// Unique by value, ascending.
    pub candidates: Vec<PriceCandidate>,
    pub document_length: usize,
    pub elapsed_ms: f64,
    pub errors: Vec<String>,
}

impl ExtractionResult {
    /// Result for a capture whose document could not be fetched.
    pub fn fetch_failed(capture: Capture, error: impl Into<String>) -> Self {
        Self {
            capture,
            candidates: Vec::new(),
            document_length: 0,
            elapsed_ms: 0.0,
            errors: vec![error.into()],
        }
    }

    pub fn has_prices(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Most preferred candidate; on a full tie the lowest value wins.
    pub fn primary_price(&self) -> Option<&PriceCandidate> {
        self.candidates.iter().min_by(|a, b| b.preference(a))
    }
}

// ── Time series ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub url: String,
    pub results: Vec<ExtractionResult>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_snapshots: usize,
    pub successful_extractions: usize,
}

impl TimeSeries {
    pub fn success_rate(&self) -> f64 {
        if self.total_snapshots == 0 {
            return 0.0;
        }
        (self.successful_extractions as f64 / self.total_snapshots as f64).min(1.0)
    }

    /// One flat row per candidate, in result order.
    pub fn rows(&self) -> Vec<PriceRow> {
        self.results
            .iter()
            .flat_map(|result| {
                result.candidates.iter().map(move |price| PriceRow {
                    date: result.capture.date(),
                    value: price.value,
                    annualized: price.annualized_value(),
                    currency: price.currency,
                    period: price.period,
                    tier: price.tier.clone(),
                    confidence: price.confidence,
                    method: price.method,
                    is_exact: result.capture.is_exact_match,
                    offset_days: result.capture.offset_days,
                    archived_url: result.capture.archived_url.clone(),
                })
            })
            .collect()
    }
}

/// Flattened view of a single price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub value: f64,
    pub annualized: f64,
    pub currency: Currency,
    pub period: BillingPeriod,
    pub tier: Option<String>,
    pub confidence: f64,
    pub method: ExtractionMethod,
    pub is_exact: bool,
    pub offset_days: u32,
    pub archived_url: String,
}
