use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::Html;

use super::text::{self, NON_CONTENT};
use super::vocab;
use crate::model::{Currency, ExtractionMethod, PriceCandidate, RealismBand};

pub const CONFIDENCE: f64 = 0.8;
const CURRENCY_RADIUS: usize = 50;
const CONTEXT_RADIUS: usize = 100;

/// Amount with optional comma thousands and up to two decimals.
pub(crate) const AMOUNT: &str = r"(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)";
pub(crate) const SYMBOL: &str = r"(?P<sym>[$€£¥])";
const CODE: &str = r"(?P<code>USD|EUR|GBP|JPY|CAD|AUD)";

/// Tried in order; earlier forms claim a value first.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"{SYMBOL}\s*{AMOUNT}"),
        format!(r"(?i){AMOUNT}\s*{CODE}\b"),
        format!(r"(?i)\b{CODE}\s*{AMOUNT}"),
        format!(r"(?i)\b(?:price|cost|fee)\s*:\s*{SYMBOL}?\s*{AMOUNT}"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Plain-text currency/number matcher.
#[derive(Debug, Clone, Default)]
pub struct PatternExtractor {
    band: RealismBand,
}

impl PatternExtractor {
    pub fn new(band: RealismBand) -> Self {
        Self { band }
    }

    /// Normalizes markup (scripts and styles dropped) and scans the text.
    pub fn detect_document(&self, doc: &Html) -> Vec<PriceCandidate> {
        self.detect(&text::visible_text(doc, NON_CONTENT))
    }

    pub fn detect(&self, text: &str) -> Vec<PriceCandidate> {
        let mut prices: Vec<PriceCandidate> = Vec::new();

        for re in PATTERNS.iter() {
            for caps in re.captures_iter(text) {
                let Some(value) = parse_amount(&caps) else {
                    continue;
                };
                if prices.iter().any(|p| p.value == value) {
                    continue;
                }
                let whole = caps.get(0).unwrap();
                let (start, end) = (whole.start(), whole.end());

                let currency = currency_of(&caps).unwrap_or_else(|| {
                    let (from, to) = text::window(text, start, end, CURRENCY_RADIUS);
                    vocab::currency_in(&text[from..to]).unwrap_or(Currency::DEFAULT)
                });

                let (from, to) = text::window(text, start, end, CONTEXT_RADIUS);
                let context = &text[from..to];
                let anchor = (start - from, end - from);

                let candidate = PriceCandidate::detected(
                    &self.band,
                    value,
                    currency,
                    vocab::period_near(context, anchor),
                    vocab::tier_near(context, anchor),
                    whole.as_str(),
                    CONFIDENCE,
                    ExtractionMethod::Pattern,
                );
                if let Some(c) = candidate {
                    prices.push(c);
                }
            }
        }

        prices.sort_by(|a, b| a.value.total_cmp(&b.value));
        prices
    }
}

pub(crate) fn parse_amount(caps: &Captures<'_>) -> Option<f64> {
    caps.name("num")?.as_str().replace(',', "").parse::<f64>().ok()
}

fn currency_of(caps: &Captures<'_>) -> Option<Currency> {
    caps.name("sym")
        .and_then(|m| vocab::currency_for_symbol(m.as_str()))
        .or_else(|| caps.name("code").and_then(|m| vocab::currency_for_code(m.as_str())))
}
