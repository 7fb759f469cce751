use std::cmp::Reverse;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::pattern::{parse_amount, AMOUNT, SYMBOL};
use super::text::{self, NON_CONTENT};
use super::vocab;
use crate::model::{BillingPeriod, Currency, ExtractionMethod, PriceCandidate, RealismBand};

pub const CONTAINER_CONFIDENCE: f64 = 0.85;
pub const PROMINENT_CONFIDENCE: f64 = 0.75;

/// Below this many container hits the prominence scan also runs.
const PROMINENCE_THRESHOLD: usize = 3;
const MAX_TIER_LEN: usize = 50;

static SYMBOL_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{SYMBOL}\s*{AMOUNT}")).unwrap());
static TIER_HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static PROMINENT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, span, div, p").unwrap());

/// Markup-aware detector: pricing containers first, large typography second.
#[derive(Debug, Clone, Default)]
pub struct StructuralExtractor {
    band: RealismBand,
}

impl StructuralExtractor {
    pub fn new(band: RealismBand) -> Self {
        Self { band }
    }

    pub fn detect(&self, doc: &Html) -> Vec<PriceCandidate> {
        let mut prices = dedup_by_value(self.from_containers(doc));
        if prices.len() < PROMINENCE_THRESHOLD {
            prices.extend(self.from_prominent(doc));
            prices = dedup_by_value(prices);
        }
        prices.sort_by(|a, b| a.value.total_cmp(&b.value));
        prices
    }

    /// When several containers hold the same value, the one that resolved a tier
    /// comes first, then one with a known period, then the innermost. A bare
    /// `.price` span thus yields to its plan card, and a plan card to the
    /// section around it.
    fn from_containers(&self, doc: &Html) -> Vec<PriceCandidate> {
        let mut found: Vec<(usize, PriceCandidate)> = Vec::new();

        for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
            if !is_container(el) {
                continue;
            }
            let text = text::element_text(el, NON_CONTENT);
            if text.is_empty() {
                continue;
            }
            let tier = container_tier(el);
            let depth = el.ancestors().count();

            for caps in SYMBOL_PRICE_RE.captures_iter(&text) {
                let whole = caps.get(0).unwrap();
                let candidate = parse_amount(&caps).and_then(|value| {
                    PriceCandidate::detected(
                        &self.band,
                        value,
                        symbol_currency(&caps),
                        vocab::period_near(&text, (whole.start(), whole.end())),
                        tier.clone(),
                        whole.as_str(),
                        CONTAINER_CONFIDENCE,
                        ExtractionMethod::Structural,
                    )
                });
                if let Some(c) = candidate {
                    found.push((depth, c));
                }
            }
        }

        found.sort_by_key(|(depth, c)| {
            Reverse((c.tier.is_some(), c.period != BillingPeriod::Unknown, *depth))
        });
        found.into_iter().map(|(_, c)| c).collect()
    }

    fn from_prominent(&self, doc: &Html) -> Vec<PriceCandidate> {
        let mut prices = Vec::new();
        for el in doc.select(&PROMINENT_SEL) {
            let style = el.value().attr("style").unwrap_or("");
            let classes = el.value().attr("class").unwrap_or("");
            if !vocab::is_prominent(style, classes) {
                continue;
            }
            let text = text::element_text(el, NON_CONTENT);
            let Some(caps) = SYMBOL_PRICE_RE.captures(&text) else {
                continue;
            };
            let whole = caps.get(0).unwrap();
            let candidate = parse_amount(&caps).and_then(|value| {
                PriceCandidate::detected(
                    &self.band,
                    value,
                    symbol_currency(&caps),
                    vocab::period_near(&text, (whole.start(), whole.end())),
                    None,
                    whole.as_str(),
                    PROMINENT_CONFIDENCE,
                    ExtractionMethod::Structural,
                )
            });
            prices.extend(candidate);
        }
        prices
    }
}

fn is_container(el: ElementRef<'_>) -> bool {
    if NON_CONTENT.contains(&el.value().name()) {
        return false;
    }
    el.value().attrs().any(|(name, value)| match name {
        "class" | "id" => vocab::is_container_name(value),
        _ => vocab::is_container_name(name),
    })
}

fn container_tier(el: ElementRef<'_>) -> Option<String> {
    let heading = el
        .select(&TIER_HEADING_SEL)
        .map(|h| text::element_text(h, NON_CONTENT))
        .find(|t| !t.is_empty() && t.chars().count() < MAX_TIER_LEN);
    heading.or_else(|| {
        vocab::TIER_ATTRIBUTES
            .iter()
            .find_map(|attr| el.value().attr(attr))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn symbol_currency(caps: &regex::Captures<'_>) -> Currency {
    caps.name("sym")
        .and_then(|m| vocab::currency_for_symbol(m.as_str()))
        .unwrap_or(Currency::DEFAULT)
}

/// Keeps the first candidate seen for each value.
fn dedup_by_value(prices: Vec<PriceCandidate>) -> Vec<PriceCandidate> {
    let mut out: Vec<PriceCandidate> = Vec::with_capacity(prices.len());
    for price in prices {
        if !out.iter().any(|p| p.value == price.value) {
            out.push(price);
        }
    }
    out
}
