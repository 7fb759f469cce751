//! Ordered lookup tables behind the extraction heuristics.
//!
//! Control flow lives in the extractors; everything that is "a list of words"
//! lives here so it can be extended and tested on its own.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{BillingPeriod, Currency};

pub const CURRENCY_SYMBOLS: &[(&str, Currency)] = &[
    ("$", Currency::Usd),
    ("€", Currency::Eur),
    ("£", Currency::Gbp),
    ("¥", Currency::Jpy),
];

pub const CURRENCY_CODES: &[(&str, Currency)] = &[
    ("USD", Currency::Usd),
    ("EUR", Currency::Eur),
    ("GBP", Currency::Gbp),
    ("JPY", Currency::Jpy),
    ("CAD", Currency::Cad),
    ("AUD", Currency::Aud),
];

/// Period phrases as regex fragments. Earlier entries win when two phrases are
/// equally close to a price.
pub const PERIOD_KEYWORDS: &[(&str, BillingPeriod)] = &[
    (r"/\s*mo\b", BillingPeriod::Monthly),
    (r"/\s*month", BillingPeriod::Monthly),
    (r"\bper\s+month\b", BillingPeriod::Monthly),
    (r"\bmonthly\b", BillingPeriod::Monthly),
    (r"\bmonths?\b", BillingPeriod::Monthly),
    (r"/\s*yr\b", BillingPeriod::Annual),
    (r"/\s*year", BillingPeriod::Annual),
    (r"\bper\s+year\b", BillingPeriod::Annual),
    (r"\bannually\b", BillingPeriod::Annual),
    (r"\bannual\b", BillingPeriod::Annual),
    (r"\byearly\b", BillingPeriod::Annual),
    (r"\byears?\b", BillingPeriod::Annual),
    (r"\bone[-\s]time\b", BillingPeriod::OneTime),
    (r"\blifetime\b", BillingPeriod::OneTime),
    (r"\bpay\s+once\b", BillingPeriod::OneTime),
];

/// Plan-name keywords and the label they produce.
pub const TIER_KEYWORDS: &[(&str, &str)] = &[
    ("starter", "Starter"),
    ("basic", "Basic"),
    ("free", "Free"),
    ("hobby", "Hobby"),
    ("professional", "Professional"),
    ("pro", "Pro"),
    ("business", "Business"),
    ("team", "Team"),
    ("enterprise", "Enterprise"),
    ("premium", "Premium"),
    ("plus", "Plus"),
    ("standard", "Standard"),
    ("advanced", "Advanced"),
    ("ultimate", "Ultimate"),
];

/// Fragments of class / id / attribute names that mark a pricing container.
pub const CONTAINER_KEYWORDS: &[&str] = &[
    "price",
    "pricing",
    "cost",
    "fee",
    "plan",
    "tier",
    "package",
    "subscription",
    "billing",
];

/// Style / class fragments suggesting large typography.
pub const PROMINENCE_STYLE_KEYWORDS: &[&str] = &["font-size"];
pub const PROMINENCE_CLASS_KEYWORDS: &[&str] = &["large", "big", "heading"];

/// Words used to score text windows for pricing density.
pub const PRICING_DENSITY_KEYWORDS: &[&str] =
    &["pricing", "price", "plans", "cost", "subscription", "buy"];

/// Attributes that name a plan directly on a container.
pub const TIER_ATTRIBUTES: &[&str] = &["data-plan", "data-tier"];

static PERIOD_RES: LazyLock<Vec<(Regex, BillingPeriod)>> = LazyLock::new(|| {
    PERIOD_KEYWORDS
        .iter()
        .map(|(pattern, period)| (Regex::new(&format!("(?i){pattern}")).unwrap(), *period))
        .collect()
});

static TIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let words: Vec<&str> = TIER_KEYWORDS.iter().map(|(word, _)| *word).collect();
    Regex::new(&format!(r"(?i)\b({})\b", words.join("|"))).unwrap()
});

pub fn currency_for_symbol(symbol: &str) -> Option<Currency> {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, c)| *c)
}

pub fn currency_for_code(code: &str) -> Option<Currency> {
    CURRENCY_CODES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, c)| *c)
}

/// First currency symbol, then first currency code, found in `text`.
pub fn currency_in(text: &str) -> Option<Currency> {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| text.contains(symbol))
        .or_else(|| {
            let upper = text.to_uppercase();
            CURRENCY_CODES.iter().find(|(code, _)| upper.contains(code))
        })
        .map(|(_, c)| *c)
}

/// Period whose keyword occurs closest to `anchor` (a byte range inside
/// `text`). Falls back to `Unknown`.
pub fn period_near(text: &str, anchor: (usize, usize)) -> BillingPeriod {
    let mut best: Option<(usize, usize, BillingPeriod)> = None;
    for (rank, (re, period)) in PERIOD_RES.iter().enumerate() {
        for m in re.find_iter(text) {
            let key = (distance(anchor, (m.start(), m.end())), rank);
            if best.map_or(true, |(d, r, _)| key < (d, r)) {
                best = Some((key.0, key.1, *period));
            }
        }
    }
    best.map(|(_, _, period)| period)
        .unwrap_or(BillingPeriod::Unknown)
}

/// Tier label whose keyword occurs closest to `anchor`.
pub fn tier_near(text: &str, anchor: (usize, usize)) -> Option<String> {
    TIER_RE
        .find_iter(text)
        .min_by_key(|m| distance(anchor, (m.start(), m.end())))
        .and_then(|m| tier_label(m.as_str()))
        .map(str::to_string)
}

pub fn tier_label(word: &str) -> Option<&'static str> {
    TIER_KEYWORDS
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(word))
        .map(|(_, label)| *label)
}

pub fn is_container_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    CONTAINER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn is_prominent(style: &str, classes: &str) -> bool {
    let style = style.to_ascii_lowercase();
    let classes = classes.to_ascii_lowercase();
    PROMINENCE_STYLE_KEYWORDS.iter().any(|kw| style.contains(kw))
        || PROMINENCE_CLASS_KEYWORDS.iter().any(|kw| classes.contains(kw))
}

/// Number of distinct density keywords present in `text`.
pub fn pricing_density(text: &str) -> usize {
    let lower = text.to_lowercase();
    PRICING_DENSITY_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count()
}

/// Gap in bytes between two ranges; zero when they overlap.
fn distance(a: (usize, usize), b: (usize, usize)) -> usize {
    if b.1 <= a.0 {
        a.0 - b.1
    } else if b.0 >= a.1 {
        b.0 - a.1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_and_code_lookup() {
        assert_eq!(currency_for_symbol("€"), Some(Currency::Eur));
        assert_eq!(currency_for_symbol("₹"), None);
        assert_eq!(currency_for_code("cad"), Some(Currency::Cad));
    }

    #[test]
    fn symbol_outranks_code_in_text() {
        assert_eq!(currency_in("£10 (about 12 EUR)"), Some(Currency::Gbp));
        assert_eq!(currency_in("10 aud"), Some(Currency::Aud));
        assert_eq!(currency_in("10"), None);
    }

    #[test]
    fn period_picks_nearest_keyword() {
        let text = "billed yearly or $10 per month";
        let start = text.find('$').unwrap();
        assert_eq!(period_near(text, (start, start + 3)), BillingPeriod::Monthly);
        assert_eq!(period_near("$10 once, lifetime access", (0, 3)), BillingPeriod::OneTime);
        assert_eq!(period_near("just $10", (5, 8)), BillingPeriod::Unknown);
    }

    #[test]
    fn bare_mo_inside_words_is_not_monthly() {
        assert_eq!(period_near("$10 for more mobile", (0, 3)), BillingPeriod::Unknown);
    }

    #[test]
    fn tier_requires_whole_words() {
        assert_eq!(tier_near("products $5", (9, 11)), None);
        assert_eq!(tier_near("Pro: $5", (5, 7)).as_deref(), Some("Pro"));
        assert_eq!(tier_near("ENTERPRISE $5", (11, 13)).as_deref(), Some("Enterprise"));
    }

    #[test]
    fn container_and_prominence_vocabularies() {
        assert!(is_container_name("PricingCard"));
        assert!(is_container_name("data-plan"));
        assert!(!is_container_name("hero"));
        assert!(is_prominent("font-size: 48px", ""));
        assert!(is_prominent("", "text-large bold"));
        assert!(!is_prominent("color: red", "muted"));
    }

    #[test]
    fn density_counts_distinct_keywords() {
        assert_eq!(pricing_density("Pricing plans: buy now"), 3);
        assert_eq!(pricing_density("about us"), 0);
    }
}
