use chrono::NaiveDate;

use crate::model::{ExtractionResult, TimeSeries};

/// Wraps per-capture results into a series. Input order is kept as-is.
pub fn assemble(
    url: impl Into<String>,
    results: Vec<ExtractionResult>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_resolved: usize,
) -> TimeSeries {
    let successful_extractions = results.iter().filter(|r| r.has_prices()).count();
    TimeSeries {
        url: url.into(),
        results,
        start_date,
        end_date,
        // keeps success_rate within [0, 1]
        total_snapshots: total_resolved.max(successful_extractions),
        successful_extractions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BillingPeriod, Capture, Currency, ExtractionMethod, PriceCandidate, RealismBand,
    };

    fn result(day: u32, values: &[f64]) -> ExtractionResult {
        let ts = NaiveDate::from_ymd_opt(2022, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let capture = Capture::new("https://example.com", format!("https://archive/{day}"), ts, 200, 0);
        ExtractionResult {
            capture,
            candidates: values
                .iter()
                .filter_map(|v| {
                    PriceCandidate::detected(
                        &RealismBand::default(),
                        *v,
                        Currency::Usd,
                        BillingPeriod::Monthly,
                        None,
                        format!("${v}"),
                        0.8,
                        ExtractionMethod::Pattern,
                    )
                })
                .collect(),
            document_length: 100,
            elapsed_ms: 2.5,
            errors: vec![],
        }
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        )
    }

    #[test]
    fn counts_results_with_prices() {
        let (start, end) = range();
        let series = assemble(
            "https://example.com",
            vec![result(1, &[10.0]), result(2, &[]), result(3, &[10.0, 20.0]), result(4, &[])],
            start,
            end,
            4,
        );
        assert_eq!(series.total_snapshots, 4);
        assert_eq!(series.successful_extractions, 2);
        assert_eq!(series.success_rate(), 0.5);
        assert_eq!(series.rows().len(), 3);
    }

    #[test]
    fn keeps_input_order() {
        let (start, end) = range();
        let series = assemble("u", vec![result(9, &[1.0]), result(3, &[2.0])], start, end, 2);
        let days: Vec<String> = series
            .results
            .iter()
            .map(|r| r.capture.archived_url.clone())
            .collect();
        assert_eq!(days, vec!["https://archive/9", "https://archive/3"]);
    }

    #[test]
    fn empty_series_has_zero_rate() {
        let (start, end) = range();
        let series = assemble("u", Vec::new(), start, end, 0);
        assert_eq!(series.total_snapshots, 0);
        assert_eq!(series.success_rate(), 0.0);
    }

    #[test]
    fn rate_never_exceeds_one() {
        let (start, end) = range();
        let series = assemble("u", vec![result(1, &[5.0]), result(2, &[6.0])], start, end, 1);
        assert_eq!(series.success_rate(), 1.0);
    }
}
