use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::debug;

use super::{CaptureSource, RawCapture};
use crate::error::ArchiveError;
use crate::model::Capture;

/// Maps a target date to the closest capture within a tolerance window.
#[derive(Clone)]
pub struct SnapshotResolver {
    source: Arc<dyn CaptureSource>,
}

impl SnapshotResolver {
    pub fn new(source: Arc<dyn CaptureSource>) -> Self {
        Self { source }
    }

    /// `Ok(None)` when nothing lies within `tolerance_days` of `target`. Ties on
    /// distance go to the earliest capture.
    pub async fn resolve(
        &self,
        url: &str,
        target: NaiveDate,
        tolerance_days: u32,
    ) -> Result<Option<Capture>, ArchiveError> {
        let span = Days::new(u64::from(tolerance_days));
        let from = target.checked_sub_days(span).unwrap_or(NaiveDate::MIN);
        let to = target.checked_add_days(span).unwrap_or(NaiveDate::MAX);

        let captures = self.source.list_captures(url, Some(from), Some(to), None).await?;
        let Some((raw, distance)) = closest(&captures, target) else {
            debug!("No captures of {} near {}", url, target);
            return Ok(None);
        };
        if distance > u64::from(tolerance_days) {
            debug!(
                "Closest capture of {} is {} days from {}, beyond tolerance {}",
                url, distance, target, tolerance_days
            );
            return Ok(None);
        }

        Ok(Some(Capture::new(
            raw.original_url.clone(),
            raw.archived_url.clone(),
            raw.timestamp,
            raw.status_code,
            // bounded by tolerance_days above
            distance as u32,
        )))
    }
}

fn closest(captures: &[RawCapture], target: NaiveDate) -> Option<(&RawCapture, u64)> {
    captures
        .iter()
        .map(|c| (c, day_distance(c.timestamp.date(), target)))
        .min_by(|(a, da), (b, db)| da.cmp(db).then(a.timestamp.cmp(&b.timestamp)))
}

fn day_distance(a: NaiveDate, b: NaiveDate) -> u64 {
    (a - b).num_days().unsigned_abs()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(y: i32, m: u32, d: u32, hour: u32) -> RawCapture {
        let timestamp = date(y, m, d).and_hms_opt(hour, 0, 0).unwrap();
        RawCapture {
            timestamp,
            original_url: "https://example.com/pricing".into(),
            status_code: 200,
            archived_url: format!("https://archive/{}", timestamp.format("%Y%m%d%H%M%S")),
        }
    }

    /// Returns a fixed listing regardless of bounds, recording the requested window.
    struct FixedListing {
        captures: Vec<RawCapture>,
        fail: bool,
        windows: Mutex<Vec<(Option<NaiveDate>, Option<NaiveDate>)>>,
    }

    impl FixedListing {
        fn new(captures: Vec<RawCapture>) -> Arc<Self> {
            Arc::new(Self {
                captures,
                fail: false,
                windows: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CaptureSource for FixedListing {
        async fn list_captures(
            &self,
            url: &str,
            from: Option<NaiveDate>,
            to: Option<NaiveDate>,
            _limit: Option<usize>,
        ) -> Result<Vec<RawCapture>, ArchiveError> {
            self.windows.lock().unwrap().push((from, to));
            if self.fail {
                return Err(ArchiveError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            Ok(self.captures.clone())
        }
    }

    #[tokio::test]
    async fn picks_nearest_capture_and_records_offset() {
        let source = FixedListing::new(vec![raw(2021, 5, 20, 10), raw(2021, 6, 25, 10)]);
        let resolver = SnapshotResolver::new(source.clone());
        let capture = resolver
            .resolve("https://example.com/pricing", date(2021, 6, 1), 30)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(capture.date(), date(2021, 5, 20));
        assert_eq!(capture.offset_days, 12);
        assert!(!capture.is_exact_match);
        assert_eq!(
            source.windows.lock().unwrap()[0],
            (Some(date(2021, 5, 2)), Some(date(2021, 7, 1)))
        );
    }

    #[tokio::test]
    async fn equal_distances_prefer_the_earliest() {
        let source = FixedListing::new(vec![
            raw(2022, 1, 4, 9),
            raw(2021, 12, 29, 18),
            raw(2021, 12, 29, 6),
            raw(2022, 1, 8, 0),
        ]);
        let capture = SnapshotResolver::new(source)
            .resolve("https://example.com/pricing", date(2022, 1, 1), 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(capture.timestamp, date(2021, 12, 29).and_hms_opt(6, 0, 0).unwrap());
        assert_eq!(capture.offset_days, 3);
    }

    #[tokio::test]
    async fn same_day_capture_is_exact() {
        let source = FixedListing::new(vec![raw(2022, 4, 1, 23)]);
        let capture = SnapshotResolver::new(source)
            .resolve("https://example.com/pricing", date(2022, 4, 1), 45)
            .await
            .unwrap()
            .unwrap();
        assert!(capture.is_exact_match);
        assert_eq!(capture.offset_days, 0);
    }

    #[tokio::test]
    async fn captures_outside_tolerance_are_rejected() {
        // the listing ignores the requested window
        let source = FixedListing::new(vec![raw(2020, 1, 1, 0)]);
        let resolved = SnapshotResolver::new(source)
            .resolve("https://example.com/pricing", date(2022, 1, 1), 20)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn empty_listing_is_none() {
        let resolved = SnapshotResolver::new(FixedListing::new(Vec::new()))
            .resolve("https://example.com/pricing", date(2022, 1, 1), 20)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let source = Arc::new(FixedListing {
            captures: Vec::new(),
            fail: true,
            windows: Mutex::new(Vec::new()),
        });
        let err = SnapshotResolver::new(source)
            .resolve("https://example.com/pricing", date(2022, 1, 1), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Status { status: 503, .. }));
    }
}
