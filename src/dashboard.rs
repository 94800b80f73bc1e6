use crate::metrics::{compute_metrics, MetricsDisplay, MetricsResult};
use crate::models::CustomerRecord;
use crate::segments::{compute_segments, SegmentResult};
use chrono::{DateTime, DurationRound, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Everything the overview and lists screens render for one reference instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub as_of: DateTime<Utc>,
    pub metrics: MetricsResult,
    /// Absent when there is no data to display.
    pub display: Option<MetricsDisplay>,
    pub segments: Vec<SegmentResult>,
}

impl DashboardOverview {
    pub fn build(customers: &[CustomerRecord], as_of: DateTime<Utc>) -> Self {
        let metrics = compute_metrics(customers, as_of);
        let display = metrics.display();
        Self {
            as_of,
            metrics,
            display,
            segments: compute_segments(customers, as_of),
        }
    }
}

/// SHA-256 over the serialized snapshot and the reference instant, hex encoded.
///
/// Two snapshots with identical content share a fingerprint regardless of
/// where they came from.
pub fn snapshot_fingerprint(customers: &[CustomerRecord], as_of: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    for customer in customers {
        hasher.update(serde_json::to_vec(customer).unwrap_or_default());
        hasher.update(b"\n");
    }
    hasher.update(as_of.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

/// Truncates `now` to `resolution` so that requests without an explicit
/// `as_of` inside the same window share memo entries.
pub fn reference_instant(now: DateTime<Utc>, resolution: Duration) -> DateTime<Utc> {
    if resolution.is_zero() {
        return now;
    }
    chrono::Duration::from_std(resolution)
        .ok()
        .and_then(|step| now.duration_trunc(step).ok())
        .unwrap_or(now)
}

/// Memoizes overviews keyed by [`snapshot_fingerprint`].
#[derive(Clone)]
pub struct OverviewMemo {
    cache: Cache<String, Arc<DashboardOverview>>,
}

impl OverviewMemo {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    pub async fn get_or_build(
        &self,
        customers: &[CustomerRecord],
        as_of: DateTime<Utc>,
    ) -> Arc<DashboardOverview> {
        let key = snapshot_fingerprint(customers, as_of);

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("Overview memo hit for {}", &key[..12]);
            return hit;
        }

        let overview = Arc::new(DashboardOverview::build(customers, as_of));
        self.cache.insert(key, overview.clone()).await;
        overview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn customers() -> Vec<CustomerRecord> {
        vec![
            CustomerRecord {
                id: "a".into(),
                lead_score: 90.0,
                ..Default::default()
            },
            CustomerRecord {
                id: "b".into(),
                lead_score: 40.0,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_fingerprint_consistency() {
        let a = snapshot_fingerprint(&customers(), as_of());
        let b = snapshot_fingerprint(&customers(), as_of());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = customers();
        changed[1].lead_score = 41.0;
        assert_ne!(a, snapshot_fingerprint(&changed, as_of()));
        assert_ne!(
            a,
            snapshot_fingerprint(&customers(), as_of() + chrono::Duration::seconds(1))
        );
    }

    #[test]
    fn test_reference_instant_truncates() {
        let now = DateTime::parse_from_rfc3339("2024-06-15T12:34:56.789Z")
            .unwrap()
            .with_timezone(&Utc);
        let truncated = reference_instant(now, Duration::from_secs(60));
        assert_eq!(truncated.to_rfc3339(), "2024-06-15T12:34:00+00:00");
        assert_eq!(reference_instant(now, Duration::ZERO), now);
    }

    #[test]
    fn test_build_bundles_both_views() {
        let overview = DashboardOverview::build(&customers(), as_of());
        assert_eq!(overview.metrics.total_customers, 2);
        assert_eq!(overview.segments.len(), 6);
        assert!(overview.display.is_some());
    }

    #[tokio::test]
    async fn test_memo_returns_shared_entry() {
        let memo = OverviewMemo::new(Duration::from_secs(60), 100);
        let first = memo.get_or_build(&customers(), as_of()).await;
        let second = memo.get_or_build(&customers(), as_of()).await;
        assert!(Arc::ptr_eq(&first, &second));

        let later = memo
            .get_or_build(&customers(), as_of() + chrono::Duration::days(1))
            .await;
        assert!(!Arc::ptr_eq(&first, &later));
    }
}
