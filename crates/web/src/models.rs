use aggregator::{CumulativePoint, DashboardSummary, EntityVolumeRanking, SeriesPoint};
use chrono::{DateTime, Utc};
use common::types::{EntityKind, Granularity, SwapPolicy};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub no_data: bool,
    #[serde(flatten)]
    pub summary: DashboardSummary,
}

/// Chart payload. `points` are `(bucket, series, value)` triples already in render order.
#[derive(Debug, Serialize)]
pub struct SeriesView {
    pub kind: EntityKind,
    pub granularity: Granularity,
    pub span: String,
    pub swap_policy: SwapPolicy,
    pub no_data: bool,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct RankingView {
    pub kind: EntityKind,
    pub span: String,
    pub swap_policy: SwapPolicy,
    pub no_data: bool,
    pub entities: EntityVolumeRanking,
}

#[derive(Debug, Serialize)]
pub struct CumulativeView<T> {
    pub metric: &'static str,
    pub granularity: Granularity,
    pub no_data: bool,
    pub points: Vec<CumulativePoint<T>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityBucket {
    pub bucket: DateTime<Utc>,
    pub trades: u64,
    pub unique_wallets: u64,
}

#[derive(Debug, Serialize)]
pub struct ActivityView {
    pub granularity: Granularity,
    pub span: String,
    pub no_data: bool,
    pub buckets: Vec<ActivityBucket>,
}
