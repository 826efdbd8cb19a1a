//! Dashboard views computed from one fetch of the trades relation. All read-only.

use std::collections::BTreeMap;
use std::str::FromStr;

use aggregator::bucketing::{entity_series, trade_counts_by_bucket, unique_wallets_by_bucket};
use aggregator::{
    aggregate_by_time_bucket, attributed_totals_by_bucket, cumulative_series,
    cumulative_unique_wallets, select_top_n_with_other, summarize, total_series, totals_by_bucket,
    EntityVolumeRanking, TimeRange, Window,
};
use chrono::{DateTime, Utc};
use common::types::{EntityKind, Granularity, SwapPolicy, TradeRecord};
use rust_decimal::Decimal;

use crate::models::{
    ActivityBucket, ActivityView, CumulativeView, RankingView, SeriesView, SummaryView,
};

/// Entity name that selects the raw volume series instead of a single chain or asset.
pub const TOTAL_ENTITY: &str = "Total";

/// Which records a chart covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Range(TimeRange),
    /// The last complete day before the newest trade.
    LatestDay,
}

impl Span {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Range(range) => range.label(),
            Self::LatestDay => "Latest Active Day",
        }
    }

    /// Hourly for the single-day view, `fallback` otherwise.
    pub fn default_granularity(&self, fallback: Granularity) -> Granularity {
        match self {
            Self::LatestDay => Granularity::Hour,
            Self::Range(_) => fallback,
        }
    }

    pub fn select<'a>(
        &self,
        records: &'a [TradeRecord],
        granularity: Granularity,
        now: DateTime<Utc>,
    ) -> Vec<&'a TradeRecord> {
        match self {
            Self::Range(range) => range.filter_records(records, granularity, now),
            Self::LatestDay => Window::latest_active_day(records)
                .map_or_else(Vec::new, |window| window.filter(records)),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::Range(TimeRange::AllTime)
    }
}

impl FromStr for Span {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "latest_day" => Ok(Self::LatestDay),
            other => other.parse().map(Self::Range),
        }
    }
}

/// Window a ranking is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingSpan {
    #[default]
    AllTime,
    /// The calendar day before today.
    PreviousDay,
}

impl RankingSpan {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AllTime => "All Time",
            Self::PreviousDay => "Previous Day",
        }
    }
}

impl FromStr for RankingSpan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "all_time" => Ok(Self::AllTime),
            "day" | "previous_day" | "yesterday" => Ok(Self::PreviousDay),
            other => Err(format!("unknown ranking span: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Volume,
    Trades,
    Wallets,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Trades => "trades",
            Self::Wallets => "wallets",
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "volume" => Ok(Self::Volume),
            "trades" => Ok(Self::Trades),
            "wallets" | "users" => Ok(Self::Wallets),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}

/// Parameters shared by every chart view.
#[derive(Debug, Clone, Copy)]
pub struct ChartRequest {
    pub kind: EntityKind,
    pub granularity: Granularity,
    pub span: Span,
    pub policy: SwapPolicy,
    pub now: DateTime<Utc>,
}

impl ChartRequest {
    fn view(&self, points: Vec<aggregator::SeriesPoint>) -> SeriesView {
        SeriesView {
            kind: self.kind,
            granularity: self.granularity,
            span: self.span.label().to_string(),
            swap_policy: self.policy,
            no_data: points.is_empty(),
            points,
        }
    }
}

pub fn summary_view(records: &[TradeRecord]) -> SummaryView {
    SummaryView {
        no_data: records.is_empty(),
        summary: summarize(records),
    }
}

/// Top-`top_n` entities plus `Other` for the requested span.
///
/// Look-back ranges rank over all time, so entity order is the same for every range. The
/// latest-day view ranks over that day alone.
pub fn volume_breakdown(records: &[TradeRecord], req: &ChartRequest, top_n: usize) -> SeriesView {
    let selected = req.span.select(records, req.granularity, req.now);
    let ranking = match req.span {
        Span::Range(_) => EntityVolumeRanking::compute(records, &req.kind, req.policy),
        Span::LatestDay => {
            EntityVolumeRanking::compute(selected.iter().copied(), &req.kind, req.policy)
        }
    };
    let series = aggregate_by_time_bucket(
        selected.iter().copied(),
        req.granularity,
        &req.kind,
        req.policy,
    );
    let totals = attributed_totals_by_bucket(
        selected.iter().copied(),
        req.granularity,
        &req.kind,
        req.policy,
    );
    req.view(select_top_n_with_other(&ranking, top_n, &totals, &series))
}

/// One entity's series, or raw volume when `entity` is [`TOTAL_ENTITY`].
pub fn entity_volume(records: &[TradeRecord], req: &ChartRequest, entity: &str) -> SeriesView {
    let selected = req.span.select(records, req.granularity, req.now);
    let points = if entity.eq_ignore_ascii_case(TOTAL_ENTITY) {
        total_series(&totals_by_bucket(selected.iter().copied(), req.granularity))
    } else {
        let series = aggregate_by_time_bucket(
            selected.iter().copied(),
            req.granularity,
            &req.kind,
            req.policy,
        );
        entity_series(&series, entity)
    };
    req.view(points)
}

pub fn ranking_view(
    records: &[TradeRecord],
    kind: EntityKind,
    span: RankingSpan,
    policy: SwapPolicy,
    now: DateTime<Utc>,
) -> RankingView {
    let entities = match span {
        RankingSpan::AllTime => EntityVolumeRanking::compute(records, &kind, policy),
        RankingSpan::PreviousDay => {
            let window = Window::previous_day(now);
            EntityVolumeRanking::compute(window.filter(records), &kind, policy)
        }
    };
    RankingView {
        kind,
        span: span.label().to_string(),
        swap_policy: policy,
        no_data: entities.is_empty(),
        entities,
    }
}

pub fn cumulative_volume(
    records: &[TradeRecord],
    granularity: Granularity,
) -> CumulativeView<Decimal> {
    let points = cumulative_series(totals_by_bucket(records, granularity));
    CumulativeView {
        metric: Metric::Volume.as_str(),
        granularity,
        no_data: points.is_empty(),
        points,
    }
}

pub fn cumulative_trades(records: &[TradeRecord], granularity: Granularity) -> CumulativeView<u64> {
    let points = cumulative_series(trade_counts_by_bucket(records, granularity));
    CumulativeView {
        metric: Metric::Trades.as_str(),
        granularity,
        no_data: points.is_empty(),
        points,
    }
}

pub fn cumulative_wallets(
    records: &[TradeRecord],
    granularity: Granularity,
) -> CumulativeView<u64> {
    let points = cumulative_unique_wallets(records, granularity);
    CumulativeView {
        metric: Metric::Wallets.as_str(),
        granularity,
        no_data: points.is_empty(),
        points,
    }
}

/// Trade count and active wallets per bucket.
pub fn activity_view(
    records: &[TradeRecord],
    granularity: Granularity,
    span: Span,
    now: DateTime<Utc>,
) -> ActivityView {
    let selected = span.select(records, granularity, now);
    let wallets: BTreeMap<_, _> = unique_wallets_by_bucket(selected.iter().copied(), granularity)
        .into_iter()
        .collect();
    let buckets: Vec<ActivityBucket> = trade_counts_by_bucket(selected.iter().copied(), granularity)
        .into_iter()
        .map(|(bucket, trades)| ActivityBucket {
            bucket,
            trades,
            unique_wallets: wallets.get(&bucket).copied().unwrap_or_default(),
        })
        .collect();
    ActivityView {
        granularity,
        span: span.label().to_string(),
        no_data: buckets.is_empty(),
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator::SeriesKey;
    use chrono::{TimeDelta, TimeZone};
    use common::types::Volume;

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    fn trade(at: DateTime<Utc>, src: &str, dst: &str, volume: u64) -> TradeRecord {
        TradeRecord::new(at)
            .with_chains(src, dst)
            .with_volumes(Volume::from(volume), Volume::from(volume))
    }

    fn request(span: Span, granularity: Granularity) -> ChartRequest {
        ChartRequest {
            kind: EntityKind::Chain,
            granularity,
            span,
            policy: SwapPolicy::Full,
            now: ts(10, 12),
        }
    }

    #[test]
    fn test_parse_span() {
        assert_eq!("day".parse::<Span>(), Ok(Span::LatestDay));
        assert_eq!(
            "week".parse::<Span>(),
            Ok(Span::Range(TimeRange::LastWeek))
        );
        assert!("fortnight".parse::<Span>().is_err());
        assert_eq!(Span::default(), Span::Range(TimeRange::AllTime));
    }

    #[test]
    fn test_parse_ranking_span_and_metric() {
        assert_eq!("yesterday".parse::<RankingSpan>(), Ok(RankingSpan::PreviousDay));
        assert!("week".parse::<RankingSpan>().is_err());
        assert_eq!("users".parse::<Metric>(), Ok(Metric::Wallets));
        assert!("fees".parse::<Metric>().is_err());
    }

    #[test]
    fn test_breakdown_folds_tail_into_other() {
        let records = vec![
            trade(ts(1, 3), "eth", "polygon", 50),
            trade(ts(1, 4), "base", "solana", 5),
        ];
        let view = volume_breakdown(&records, &request(Span::default(), Granularity::Day), 2);
        let keys: Vec<_> = view.points.iter().map(|p| p.series.as_str()).collect();
        assert_eq!(keys, vec!["eth", "polygon", "Other"]);
        let other = view
            .points
            .iter()
            .find(|p| p.series == SeriesKey::Other)
            .map(|p| p.value);
        assert_eq!(other, Some(Decimal::from(10)));
        assert!(!view.no_data);
    }

    #[test]
    fn test_halved_breakdown_has_no_other_when_every_entity_is_shown() {
        let records = vec![
            trade(ts(1, 3), "eth", "polygon", 100),
            trade(ts(1, 4), "eth", "eth", 50),
        ];
        let mut req = request(Span::default(), Granularity::Day);
        req.policy = SwapPolicy::Halved;
        let view = volume_breakdown(&records, &req, 8);
        let got: Vec<_> = view
            .points
            .iter()
            .map(|p| (p.series.as_str(), p.value))
            .collect();
        assert_eq!(
            got,
            vec![("eth", Decimal::from(150)), ("polygon", Decimal::from(100))]
        );
    }

    #[test]
    fn test_halved_breakdown_other_is_the_excluded_entities() {
        let records = vec![
            trade(ts(1, 3), "eth", "polygon", 100),
            trade(ts(1, 4), "eth", "eth", 50),
            trade(ts(1, 5), "base", "base", 8),
        ];
        let mut req = request(Span::default(), Granularity::Day);
        req.policy = SwapPolicy::Halved;
        let view = volume_breakdown(&records, &req, 2);
        let other: Vec<_> = view
            .points
            .iter()
            .filter(|p| p.series == SeriesKey::Other)
            .map(|p| p.value)
            .collect();
        assert_eq!(other, vec![Decimal::from(8)]);
    }

    #[test]
    fn test_latest_day_ranks_within_the_day() {
        // Polygon dominates all time; base leads on the day being shown.
        let records = vec![
            trade(ts(1, 3), "polygon", "solana", 1000),
            trade(ts(4, 7), "base", "base", 30),
            trade(ts(4, 9), "polygon", "arbitrum", 5),
            trade(ts(5, 1), "eth", "eth", 1),
        ];
        let view = volume_breakdown(&records, &request(Span::LatestDay, Granularity::Hour), 1);
        let entities: Vec<_> = view
            .points
            .iter()
            .filter(|p| matches!(p.series, SeriesKey::Entity(_)))
            .map(|p| p.series.as_str())
            .collect();
        assert_eq!(entities, vec!["base"]);
    }

    #[test]
    fn test_latest_day_span_is_hourly_and_bounded() {
        let records = vec![
            trade(ts(1, 3), "eth", "polygon", 1),
            trade(ts(4, 7), "eth", "polygon", 2),
            trade(ts(4, 9), "eth", "base", 3),
            trade(ts(5, 1), "eth", "polygon", 4),
        ];
        let span = Span::LatestDay;
        let granularity = span.default_granularity(Granularity::Day);
        assert_eq!(granularity, Granularity::Hour);
        let view = volume_breakdown(&records, &request(span, granularity), 8);
        let buckets: Vec<_> = view.points.iter().map(|p| p.bucket).collect();
        assert!(buckets.iter().all(|b| *b >= ts(4, 0) && *b < ts(5, 0)));
        assert!(buckets.contains(&ts(4, 7)));
        assert!(buckets.contains(&ts(4, 9)));
    }

    #[test]
    fn test_entity_volume_total_is_raw_volume() {
        let records = vec![
            trade(ts(1, 3), "eth", "eth", 10),
            trade(ts(2, 3), "eth", "polygon", 5),
        ];
        let req = request(Span::default(), Granularity::Day);
        let total = entity_volume(&records, &req, "total");
        let values: Vec<_> = total.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![Decimal::from(20), Decimal::from(10)]);
        assert!(total.points.iter().all(|p| p.series == SeriesKey::Total));

        let polygon = entity_volume(&records, &req, "polygon");
        assert_eq!(polygon.points.len(), 1);
        assert_eq!(polygon.points[0].value, Decimal::from(5));

        let unknown = entity_volume(&records, &req, "cosmos");
        assert!(unknown.no_data);
    }

    #[test]
    fn test_ranking_previous_day() {
        let now = ts(10, 12);
        let records = vec![
            trade(ts(9, 1), "eth", "polygon", 5),
            trade(ts(9, 2), "base", "base", 50),
            trade(ts(8, 2), "solana", "eth", 500),
            trade(now, "arbitrum", "eth", 5000),
        ];
        let view = ranking_view(
            &records,
            EntityKind::Chain,
            RankingSpan::PreviousDay,
            SwapPolicy::Full,
            now,
        );
        let names = view.entities.entity_names();
        assert_eq!(names, vec!["base", "eth", "polygon"]);

        let all = ranking_view(
            &records,
            EntityKind::Chain,
            RankingSpan::AllTime,
            SwapPolicy::Full,
            now,
        );
        assert_eq!(all.entities.len(), 5);
    }

    #[test]
    fn test_cumulative_views() {
        let records = vec![
            trade(ts(1, 3), "eth", "polygon", 1)
                .with_transaction_id("a")
                .with_wallet("w1"),
            trade(ts(1, 3), "polygon", "eth", 1)
                .with_transaction_id("a")
                .with_wallet("w1"),
            trade(ts(2, 3), "eth", "base", 3)
                .with_transaction_id("b")
                .with_wallet("w2"),
        ];
        let volume = cumulative_volume(&records, Granularity::Day);
        assert_eq!(
            volume.points.last().map(|p| p.running_total),
            Some(Decimal::from(10))
        );
        let trades = cumulative_trades(&records, Granularity::Day);
        let counts: Vec<_> = trades.points.iter().map(|p| p.running_total).collect();
        assert_eq!(counts, vec![1, 2]);
        let wallets = cumulative_wallets(&records, Granularity::Day);
        assert_eq!(wallets.points.last().map(|p| p.running_total), Some(2));
        assert_eq!(wallets.metric, "wallets");
    }

    #[test]
    fn test_activity_view_merges_counts() {
        let now = ts(10, 12);
        let records = vec![
            trade(now - TimeDelta::hours(30), "eth", "base", 1).with_wallet("w1"),
            trade(now - TimeDelta::hours(30), "eth", "base", 1).with_wallet("w2"),
            trade(now - TimeDelta::days(40), "eth", "base", 1).with_wallet("w3"),
        ];
        let view = activity_view(
            &records,
            Granularity::Day,
            Span::Range(TimeRange::LastMonth),
            now,
        );
        assert_eq!(view.buckets.len(), 1);
        assert_eq!(view.buckets[0].trades, 2);
        assert_eq!(view.buckets[0].unique_wallets, 2);
    }

    #[test]
    fn test_empty_records_are_no_data() {
        let req = request(Span::default(), Granularity::Day);
        assert!(volume_breakdown(&[], &req, 5).no_data);
        assert!(summary_view(&[]).no_data);
        assert!(cumulative_volume(&[], Granularity::Day).no_data);
        assert!(activity_view(&[], Granularity::Day, Span::LatestDay, req.now).no_data);
    }
}
