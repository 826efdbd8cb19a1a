use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use common::types::{Granularity, SwapPolicy, TradeRecord};
use rust_decimal::Decimal;

use crate::attribution::{attribute_leg_volume, EntitySelector};
use crate::series::{sort_for_chart, SeriesKey, SeriesPoint};

/// Attributed volume per `(bucket, entity)`, in chart order.
///
/// Each record contributes once to every distinct entity it touches. Records whose legs carry
/// no entity contribute nothing; no `""` series is ever produced.
pub fn aggregate_by_time_bucket<'a, I, S>(
    records: I,
    granularity: Granularity,
    selector: &S,
    policy: SwapPolicy,
) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = &'a TradeRecord>,
    S: EntitySelector + ?Sized,
{
    let mut buckets: HashMap<(DateTime<Utc>, &'a str), Decimal> = HashMap::new();
    let mut seen = 0_u64;

    for record in records {
        seen += 1;
        let bucket = granularity.floor(record.timestamp);
        for entity in selector.legs(record).touched() {
            let slot = buckets.entry((bucket, entity)).or_default();
            *slot = slot.saturating_add(attribute_leg_volume(record, selector, entity, policy));
        }
    }

    metrics::counter!("aggregator_records_total").increment(seen);
    tracing::debug!(
        records = seen,
        buckets = buckets.len(),
        granularity = granularity.as_str(),
        policy = policy.as_str(),
        "aggregate_by_time_bucket"
    );

    let mut points: Vec<SeriesPoint> = buckets
        .into_iter()
        .map(|((bucket, entity), value)| SeriesPoint::new(bucket, SeriesKey::entity(entity), value))
        .collect();
    sort_for_chart(&mut points);
    points
}

/// Raw volume (both legs, uncorrected) per bucket.
pub fn totals_by_bucket<'a, I>(
    records: I,
    granularity: Granularity,
) -> BTreeMap<DateTime<Utc>, Decimal>
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    let mut totals = BTreeMap::new();
    for record in records {
        let slot = totals
            .entry(granularity.floor(record.timestamp))
            .or_insert(Decimal::ZERO);
        *slot = slot.saturating_add(record.total_volume());
    }
    totals
}

/// Volume per bucket as the entity breakdown counts it.
///
/// Self-swaps are corrected by `policy` exactly as in [`aggregate_by_time_bucket`]; every other
/// row keeps both legs, including legs with no entity. Under `SwapPolicy::Full` this equals
/// [`totals_by_bucket`].
pub fn attributed_totals_by_bucket<'a, I, S>(
    records: I,
    granularity: Granularity,
    selector: &S,
    policy: SwapPolicy,
) -> BTreeMap<DateTime<Utc>, Decimal>
where
    I: IntoIterator<Item = &'a TradeRecord>,
    S: EntitySelector + ?Sized,
{
    let mut totals = BTreeMap::new();
    for record in records {
        let volume = if selector.legs(record).is_self_swap() {
            policy.self_swap_volume(record.source_volume, record.dest_volume)
        } else {
            record.total_volume()
        };
        let slot = totals
            .entry(granularity.floor(record.timestamp))
            .or_insert(Decimal::ZERO);
        *slot = slot.saturating_add(volume);
    }
    totals
}

/// The `Total` series: one point per bucket carrying raw volume.
pub fn total_series(totals: &BTreeMap<DateTime<Utc>, Decimal>) -> Vec<SeriesPoint> {
    totals
        .iter()
        .map(|(bucket, value)| SeriesPoint::new(*bucket, SeriesKey::Total, *value))
        .collect()
}

/// Points of one entity out of an aggregated series.
pub fn entity_series(points: &[SeriesPoint], entity: &str) -> Vec<SeriesPoint> {
    points
        .iter()
        .filter(|p| matches!(&p.series, SeriesKey::Entity(id) if id == entity))
        .cloned()
        .collect()
}

/// Distinct trades per bucket.
///
/// Legs of one trade share a transaction id, so ids are deduplicated within a bucket.
/// Rows without an id count as one trade each.
pub fn trade_counts_by_bucket<'a, I>(
    records: I,
    granularity: Granularity,
) -> Vec<(DateTime<Utc>, u64)>
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    let mut buckets: BTreeMap<DateTime<Utc>, (HashSet<&'a str>, u64)> = BTreeMap::new();
    for record in records {
        let (ids, anonymous) = buckets
            .entry(granularity.floor(record.timestamp))
            .or_default();
        match record.transaction_id.as_deref() {
            Some(id) => {
                ids.insert(id);
            }
            None => *anonymous += 1,
        }
    }
    buckets
        .into_iter()
        .map(|(bucket, (ids, anonymous))| (bucket, ids.len() as u64 + anonymous))
        .collect()
}

/// Distinct wallets active in each bucket.
pub fn unique_wallets_by_bucket<'a, I>(
    records: I,
    granularity: Granularity,
) -> Vec<(DateTime<Utc>, u64)>
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    wallets_by_bucket(records, granularity)
        .into_iter()
        .map(|(bucket, wallets)| (bucket, wallets.len() as u64))
        .collect()
}

pub(crate) fn wallets_by_bucket<'a, I>(
    records: I,
    granularity: Granularity,
) -> BTreeMap<DateTime<Utc>, HashSet<&'a str>>
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    let mut buckets: BTreeMap<DateTime<Utc>, HashSet<&'a str>> = BTreeMap::new();
    for record in records {
        let wallets = buckets
            .entry(granularity.floor(record.timestamp))
            .or_default();
        if let Some(wallet) = record.wallet.as_deref().filter(|w| !w.is_empty()) {
            wallets.insert(wallet);
        }
    }
    buckets
}
