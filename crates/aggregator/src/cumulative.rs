use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use common::types::{Granularity, TradeRecord};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::bucketing::wallets_by_bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CumulativePoint<T> {
    pub timestamp: DateTime<Utc>,
    pub running_total: T,
}

/// Quantities a running total can be kept over. Accumulation saturates instead of overflowing.
pub trait RunningTotal: Copy + Default {
    fn accumulate(self, value: Self) -> Self;
}

impl RunningTotal for Decimal {
    fn accumulate(self, value: Self) -> Self {
        self.saturating_add(value)
    }
}

impl RunningTotal for u64 {
    fn accumulate(self, value: Self) -> Self {
        self.saturating_add(value)
    }
}

/// Running sum over strictly ascending timestamps.
///
/// Points sharing a timestamp (e.g. several entities in one bucket) are collapsed first, so
/// the output has one point per distinct timestamp.
pub fn cumulative_series<T, I>(points: I) -> Vec<CumulativePoint<T>>
where
    I: IntoIterator<Item = (DateTime<Utc>, T)>,
    T: RunningTotal,
{
    let mut per_ts: BTreeMap<DateTime<Utc>, T> = BTreeMap::new();
    for (ts, value) in points {
        let slot = per_ts.entry(ts).or_default();
        *slot = slot.accumulate(value);
    }

    let mut running = T::default();
    per_ts
        .into_iter()
        .map(|(timestamp, value)| {
            running = running.accumulate(value);
            CumulativePoint {
                timestamp,
                running_total: running,
            }
        })
        .collect()
}

/// Number of distinct wallets seen up to and including each bucket.
///
/// This is the cardinality of a growing union, not a sum of per-bucket counts: a wallet
/// active in many buckets is counted once.
pub fn cumulative_unique_wallets<'a, I>(
    records: I,
    granularity: Granularity,
) -> Vec<CumulativePoint<u64>>
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    let mut seen: HashSet<&'a str> = HashSet::new();
    wallets_by_bucket(records, granularity)
        .into_iter()
        .map(|(timestamp, wallets)| {
            seen.extend(wallets);
            CumulativePoint {
                timestamp,
                running_total: seen.len() as u64,
            }
        })
        .collect()
}
