use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use common::types::{Granularity, TradeRecord};
use serde::{Deserialize, Serialize};

use crate::series::SeriesPoint;

/// Look-back ranges offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    #[default]
    AllTime,
    LastWeek,
    LastMonth,
    Last3Months,
    Last6Months,
}

impl TimeRange {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AllTime => "All Time",
            Self::LastWeek => "Last Week",
            Self::LastMonth => "Last Month",
            Self::Last3Months => "Last 3 Months",
            Self::Last6Months => "Last 6 Months",
        }
    }

    pub fn days(&self) -> Option<i64> {
        match self {
            Self::AllTime => None,
            Self::LastWeek => Some(7),
            Self::LastMonth => Some(30),
            Self::Last3Months => Some(90),
            Self::Last6Months => Some(180),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|d| now - TimeDelta::days(d))
    }

    /// A bucket is in range when it starts strictly after `now - days`.
    pub fn retains(&self, bucket_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.cutoff(now) {
            Some(cutoff) => bucket_start > cutoff,
            None => true,
        }
    }

    pub fn filter_points(&self, points: Vec<SeriesPoint>, now: DateTime<Utc>) -> Vec<SeriesPoint> {
        points
            .into_iter()
            .filter(|p| self.retains(p.bucket, now))
            .collect()
    }

    /// Records whose `granularity` bucket is in range.
    pub fn filter_records<'a, I>(
        &self,
        records: I,
        granularity: Granularity,
        now: DateTime<Utc>,
    ) -> Vec<&'a TradeRecord>
    where
        I: IntoIterator<Item = &'a TradeRecord>,
    {
        records
            .into_iter()
            .filter(|r| self.retains(granularity.floor(r.timestamp), now))
            .collect()
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "all_time" => Ok(Self::AllTime),
            "week" | "last_week" | "7d" => Ok(Self::LastWeek),
            "month" | "last_month" | "30d" => Ok(Self::LastMonth),
            "3m" | "last_3_months" | "90d" => Ok(Self::Last3Months),
            "6m" | "last_6_months" | "180d" => Ok(Self::Last6Months),
            other => Err(format!("unknown time range: {other}")),
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn filter<'a, I>(&self, records: I) -> Vec<&'a TradeRecord>
    where
        I: IntoIterator<Item = &'a TradeRecord>,
    {
        records
            .into_iter()
            .filter(|r| self.contains(r.timestamp))
            .collect()
    }

    /// The calendar day before the one containing `now`.
    pub fn previous_day(now: DateTime<Utc>) -> Self {
        let today = Granularity::Day.floor(now);
        Self::new(today - TimeDelta::days(1), today)
    }

    /// The last complete calendar day before the newest trade, i.e. the day preceding the
    /// day of the latest timestamp. `None` when there are no records.
    pub fn latest_active_day<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a TradeRecord>,
    {
        let latest = records.into_iter().map(|r| r.timestamp).max()?;
        Some(Self::previous_day(latest))
    }
}
