use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Series a chart point belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesKey {
    Entity(String),
    /// Residual of everything outside a top-N cut.
    Other,
    /// Raw volume across all entities.
    Total,
}

impl SeriesKey {
    pub fn entity(id: impl Into<String>) -> Self {
        Self::Entity(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Entity(id) => id,
            Self::Other => "Other",
            Self::Total => "Total",
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SeriesKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// `(bucket, series, value)` triple handed to the chart renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub bucket: DateTime<Utc>,
    pub series: SeriesKey,
    pub value: Decimal,
}

impl SeriesPoint {
    pub fn new(bucket: DateTime<Utc>, series: SeriesKey, value: Decimal) -> Self {
        Self {
            bucket,
            series,
            value,
        }
    }
}

/// Bucket ascending, then value descending, then series key ascending.
pub fn chart_order(a: &SeriesPoint, b: &SeriesPoint) -> Ordering {
    a.bucket
        .cmp(&b.bucket)
        .then_with(|| b.value.cmp(&a.value))
        .then_with(|| a.series.cmp(&b.series))
}

pub fn sort_for_chart(points: &mut [SeriesPoint]) {
    points.sort_by(chart_order);
}
