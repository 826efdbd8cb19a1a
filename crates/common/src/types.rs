use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// USD-equivalent quantity on one leg of a trade. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Volume(Decimal);

impl Volume {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Returns `None` for negative quantities.
    pub fn new(value: Decimal) -> Option<Self> {
        (value >= Decimal::ZERO).then_some(Self(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl From<u64> for Volume {
    fn from(value: u64) -> Self {
        Self(Decimal::from(value))
    }
}

/// Which pair of legs an entity is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Chain,
    Asset,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Asset => "asset",
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chain" | "chains" => Ok(Self::Chain),
            "asset" | "assets" => Ok(Self::Asset),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width of a chart bucket. Boundaries are aligned to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let into_bucket = secs.rem_euclid(self.seconds());
        ts - TimeDelta::seconds(into_bucket)
            - TimeDelta::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Self::Hour),
            "day" | "daily" => Ok(Self::Day),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

/// How a self-swap (same entity on both legs) is attributed to that entity.
///
/// Historical queries disagreed here: some summed both legs, others halved the sum.
/// The choice is explicit configuration rather than a per-query accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapPolicy {
    /// Attribute `source_volume + dest_volume`.
    #[default]
    Full,
    /// Attribute `(source_volume + dest_volume) / 2`.
    Halved,
}

impl SwapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Halved => "halved",
        }
    }

    pub fn self_swap_volume(&self, source: Volume, dest: Volume) -> Decimal {
        let total = source.value().saturating_add(dest.value());
        match self {
            Self::Full => total,
            Self::Halved => total / Decimal::TWO,
        }
    }
}

impl FromStr for SwapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "halved" | "half" => Ok(Self::Halved),
            other => Err(format!("unknown swap policy: {other}")),
        }
    }
}

/// One directional trade as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    /// Shared by both legs of a trade, so not unique per row.
    pub transaction_id: Option<String>,
    pub source_chain: Option<String>,
    pub dest_chain: Option<String>,
    pub source_asset: Option<String>,
    pub dest_asset: Option<String>,
    pub source_volume: Volume,
    pub dest_volume: Volume,
    pub wallet: Option<String>,
}

/// Empty and absent identifiers both mean "no entity".
pub fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|s| !s.is_empty())
}

fn owned_id(id: &str) -> Option<String> {
    (!id.is_empty()).then(|| id.to_string())
}

impl TradeRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            transaction_id: None,
            source_chain: None,
            dest_chain: None,
            source_asset: None,
            dest_asset: None,
            source_volume: Volume::ZERO,
            dest_volume: Volume::ZERO,
            wallet: None,
        }
    }

    pub fn with_transaction_id(mut self, id: &str) -> Self {
        self.transaction_id = owned_id(id);
        self
    }

    pub fn with_chains(mut self, source: &str, dest: &str) -> Self {
        self.source_chain = owned_id(source);
        self.dest_chain = owned_id(dest);
        self
    }

    pub fn with_assets(mut self, source: &str, dest: &str) -> Self {
        self.source_asset = owned_id(source);
        self.dest_asset = owned_id(dest);
        self
    }

    pub fn with_volumes(mut self, source: Volume, dest: Volume) -> Self {
        self.source_volume = source;
        self.dest_volume = dest;
        self
    }

    pub fn with_wallet(mut self, wallet: &str) -> Self {
        self.wallet = owned_id(wallet);
        self
    }

    /// Raw volume of the row: both legs summed, no self-swap correction.
    ///
    /// Saturates at `Decimal::MAX`; parsed rows never get there.
    pub fn total_volume(&self) -> Decimal {
        self.source_volume
            .value()
            .saturating_add(self.dest_volume.value())
    }

    pub fn source_entity(&self, kind: EntityKind) -> Option<&str> {
        let id = match kind {
            EntityKind::Chain => self.source_chain.as_deref(),
            EntityKind::Asset => self.source_asset.as_deref(),
        };
        non_empty(id)
    }

    pub fn dest_entity(&self, kind: EntityKind) -> Option<&str> {
        let id = match kind {
            EntityKind::Chain => self.dest_chain.as_deref(),
            EntityKind::Asset => self.dest_asset.as_deref(),
        };
        non_empty(id)
    }
}
