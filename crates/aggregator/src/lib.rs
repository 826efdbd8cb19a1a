//! Volume attribution and time-bucketed aggregation for directional trade records.

pub mod attribution;
pub mod bucketing;
pub mod cumulative;
pub mod ranking;
pub mod series;
pub mod summary;
pub mod top_n;
pub mod window;

pub use attribution::{attribute_leg_volume, EntitySelector, Legs};
pub use bucketing::{
    aggregate_by_time_bucket, attributed_totals_by_bucket, total_series, totals_by_bucket,
};
pub use cumulative::{cumulative_series, cumulative_unique_wallets, CumulativePoint, RunningTotal};
pub use ranking::{EntityVolumeRanking, RankedEntity};
pub use series::{SeriesKey, SeriesPoint};
pub use summary::{summarize, DashboardSummary};
pub use top_n::select_top_n_with_other;
pub use window::{TimeRange, Window};
