use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::ranking::EntityVolumeRanking;
use crate::series::{sort_for_chart, SeriesKey, SeriesPoint};

/// Keeps the top-`n` ranked entities of `series` and folds the rest of each bucket's total
/// into an `Other` series.
///
/// `Other = max(0, total - sum(top_n))` per bucket. `totals_by_bucket` must count self-swaps
/// under the same policy as `series` (see `attributed_totals_by_bucket`). The ranking may come
/// from a different window than the totals, so the residual is clamped rather than allowed to
/// go negative.
/// When `Other` is zero in every bucket the series is left out entirely; otherwise it carries
/// one point per bucket.
pub fn select_top_n_with_other(
    ranking: &EntityVolumeRanking,
    n: usize,
    totals_by_bucket: &BTreeMap<DateTime<Utc>, Decimal>,
    series: &[SeriesPoint],
) -> Vec<SeriesPoint> {
    let top = ranking.top_set(n);

    let mut out: Vec<SeriesPoint> = Vec::new();
    let mut top_sums: BTreeMap<DateTime<Utc>, Decimal> = BTreeMap::new();
    for point in series {
        if let SeriesKey::Entity(id) = &point.series {
            if top.contains(id.as_str()) {
                let slot = top_sums.entry(point.bucket).or_default();
                *slot = slot.saturating_add(point.value);
                out.push(point.clone());
            }
        }
    }

    let mut clamped = 0_u32;
    let mut other: Vec<SeriesPoint> = Vec::with_capacity(totals_by_bucket.len());
    for (bucket, total) in totals_by_bucket {
        let top_sum = top_sums.get(bucket).copied().unwrap_or_default();
        let residual = *total - top_sum;
        if residual < Decimal::ZERO {
            clamped += 1;
        }
        other.push(SeriesPoint::new(
            *bucket,
            SeriesKey::Other,
            residual.max(Decimal::ZERO),
        ));
    }

    if clamped > 0 {
        tracing::debug!(
            buckets = clamped,
            "select_top_n_with_other: clamped negative residuals"
        );
    }

    if other.iter().any(|p| p.value > Decimal::ZERO) {
        out.extend(other);
    }
    sort_for_chart(&mut out);
    out
}
