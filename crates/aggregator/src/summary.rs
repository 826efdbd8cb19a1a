use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::types::TradeRecord;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::window::Window;

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_volume: Decimal,
    pub trade_count: u64,
    pub unique_wallets: u64,
    /// Raw volume over the last complete day of trading.
    pub latest_day_volume: Decimal,
    pub latest_day: Option<Window>,
    pub first_trade_at: Option<DateTime<Utc>>,
    pub last_trade_at: Option<DateTime<Utc>>,
}

pub fn summarize(records: &[TradeRecord]) -> DashboardSummary {
    let latest_day = Window::latest_active_day(records);

    let mut total_volume = Decimal::ZERO;
    let mut latest_day_volume = Decimal::ZERO;
    let mut ids: HashSet<&str> = HashSet::new();
    let mut anonymous = 0_u64;
    let mut wallets: HashSet<&str> = HashSet::new();

    for record in records {
        total_volume = total_volume.saturating_add(record.total_volume());
        if latest_day.is_some_and(|w| w.contains(record.timestamp)) {
            latest_day_volume = latest_day_volume.saturating_add(record.total_volume());
        }
        match record.transaction_id.as_deref() {
            Some(id) => {
                ids.insert(id);
            }
            None => anonymous += 1,
        }
        if let Some(wallet) = record.wallet.as_deref().filter(|w| !w.is_empty()) {
            wallets.insert(wallet);
        }
    }

    DashboardSummary {
        total_volume,
        trade_count: ids.len() as u64 + anonymous,
        unique_wallets: wallets.len() as u64,
        latest_day_volume,
        latest_day,
        first_trade_at: records.iter().map(|r| r.timestamp).min(),
        last_trade_at: records.iter().map(|r| r.timestamp).max(),
    }
}
