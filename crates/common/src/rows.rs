//! Row-to-record data contract for tables returned by a query executor.
//!
//! Rows are JSON objects. Column names follow the store's `main_volume_table` with a few
//! accepted aliases; empty strings and nulls are treated as absent.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::DataContractError;
use crate::types::{TradeRecord, Volume};

pub type Row = serde_json::Map<String, Value>;

const TIMESTAMP: &[&str] = &["timestamp", "block_timestamp"];
const TRANSACTION_ID: &[&str] = &["transaction_id", "order_uuid", "tx_hash"];
const SOURCE_CHAIN: &[&str] = &["source_chain"];
const DEST_CHAIN: &[&str] = &["dest_chain"];
const SOURCE_ASSET: &[&str] = &["source_asset", "source_id"];
const DEST_ASSET: &[&str] = &["dest_asset", "dest_id"];
const SOURCE_VOLUME: &[&str] = &["source_volume"];
const DEST_VOLUME: &[&str] = &["dest_volume"];
const WALLET: &[&str] = &["wallet", "sender_address", "maker_address"];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Ordered rows as produced by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    /// Accepts a bare array of rows or the RPC envelope `{"result": [...]}`.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DataContractError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DataContractError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut envelope) => match envelope.remove("result") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) => Vec::new(),
                _ => return Err(DataContractError::InvalidEnvelope),
            },
            _ => return Err(DataContractError::InvalidEnvelope),
        };

        let rows = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                other => Err(DataContractError::NotAnObject {
                    row: i,
                    kind: json_kind(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Converts every row, failing on the first contract violation.
    ///
    /// The volume of the whole table must itself be representable, so every sum taken over a
    /// subset of the records fits as well.
    pub fn to_records(&self) -> Result<Vec<TradeRecord>, DataContractError> {
        let records = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_record(i, row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut table_volume = Decimal::ZERO;
        for (row, record) in records.iter().enumerate() {
            table_volume = table_volume
                .checked_add(record.total_volume())
                .ok_or(DataContractError::VolumeOverflow { row })?;
        }
        Ok(records)
    }
}

pub fn parse_record(index: usize, row: &Row) -> Result<TradeRecord, DataContractError> {
    let timestamp = match column(row, TIMESTAMP) {
        Some(v) => parse_timestamp(index, v)?,
        None => return Err(DataContractError::MissingTimestamp { row: index }),
    };

    let source_volume = volume(index, row, SOURCE_VOLUME, "source_volume")?;
    let dest_volume = volume(index, row, DEST_VOLUME, "dest_volume")?;
    if source_volume.value().checked_add(dest_volume.value()).is_none() {
        return Err(DataContractError::VolumeOverflow { row: index });
    }

    Ok(TradeRecord {
        timestamp,
        transaction_id: identifier(row, TRANSACTION_ID),
        source_chain: identifier(row, SOURCE_CHAIN),
        dest_chain: identifier(row, DEST_CHAIN),
        source_asset: identifier(row, SOURCE_ASSET),
        dest_asset: identifier(row, DEST_ASSET),
        source_volume,
        dest_volume,
        wallet: identifier(row, WALLET),
    })
}

fn column<'r>(row: &'r Row, names: &[&str]) -> Option<&'r Value> {
    names
        .iter()
        .filter_map(|name| row.get(*name))
        .find(|v| !v.is_null())
}

fn identifier(row: &Row, names: &[&str]) -> Option<String> {
    match column(row, names)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A missing leg volume is zero; anything present must be a non-negative number.
fn volume(
    index: usize,
    row: &Row,
    names: &[&str],
    column_name: &'static str,
) -> Result<Volume, DataContractError> {
    let Some(value) = column(row, names) else {
        return Ok(Volume::ZERO);
    };

    let parsed = match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };
    let Some(decimal) = parsed else {
        return Err(DataContractError::NonNumericVolume {
            row: index,
            column: column_name,
            value: value.to_string(),
        });
    };

    Volume::new(decimal).ok_or(DataContractError::NegativeVolume {
        row: index,
        column: column_name,
        value: decimal,
    })
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn parse_timestamp(index: usize, value: &Value) -> Result<DateTime<Utc>, DataContractError> {
    let parsed = match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    };
    parsed.ok_or_else(|| DataContractError::InvalidTimestamp {
        row: index,
        value: value.to_string(),
    })
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres text output: "2025-01-06 20:54:44.123+00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
