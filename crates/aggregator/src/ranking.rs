use std::collections::{HashMap, HashSet};

use common::types::{SwapPolicy, TradeRecord};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::attribution::{attribute_leg_volume, EntitySelector};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntity {
    pub entity: String,
    pub volume: Decimal,
}

/// Entities ordered by total attributed volume over a reference window, highest first.
///
/// Ties break on the identifier so the stacking order of chart series is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntityVolumeRanking {
    entries: Vec<RankedEntity>,
}

impl EntityVolumeRanking {
    /// Ranks with the same attribution rules the bucketed series use.
    pub fn compute<'a, I, S>(records: I, selector: &S, policy: SwapPolicy) -> Self
    where
        I: IntoIterator<Item = &'a TradeRecord>,
        S: EntitySelector + ?Sized,
    {
        let mut totals: HashMap<&'a str, Decimal> = HashMap::new();
        for record in records {
            for entity in selector.legs(record).touched() {
                let slot = totals.entry(entity).or_default();
                *slot = slot.saturating_add(attribute_leg_volume(record, selector, entity, policy));
            }
        }
        Self::from_totals(totals.into_iter().map(|(e, v)| (e.to_string(), v)))
    }

    /// Builds a ranking from precomputed totals. Duplicates are merged, empty ids dropped.
    pub fn from_totals<I>(totals: I) -> Self
    where
        I: IntoIterator<Item = (String, Decimal)>,
    {
        let mut merged: HashMap<String, Decimal> = HashMap::new();
        for (entity, volume) in totals {
            if entity.is_empty() {
                continue;
            }
            let slot = merged.entry(entity).or_default();
            *slot = slot.saturating_add(volume);
        }

        let mut entries: Vec<RankedEntity> = merged
            .into_iter()
            .map(|(entity, volume)| RankedEntity { entity, volume })
            .collect();
        entries.sort_by(|a, b| b.volume.cmp(&a.volume).then_with(|| a.entity.cmp(&b.entity)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self, n: usize) -> &[RankedEntity] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn top_set(&self, n: usize) -> HashSet<&str> {
        self.top(n).iter().map(|e| e.entity.as_str()).collect()
    }

    /// Entity identifiers in rank order, e.g. for a selector widget.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.entity.as_str()).collect()
    }

    pub fn volume_of(&self, entity: &str) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|e| e.entity == entity)
            .map(|e| e.volume)
    }
}
