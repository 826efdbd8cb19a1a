use common::types::{non_empty, EntityKind, SwapPolicy, TradeRecord};
use rust_decimal::Decimal;

/// Source and destination entity of one record, with empty identifiers already dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Legs<'r> {
    source: Option<&'r str>,
    dest: Option<&'r str>,
}

impl<'r> Legs<'r> {
    pub fn new(source: Option<&'r str>, dest: Option<&'r str>) -> Self {
        Self {
            source: non_empty(source),
            dest: non_empty(dest),
        }
    }

    pub fn source(&self) -> Option<&'r str> {
        self.source
    }

    pub fn dest(&self) -> Option<&'r str> {
        self.dest
    }

    pub fn is_self_swap(&self) -> bool {
        self.source.is_some() && self.source == self.dest
    }

    /// Distinct entities on either leg; a self-swap yields its entity once.
    pub fn touched(self) -> impl Iterator<Item = &'r str> {
        let dest = self.dest.filter(|d| Some(*d) != self.source);
        self.source.into_iter().chain(dest)
    }
}

/// Maps a record to the entities it touches.
pub trait EntitySelector {
    fn legs<'r>(&self, record: &'r TradeRecord) -> Legs<'r>;
}

impl EntitySelector for EntityKind {
    fn legs<'r>(&self, record: &'r TradeRecord) -> Legs<'r> {
        Legs::new(record.source_entity(*self), record.dest_entity(*self))
    }
}

/// Volume of `record` attributed to `entity`.
///
/// A self-swap is attributed once, according to `policy`. A one-sided match gets that leg's
/// volume; no match gets zero.
pub fn attribute_leg_volume<S>(
    record: &TradeRecord,
    selector: &S,
    entity: &str,
    policy: SwapPolicy,
) -> Decimal
where
    S: EntitySelector + ?Sized,
{
    let legs = selector.legs(record);
    let on_source = legs.source() == Some(entity);
    let on_dest = legs.dest() == Some(entity);

    match (on_source, on_dest) {
        (true, true) => policy.self_swap_volume(record.source_volume, record.dest_volume),
        (true, false) => record.source_volume.value(),
        (false, true) => record.dest_volume.value(),
        (false, false) => Decimal::ZERO,
    }
}
