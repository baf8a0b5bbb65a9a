//! Position ledger and occupancy snapshot
//!
//! The ledger holds exactly one record per prisoner: the latest reported
//! coordinate and the zone it resolved to. Occupancy is never patched
//! incrementally; `tally` rebuilds it from every record so counts cannot drift.

use crate::domain::types::{EntityId, PositionRecord, ZoneId};
use crate::domain::zone::ZoneCatalog;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-zone headcount. Every catalog zone is present, empty zones count 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OccupancySnapshot(BTreeMap<ZoneId, u32>);

impl OccupancySnapshot {
    /// All catalog zones at zero
    pub fn empty(catalog: &ZoneCatalog) -> Self {
        Self(catalog.ids().map(|id| (id.clone(), 0)).collect())
    }

    pub fn get(&self, zone: &ZoneId) -> u32 {
        self.0.get(zone).copied().unwrap_or(0)
    }

    /// Sum across all zones
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ZoneId, u32)> {
        self.0.iter().map(|(id, &count)| (id, count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Latest position per prisoner
#[derive(Debug, Default)]
pub struct PositionLedger {
    records: FxHashMap<EntityId, PositionRecord>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the prisoner's record, returning the previous one
    pub fn upsert(&mut self, record: PositionRecord) -> Option<PositionRecord> {
        self.records.insert(record.entity_id, record)
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&PositionRecord> {
        self.records.get(&entity_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &PositionRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Recompute occupancy from scratch. Records pointing at zones missing
    /// from the catalog are ignored.
    pub fn tally(&self, catalog: &ZoneCatalog) -> OccupancySnapshot {
        let mut snapshot = OccupancySnapshot::empty(catalog);
        for record in self.records.values() {
            let Some(zone_id) = &record.zone_id else {
                continue;
            };
            if let Some(count) = snapshot.0.get_mut(zone_id) {
                *count += 1;
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Point;
    use crate::domain::zone::Zone;

    fn catalog() -> ZoneCatalog {
        let sq = |x0: f64, x1: f64| vec![[x0, 0.0], [x1, 0.0], [x1, 10.0], [x0, 10.0]];
        ZoneCatalog::new(vec![Zone::new("A", "Comedor", sq(0.0, 10.0)), Zone::new("C", "Patio", sq(12.0, 22.0))])
            .unwrap()
    }

    fn record(id: i64, zone: Option<&str>) -> PositionRecord {
        PositionRecord { entity_id: EntityId(id), point: Point::new(1.0, 1.0), zone_id: zone.map(ZoneId::from) }
    }

    #[test]
    fn test_empty_snapshot_has_every_zone_at_zero() {
        let snapshot = PositionLedger::new().tally(&catalog());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&ZoneId::from("A")), 0);
        assert_eq!(snapshot.get(&ZoneId::from("C")), 0);
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), serde_json::json!({"A": 0, "C": 0}));
    }

    #[test]
    fn test_tally_counts_latest_record_only() {
        let catalog = catalog();
        let mut ledger = PositionLedger::new();
        ledger.upsert(record(1, Some("A")));
        ledger.upsert(record(2, Some("A")));
        ledger.upsert(record(3, None));
        assert_eq!(ledger.tally(&catalog).get(&ZoneId::from("A")), 2);

        // Prisoner 1 moves to the patio: old zone must not keep counting it
        let previous = ledger.upsert(record(1, Some("C")));
        assert_eq!(previous.unwrap().zone_id, Some(ZoneId::from("A")));

        let snapshot = ledger.tally(&catalog);
        assert_eq!(snapshot.get(&ZoneId::from("A")), 1);
        assert_eq!(snapshot.get(&ZoneId::from("C")), 1);
        assert_eq!(snapshot.total(), 2);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_unknown_zone_ids_are_ignored() {
        let mut ledger = PositionLedger::new();
        ledger.upsert(record(1, Some("Z")));
        let snapshot = ledger.tally(&catalog());
        assert_eq!(snapshot.total(), 0);
        assert_eq!(snapshot.get(&ZoneId::from("Z")), 0);
    }

    #[test]
    fn test_clear() {
        let mut ledger = PositionLedger::new();
        ledger.upsert(record(1, Some("A")));
        ledger.clear();
        assert!(ledger.is_empty());
        assert!(ledger.get(EntityId(1)).is_none());
    }
}
