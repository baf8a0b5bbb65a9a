//! Occupancy and alert engine
//!
//! The Monitor owns every piece of mutable facility state:
//! - Zone catalog (geometry is fixed, sensor readings are updated in place)
//! - Registered prisoners and the position ledger
//! - Occupancy snapshot, recomputed on every position report
//! - Alert dedup sets and the facility clock
//! - Sweep tracking for the consolidated position broadcast
//!
//! Each operation validates first, mutates second and publishes last, so a
//! rejected request never leaves partial state and a failed publish never
//! undoes a mutation. Callers serialize access (one operation at a time).

mod handlers;

pub use handlers::{PositionOutcome, SensorData, SensorOutcome, SweepOutcome};

use crate::domain::clock::{ClockTime, FacilityClock};
use crate::domain::types::{Entity, EntityId, ZoneId};
use crate::domain::zone::{Zone, ZoneCatalog};
use crate::infra::config::Config;
use crate::infra::metrics::{Metrics, MetricsSummary};
use crate::io::egress_channel::EgressMessage;
use crate::services::alerts::{Alert, AlertEngine};
use crate::services::ledger::{OccupancySnapshot, PositionLedger};
use crate::services::notifier::Notifier;
use crate::services::sweep::SweepTracker;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registered prisoner joined with their latest position, for `GET /jail/prisoners`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrisonerView {
    pub id: EntityId,
    pub name: String,
    /// Zone the prisoner was last resolved into
    pub room: Option<ZoneId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionView {
    pub x: f64,
    pub y: f64,
}

pub struct Monitor {
    pub(crate) catalog: ZoneCatalog,
    /// Registered prisoners, ordered by id
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    pub(crate) next_id: i64,
    pub(crate) ledger: PositionLedger,
    pub(crate) occupancy: OccupancySnapshot,
    pub(crate) alerts: AlertEngine,
    pub(crate) clock: FacilityClock,
    pub(crate) sweep: SweepTracker,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) notifier: Option<Arc<dyn Notifier>>,
}

impl Monitor {
    /// Create a monitor from configuration. The startup roster is registered
    /// without notifying subscribers.
    pub fn new(config: &Config, metrics: Arc<Metrics>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        let catalog = config.catalog().clone();
        let (hour, minute) = config.clock_default();
        let mut monitor = Self {
            occupancy: OccupancySnapshot::empty(&catalog),
            catalog,
            entities: BTreeMap::new(),
            next_id: 1,
            ledger: PositionLedger::new(),
            alerts: AlertEngine::new(config.alert_rules().clone()),
            clock: FacilityClock::new(hour, minute),
            sweep: SweepTracker::new(),
            metrics,
            notifier,
        };

        for seed in config.prisoners() {
            monitor.insert_entity(seed.name.clone(), seed.room.clone());
        }
        monitor
    }

    /// Assign the next sequential id and start expecting reports from it
    pub(crate) fn insert_entity(&mut self, name: String, room_hint: Option<String>) -> Entity {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let entity = Entity { id, name, room_hint };
        self.entities.insert(id, entity.clone());
        self.sweep.register(id);
        entity
    }

    /// Zone catalog in declaration order, with current readings
    pub fn rooms(&self) -> &[Zone] {
        self.catalog.zones()
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    pub fn occupancy(&self) -> &OccupancySnapshot {
        &self.occupancy
    }

    pub fn time(&self) -> ClockTime {
        self.clock.time()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn alert_engine(&self) -> &AlertEngine {
        &self.alerts
    }

    /// Prisoners not yet heard from in the current sweep
    pub fn sweep_pending(&self) -> usize {
        self.sweep.pending()
    }

    /// Registered prisoners with their latest known position
    pub fn prisoners(&self) -> Vec<PrisonerView> {
        self.entities
            .values()
            .map(|entity| {
                let record = self.ledger.get(entity.id);
                PrisonerView {
                    id: entity.id,
                    name: entity.name.clone(),
                    room: record.and_then(|r| r.zone_id.clone()),
                    position: record.map(|r| PositionView { x: r.point.x, y: r.point.y }),
                }
            })
            .collect()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Periodic metrics summary with the current headcount
    pub fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.report(self.entities.len(), self.occupancy.total())
    }

    /// Hand a message to the notifier. Failures are logged and counted only.
    pub(crate) fn publish(&self, message: EgressMessage) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let kind = message.kind();
        if let Err(e) = notifier.publish(message) {
            self.metrics.record_publish_failure();
            warn!(kind = %kind, error = %e, "publish_failed");
        }
    }

    /// Log, count and publish an alert onset
    pub(crate) fn raise(&self, alert: Alert) {
        match &alert {
            Alert::Curfew { entity_id, zone_id, hour, minute, .. } => {
                warn!(prisoner_id = %entity_id, room = %zone_id, hour = %hour, minute = %minute, "curfew_violation");
            }
            Alert::Capacity { zone_id, occupancy, capacity, .. } => {
                warn!(room = %zone_id, occupancy = %occupancy, capacity = %capacity, "capacity_exceeded");
            }
            Alert::Sensor { kind, zone_id, level, threshold } => {
                warn!(kind = %kind.as_str(), room = %zone_id, level = %level, threshold = %threshold, "sensor_threshold_exceeded");
            }
        }
        self.metrics.record_alert(&alert);
        for message in EgressMessage::from_alert(alert) {
            self.publish(message);
        }
    }

    pub(crate) fn suppressed(&self, category: &'static str, zone_id: &ZoneId) {
        self.metrics.record_alert_suppressed();
        debug!(category = %category, room = %zone_id, "alert_suppressed");
    }
}
