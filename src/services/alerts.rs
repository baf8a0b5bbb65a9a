//! Alert state machines
//!
//! Curfew and capacity alerts are edge-triggered: a sustained violation fires
//! once on onset and stays silent until it clears. Onset markers live in two
//! sets that carry nothing but membership:
//! - `night_alerts` keyed by (prisoner, zone), so moving between two
//!   non-rest zones during curfew fires once per new zone
//! - `capacity_alerts` keyed by zone
//!
//! Noise and smoke alerts are level-triggered and keep no state.

use crate::domain::clock::{FacilityClock, NightWindow};
use crate::domain::types::{EntityId, SensorKind, ZoneId};
use crate::domain::zone::{Zone, ZoneCatalog};
use crate::services::ledger::OccupancySnapshot;
use rustc_hash::FxHashSet;

/// A condition that should be published downstream
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Curfew {
        entity_id: EntityId,
        zone_id: ZoneId,
        zone_name: String,
        hour: u32,
        minute: u32,
    },
    Capacity {
        zone_id: ZoneId,
        zone_name: String,
        occupancy: u32,
        capacity: u32,
    },
    Sensor {
        kind: SensorKind,
        zone_id: ZoneId,
        level: f64,
        threshold: f64,
    },
}

impl Alert {
    pub fn category(&self) -> &'static str {
        match self {
            Alert::Curfew { .. } => "curfew",
            Alert::Capacity { .. } => "capacity",
            Alert::Sensor { kind, .. } => kind.as_str(),
        }
    }
}

/// Outcome of evaluating an edge-triggered condition
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Condition does not hold
    Idle,
    /// IDLE -> FIRING, publish this alert
    Onset(Alert),
    /// FIRING -> FIRING, duplicate suppressed
    Sustained,
}

impl Transition {
    pub fn into_alert(self) -> Option<Alert> {
        match self {
            Transition::Onset(alert) => Some(alert),
            Transition::Idle | Transition::Sustained => None,
        }
    }
}

/// Thresholds and curfew rules
#[derive(Debug, Clone)]
pub struct AlertRules {
    pub night_window: NightWindow,
    pub rest_zone: ZoneId,
    pub noise_threshold: f64,
    pub smoke_threshold: f64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            night_window: NightWindow::default(),
            rest_zone: ZoneId::from("B"),
            noise_threshold: 90.0,
            smoke_threshold: 1.0,
        }
    }
}

pub struct AlertEngine {
    rules: AlertRules,
    night_alerts: FxHashSet<(EntityId, ZoneId)>,
    capacity_alerts: FxHashSet<ZoneId>,
}

impl AlertEngine {
    pub fn new(rules: AlertRules) -> Self {
        Self { rules, night_alerts: FxHashSet::default(), capacity_alerts: FxHashSet::default() }
    }

    pub fn rules(&self) -> &AlertRules {
        &self.rules
    }

    /// Drop every curfew marker when facility time leaves the night window.
    /// Returns how many markers were cleared.
    pub fn sync_clock(&mut self, clock: &FacilityClock) -> usize {
        if self.rules.night_window.contains(clock.hour()) {
            return 0;
        }
        let cleared = self.night_alerts.len();
        self.night_alerts.clear();
        cleared
    }

    /// Evaluate curfew for a prisoner that just reported from `zone`
    pub fn evaluate_curfew(
        &mut self,
        entity_id: EntityId,
        zone: Option<&Zone>,
        clock: &FacilityClock,
    ) -> Transition {
        if !self.rules.night_window.contains(clock.hour()) {
            self.night_alerts.clear();
            return Transition::Idle;
        }

        let Some(zone) = zone else {
            return Transition::Idle;
        };
        if zone.id == self.rules.rest_zone {
            return Transition::Idle;
        }

        if !self.night_alerts.insert((entity_id, zone.id.clone())) {
            return Transition::Sustained;
        }

        Transition::Onset(Alert::Curfew {
            entity_id,
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            hour: clock.hour(),
            minute: clock.minute(),
        })
    }

    /// Clear capacity markers for zones back at or under capacity.
    /// Must run after every occupancy recomputation. Returns the cleared zones.
    pub fn clear_resolved_capacity(
        &mut self,
        catalog: &ZoneCatalog,
        occupancy: &OccupancySnapshot,
    ) -> Vec<ZoneId> {
        let mut cleared = Vec::new();
        self.capacity_alerts.retain(|zone_id| {
            let still_over = catalog
                .get(zone_id)
                .is_some_and(|zone| zone.is_over_capacity(occupancy.get(zone_id)));
            if !still_over {
                cleared.push(zone_id.clone());
            }
            still_over
        });
        cleared
    }

    /// Evaluate capacity for the zone a prisoner just reported from
    pub fn evaluate_capacity(&mut self, zone: Option<&Zone>, occupancy: &OccupancySnapshot) -> Transition {
        let Some(zone) = zone else {
            return Transition::Idle;
        };
        let Some(capacity) = zone.capacity else {
            return Transition::Idle;
        };

        let count = occupancy.get(&zone.id);
        if count <= capacity {
            return Transition::Idle;
        }

        if !self.capacity_alerts.insert(zone.id.clone()) {
            return Transition::Sustained;
        }

        Transition::Onset(Alert::Capacity {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            occupancy: count,
            capacity,
        })
    }

    /// Level-triggered check of a fresh sensor reading
    pub fn evaluate_sensor(&self, kind: SensorKind, zone_id: &ZoneId, level: f64) -> Option<Alert> {
        let threshold = match kind {
            SensorKind::Noise => self.rules.noise_threshold,
            SensorKind::Smoke => self.rules.smoke_threshold,
        };
        (level > threshold).then(|| Alert::Sensor { kind, zone_id: zone_id.clone(), level, threshold })
    }

    pub fn is_curfew_firing(&self, entity_id: EntityId, zone_id: &ZoneId) -> bool {
        self.night_alerts.contains(&(entity_id, zone_id.clone()))
    }

    pub fn is_capacity_firing(&self, zone_id: &ZoneId) -> bool {
        self.capacity_alerts.contains(zone_id)
    }

    pub fn active_curfew_alerts(&self) -> usize {
        self.night_alerts.len()
    }

    pub fn active_capacity_alerts(&self) -> usize {
        self.capacity_alerts.len()
    }

    /// Forget every onset marker
    pub fn reset(&mut self) {
        self.night_alerts.clear();
        self.capacity_alerts.clear();
    }
}
