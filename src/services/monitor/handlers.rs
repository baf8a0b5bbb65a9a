//! Operation handlers for the Monitor
//!
//! Each handler validates its request, applies the mutation in one step,
//! evaluates alerts against the fresh state and only then publishes.

use super::Monitor;
use crate::domain::clock::ClockTime;
use crate::domain::error::MonitorError;
use crate::domain::requests::{NoiseRequest, PositionRequest, RegisterRequest, SmokeRequest, TimeRequest};
use crate::domain::types::{Entity, EntityId, Point, PositionRecord, SensorKind, ZoneId};
use crate::io::egress_channel::{
    EgressMessage, PrisonerPositionPayload, PrisonerRegisteredPayload, ResetPayload, SensorLevelPayload,
};
use crate::services::alerts::Transition;
use crate::services::ledger::{OccupancySnapshot, PositionLedger};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

const POSITION_UPDATED: &str = "Posición actualizada";
const OUTSIDE_ALL_ZONES: &str = "Fuera del recinto";

/// Result of a position report, serialized as the HTTP response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionOutcome {
    pub message: &'static str,
    /// Zone name, or "Fuera del recinto" when outside every zone
    pub room: String,
    pub occupancy: OccupancySnapshot,
    #[serde(skip)]
    pub zone_id: Option<ZoneId>,
    /// Whether this report completed a sweep and triggered the broadcast
    #[serde(skip)]
    pub sweep_completed: bool,
}

/// Reading echoed back in a sensor response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorData {
    Noise {
        sala: ZoneId,
        #[serde(rename = "noiseLevel")]
        noise_level: f64,
    },
    Smoke {
        sala: ZoneId,
        #[serde(rename = "smokeLevel")]
        smoke_level: f64,
    },
}

/// Result of a noise or smoke report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorOutcome {
    pub message: String,
    pub data: SensorData,
}

/// Result of an explicit sweep request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepOutcome {
    /// Prisoners included in the broadcast
    pub prisoners: usize,
    pub occupancy: OccupancySnapshot,
}

impl Monitor {
    /// Register a prisoner under the next sequential id
    pub fn register_entity(&mut self, req: RegisterRequest) -> Result<Entity, MonitorError> {
        let name = match req.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                self.metrics.record_rejected();
                return Err(MonitorError::invalid("Faltan datos: se requiere name"));
            }
        };

        let entity = self.insert_entity(name, req.room);
        self.metrics.record_registration();
        info!(prisoner_id = %entity.id, name = %entity.name, room = ?entity.room_hint, "prisoner_registered");

        self.publish(EgressMessage::PrisonerRegistered(PrisonerRegisteredPayload {
            id: entity.id,
            room: entity.room_hint.clone(),
        }));
        Ok(entity)
    }

    /// Clear every prisoner, position, reading and alert marker. Zone
    /// geometry and capacity survive; ids restart at 1.
    pub fn reset(&mut self) {
        let prisoners = self.entities.len();

        self.entities.clear();
        self.next_id = 1;
        self.ledger.clear();
        self.catalog.reset_readings();
        self.occupancy = OccupancySnapshot::empty(&self.catalog);
        self.alerts.reset();
        self.clock.reset();
        self.sweep.clear();

        self.metrics.record_reset();
        info!(prisoners = %prisoners, "state_reset");

        self.publish(EgressMessage::Reset(ResetPayload {}));
    }

    /// Set facility time. Leaving the night window clears every curfew marker.
    pub fn set_clock(&mut self, req: TimeRequest) -> Result<ClockTime, MonitorError> {
        let (hour, minute) = match (req.hour, req.minute) {
            (Some(h), Some(m)) if (0..24).contains(&h) && (0..60).contains(&m) => (h as u32, m as u32),
            _ => {
                self.metrics.record_rejected();
                return Err(MonitorError::invalid("Hora inválida: se requiere 0 <= hour < 24 y 0 <= minute < 60"));
            }
        };

        self.clock.set(hour, minute);
        let cleared = self.alerts.sync_clock(&self.clock);
        info!(hour = %hour, minute = %minute, cleared_curfew_alerts = %cleared, "clock_set");

        let time = self.clock.time();
        self.publish(EgressMessage::Time(time));
        Ok(time)
    }

    /// Record a prisoner's latest coordinate, recompute occupancy and
    /// evaluate curfew and capacity for the zone they landed in
    pub fn report_position(&mut self, req: PositionRequest) -> Result<PositionOutcome, MonitorError> {
        let start = Instant::now();

        let (entity_id, point) = match (req.prisoner_id, req.x, req.y) {
            (Some(id), Some(x), Some(y)) => (EntityId(id), Point::new(x, y)),
            _ => {
                self.metrics.record_rejected();
                return Err(MonitorError::invalid("Faltan datos"));
            }
        };

        let zone = self.catalog.resolve(point);
        let zone_id = zone.map(|z| z.id.clone());
        let room = zone.map_or_else(|| OUTSIDE_ALL_ZONES.to_string(), |z| z.name.clone());

        self.ledger.upsert(PositionRecord { entity_id, point, zone_id: zone_id.clone() });
        self.occupancy = self.ledger.tally(&self.catalog);

        for cleared in self.alerts.clear_resolved_capacity(&self.catalog, &self.occupancy) {
            info!(room = %cleared, occupancy = %self.occupancy.get(&cleared), "capacity_cleared");
        }

        let curfew = self.alerts.evaluate_curfew(entity_id, zone, &self.clock);
        let capacity = self.alerts.evaluate_capacity(zone, &self.occupancy);

        debug!(prisoner_id = %entity_id, x = %point.x, y = %point.y, room = %room, "position_updated");

        for (category, transition) in [("curfew", curfew), ("capacity", capacity)] {
            match transition {
                Transition::Onset(alert) => self.raise(alert),
                Transition::Sustained => {
                    if let Some(zone_id) = &zone_id {
                        self.suppressed(category, zone_id);
                    }
                }
                Transition::Idle => {}
            }
        }

        let sweep_completed = self.sweep.record(entity_id);
        if sweep_completed {
            self.broadcast_positions();
        }

        self.metrics.record_position_report();
        self.metrics.record_latency(start.elapsed().as_micros() as u64);

        Ok(PositionOutcome {
            message: POSITION_UPDATED,
            room,
            occupancy: self.occupancy.clone(),
            zone_id,
            sweep_completed,
        })
    }

    pub fn report_noise(&mut self, req: NoiseRequest) -> Result<SensorOutcome, MonitorError> {
        self.report_sensor(SensorKind::Noise, req.sala, req.noise_level)
    }

    pub fn report_smoke(&mut self, req: SmokeRequest) -> Result<SensorOutcome, MonitorError> {
        self.report_sensor(SensorKind::Smoke, req.sala, req.smoke_level)
    }

    fn report_sensor(
        &mut self,
        kind: SensorKind,
        sala: Option<String>,
        level: Option<f64>,
    ) -> Result<SensorOutcome, MonitorError> {
        let start = Instant::now();

        let field = match kind {
            SensorKind::Noise => "noiseLevel",
            SensorKind::Smoke => "smokeLevel",
        };
        let (zone_id, level) = match (sala, level) {
            (Some(sala), Some(level)) if !sala.is_empty() => (ZoneId::new(sala), level),
            _ => {
                self.metrics.record_rejected();
                return Err(MonitorError::invalid(format!(
                    "Datos inválidos: se requiere sala y {field} numérico"
                )));
            }
        };
        // Readings are non-negative
        if level < 0.0 {
            self.metrics.record_rejected();
            return Err(MonitorError::invalid(format!("Datos inválidos: {field} no puede ser negativo")));
        }

        let Some(zone) = self.catalog.get_mut(&zone_id) else {
            self.metrics.record_rejected();
            return Err(MonitorError::not_found(format!("No se encontró la sala con id {zone_id}")));
        };
        match kind {
            SensorKind::Noise => zone.noise = level,
            SensorKind::Smoke => zone.smoke = level,
        }

        debug!(kind = %kind.as_str(), room = %zone_id, level = %level, "sensor_updated");

        if self.catalog.last_id() == Some(&zone_id) {
            self.publish(self.sensor_snapshot(kind));
        }
        if let Some(alert) = self.alerts.evaluate_sensor(kind, &zone_id, level) {
            self.raise(alert);
        }

        self.metrics.record_sensor_report(kind);
        self.metrics.record_latency(start.elapsed().as_micros() as u64);

        let (message, data) = match kind {
            SensorKind::Noise => (
                format!("Nivel de ruido actualizado para sala {zone_id}"),
                SensorData::Noise { sala: zone_id, noise_level: level },
            ),
            SensorKind::Smoke => (
                format!("Nivel de humo actualizado para sala {zone_id}"),
                SensorData::Smoke { sala: zone_id, smoke_level: level },
            ),
        };
        Ok(SensorOutcome { message, data })
    }

    /// Current readings of one kind for every zone, in catalog order
    fn sensor_snapshot(&self, kind: SensorKind) -> EgressMessage {
        let levels = self
            .catalog
            .zones()
            .iter()
            .map(|zone| SensorLevelPayload {
                sala: zone.id.clone(),
                level: match kind {
                    SensorKind::Noise => zone.noise,
                    SensorKind::Smoke => zone.smoke,
                },
            })
            .collect();
        match kind {
            SensorKind::Noise => EgressMessage::NoiseLevels(levels),
            SensorKind::Smoke => EgressMessage::SmokeLevels(levels),
        }
    }

    /// Publish the consolidated broadcast now and start a new sweep
    pub fn request_sweep(&mut self) -> SweepOutcome {
        self.sweep.restart();
        let prisoners = self.broadcast_positions();
        SweepOutcome { prisoners, occupancy: self.occupancy.clone() }
    }

    /// Publish every reported position followed by the occupancy snapshot.
    /// Returns how many positions were included.
    fn broadcast_positions(&self) -> usize {
        let positions = position_payloads(&self.ledger, |id| self.entities.get(&id).map(|e| e.name.as_str()));
        let count = positions.len();

        self.publish(EgressMessage::Prisoners(positions));
        self.publish(EgressMessage::Occupancy(self.occupancy.clone()));
        self.metrics.record_sweep();
        info!(prisoners = %count, occupied = %self.occupancy.total(), "sweep_broadcast");
        count
    }
}

/// Ledger records as wire payloads, ordered by prisoner id
fn position_payloads<'a>(
    ledger: &PositionLedger,
    name_of: impl Fn(EntityId) -> Option<&'a str>,
) -> Vec<PrisonerPositionPayload> {
    let mut positions: Vec<PrisonerPositionPayload> = ledger
        .records()
        .map(|record| PrisonerPositionPayload {
            id: record.entity_id,
            name: name_of(record.entity_id).unwrap_or_default().to_string(),
            x: record.point.x,
            y: record.point.y,
            room: record.zone_id.clone(),
        })
        .collect();
    positions.sort_by_key(|p| p.id);
    positions
}
