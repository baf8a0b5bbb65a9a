//! Typed channel for MQTT egress messages
//!
//! Provides a non-blocking way to send events to the MQTT publisher.
//! Uses bounded mpsc channels to prevent unbounded memory growth; a full
//! channel drops the message and reports `PublishError::Full`.

use crate::domain::clock::ClockTime;
use crate::domain::error::PublishError;
use crate::domain::types::{EntityId, SensorKind, ZoneId};
use crate::infra::config::Topics;
use crate::services::alerts::Alert;
use crate::services::ledger::OccupancySnapshot;
use crate::services::notifier::Notifier;
use rumqttc::QoS;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Messages that can be sent to the MQTT publisher
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EgressMessage {
    /// New prisoner registered (`carcel/preso`)
    PrisonerRegistered(PrisonerRegisteredPayload),
    /// All state cleared (`carcel/reiniciar`)
    Reset(ResetPayload),
    /// Facility clock changed (`jail/time`)
    Time(ClockTime),
    /// Curfew violation onset (`jail/alerts/night`)
    NightAlert(NightAlertPayload),
    /// Capacity exceeded onset (`jail/alerts/capacity`)
    CapacityAlert(CapacityAlertPayload),
    /// Consolidated positions after a sweep (`jail/prisoners`)
    Prisoners(Vec<PrisonerPositionPayload>),
    /// Occupancy snapshot after a sweep (`jail/occupancy`)
    Occupancy(OccupancySnapshot),
    /// Noise levels for every zone (`jail/noise`)
    NoiseLevels(Vec<SensorLevelPayload>),
    /// Noise above threshold (`jail/alerts/noise`)
    NoiseAlert(NoiseAlertPayload),
    /// Smoke levels for every zone (`jail/smoke`)
    SmokeLevels(Vec<SensorLevelPayload>),
    /// Sprinkler actuator command (`carcel/aspersor`)
    Sprinkler(SprinklerPayload),
    /// Smoke above threshold (`jail/alerts/sprinkler`)
    SprinklerAlert(SmokeAlertPayload),
}

impl EgressMessage {
    /// Topic this message is published on
    pub fn topic<'a>(&self, topics: &'a Topics) -> &'a str {
        match self {
            EgressMessage::PrisonerRegistered(_) => &topics.prisoner_registered,
            EgressMessage::Reset(_) => &topics.reset,
            EgressMessage::Time(_) => &topics.time,
            EgressMessage::NightAlert(_) => &topics.night_alert,
            EgressMessage::CapacityAlert(_) => &topics.capacity_alert,
            EgressMessage::Prisoners(_) => &topics.prisoners,
            EgressMessage::Occupancy(_) => &topics.occupancy,
            EgressMessage::NoiseLevels(_) => &topics.noise,
            EgressMessage::NoiseAlert(_) => &topics.noise_alert,
            EgressMessage::SmokeLevels(_) => &topics.smoke,
            EgressMessage::Sprinkler(_) => &topics.sprinkler,
            EgressMessage::SprinklerAlert(_) => &topics.sprinkler_alert,
        }
    }

    /// Alerts and actuator commands are at-least-once, snapshots fire-and-forget
    pub fn qos(&self) -> QoS {
        match self {
            EgressMessage::NightAlert(_)
            | EgressMessage::CapacityAlert(_)
            | EgressMessage::NoiseAlert(_)
            | EgressMessage::Sprinkler(_)
            | EgressMessage::SprinklerAlert(_)
            | EgressMessage::Reset(_)
            | EgressMessage::PrisonerRegistered(_) => QoS::AtLeastOnce,
            EgressMessage::Time(_)
            | EgressMessage::Prisoners(_)
            | EgressMessage::Occupancy(_)
            | EgressMessage::NoiseLevels(_)
            | EgressMessage::SmokeLevels(_) => QoS::AtMostOnce,
        }
    }

    /// Short name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            EgressMessage::PrisonerRegistered(_) => "prisoner_registered",
            EgressMessage::Reset(_) => "reset",
            EgressMessage::Time(_) => "time",
            EgressMessage::NightAlert(_) => "night_alert",
            EgressMessage::CapacityAlert(_) => "capacity_alert",
            EgressMessage::Prisoners(_) => "prisoners",
            EgressMessage::Occupancy(_) => "occupancy",
            EgressMessage::NoiseLevels(_) => "noise",
            EgressMessage::NoiseAlert(_) => "noise_alert",
            EgressMessage::SmokeLevels(_) => "smoke",
            EgressMessage::Sprinkler(_) => "sprinkler",
            EgressMessage::SprinklerAlert(_) => "sprinkler_alert",
        }
    }

    /// Messages to publish for an alert. Smoke alerts also drive the sprinkler.
    pub fn from_alert(alert: Alert) -> Vec<EgressMessage> {
        match alert {
            Alert::Curfew { entity_id, zone_id, zone_name, hour, minute } => {
                vec![EgressMessage::NightAlert(NightAlertPayload {
                    prisoner_id: entity_id,
                    room: zone_id,
                    room_name: zone_name,
                    hour,
                    minute,
                })]
            }
            Alert::Capacity { zone_id, zone_name, occupancy, capacity } => {
                vec![EgressMessage::CapacityAlert(CapacityAlertPayload {
                    room: zone_id,
                    room_name: zone_name,
                    occupancy,
                    capacity,
                })]
            }
            Alert::Sensor { kind: SensorKind::Noise, zone_id, level, threshold } => {
                vec![EgressMessage::NoiseAlert(NoiseAlertPayload { sala: zone_id, noise_level: level, threshold })]
            }
            Alert::Sensor { kind: SensorKind::Smoke, zone_id, level, threshold } => vec![
                EgressMessage::Sprinkler(SprinklerPayload { sala: zone_id.clone(), activate: true }),
                EgressMessage::SprinklerAlert(SmokeAlertPayload { sala: zone_id, smoke_level: level, threshold }),
            ],
        }
    }
}

/// Payload for `carcel/preso`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrisonerRegisteredPayload {
    pub id: EntityId,
    /// Always present, `null` when registered without a room
    pub room: Option<String>,
}

/// Payload for `carcel/reiniciar`, always `{}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetPayload {}

/// Payload for `jail/alerts/night`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NightAlertPayload {
    pub prisoner_id: EntityId,
    pub room: ZoneId,
    pub room_name: String,
    pub hour: u32,
    pub minute: u32,
}

/// Payload for `jail/alerts/capacity`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityAlertPayload {
    pub room: ZoneId,
    pub room_name: String,
    pub occupancy: u32,
    pub capacity: u32,
}

/// One prisoner in the `jail/prisoners` broadcast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrisonerPositionPayload {
    pub id: EntityId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Zone id, null when outside every zone
    pub room: Option<ZoneId>,
}

/// One zone in the `jail/noise` / `jail/smoke` snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorLevelPayload {
    pub sala: ZoneId,
    pub level: f64,
}

/// Payload for `jail/alerts/noise`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseAlertPayload {
    pub sala: ZoneId,
    pub noise_level: f64,
    pub threshold: f64,
}

/// Payload for `carcel/aspersor`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprinklerPayload {
    pub sala: ZoneId,
    pub activate: bool,
}

/// Payload for `jail/alerts/sprinkler`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeAlertPayload {
    pub sala: ZoneId,
    pub smoke_level: f64,
    pub threshold: f64,
}

/// Sender handle for egress messages
///
/// Clone this to share across multiple producers.
/// Non-blocking - if the channel is full, messages are dropped.
#[derive(Clone)]
pub struct EgressSender {
    tx: mpsc::Sender<EgressMessage>,
}

impl EgressSender {
    /// Create a new sender from an mpsc sender
    pub fn new(tx: mpsc::Sender<EgressMessage>) -> Self {
        Self { tx }
    }
}

impl Notifier for EgressSender {
    fn publish(&self, message: EgressMessage) -> Result<(), PublishError> {
        // Use try_send to avoid blocking the caller - drop if channel full
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => PublishError::Full,
            TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

/// Create a new egress channel pair
///
/// Returns (sender, receiver) where sender can be cloned and shared.
/// Buffer size determines how many messages can be queued.
pub fn create_egress_channel(buffer_size: usize) -> (EgressSender, mpsc::Receiver<EgressMessage>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EgressSender::new(tx), rx)
}
