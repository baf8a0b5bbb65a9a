//! Shared types for the jail monitor

use serde::{Deserialize, Serialize};

/// Newtype wrapper for prisoner (tracked entity) IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for zone (room) IDs, e.g. "A", "B"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A planar coordinate in facility units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A registered prisoner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Room supplied at registration; informational only, never used for occupancy
    #[serde(rename = "room", skip_serializing_if = "Option::is_none")]
    pub room_hint: Option<String>,
}

/// Latest known position of a prisoner. No history is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub entity_id: EntityId,
    pub point: Point,
    pub zone_id: Option<ZoneId>,
}

/// Kind of sensor reading attached to a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Noise,
    Smoke,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Noise => "noise",
            SensorKind::Smoke => "smoke",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ZoneId::new("A")).unwrap();
        assert_eq!(json, "\"A\"");
    }

    #[test]
    fn test_entity_hint_serializes_as_room() {
        let entity = Entity { id: EntityId(1), name: "Ana".to_string(), room_hint: Some("B".to_string()) };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "Ana", "room": "B"}));
    }

    #[test]
    fn test_entity_skips_missing_hint() {
        let entity = Entity { id: EntityId(4), name: "Ana".to_string(), room_hint: None };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json, serde_json::json!({"id": 4, "name": "Ana"}));
    }
}
