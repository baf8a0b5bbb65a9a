//! Inbound request bodies
//!
//! Every field is optional at the serde level so that a missing field can be
//! reported as `InvalidInput` by the operation itself rather than as a parse
//! failure. A present field with the wrong JSON type still fails to parse.

use serde::Deserialize;

/// `POST /jail/position`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionRequest {
    #[serde(rename = "prisonerId")]
    pub prisoner_id: Option<i64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// `POST /jail/prisoner`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub room: Option<String>,
}

/// `POST /jail/time`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeRequest {
    pub hour: Option<i64>,
    pub minute: Option<i64>,
}

/// `POST /jail/noise`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoiseRequest {
    pub sala: Option<String>,
    #[serde(rename = "noiseLevel")]
    pub noise_level: Option<f64>,
}

/// `POST /jail/smoke`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmokeRequest {
    pub sala: Option<String>,
    #[serde(rename = "smokeLevel")]
    pub smoke_level: Option<f64>,
}
