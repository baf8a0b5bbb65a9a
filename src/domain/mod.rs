//! Domain models - core facility types
//!
//! This module contains the canonical data types used throughout the system:
//! - `Zone` / `ZoneCatalog` - rooms and the geofence resolver
//! - `Entity` / `PositionRecord` - prisoners and their latest position
//! - `FacilityClock` / `NightWindow` - injected facility time and curfew hours
//! - `MonitorError` - validation failures surfaced to callers
//! - `requests` - inbound sensor and admin request bodies

pub mod clock;
pub mod error;
pub mod requests;
pub mod types;
pub mod zone;

// Re-export commonly used types at module level
pub use clock::{ClockTime, FacilityClock, NightWindow};
pub use error::{MonitorError, PublishError};
pub use types::{Entity, EntityId, Point, PositionRecord, SensorKind, ZoneId};
pub use zone::{Zone, ZoneCatalog};
