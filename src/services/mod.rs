//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `monitor` - Engine instance owning all facility state and operations
//! - `ledger` - Latest position per prisoner and occupancy tally
//! - `alerts` - Edge-triggered curfew/capacity and level-triggered sensor alerts
//! - `sweep` - Tracks which prisoners reported since the last broadcast
//! - `notifier` - Publish seam between the engine and egress

pub mod alerts;
pub mod ledger;
pub mod monitor;
pub mod notifier;
pub mod sweep;

// Re-export commonly used types
pub use alerts::{Alert, AlertEngine, AlertRules};
pub use ledger::{OccupancySnapshot, PositionLedger};
pub use monitor::Monitor;
pub use notifier::Notifier;
