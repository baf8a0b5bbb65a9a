//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `egress_channel` - Typed channel for MQTT egress messages
//! - `mqtt_egress` - MQTT publisher for egress events
//! - `http_api` - HTTP API for sensors, dashboards and operators
//! - `prometheus` - Prometheus text exposition

pub mod egress_channel;
pub mod http_api;
pub mod mqtt_egress;
pub mod prometheus;

// Re-export commonly used types
pub use egress_channel::{create_egress_channel, EgressMessage, EgressSender};
pub use http_api::{ApiState, SharedMonitor};
pub use mqtt_egress::MqttPublisher;
