//! Embedded MQTT broker using rumqttd
//!
//! Dashboards and the sprinkler actuator subscribe here when no external
//! broker is configured. An optional WebSocket listener serves browser clients.

use crate::infra::config::Config as AppConfig;
use rumqttd::{Broker, Config, ConnectionSettings, RouterConfig, ServerSettings};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::thread;
use tracing::{info, warn};

fn server_settings(name: &str, listen: SocketAddr) -> ServerSettings {
    ServerSettings {
        name: name.to_string(),
        listen,
        tls: None,
        next_connection_delay_ms: 1,
        connections: ConnectionSettings {
            connection_timeout_ms: 5000,
            max_payload_size: 262144,
            max_inflight_count: 200,
            auth: None,
            dynamic_filters: false,
            external_auth: None,
        },
    }
}

fn parse_listen_addr(bind_address: &str, port: u16) -> Option<SocketAddr> {
    let addr_str = format!("{}:{}", bind_address, port);
    match addr_str.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!(error = %e, addr = %addr_str, "broker_invalid_bind_address");
            None
        }
    }
}

/// Build the rumqttd config, or None if the bind address is unusable
pub fn broker_config(app_config: &AppConfig) -> Option<Config> {
    let bind_address = app_config.broker_bind_address();
    let listen_addr = parse_listen_addr(bind_address, app_config.broker_port())?;

    let router_config = RouterConfig {
        max_segment_size: 104857600,
        max_segment_count: 10,
        max_connections: 1010,
        max_outgoing_packet_count: 200,
        initialized_filters: None,
        ..Default::default()
    };

    let mut v4 = HashMap::new();
    v4.insert("v4".to_string(), server_settings("v4", listen_addr));

    let ws = app_config.broker_ws_port().and_then(|ws_port| {
        let ws_addr = parse_listen_addr(bind_address, ws_port)?;
        let mut servers = HashMap::new();
        servers.insert("ws".to_string(), server_settings("ws", ws_addr));
        Some(servers)
    });

    Some(Config {
        id: 0,
        router: router_config,
        v4: Some(v4),
        v5: None,
        ws,
        prometheus: None,
        metrics: None,
        bridge: None,
        console: None,
        cluster: None,
    })
}

/// Start the embedded MQTT broker with configuration
pub fn start_embedded_broker(app_config: &AppConfig) {
    let Some(config) = broker_config(app_config) else {
        return;
    };

    thread::spawn(move || {
        let mut broker = Broker::new(config);
        // start() blocks until the broker dies
        if let Err(e) = broker.start() {
            warn!(error = %e, "broker_start_failed");
        }
    });

    // Give broker time to start
    thread::sleep(std::time::Duration::from_millis(100));
    info!(
        bind_address = %app_config.broker_bind_address(),
        port = %app_config.broker_port(),
        ws_port = ?app_config.broker_ws_port(),
        "broker_started"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_config_without_ws() {
        let config = broker_config(&AppConfig::default()).unwrap();
        let v4 = config.v4.unwrap();
        assert_eq!(v4["v4"].listen.port(), 1883);
        assert!(config.ws.is_none());
    }
}
