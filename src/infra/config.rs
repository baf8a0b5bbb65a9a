//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::clock::NightWindow;
use crate::domain::types::ZoneId;
use crate::domain::zone::{Zone, ZoneCatalog};
use crate::services::alerts::AlertRules;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Facility identifier used as a metrics label
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "jail".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: default_http_bind_address(), port: default_http_port() }
    }
}

fn default_http_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8484
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Publish alerts and snapshots over MQTT
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_mqtt_client_id(),
            username: None,
            password: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    "jail-monitor".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Run the embedded rumqttd broker in-process
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_broker_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// MQTT-over-WebSocket listener for browser dashboards (disabled when absent)
    #[serde(default)]
    pub ws_port: Option<u16>,
}

fn default_broker_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { enabled: true, bind_address: default_broker_bind_address(), port: default_mqtt_port(), ws_port: None }
    }
}

/// Publish topics. Defaults match the topics existing dashboard and actuator
/// subscribers listen on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub prisoner_registered: String,
    pub reset: String,
    pub time: String,
    pub night_alert: String,
    pub capacity_alert: String,
    pub prisoners: String,
    pub occupancy: String,
    pub noise: String,
    pub noise_alert: String,
    pub smoke: String,
    pub sprinkler: String,
    pub sprinkler_alert: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            prisoner_registered: "carcel/preso".to_string(),
            reset: "carcel/reiniciar".to_string(),
            time: "jail/time".to_string(),
            night_alert: "jail/alerts/night".to_string(),
            capacity_alert: "jail/alerts/capacity".to_string(),
            prisoners: "jail/prisoners".to_string(),
            occupancy: "jail/occupancy".to_string(),
            noise: "jail/noise".to_string(),
            noise_alert: "jail/alerts/noise".to_string(),
            smoke: "jail/smoke".to_string(),
            sprinkler: "carcel/aspersor".to_string(),
            sprinkler_alert: "jail/alerts/sprinkler".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Noise level strictly above this raises an alert
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: f64,
    /// Smoke level strictly above this fires the sprinkler
    #[serde(default = "default_smoke_threshold")]
    pub smoke_threshold: f64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { noise_threshold: default_noise_threshold(), smoke_threshold: default_smoke_threshold() }
    }
}

fn default_noise_threshold() -> f64 {
    90.0
}

fn default_smoke_threshold() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurfewConfig {
    #[serde(default)]
    pub start_hour: u32,
    #[serde(default = "default_curfew_end_hour")]
    pub end_hour: u32,
    /// Zone prisoners must be in during curfew
    #[serde(default = "default_rest_zone")]
    pub rest_zone: String,
}

impl Default for CurfewConfig {
    fn default() -> Self {
        Self { start_hour: 0, end_hour: default_curfew_end_hour(), rest_zone: default_rest_zone() }
    }
}

fn default_curfew_end_hour() -> u32 {
    6
}

fn default_rest_zone() -> String {
    "B".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_clock_hour")]
    pub default_hour: u32,
    #[serde(default)]
    pub default_minute: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { default_hour: default_clock_hour(), default_minute: 0 }
    }
}

fn default_clock_hour() -> u32 {
    12
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    pub id: String,
    pub name: String,
    pub polygon: Vec<[f64; 2]>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl From<ZoneConfig> for Zone {
    fn from(cfg: ZoneConfig) -> Self {
        let zone = Zone::new(cfg.id, cfg.name, cfg.polygon);
        match cfg.capacity {
            Some(cap) => zone.with_capacity(cap),
            None => zone,
        }
    }
}

/// Prisoner registered at startup
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrisonerSeed {
    pub name: String,
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub topics: Topics,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub curfew: CurfewConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Zone catalog in resolution order. Empty means the built-in facility.
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    /// Prisoners to register at startup. Absent means the built-in roster.
    #[serde(default)]
    pub prisoners: Option<Vec<PrisonerSeed>>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    http_bind_address: String,
    http_port: u16,
    mqtt_enabled: bool,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_client_id: String,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    broker_enabled: bool,
    broker_bind_address: String,
    broker_port: u16,
    broker_ws_port: Option<u16>,
    topics: Topics,
    alert_rules: AlertRules,
    clock_default_hour: u32,
    clock_default_minute: u32,
    catalog: ZoneCatalog,
    prisoners: Vec<PrisonerSeed>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            http_bind_address: default_http_bind_address(),
            http_port: default_http_port(),
            mqtt_enabled: true,
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_client_id: default_mqtt_client_id(),
            mqtt_username: None,
            mqtt_password: None,
            broker_enabled: true,
            broker_bind_address: default_broker_bind_address(),
            broker_port: default_mqtt_port(),
            broker_ws_port: None,
            topics: Topics::default(),
            alert_rules: AlertRules::default(),
            clock_default_hour: default_clock_hour(),
            clock_default_minute: 0,
            catalog: Self::default_catalog(),
            prisoners: Self::default_prisoners(),
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Built-in facility: dining hall, cells, yard and showers
    fn default_zones() -> Vec<Zone> {
        let rect = |x0: f64, y0: f64, x1: f64, y1: f64| vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]];
        vec![
            Zone::new("A", "Comedor", rect(0.0, 0.0, 10.0, 10.0)).with_capacity(20),
            Zone::new("B", "Celdas", rect(6.0, 10.0, 18.0, 20.0)),
            Zone::new("C", "Patio", rect(12.0, 0.0, 22.0, 10.0)),
            Zone::new("D", "Duchas", rect(3.0, 12.0, 6.0, 20.0)).with_capacity(20),
        ]
    }

    fn default_catalog() -> ZoneCatalog {
        ZoneCatalog::new(Self::default_zones()).unwrap_or_else(|e| unreachable!("built-in catalog: {e}"))
    }

    fn default_prisoners() -> Vec<PrisonerSeed> {
        ["John Doe", "Jane Smith", "Carlos Pérez"]
            .into_iter()
            .map(|name| PrisonerSeed { name: name.to_string(), room: None })
            .collect()
    }

    /// Config file path when none is given on the command line:
    /// `CONFIG_FILE`, else `config/dev.toml`
    pub fn resolve_config_path() -> String {
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Self::from_toml(toml_config, path.display().to_string())
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> anyhow::Result<Self> {
        let catalog = if toml_config.zones.is_empty() {
            Self::default_catalog()
        } else {
            ZoneCatalog::new(toml_config.zones.into_iter().map(Zone::from).collect())?
        };

        let curfew = toml_config.curfew;
        if curfew.start_hour > 23 || curfew.end_hour > 24 {
            bail!("curfew hours out of range: {}..{}", curfew.start_hour, curfew.end_hour);
        }
        let rest_zone = ZoneId::new(curfew.rest_zone);
        if !catalog.contains_id(&rest_zone) {
            bail!("curfew rest zone {} is not in the zone catalog", rest_zone);
        }

        let alerts = toml_config.alerts;
        if !alerts.noise_threshold.is_finite() || !alerts.smoke_threshold.is_finite() {
            bail!("alert thresholds must be finite numbers");
        }

        let clock = toml_config.clock;
        if clock.default_hour > 23 || clock.default_minute > 59 {
            bail!("default clock {}:{} out of range", clock.default_hour, clock.default_minute);
        }

        Ok(Self {
            site_id: toml_config.site.id,
            http_bind_address: toml_config.http.bind_address,
            http_port: toml_config.http.port,
            mqtt_enabled: toml_config.mqtt.enabled,
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_client_id: toml_config.mqtt.client_id,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            broker_enabled: toml_config.broker.enabled,
            broker_bind_address: toml_config.broker.bind_address,
            broker_port: toml_config.broker.port,
            broker_ws_port: toml_config.broker.ws_port,
            topics: toml_config.topics,
            alert_rules: AlertRules {
                night_window: NightWindow::new(curfew.start_hour, curfew.end_hour),
                rest_zone,
                noise_threshold: alerts.noise_threshold,
                smoke_threshold: alerts.smoke_threshold,
            },
            clock_default_hour: clock.default_hour,
            clock_default_minute: clock.default_minute,
            catalog,
            prisoners: toml_config.prisoners.unwrap_or_else(Self::default_prisoners),
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        })
    }

    /// Load configuration from a path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn http_bind_address(&self) -> &str {
        &self.http_bind_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn mqtt_enabled(&self) -> bool {
        self.mqtt_enabled
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_client_id(&self) -> &str {
        &self.mqtt_client_id
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn broker_enabled(&self) -> bool {
        self.broker_enabled
    }

    pub fn broker_bind_address(&self) -> &str {
        &self.broker_bind_address
    }

    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    pub fn broker_ws_port(&self) -> Option<u16> {
        self.broker_ws_port
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn alert_rules(&self) -> &AlertRules {
        &self.alert_rules
    }

    pub fn clock_default(&self) -> (u32, u32) {
        (self.clock_default_hour, self.clock_default_minute)
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    pub fn prisoners(&self) -> &[PrisonerSeed] {
        &self.prisoners
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to replace the startup roster
    pub fn with_prisoners(mut self, prisoners: Vec<PrisonerSeed>) -> Self {
        self.prisoners = prisoners;
        self
    }

    /// Builder method for tests to replace the zone catalog
    pub fn with_catalog(mut self, catalog: ZoneCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Builder method for tests to override alert thresholds and curfew rules
    pub fn with_alert_rules(mut self, rules: AlertRules) -> Self {
        self.alert_rules = rules;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mqtt_host(), "localhost");
        assert_eq!(config.mqtt_port(), 1883);
        assert_eq!(config.http_port(), 8484);
        assert_eq!(config.catalog().len(), 4);
        assert_eq!(config.prisoners().len(), 3);
        assert_eq!(config.clock_default(), (12, 0));
        assert_eq!(config.alert_rules().rest_zone, ZoneId::from("B"));
        assert_eq!(config.alert_rules().noise_threshold, 90.0);
        assert_eq!(config.alert_rules().smoke_threshold, 1.0);
    }

    #[test]
    fn test_default_topics() {
        let topics = Topics::default();
        assert_eq!(topics.prisoner_registered, "carcel/preso");
        assert_eq!(topics.sprinkler, "carcel/aspersor");
        assert_eq!(topics.capacity_alert, "jail/alerts/capacity");
    }

    #[test]
    fn test_resolve_config_path_default() {
        if env::var("CONFIG_FILE").is_err() {
            assert_eq!(Config::resolve_config_path(), "config/dev.toml");
        }
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string()).unwrap();
        assert_eq!(config.catalog().len(), 4);
        assert_eq!(config.topics(), &Topics::default());
        assert_eq!(config.config_file(), "inline");
    }

    #[test]
    fn test_partial_topics_override() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[topics]
noise_alert = "lab/noise"
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string()).unwrap();
        assert_eq!(config.topics().noise_alert, "lab/noise");
        assert_eq!(config.topics().smoke, "jail/smoke");
    }

    #[test]
    fn test_unknown_rest_zone_rejected() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[curfew]
rest_zone = "Z"
"#,
        )
        .unwrap();
        assert!(Config::from_toml(toml_config, "inline".to_string()).is_err());
    }

    #[test]
    fn test_empty_prisoner_list_is_respected() {
        let toml_config: TomlConfig = toml::from_str("prisoners = []").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string()).unwrap();
        assert!(config.prisoners().is_empty());
    }
}
