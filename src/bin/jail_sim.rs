//! Jail monitor simulator - scripted load against a running monitor
//!
//! Registers extra prisoners, walks everyone between zone centroids and
//! feeds noise and smoke readings over the HTTP API. Optionally subscribes
//! to the MQTT topic tree and logs every alert and snapshot the monitor
//! publishes.
//!
//! Usage:
//!   cargo run --bin jail-sim -- --prisoners 25 --rounds 5 --night-hour 2
//!   cargo run --bin jail-sim -- --mqtt-host localhost --noise 95 --smoke 1.5

use anyhow::{bail, Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Share of moves (out of 100) that land outside every zone
const STRAY_PERCENT: u64 = 10;
const STRAY_POINT: (f64, f64) = (-50.0, -50.0);

// ============================================================================
// CLI Args
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "jail-sim")]
#[command(about = "Scripted prisoner movement and sensor load for the jail monitor")]
struct Args {
    /// Monitor base URL
    #[arg(long, default_value = "http://localhost:8484")]
    url: String,

    /// Extra prisoners to register before the run
    #[arg(long, default_value = "0")]
    prisoners: u32,

    /// Movement rounds (every prisoner moves once per round)
    #[arg(long, default_value = "3")]
    rounds: u32,

    /// Pause between rounds in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Set the monitor clock to this hour before moving anyone
    #[arg(long)]
    night_hour: Option<u32>,

    /// Noise level reported for every room each round
    #[arg(long)]
    noise: Option<f64>,

    /// Smoke level reported for every room each round
    #[arg(long)]
    smoke: Option<f64>,

    /// Seed for the movement generator
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Reset the monitor before the run
    #[arg(long)]
    reset: bool,

    /// MQTT broker host to watch (disabled when absent)
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    mqtt_port: u16,

    /// Topic filter to subscribe to. The default covers both the `jail/`
    /// and `carcel/` trees.
    #[arg(long, default_value = "#")]
    mqtt_topic: String,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Room {
    id: String,
    polygon: Vec<[f64; 2]>,
}

impl Room {
    /// Vertex average. Good enough for the convex rooms the monitor ships with.
    fn center(&self) -> (f64, f64) {
        let n = self.polygon.len().max(1) as f64;
        let (sx, sy) = self.polygon.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        (sx / n, sy / n)
    }
}

#[derive(Debug, Deserialize)]
struct Prisoner {
    id: i64,
    name: String,
}

/// Small deterministic generator so runs are repeatable per seed
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

struct MonitorClient {
    http: reqwest::Client,
    base: String,
}

impl MonitorClient {
    fn new(base: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base: base.trim_end_matches('/').to_string() })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        if !resp.status().is_success() {
            bail!("GET {path} returned {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        let status = resp.status();
        let value: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            bail!("POST {path} returned {status}: {value}");
        }
        Ok(value)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.http.delete(format!("{}{}", self.base, path)).send().await?;
        if !resp.status().is_success() {
            bail!("DELETE {path} returned {}", resp.status());
        }
        Ok(())
    }
}

// ============================================================================
// MQTT Watcher
// ============================================================================

async fn spawn_mqtt_watcher(host: &str, port: u16, topic: &str) -> Result<()> {
    let client_id = format!("jail-sim-{}", std::process::id());
    let mut mqtt_options = MqttOptions::new(client_id, host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);
    client.subscribe(topic, QoS::AtLeastOnce).await?;

    tokio::spawn(async move {
        // Keep the client alive for the lifetime of the loop
        let _client = client;
        loop {
            match eventloop.poll().await {
                Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => info!("mqtt_watch_connected"),
                Ok(MqttEvent::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload);
                    if publish.topic.contains("alert") || publish.topic.contains("sprinkler") {
                        warn!(topic = %publish.topic, payload = %payload, "mqtt_alert");
                    } else {
                        debug!(topic = %publish.topic, payload = %payload, "mqtt_message");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt_watch_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    Ok(())
}

// ============================================================================
// Scenario
// ============================================================================

async fn run(args: Args) -> Result<()> {
    let api = MonitorClient::new(&args.url)?;

    if args.reset {
        api.delete("/jail/reset").await?;
        info!("monitor_reset");
    }

    let rooms: Vec<Room> = api.get("/jail/rooms").await?;
    if rooms.is_empty() {
        bail!("monitor has no rooms configured");
    }
    info!(rooms = %rooms.len(), "rooms_loaded");

    for i in 0..args.prisoners {
        let name = format!("Sim {}", i + 1);
        let created = api.post("/jail/prisoner", json!({ "name": name })).await?;
        debug!(response = %created, "prisoner_registered");
    }

    let prisoners: Vec<Prisoner> = api.get("/jail/prisoners").await?;
    info!(prisoners = %prisoners.len(), "roster_loaded");

    if let Some(hour) = args.night_hour {
        api.post("/jail/time", json!({ "hour": hour, "minute": 0 })).await?;
        info!(hour = %hour, "clock_set");
    }

    let mut rng = Lcg(args.seed);
    for round in 1..=args.rounds {
        let mut failures = 0u32;

        for prisoner in &prisoners {
            let (x, y) = if rng.below(100) < STRAY_PERCENT {
                STRAY_POINT
            } else {
                let room = &rooms[rng.below(rooms.len() as u64) as usize];
                let (cx, cy) = room.center();
                let jitter = |v: u64| (v as f64 / 1000.0) - 0.5;
                (cx + jitter(rng.below(1000)), cy + jitter(rng.below(1000)))
            };

            let body = json!({ "prisonerId": prisoner.id, "x": x, "y": y });
            match api.post("/jail/position", body).await {
                Ok(resp) => debug!(id = %prisoner.id, name = %prisoner.name, room = %resp["room"], "position_sent"),
                Err(e) => {
                    failures += 1;
                    warn!(id = %prisoner.id, error = %e, "position_failed");
                }
            }
        }

        for room in &rooms {
            if let Some(level) = args.noise {
                if let Err(e) = api.post("/jail/noise", json!({ "sala": room.id, "noiseLevel": level })).await {
                    failures += 1;
                    warn!(room = %room.id, error = %e, "noise_failed");
                }
            }
            if let Some(level) = args.smoke {
                if let Err(e) = api.post("/jail/smoke", json!({ "sala": room.id, "smokeLevel": level })).await {
                    failures += 1;
                    warn!(room = %room.id, error = %e, "smoke_failed");
                }
            }
        }

        api.post("/jail/sweep", json!({})).await?;
        let occupancy: Value = api.get("/jail/occupancy").await?;
        info!(round = %round, failures = %failures, occupancy = %occupancy, "round_complete");

        if round < args.rounds {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    info!(url = %args.url, rounds = %args.rounds, seed = %args.seed, "jail-sim starting");

    if let Some(host) = args.mqtt_host.as_deref() {
        spawn_mqtt_watcher(host, args.mqtt_port, &args.mqtt_topic).await?;
        // Give the subscription a moment before traffic starts
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    run(args).await?;

    // Let trailing alerts arrive before exit
    tokio::time::sleep(Duration::from_millis(500)).await;
    info!("jail-sim done");
    Ok(())
}
