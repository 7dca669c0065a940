use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub simulators: SimulatorConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout_secs() -> u64 { 3 }

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
}

fn default_queue_name() -> String {
    "unbookedTicket".to_string()
}

/// Knobs of the reservation workflow.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BookingRules {
    /// How long a hold stays exclusive before the store expires it.
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    /// Overall budget for the airline confirmation, retries included.
    #[serde(default = "default_airline_timeout_ms")]
    pub airline_timeout_ms: u64,
    /// Pops tried before a reservation gives up on the flight.
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,
}

fn default_hold_seconds() -> u64 { 180 }
fn default_airline_timeout_ms() -> u64 { 10_000 }
fn default_max_claim_attempts() -> u32 { 64 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            airline_timeout_ms: default_airline_timeout_ms(),
            max_claim_attempts: default_max_claim_attempts(),
        }
    }
}

impl BookingRules {
    pub fn hold_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_seconds as i64)
    }

    pub fn airline_budget(&self) -> Duration {
        Duration::from_millis(self.airline_timeout_ms)
    }
}

/// Latency and failure profile of a simulated downstream system.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct LatencyProfile {
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    /// 0..=100
    pub failure_percent: u8,
}

impl LatencyProfile {
    pub fn new(min_latency_ms: u64, max_latency_ms: u64, failure_percent: u8) -> Self {
        Self {
            min_latency_ms,
            max_latency_ms: max_latency_ms.max(min_latency_ms),
            failure_percent: failure_percent.min(100),
        }
    }

    pub fn instant() -> Self {
        Self::new(0, 0, 0)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SimulatorConfig {
    #[serde(default = "default_airline_profile")]
    pub airline: LatencyProfile,
    #[serde(default = "default_payment_profile")]
    pub payment: LatencyProfile,
}

fn default_airline_profile() -> LatencyProfile {
    LatencyProfile::new(250, 3000, 20)
}

fn default_payment_profile() -> LatencyProfile {
    LatencyProfile::new(250, 3000, 10)
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            airline: default_airline_profile(),
            payment: default_payment_profile(),
        }
    }
}

/// Shape of the synthetic inventory written by the data generator.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GeneratorConfig {
    #[serde(default = "default_flight_count")]
    pub flight_count: u32,
    #[serde(default = "default_traveler_count")]
    pub traveler_count: u32,
    #[serde(default = "default_min_capacity")]
    pub min_capacity: u32,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
}

fn default_flight_count() -> u32 { 200 }
fn default_traveler_count() -> u32 { 10_000 }
fn default_min_capacity() -> u32 { 20 }
fn default_max_capacity() -> u32 { 80 }

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            flight_count: default_flight_count(),
            traveler_count: default_traveler_count(),
            min_capacity: default_min_capacity(),
            max_capacity: default_max_capacity(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    fn load_from(dir: &str) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            // e.g. `AEROHOLD_BOOKING__HOLD_SECONDS=60`
            .add_source(config::Environment::with_prefix("AEROHOLD").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
