//! Stand-ins for the airline and the payment gateway with configurable
//! latency and failure rate.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use aerohold_core::{AirlineService, PaymentService};
use aerohold_store::app_config::LatencyProfile;

/// One call: a uniform random latency, then success unless the failure roll hits.
async fn attempt(profile: LatencyProfile) -> bool {
    let (latency_ms, failed) = {
        let mut rng = rand::thread_rng();
        let low = profile.min_latency_ms.min(profile.max_latency_ms);
        let high = profile.min_latency_ms.max(profile.max_latency_ms);
        (rng.gen_range(low..=high), rng.gen_range(0..100u8) < profile.failure_percent)
    };

    sleep(Duration::from_millis(latency_ms)).await;
    !failed
}

pub struct SimulatedAirline {
    profile: LatencyProfile,
}

impl SimulatedAirline {
    pub fn new(profile: LatencyProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl AirlineService for SimulatedAirline {
    async fn confirm(&self, budget: Duration) -> bool {
        if budget.is_zero() {
            return false;
        }

        let deadline = Instant::now() + budget;
        let mut attempts = 0u32;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Airline budget spent after {} attempts", attempts);
                return false;
            }

            attempts += 1;
            match timeout(remaining, attempt(self.profile)).await {
                Ok(true) => return true,
                Ok(false) => tokio::task::yield_now().await,
                Err(_) => {
                    debug!("Airline attempt {} timed out", attempts);
                    return false;
                }
            }
        }
    }
}

pub struct SimulatedPayment {
    profile: LatencyProfile,
}

impl SimulatedPayment {
    pub fn new(profile: LatencyProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl PaymentService for SimulatedPayment {
    async fn pay(&self) -> bool {
        attempt(self.profile).await
    }
}
