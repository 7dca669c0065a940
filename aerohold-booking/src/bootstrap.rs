use std::sync::Arc;
use tracing::info;

use aerohold_store::app_config::Config;
use aerohold_store::{DbClient, PgStorage, RedisClient, RedisLock, RedisQueue};

use crate::generator::DataGenerator;
use crate::orchestrator::BookingOrchestrator;
use crate::provision::Provisioner;
use crate::simulators::{SimulatedAirline, SimulatedPayment};

/// Postgres and Redis backends built from configuration.
pub struct Backends {
    pub storage: Arc<PgStorage>,
    pub queue: Arc<RedisQueue>,
    pub lock: Arc<RedisLock>,
}

impl Backends {
    /// Connects both stores and brings the schema up to date.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let db = DbClient::connect(&config.database).await?;
        db.migrate().await?;
        info!("Connected to Postgres");

        let redis = RedisClient::new(&config.redis.url).await?;

        Ok(Self {
            storage: Arc::new(PgStorage::new(db.pool)),
            queue: Arc::new(RedisQueue::new(redis.clone(), &config.redis.queue_name)),
            lock: Arc::new(RedisLock::new(redis)),
        })
    }

    pub fn generator(&self, config: &Config) -> DataGenerator {
        DataGenerator::new(self.storage.clone(), config.generator.clone())
    }

    pub fn provisioner(&self) -> Provisioner {
        Provisioner::new(self.storage.clone(), self.queue.clone())
    }

    /// Orchestrator over these backends with simulated downstream services.
    pub fn orchestrator(&self, config: &Config) -> BookingOrchestrator {
        BookingOrchestrator::new(
            self.storage.clone(),
            self.queue.clone(),
            self.lock.clone(),
            Arc::new(SimulatedAirline::new(config.simulators.airline)),
            Arc::new(SimulatedPayment::new(config.simulators.payment)),
            config.booking.clone(),
        )
    }
}
