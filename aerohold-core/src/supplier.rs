use async_trait::async_trait;
use std::time::Duration;

/// The airline's own reservation system, which must confirm every hold.
#[async_trait]
pub trait AirlineService: Send + Sync {
    /// Keeps attempting the confirmation until one attempt succeeds or the
    /// overall `budget` is spent. A zero budget fails without attempting.
    async fn confirm(&self, budget: Duration) -> bool;
}
