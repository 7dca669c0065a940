use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use aerohold_core::{InventoryQueue, StoreResult};
use aerohold_shared::{FlightId, TicketId};

/// Delay queue keyed by flight; each member maps to its availability time
/// in epoch milliseconds.
#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<FlightId, HashMap<TicketId, i64>>>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Availability time of a queued ticket, if it is queued at all.
    pub async fn scheduled_at(&self, flight_id: FlightId, ticket_id: TicketId) -> Option<i64> {
        let queues = self.queues.lock().await;
        queues.get(&flight_id).and_then(|q| q.get(&ticket_id).copied())
    }

    /// Queued members, held or not.
    pub async fn len(&self, flight_id: FlightId) -> usize {
        let queues = self.queues.lock().await;
        queues.get(&flight_id).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl InventoryQueue for MemoryQueue {
    async fn pop(&self, flight_id: FlightId) -> StoreResult<Option<TicketId>> {
        let now = now_ms();
        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.get_mut(&flight_id) else {
            return Ok(None);
        };

        // Earliest score first, ties by id, like ZRANGEBYSCORE.
        let due = queue
            .iter()
            .filter(|(_, score)| **score <= now)
            .min_by_key(|(id, score)| (**score, **id))
            .map(|(id, _)| *id);

        if let Some(ticket_id) = due {
            queue.remove(&ticket_id);
        }
        Ok(due)
    }

    async fn push(&self, flight_id: FlightId, ticket_id: TicketId, delay_seconds: u64) -> StoreResult<()> {
        let score = now_ms() + (delay_seconds as i64) * 1000;
        let mut queues = self.queues.lock().await;
        queues.entry(flight_id).or_default().insert(ticket_id, score);
        Ok(())
    }

    async fn push_list(
        &self,
        flight_id: FlightId,
        ticket_ids: &[TicketId],
        delay_seconds: u64,
    ) -> StoreResult<()> {
        let score = now_ms() + (delay_seconds as i64) * 1000;
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(flight_id).or_default();
        for ticket_id in ticket_ids {
            queue.entry(*ticket_id).or_insert(score);
        }
        Ok(())
    }

    async fn fix(&self, flight_id: FlightId, ticket_id: TicketId) -> StoreResult<()> {
        let mut queues = self.queues.lock().await;
        if let Some(queue) = queues.get_mut(&flight_id) {
            queue.remove(&ticket_id);
        }
        Ok(())
    }

    async fn count(&self, flight_id: FlightId) -> StoreResult<u32> {
        let now = now_ms();
        let queues = self.queues.lock().await;
        let held = queues
            .get(&flight_id)
            .map_or(0, |q| q.values().filter(|score| **score > now).count());
        Ok(u32::try_from(held).unwrap_or(u32::MAX))
    }
}
