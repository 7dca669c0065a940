use async_trait::async_trait;
use aerohold_shared::{FlightId, TicketId};

use crate::error::StoreResult;

/// Per-flight delay queue of ticket ids.
///
/// Every member carries a scheduled availability time; only members whose
/// time has passed can be popped.
#[async_trait]
pub trait InventoryQueue: Send + Sync {
    /// Atomically removes and returns one available ticket id.
    /// Concurrent callers never receive the same member from one insertion.
    async fn pop(&self, flight_id: FlightId) -> StoreResult<Option<TicketId>>;

    /// (Re)inserts a ticket, available `delay_seconds` from now.
    async fn push(&self, flight_id: FlightId, ticket_id: TicketId, delay_seconds: u64) -> StoreResult<()>;

    /// Bulk insert for provisioning. Members already queued keep their schedule.
    async fn push_list(
        &self,
        flight_id: FlightId,
        ticket_ids: &[TicketId],
        delay_seconds: u64,
    ) -> StoreResult<()>;

    /// Permanently removes a sold ticket.
    async fn fix(&self, flight_id: FlightId, ticket_id: TicketId) -> StoreResult<()>;

    /// Number of members scheduled in the future, i.e. currently held.
    async fn count(&self, flight_id: FlightId) -> StoreResult<u32>;
}
