//! Two-namespace exclusion lock: one key per traveler (the claimant) and
//! one key per ticket (the unit).
//!
//! The traveler key stores a JSON snapshot of the held ticket, the ticket key
//! stores the id of the traveler holding it. Both carry an absolute expiry
//! enforced by the backing store. Releases are identity-checked so a lock
//! that expired and was re-acquired by someone else is never removed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use aerohold_shared::{Ticket, TicketId, TravelerId};

use crate::error::StoreResult;

/// Inverse of one key extended by [`ExclusionLock::extend_lock_time`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LockCompensation {
    RestoreClaimantExpiry {
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    },
    RestoreUnitExpiry {
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    },
}

impl LockCompensation {
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            LockCompensation::RestoreClaimantExpiry { expires_at, .. }
            | LockCompensation::RestoreUnitExpiry { expires_at, .. } => *expires_at,
        }
    }
}

impl fmt::Display for LockCompensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockCompensation::RestoreClaimantExpiry { traveler_id, ticket_id, expires_at } => write!(
                f,
                "restore traveler lock {} (ticket {}) expiry to {}",
                traveler_id,
                ticket_id,
                expires_at.to_rfc3339()
            ),
            LockCompensation::RestoreUnitExpiry { traveler_id, ticket_id, expires_at } => write!(
                f,
                "restore ticket lock {} (traveler {}) expiry to {}",
                ticket_id,
                traveler_id,
                expires_at.to_rfc3339()
            ),
        }
    }
}

#[async_trait]
pub trait ExclusionLock: Send + Sync {
    /// Acquire-if-absent on the traveler key, storing a snapshot of `ticket`.
    async fn lock_traveler(
        &self,
        traveler_id: TravelerId,
        ticket: &Ticket,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Acquire-if-absent on the ticket key, storing the traveler id.
    async fn lock_ticket(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Releases the traveler key only if its snapshot is still `ticket_id`.
    async fn unlock_traveler(&self, traveler_id: TravelerId, ticket_id: TicketId) -> StoreResult<()>;

    /// Releases the ticket key only if it is still held by `traveler_id`.
    async fn unlock_ticket(&self, traveler_id: TravelerId, ticket_id: TicketId) -> StoreResult<()>;

    async fn get_traveler_locked_ticket(&self, traveler_id: TravelerId) -> StoreResult<Option<Ticket>>;

    /// Pushes both keys' expiry to `expires_at`, for each key that still
    /// exists with the expected identity and a positive remaining TTL.
    /// Applied atomically; returns one compensation per extended key.
    async fn extend_lock_time(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Vec<LockCompensation>>;

    /// Restores the expiry recorded in `compensation`, if the key still holds
    /// the expected identity.
    async fn compensate(&self, compensation: &LockCompensation) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_compensation_is_inspectable() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let c = LockCompensation::RestoreUnitExpiry { traveler_id: 4, ticket_id: 9, expires_at: at };

        assert_eq!(c.expires_at(), at);
        assert_eq!(
            c.to_string(),
            "restore ticket lock 9 (traveler 4) expiry to 2024-05-01T12:00:00+00:00"
        );

        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["kind"], "restore_unit_expiry");
        assert_eq!(json["ticket_id"], 9);
    }
}
