use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use aerohold_core::{ExclusionLock, LockCompensation, StoreResult};
use aerohold_shared::{Ticket, TicketId, TravelerId};

struct Held<T> {
    holder: T,
    expires_at: DateTime<Utc>,
}

impl<T> Held<T> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Default)]
struct Slots {
    travelers: HashMap<TravelerId, Held<Ticket>>,
    tickets: HashMap<TicketId, Held<TravelerId>>,
}

impl Slots {
    fn prune(&mut self, now: DateTime<Utc>) {
        self.travelers.retain(|_, held| held.is_live(now));
        self.tickets.retain(|_, held| held.is_live(now));
    }
}

/// Both lock namespaces behind one mutex; expired entries behave as absent.
#[derive(Default)]
pub struct MemoryLock {
    slots: Mutex<Slots>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ticket_holder(&self, ticket_id: TicketId) -> Option<TravelerId> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());
        slots.tickets.get(&ticket_id).map(|held| held.holder)
    }

    pub async fn ticket_lock_expiry(&self, ticket_id: TicketId) -> Option<DateTime<Utc>> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());
        slots.tickets.get(&ticket_id).map(|held| held.expires_at)
    }

    pub async fn traveler_lock_expiry(&self, traveler_id: TravelerId) -> Option<DateTime<Utc>> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());
        slots.travelers.get(&traveler_id).map(|held| held.expires_at)
    }

    /// Number of live locks across both namespaces.
    pub async fn live_locks(&self) -> usize {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());
        slots.travelers.len() + slots.tickets.len()
    }
}

#[async_trait]
impl ExclusionLock for MemoryLock {
    async fn lock_traveler(
        &self,
        traveler_id: TravelerId,
        ticket: &Ticket,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let now = Utc::now();
        let mut slots = self.slots.lock().await;
        slots.prune(now);

        if slots.travelers.contains_key(&traveler_id) || expires_at <= now {
            return Ok(false);
        }
        slots.travelers.insert(traveler_id, Held { holder: ticket.clone(), expires_at });
        Ok(true)
    }

    async fn lock_ticket(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let now = Utc::now();
        let mut slots = self.slots.lock().await;
        slots.prune(now);

        if slots.tickets.contains_key(&ticket_id) || expires_at <= now {
            return Ok(false);
        }
        slots.tickets.insert(ticket_id, Held { holder: traveler_id, expires_at });
        Ok(true)
    }

    async fn unlock_traveler(&self, traveler_id: TravelerId, ticket_id: TicketId) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());

        if slots.travelers.get(&traveler_id).is_some_and(|held| held.holder.id == ticket_id) {
            slots.travelers.remove(&traveler_id);
        }
        Ok(())
    }

    async fn unlock_ticket(&self, traveler_id: TravelerId, ticket_id: TicketId) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());

        if slots.tickets.get(&ticket_id).is_some_and(|held| held.holder == traveler_id) {
            slots.tickets.remove(&ticket_id);
        }
        Ok(())
    }

    async fn get_traveler_locked_ticket(&self, traveler_id: TravelerId) -> StoreResult<Option<Ticket>> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());
        Ok(slots.travelers.get(&traveler_id).map(|held| held.holder.clone()))
    }

    async fn extend_lock_time(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Vec<LockCompensation>> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());

        let mut compensations = Vec::with_capacity(2);

        if let Some(held) = slots.travelers.get_mut(&traveler_id) {
            if held.holder.id == ticket_id {
                compensations.push(LockCompensation::RestoreClaimantExpiry {
                    traveler_id,
                    ticket_id,
                    expires_at: held.expires_at,
                });
                held.expires_at = expires_at;
            }
        }

        if let Some(held) = slots.tickets.get_mut(&ticket_id) {
            if held.holder == traveler_id {
                compensations.push(LockCompensation::RestoreUnitExpiry {
                    traveler_id,
                    ticket_id,
                    expires_at: held.expires_at,
                });
                held.expires_at = expires_at;
            }
        }

        Ok(compensations)
    }

    async fn compensate(&self, compensation: &LockCompensation) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        slots.prune(Utc::now());

        match compensation {
            LockCompensation::RestoreClaimantExpiry { traveler_id, ticket_id, expires_at } => {
                if let Some(held) = slots.travelers.get_mut(traveler_id) {
                    if held.holder.id == *ticket_id {
                        held.expires_at = *expires_at;
                    }
                }
            }
            LockCompensation::RestoreUnitExpiry { traveler_id, ticket_id, expires_at } => {
                if let Some(held) = slots.tickets.get_mut(ticket_id) {
                    if held.holder == *traveler_id {
                        held.expires_at = *expires_at;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerohold_shared::{Airport, Flight, Route};
    use chrono::Duration;
    use std::sync::Arc;

    fn ticket(id: TicketId) -> Ticket {
        Ticket {
            id,
            flight: Flight {
                id: 1,
                capacity: 10,
                base_price: 100.0,
                route: Route {
                    id: 1,
                    airports: [
                        Airport { id: 1, name: "a".to_string() },
                        Airport { id: 2, name: "b".to_string() },
                    ],
                },
                booked: None,
                current_ticket_price: None,
            },
            traveler: None,
            price: 100.0,
        }
    }

    fn in_minutes(m: i64) -> DateTime<Utc> {
        Utc::now() + Duration::minutes(m)
    }

    #[tokio::test]
    async fn test_ticket_lock_is_exclusive_and_identity_checked() {
        let lock = MemoryLock::new();
        assert!(lock.lock_ticket(1, 50, in_minutes(3)).await.unwrap());
        assert!(!lock.lock_ticket(2, 50, in_minutes(3)).await.unwrap());

        // Not the holder: no effect.
        lock.unlock_ticket(2, 50).await.unwrap();
        assert_eq!(lock.ticket_holder(50).await, Some(1));

        lock.unlock_ticket(1, 50).await.unwrap();
        assert_eq!(lock.ticket_holder(50).await, None);
        assert!(lock.lock_ticket(2, 50, in_minutes(3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_traveler_lock_holds_snapshot() {
        let lock = MemoryLock::new();
        assert!(lock.lock_traveler(1, &ticket(50), in_minutes(3)).await.unwrap());
        assert!(!lock.lock_traveler(1, &ticket(51), in_minutes(3)).await.unwrap());

        let held = lock.get_traveler_locked_ticket(1).await.unwrap().unwrap();
        assert_eq!(held.id, 50);

        // Different ticket: no effect.
        lock.unlock_traveler(1, 51).await.unwrap();
        assert!(lock.get_traveler_locked_ticket(1).await.unwrap().is_some());

        lock.unlock_traveler(1, 50).await.unwrap();
        assert!(lock.get_traveler_locked_ticket(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_reacquired() {
        let lock = MemoryLock::new();
        let soon = Utc::now() + Duration::milliseconds(20);
        assert!(lock.lock_ticket(1, 50, soon).await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert!(lock.lock_ticket(2, 50, in_minutes(3)).await.unwrap());

        // The stale holder cannot release the new lock.
        lock.unlock_ticket(1, 50).await.unwrap();
        assert_eq!(lock.ticket_holder(50).await, Some(2));
    }

    #[tokio::test]
    async fn test_extend_returns_compensations_that_restore() {
        let lock = MemoryLock::new();
        let first_expiry = in_minutes(3);
        lock.lock_ticket(1, 50, first_expiry).await.unwrap();
        lock.lock_traveler(1, &ticket(50), first_expiry).await.unwrap();

        let extended = in_minutes(10);
        let compensations = lock.extend_lock_time(1, 50, extended).await.unwrap();
        assert_eq!(compensations.len(), 2);
        assert_eq!(lock.ticket_lock_expiry(50).await, Some(extended));
        assert_eq!(lock.traveler_lock_expiry(1).await, Some(extended));

        for c in &compensations {
            assert_eq!(c.expires_at(), first_expiry);
            lock.compensate(c).await.unwrap();
        }
        assert_eq!(lock.ticket_lock_expiry(50).await, Some(first_expiry));
        assert_eq!(lock.traveler_lock_expiry(1).await, Some(first_expiry));
    }

    #[tokio::test]
    async fn test_extend_skips_missing_or_foreign_keys() {
        let lock = MemoryLock::new();
        assert!(lock.extend_lock_time(1, 50, in_minutes(10)).await.unwrap().is_empty());

        lock.lock_ticket(2, 50, in_minutes(3)).await.unwrap();
        lock.lock_traveler(1, &ticket(50), in_minutes(3)).await.unwrap();

        let compensations = lock.extend_lock_time(1, 50, in_minutes(10)).await.unwrap();
        assert_eq!(compensations.len(), 1);
        assert!(matches!(compensations[0], LockCompensation::RestoreClaimantExpiry { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ticket_locks_have_one_winner() {
        let lock = Arc::new(MemoryLock::new());
        let expires_at = in_minutes(3);

        let mut handles = Vec::new();
        for traveler_id in 0..32 {
            let lock = lock.clone();
            handles.push(tokio::spawn(async move {
                lock.lock_ticket(traveler_id, 99, expires_at).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(lock.live_locks().await, 1);
    }
}
