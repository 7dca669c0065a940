use std::sync::Arc;
use tracing::info;

use aerohold_core::{InventoryQueue, Storage, StoreResult};
use aerohold_shared::FlightId;

/// Loads unsold tickets from storage into the flight queues.
pub struct Provisioner {
    storage: Arc<dyn Storage>,
    queue: Arc<dyn InventoryQueue>,
}

impl Provisioner {
    pub fn new(storage: Arc<dyn Storage>, queue: Arc<dyn InventoryQueue>) -> Self {
        Self { storage, queue }
    }

    /// Queues every unsold ticket of the flight as available now. Tickets
    /// already queued keep their schedule, so live holds survive a reseed.
    pub async fn seed_flight(&self, flight_id: FlightId) -> StoreResult<usize> {
        let ticket_ids = self.storage.get_unbooked_ticket_ids(flight_id).await?;
        self.queue.push_list(flight_id, &ticket_ids, 0).await?;

        info!("Seeded {} tickets for flight {}", ticket_ids.len(), flight_id);
        Ok(ticket_ids.len())
    }

    /// Seeds every flight of every route. Returns the number of tickets queued.
    pub async fn seed_all(&self) -> StoreResult<usize> {
        let mut total = 0;
        for route_id in self.storage.get_route_ids().await? {
            for flight_id in self.storage.get_flight_ids_by_route_id(route_id).await? {
                total += self.seed_flight(flight_id).await?;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerohold_store::{MemoryQueue, MemoryStorage};

    #[tokio::test]
    async fn test_seed_all_queues_unsold_tickets() {
        let storage = Arc::new(MemoryStorage::new());
        let a = storage.add_airport("AirPort-0").await;
        let b = storage.add_airport("AirPort-1").await;
        let route_id = storage.add_route(a, b).await;
        let (first, tickets) = storage.add_flight(route_id, 4, 100.0).await;
        let (second, _) = storage.add_flight(route_id, 2, 80.0).await;
        let traveler_id = storage.add_traveler("Traveler-0", Some(route_id)).await;
        storage.pay_ticket_order(traveler_id, tickets[0], 100.0).await.unwrap();

        let queue = Arc::new(MemoryQueue::new());
        let provisioner = Provisioner::new(storage.clone(), queue.clone());

        assert_eq!(provisioner.seed_all().await.unwrap(), 5);
        assert_eq!(queue.len(first).await, 3);
        assert_eq!(queue.len(second).await, 2);
        assert_eq!(queue.scheduled_at(first, tickets[0]).await, None);
    }

    #[tokio::test]
    async fn test_reseed_keeps_held_tickets_held() {
        let storage = Arc::new(MemoryStorage::new());
        let a = storage.add_airport("AirPort-0").await;
        let b = storage.add_airport("AirPort-1").await;
        let route_id = storage.add_route(a, b).await;
        let (flight_id, tickets) = storage.add_flight(route_id, 3, 100.0).await;

        let queue = Arc::new(MemoryQueue::new());
        queue.push(flight_id, tickets[1], 180).await.unwrap();

        let provisioner = Provisioner::new(storage, queue.clone());
        provisioner.seed_flight(flight_id).await.unwrap();
        assert_eq!(queue.count(flight_id).await.unwrap(), 1);
        assert_eq!(queue.len(flight_id).await, 3);
    }
}
