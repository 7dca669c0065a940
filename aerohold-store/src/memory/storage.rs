use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use aerohold_core::{CatalogWriter, Storage, StoreResult};
use aerohold_shared::{
    Airport, AirportId, Flight, FlightId, Route, RouteId, Ticket, TicketId, Traveler, TravelerId,
};

struct RouteRecord {
    from: AirportId,
    to: AirportId,
}

struct FlightRecord {
    route_id: RouteId,
    capacity: u32,
    base_price: f64,
}

struct TravelerRecord {
    name: String,
    route_id: Option<RouteId>,
}

struct TicketRecord {
    flight_id: FlightId,
    traveler_id: Option<TravelerId>,
    price: f64,
}

/// Rows keyed the way the relational schema keys them; entities are
/// assembled on read.
#[derive(Default)]
struct Catalog {
    airports: BTreeMap<AirportId, String>,
    routes: BTreeMap<RouteId, RouteRecord>,
    flights: BTreeMap<FlightId, FlightRecord>,
    travelers: BTreeMap<TravelerId, TravelerRecord>,
    tickets: BTreeMap<TicketId, TicketRecord>,
}

fn next_id<V>(table: &BTreeMap<i64, V>) -> i64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

impl Catalog {
    fn airport(&self, id: AirportId) -> Option<Airport> {
        self.airports.get(&id).map(|name| Airport { id, name: name.clone() })
    }

    fn route(&self, id: RouteId) -> Option<Route> {
        let record = self.routes.get(&id)?;
        Some(Route { id, airports: [self.airport(record.from)?, self.airport(record.to)?] })
    }

    fn flight(&self, id: FlightId) -> Option<Flight> {
        let record = self.flights.get(&id)?;
        Some(Flight {
            id,
            capacity: record.capacity,
            base_price: record.base_price,
            route: self.route(record.route_id)?,
            booked: None,
            current_ticket_price: None,
        })
    }

    fn traveler(&self, id: TravelerId) -> Option<Traveler> {
        let record = self.travelers.get(&id)?;
        Some(Traveler {
            id,
            name: record.name.clone(),
            route: record.route_id.and_then(|route_id| self.route(route_id)),
        })
    }

    fn ticket(&self, id: TicketId) -> Option<Ticket> {
        let record = self.tickets.get(&id)?;
        Some(Ticket {
            id,
            flight: self.flight(record.flight_id)?,
            traveler: record.traveler_id.and_then(|traveler_id| self.traveler(traveler_id)),
            price: record.price,
        })
    }
}

/// In-process `Storage` with provisioning helpers.
#[derive(Default)]
pub struct MemoryStorage {
    catalog: RwLock<Catalog>,
    mutations: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_airport(&self, name: &str) -> AirportId {
        let mut catalog = self.catalog.write().await;
        let id = next_id(&catalog.airports);
        catalog.airports.insert(id, name.to_string());
        id
    }

    pub async fn add_route(&self, from: AirportId, to: AirportId) -> RouteId {
        let mut catalog = self.catalog.write().await;
        let id = next_id(&catalog.routes);
        catalog.routes.insert(id, RouteRecord { from, to });
        id
    }

    /// Creates the flight together with `capacity` unsold tickets.
    pub async fn add_flight(
        &self,
        route_id: RouteId,
        capacity: u32,
        base_price: f64,
    ) -> (FlightId, Vec<TicketId>) {
        let mut catalog = self.catalog.write().await;
        let flight_id = next_id(&catalog.flights);
        catalog.flights.insert(flight_id, FlightRecord { route_id, capacity, base_price });

        let first = next_id(&catalog.tickets);
        let ticket_ids: Vec<TicketId> = (first..first + i64::from(capacity)).collect();
        for ticket_id in &ticket_ids {
            catalog.tickets.insert(
                *ticket_id,
                TicketRecord { flight_id, traveler_id: None, price: 0.0 },
            );
        }
        (flight_id, ticket_ids)
    }

    pub async fn add_traveler(&self, name: &str, route_id: Option<RouteId>) -> TravelerId {
        let mut catalog = self.catalog.write().await;
        let id = next_id(&catalog.travelers);
        catalog.travelers.insert(id, TravelerRecord { name: name.to_string(), route_id });
        id
    }

    /// Count of `pay_ticket_order` and `cancel_ticket_order` calls so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_traveler_by_id(&self, id: TravelerId) -> StoreResult<Option<Traveler>> {
        Ok(self.catalog.read().await.traveler(id))
    }

    async fn get_route_by_id(&self, id: RouteId) -> StoreResult<Option<Route>> {
        Ok(self.catalog.read().await.route(id))
    }

    async fn get_airport_by_id(&self, id: AirportId) -> StoreResult<Option<Airport>> {
        Ok(self.catalog.read().await.airport(id))
    }

    async fn get_flight_by_id(&self, id: FlightId) -> StoreResult<Option<Flight>> {
        Ok(self.catalog.read().await.flight(id))
    }

    async fn get_ticket_by_id(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        Ok(self.catalog.read().await.ticket(id))
    }

    async fn get_route_ids(&self) -> StoreResult<Vec<RouteId>> {
        Ok(self.catalog.read().await.routes.keys().copied().collect())
    }

    async fn get_flight_ids_by_route_id(&self, route_id: RouteId) -> StoreResult<Vec<FlightId>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .flights
            .iter()
            .filter(|(_, f)| f.route_id == route_id)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn get_unbooked_ticket_ids(&self, flight_id: FlightId) -> StoreResult<Vec<TicketId>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .tickets
            .iter()
            .filter(|(_, t)| t.flight_id == flight_id && t.traveler_id.is_none())
            .map(|(id, _)| *id)
            .collect())
    }

    async fn pay_ticket_order(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        price: f64,
    ) -> StoreResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut catalog = self.catalog.write().await;
        if let Some(ticket) = catalog.tickets.get_mut(&ticket_id) {
            ticket.traveler_id = Some(traveler_id);
            ticket.price = price;
        }
        Ok(())
    }

    async fn cancel_ticket_order(&self, ticket_id: TicketId) -> StoreResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut catalog = self.catalog.write().await;
        if let Some(ticket) = catalog.tickets.get_mut(&ticket_id) {
            ticket.traveler_id = None;
            ticket.price = 0.0;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogWriter for MemoryStorage {
    async fn get_airport_ids(&self) -> StoreResult<Vec<AirportId>> {
        Ok(self.catalog.read().await.airports.keys().copied().collect())
    }

    async fn insert_airports(&self, names: &[String]) -> StoreResult<Vec<AirportId>> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            ids.push(self.add_airport(name).await);
        }
        Ok(ids)
    }

    async fn insert_routes(&self, pairs: &[(AirportId, AirportId)]) -> StoreResult<u64> {
        let mut catalog = self.catalog.write().await;
        let mut inserted = 0;
        for &(from, to) in pairs {
            if from == to || catalog.routes.values().any(|r| r.from == from && r.to == to) {
                continue;
            }
            let id = next_id(&catalog.routes);
            catalog.routes.insert(id, RouteRecord { from, to });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn clear_inventory(&self) -> StoreResult<()> {
        let mut catalog = self.catalog.write().await;
        catalog.tickets.clear();
        catalog.flights.clear();
        catalog.travelers.clear();
        Ok(())
    }

    async fn insert_flight(&self, route_id: RouteId, capacity: u32, base_price: f64) -> StoreResult<FlightId> {
        let (flight_id, _) = self.add_flight(route_id, capacity, base_price).await;
        Ok(flight_id)
    }

    async fn insert_travelers(&self, travelers: &[(String, RouteId)]) -> StoreResult<u64> {
        for (name, route_id) in travelers {
            self.add_traveler(name, Some(*route_id)).await;
        }
        Ok(travelers.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStorage, RouteId, FlightId, Vec<TicketId>) {
        let storage = MemoryStorage::new();
        let a = storage.add_airport("AirPort-0").await;
        let b = storage.add_airport("AirPort-1").await;
        let route_id = storage.add_route(a, b).await;
        let (flight_id, tickets) = storage.add_flight(route_id, 3, 100.0).await;
        (storage, route_id, flight_id, tickets)
    }

    #[tokio::test]
    async fn test_add_flight_creates_unsold_tickets() {
        let (storage, route_id, flight_id, tickets) = seeded().await;
        assert_eq!(tickets, vec![1, 2, 3]);
        assert_eq!(storage.get_unbooked_ticket_ids(flight_id).await.unwrap(), tickets);
        assert_eq!(storage.get_flight_ids_by_route_id(route_id).await.unwrap(), vec![flight_id]);

        let (second, more) = storage.add_flight(route_id, 2, 50.0).await;
        assert_eq!(second, 2);
        assert_eq!(more, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_ticket_resolves_relations() {
        let (storage, route_id, flight_id, tickets) = seeded().await;
        let ticket = storage.get_ticket_by_id(tickets[0]).await.unwrap().unwrap();

        assert_eq!(ticket.flight_id(), flight_id);
        assert_eq!(ticket.flight.route.id, route_id);
        assert_eq!(ticket.flight.route.airports[1].name, "AirPort-1");
        assert!(!ticket.is_sold());
        assert!(storage.get_ticket_by_id(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pay_and_cancel_persist() {
        let (storage, _, flight_id, tickets) = seeded().await;
        let traveler_id = storage.add_traveler("Traveler-0", None).await;

        storage.pay_ticket_order(traveler_id, tickets[1], 133.33).await.unwrap();
        let sold = storage.get_ticket_by_id(tickets[1]).await.unwrap().unwrap();
        assert!(sold.sold_to(traveler_id));
        assert_eq!(sold.price, 133.33);
        assert_eq!(
            storage.get_unbooked_ticket_ids(flight_id).await.unwrap(),
            vec![tickets[0], tickets[2]]
        );

        storage.cancel_ticket_order(tickets[1]).await.unwrap();
        let back = storage.get_ticket_by_id(tickets[1]).await.unwrap().unwrap();
        assert!(!back.is_sold());
        assert_eq!(back.price, 0.0);
        assert_eq!(storage.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_catalog_writer_skips_duplicate_routes_and_clears_inventory() {
        let (storage, route_id, flight_id, _) = seeded().await;
        storage.add_traveler("Traveler-0", Some(route_id)).await;

        let ids = storage.get_airport_ids().await.unwrap();
        let inserted = storage
            .insert_routes(&[(ids[0], ids[1]), (ids[1], ids[0]), (ids[0], ids[0])])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(storage.get_route_ids().await.unwrap().len(), 2);

        storage.clear_inventory().await.unwrap();
        assert!(storage.get_flight_by_id(flight_id).await.unwrap().is_none());
        assert!(storage.get_traveler_by_id(1).await.unwrap().is_none());
        assert!(storage.get_unbooked_ticket_ids(flight_id).await.unwrap().is_empty());
        assert_eq!(storage.get_route_ids().await.unwrap().len(), 2);
    }
}
