use async_trait::async_trait;
use aerohold_shared::{
    Airport, AirportId, Flight, FlightId, Route, RouteId, Ticket, TicketId, Traveler, TravelerId,
};

use crate::error::StoreResult;

/// Canonical entity persistence.
///
/// Mutations are only invoked once the caller owns the ticket's unit lock,
/// so implementations are not required to serialize them.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_traveler_by_id(&self, id: TravelerId) -> StoreResult<Option<Traveler>>;

    async fn get_route_by_id(&self, id: RouteId) -> StoreResult<Option<Route>>;

    async fn get_airport_by_id(&self, id: AirportId) -> StoreResult<Option<Airport>>;

    /// Flight as persisted; `booked` and `current_ticket_price` are left empty.
    async fn get_flight_by_id(&self, id: FlightId) -> StoreResult<Option<Flight>>;

    async fn get_ticket_by_id(&self, id: TicketId) -> StoreResult<Option<Ticket>>;

    async fn get_route_ids(&self) -> StoreResult<Vec<RouteId>>;

    async fn get_flight_ids_by_route_id(&self, route_id: RouteId) -> StoreResult<Vec<FlightId>>;

    /// Tickets of the flight with no traveler persisted on them.
    async fn get_unbooked_ticket_ids(&self, flight_id: FlightId) -> StoreResult<Vec<TicketId>>;

    /// Records the sale: traveler and final price.
    async fn pay_ticket_order(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        price: f64,
    ) -> StoreResult<()>;

    /// Clears the traveler and resets the price to zero.
    async fn cancel_ticket_order(&self, ticket_id: TicketId) -> StoreResult<()>;
}

/// Bulk writes that (re)build the flight inventory.
#[async_trait]
pub trait CatalogWriter: Storage {
    async fn get_airport_ids(&self) -> StoreResult<Vec<AirportId>>;

    /// Returns the ids of the new airports.
    async fn insert_airports(&self, names: &[String]) -> StoreResult<Vec<AirportId>>;

    /// Pairs that already exist are skipped. Returns the number inserted.
    async fn insert_routes(&self, pairs: &[(AirportId, AirportId)]) -> StoreResult<u64>;

    /// Deletes every ticket, flight and traveler. Airports and routes stay.
    async fn clear_inventory(&self) -> StoreResult<()>;

    /// Creates the flight together with `capacity` unsold tickets at price zero.
    async fn insert_flight(&self, route_id: RouteId, capacity: u32, base_price: f64) -> StoreResult<FlightId>;

    async fn insert_travelers(&self, travelers: &[(String, RouteId)]) -> StoreResult<u64>;
}
