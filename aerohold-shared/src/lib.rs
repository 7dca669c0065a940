pub mod models;

pub use models::entities::{
    Airport, AirportId, Flight, FlightId, Route, RouteId, Ticket, TicketId, Traveler, TravelerId,
};
pub use models::events::ReservationEvent;
