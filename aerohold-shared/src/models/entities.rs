use serde::{Deserialize, Serialize};

pub type AirportId = i64;
pub type RouteId = i64;
pub type FlightId = i64;
pub type TravelerId = i64;
pub type TicketId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: AirportId,
    pub name: String,
}

/// An unordered pair of airports. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub airports: [Airport; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub capacity: u32,
    pub base_price: f64,
    pub route: Route,

    /// Derived from inventory occupancy, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked: Option<u32>,

    /// Derived from `booked`, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ticket_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traveler {
    pub id: TravelerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}

/// The sellable unit. A ticket belongs to exactly one flight for its whole life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub flight: Flight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traveler: Option<Traveler>,
    pub price: f64,
}

impl Ticket {
    pub fn flight_id(&self) -> FlightId {
        self.flight.id
    }

    /// True when a traveler has been persisted on the ticket (it was paid for).
    pub fn is_sold(&self) -> bool {
        self.traveler.is_some()
    }

    pub fn sold_to(&self, traveler_id: TravelerId) -> bool {
        self.traveler.as_ref().map(|t| t.id) == Some(traveler_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket() -> Ticket {
        Ticket {
            id: 7,
            flight: Flight {
                id: 3,
                capacity: 10,
                base_price: 100.0,
                route: Route {
                    id: 1,
                    airports: [
                        Airport { id: 1, name: "AirPort-0".to_string() },
                        Airport { id: 2, name: "AirPort-1".to_string() },
                    ],
                },
                booked: None,
                current_ticket_price: None,
            },
            traveler: None,
            price: 0.0,
        }
    }

    #[test]
    fn test_ticket_snapshot_round_trip() {
        let mut ticket = sample_ticket();
        ticket.price = 140.5;

        let json = serde_json::to_string(&ticket).unwrap();
        assert!(!json.contains("booked"));
        assert!(!json.contains("traveler"));

        let back: Ticket = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ticket);
        assert_eq!(back.flight_id(), 3);
    }

    #[test]
    fn test_sold_to() {
        let mut ticket = sample_ticket();
        assert!(!ticket.is_sold());
        assert!(!ticket.sold_to(5));

        ticket.traveler = Some(Traveler { id: 5, name: "traveler-5".to_string(), route: None });
        assert!(ticket.is_sold());
        assert!(ticket.sold_to(5));
        assert!(!ticket.sold_to(6));
    }
}
