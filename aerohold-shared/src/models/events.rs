use serde::{Deserialize, Serialize};

use super::entities::{FlightId, TicketId, TravelerId};

/// Lifecycle notifications emitted by the booking workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationEvent {
    TicketHeld {
        traveler_id: TravelerId,
        flight_id: FlightId,
        ticket_id: TicketId,
        price: f64,
        held_at: i64,
        expires_at: i64,
    },
    TicketPaid {
        traveler_id: TravelerId,
        flight_id: FlightId,
        ticket_id: TicketId,
        price: f64,
        timestamp: i64,
    },
    TicketCancelled {
        traveler_id: TravelerId,
        flight_id: FlightId,
        ticket_id: TicketId,
        timestamp: i64,
    },
    HoldRolledBack {
        traveler_id: TravelerId,
        flight_id: FlightId,
        ticket_id: TicketId,
        reason: String,
        timestamp: i64,
    },
}

impl ReservationEvent {
    pub fn ticket_id(&self) -> TicketId {
        match self {
            ReservationEvent::TicketHeld { ticket_id, .. }
            | ReservationEvent::TicketPaid { ticket_id, .. }
            | ReservationEvent::TicketCancelled { ticket_id, .. }
            | ReservationEvent::HoldRolledBack { ticket_id, .. } => *ticket_id,
        }
    }

    pub fn flight_id(&self) -> FlightId {
        match self {
            ReservationEvent::TicketHeld { flight_id, .. }
            | ReservationEvent::TicketPaid { flight_id, .. }
            | ReservationEvent::TicketCancelled { flight_id, .. }
            | ReservationEvent::HoldRolledBack { flight_id, .. } => *flight_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let event = ReservationEvent::TicketCancelled {
            traveler_id: 1,
            flight_id: 2,
            ticket_id: 3,
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TICKET_CANCELLED");
        assert_eq!(event.ticket_id(), 3);
        assert_eq!(event.flight_id(), 2);
    }
}
