use std::fmt;

/// Numeric codes surfaced to callers of the booking workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    ResourceInvalid = 1001,

    TicketInvalid = 1101,
    TicketBooked = 1102,
    TicketUnbooked = 1103,

    FlightInvalid = 1201,
    FlightStock = 1211,

    TravelerInvalid = 1301,
    TravelerBooked = 1302,

    PayFailed = 2001,
    AirlineFailed = 3001,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ResourceInvalid => "RESOURCE_INVALID",
            ErrorCode::TicketInvalid => "TICKET_INVALID",
            ErrorCode::TicketBooked => "TICKET_BOOKED",
            ErrorCode::TicketUnbooked => "TICKET_UNBOOKED",
            ErrorCode::FlightInvalid => "FLIGHT_INVALID",
            ErrorCode::FlightStock => "FLIGHT_STOCK",
            ErrorCode::TravelerInvalid => "TRAVELER_INVALID",
            ErrorCode::TravelerBooked => "TRAVELER_BOOKED",
            ErrorCode::PayFailed => "PAY_FAILED",
            ErrorCode::AirlineFailed => "AIRLINE_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.as_u16())
    }
}

/// Failure of a backing store (queue, lock or storage).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue member is not a ticket id: {0}")]
    InvalidMember(String),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid resource: {0}")]
    ResourceInvalid(String),

    #[error("Invalid ticket: {0}")]
    TicketInvalid(String),

    #[error("Ticket not booked: {0}")]
    TicketUnbooked(String),

    #[error("Invalid flight: {0}")]
    FlightInvalid(String),

    #[error("Out of stock: {0}")]
    FlightStock(String),

    #[error("Invalid traveler: {0}")]
    TravelerInvalid(String),

    #[error("Traveler already booked: {0}")]
    TravelerBooked(String),

    #[error("Payment failed: {0}")]
    PayFailed(String),

    #[error("Airline confirmation failed: {0}")]
    AirlineFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Caller-facing code, `None` for infrastructure failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            BookingError::ResourceInvalid(_) => Some(ErrorCode::ResourceInvalid),
            BookingError::TicketInvalid(_) => Some(ErrorCode::TicketInvalid),
            BookingError::TicketUnbooked(_) => Some(ErrorCode::TicketUnbooked),
            BookingError::FlightInvalid(_) => Some(ErrorCode::FlightInvalid),
            BookingError::FlightStock(_) => Some(ErrorCode::FlightStock),
            BookingError::TravelerInvalid(_) => Some(ErrorCode::TravelerInvalid),
            BookingError::TravelerBooked(_) => Some(ErrorCode::TravelerBooked),
            BookingError::PayFailed(_) => Some(ErrorCode::PayFailed),
            BookingError::AirlineFailed(_) => Some(ErrorCode::AirlineFailed),
            BookingError::Store(_) => None,
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_values() {
        assert_eq!(ErrorCode::ResourceInvalid.as_u16(), 1001);
        assert_eq!(ErrorCode::FlightStock.as_u16(), 1211);
        assert_eq!(ErrorCode::TravelerBooked.as_u16(), 1302);
        assert_eq!(ErrorCode::AirlineFailed.as_u16(), 3001);
        assert_eq!(ErrorCode::PayFailed.to_string(), "PAY_FAILED(2001)");
    }

    #[test]
    fn test_store_errors_have_no_code() {
        let err: BookingError = StoreError::InvalidMember("abc".to_string()).into();
        assert_eq!(err.code(), None);
        assert_eq!(
            BookingError::TicketUnbooked("x".to_string()).code(),
            Some(ErrorCode::TicketUnbooked)
        );
    }
}
