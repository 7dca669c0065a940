use aerohold_shared::Flight;

/// Rounds to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Demand-based price: the base price at zero occupancy, tripled at full.
///
/// `round2(base_price * ((booked / capacity) * 2 + 1))`. A flight without
/// capacity sells at its base price.
pub fn current_ticket_price(base_price: f64, booked: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return round2(base_price);
    }

    let utilization = booked as f64 / capacity as f64;
    round2(base_price * (utilization * 2.0 + 1.0))
}

/// Fills the derived `booked` and `current_ticket_price` fields.
pub fn apply_occupancy(flight: &mut Flight, booked: u32) {
    flight.booked = Some(booked);
    flight.current_ticket_price = Some(current_ticket_price(flight.base_price, booked, flight.capacity));
}

/// Price a new hold is sold at.
pub fn ticket_price(flight: &Flight) -> f64 {
    match flight.current_ticket_price {
        Some(price) if price > 0.0 => price,
        _ => flight.base_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerohold_shared::{Airport, Route};

    fn flight(base_price: f64, capacity: u32) -> Flight {
        Flight {
            id: 1,
            capacity,
            base_price,
            route: Route {
                id: 1,
                airports: [
                    Airport { id: 1, name: "a".to_string() },
                    Airport { id: 2, name: "b".to_string() },
                ],
            },
            booked: None,
            current_ticket_price: None,
        }
    }

    #[test]
    fn test_price_curve() {
        assert_eq!(current_ticket_price(100.0, 0, 10), 100.0);
        assert_eq!(current_ticket_price(100.0, 5, 10), 200.0);
        assert_eq!(current_ticket_price(100.0, 9, 10), 280.0);
        assert_eq!(current_ticket_price(100.0, 10, 10), 300.0);
    }

    #[test]
    fn test_price_rounds_to_cents() {
        // 99.99 * (1/3 * 2 + 1) = 166.65
        assert_eq!(current_ticket_price(99.99, 1, 3), 166.65);
        assert_eq!(round2(12.3456), 12.35);
    }

    #[test]
    fn test_zero_capacity_falls_back_to_base() {
        assert_eq!(current_ticket_price(120.0, 0, 0), 120.0);
    }

    #[test]
    fn test_apply_occupancy() {
        let mut f = flight(100.0, 10);
        apply_occupancy(&mut f, 5);
        assert_eq!(f.booked, Some(5));
        assert_eq!(f.current_ticket_price, Some(200.0));
        assert_eq!(ticket_price(&f), 200.0);

        let mut free = flight(0.0, 10);
        apply_occupancy(&mut free, 0);
        assert_eq!(ticket_price(&free), 0.0);
        assert_eq!(ticket_price(&flight(80.0, 10)), 80.0);
    }
}
