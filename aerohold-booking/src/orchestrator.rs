use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use aerohold_core::pricing::{apply_occupancy, ticket_price};
use aerohold_core::{
    AirlineService, BookingError, BookingResult, ExclusionLock, InventoryQueue, LockCompensation,
    PaymentService, Storage, StoreResult,
};
use aerohold_shared::{Flight, FlightId, ReservationEvent, Route, RouteId, Ticket, TicketId, TravelerId};
use aerohold_store::app_config::BookingRules;

/// Drives the hold, pay and cancel workflows over the injected stores.
///
/// Holding a ticket takes two locks: the ticket lock (one traveler per
/// ticket) and the traveler lock (one ticket per traveler). A held ticket
/// stays in the flight's queue with a future availability time so that it
/// comes back on its own if nobody releases it.
pub struct BookingOrchestrator {
    storage: Arc<dyn Storage>,
    queue: Arc<dyn InventoryQueue>,
    lock: Arc<dyn ExclusionLock>,
    airline: Arc<dyn AirlineService>,
    payment: Arc<dyn PaymentService>,
    rules: BookingRules,
    events: Option<broadcast::Sender<ReservationEvent>>,
}

impl BookingOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        queue: Arc<dyn InventoryQueue>,
        lock: Arc<dyn ExclusionLock>,
        airline: Arc<dyn AirlineService>,
        payment: Arc<dyn PaymentService>,
        rules: BookingRules,
    ) -> Self {
        Self { storage, queue, lock, airline, payment, rules, events: None }
    }

    /// Publish lifecycle events on `tx`. Send errors (no subscribers) are ignored.
    pub fn with_events(mut self, tx: broadcast::Sender<ReservationEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub async fn get_route_list(&self) -> BookingResult<Vec<Route>> {
        let ids = self.storage.get_route_ids().await?;
        let routes = join_all(ids.into_iter().map(|id| self.storage.get_route_by_id(id))).await;

        let mut list = Vec::with_capacity(routes.len());
        for route in routes {
            if let Some(route) = route? {
                list.push(route);
            }
        }
        Ok(list)
    }

    pub async fn get_flight_list(&self, route_id: RouteId) -> BookingResult<Vec<Flight>> {
        if self.storage.get_route_by_id(route_id).await?.is_none() {
            return Err(BookingError::ResourceInvalid(format!("route {}", route_id)));
        }

        let ids = self.storage.get_flight_ids_by_route_id(route_id).await?;
        let flights = join_all(ids.into_iter().map(|id| self.get_flight_info(id))).await;

        let mut list = Vec::with_capacity(flights.len());
        for flight in flights {
            if let Some(flight) = flight? {
                list.push(flight);
            }
        }
        Ok(list)
    }

    /// The flight with its live occupancy and demand price.
    pub async fn get_flight_info(&self, flight_id: FlightId) -> BookingResult<Option<Flight>> {
        let Some(mut flight) = self.storage.get_flight_by_id(flight_id).await? else {
            return Ok(None);
        };

        let booked = self.queue.count(flight_id).await?;
        apply_occupancy(&mut flight, booked);
        Ok(Some(flight))
    }

    /// Holds one ticket of the flight for the traveler.
    ///
    /// Returns the traveler's existing hold unchanged when it is already on
    /// this flight. Every failure after the ticket lock is taken releases it
    /// and makes the ticket available again before returning.
    pub async fn create_ticket_order(
        &self,
        traveler_id: TravelerId,
        flight_id: FlightId,
    ) -> BookingResult<Ticket> {
        if self.storage.get_traveler_by_id(traveler_id).await?.is_none() {
            return Err(BookingError::TravelerInvalid(format!("traveler {}", traveler_id)));
        }
        let Some(flight) = self.get_flight_info(flight_id).await? else {
            return Err(BookingError::FlightInvalid(format!("flight {}", flight_id)));
        };

        let held_at = Utc::now();
        let expires_at = held_at + self.rules.hold_window();
        let ticket_id = self.claim_ticket(traveler_id, flight_id, expires_at).await?;
        debug!("Traveler {} claimed ticket {} on flight {}", traveler_id, ticket_id, flight_id);

        let stored = match self.storage.get_ticket_by_id(ticket_id).await {
            Ok(stored) => stored,
            Err(e) => {
                self.release_ticket(traveler_id, flight_id, ticket_id, "storage failure").await;
                return Err(e.into());
            }
        };
        let mut ticket = match stored {
            Some(ticket) if !ticket.is_sold() => ticket,
            _ => {
                self.release_ticket(traveler_id, flight_id, ticket_id, "ticket missing or sold").await;
                return Err(BookingError::TicketInvalid(format!("ticket {}", ticket_id)));
            }
        };
        ticket.price = ticket_price(&flight);
        ticket.flight = flight;

        match self.lock.lock_traveler(traveler_id, &ticket, expires_at).await {
            Ok(true) => {}
            Ok(false) => {
                self.release_ticket(traveler_id, flight_id, ticket_id, "traveler already holds a ticket")
                    .await;
                return self.existing_hold(traveler_id, flight_id).await;
            }
            Err(e) => {
                self.release_ticket(traveler_id, flight_id, ticket_id, "storage failure").await;
                return Err(e.into());
            }
        }

        if !self.airline.confirm(self.rules.airline_budget()).await {
            warn!("Airline did not confirm ticket {} for traveler {}", ticket_id, traveler_id);
            self.release_hold(traveler_id, flight_id, ticket_id, "airline confirmation failed").await;
            return Err(BookingError::AirlineFailed(format!("ticket {}", ticket_id)));
        }

        info!(
            "Ticket {} held for traveler {} at {} until {}",
            ticket_id, traveler_id, ticket.price, expires_at
        );
        self.emit(ReservationEvent::TicketHeld {
            traveler_id,
            flight_id,
            ticket_id,
            price: ticket.price,
            held_at: held_at.timestamp(),
            expires_at: expires_at.timestamp(),
        });

        Ok(ticket)
    }

    /// Settles the traveler's hold on `ticket_id`.
    ///
    /// A declined payment keeps the hold so the caller can retry.
    pub async fn pay_ticket_order(&self, traveler_id: TravelerId, ticket_id: TicketId) -> BookingResult<bool> {
        let expires_at = Utc::now() + self.rules.hold_window();
        let compensations = self.lock.extend_lock_time(traveler_id, ticket_id, expires_at).await?;

        let held = match self.verify_hold(traveler_id, ticket_id).await {
            Ok(held) => held,
            Err(e) => {
                self.compensate(&compensations).await;
                return Err(e);
            }
        };

        if !self.payment.pay().await {
            warn!("Payment declined for ticket {} by traveler {}", ticket_id, traveler_id);
            self.compensate(&compensations).await;
            return Err(BookingError::PayFailed(format!("ticket {}", ticket_id)));
        }

        let flight_id = held.flight_id();
        if let Err(e) = self.settle(traveler_id, flight_id, ticket_id, held.price).await {
            error!("Settling ticket {} for traveler {} failed: {}", ticket_id, traveler_id, e);
            self.compensate(&compensations).await;
            return Err(e.into());
        }

        // The sale is recorded; leftover locks expire on their own.
        if let Err(e) = self.lock.unlock_traveler(traveler_id, ticket_id).await {
            error!("Failed to unlock traveler {} from ticket {}: {}", traveler_id, ticket_id, e);
        }
        if let Err(e) = self.lock.unlock_ticket(traveler_id, ticket_id).await {
            error!("Failed to unlock ticket {} for traveler {}: {}", ticket_id, traveler_id, e);
        }

        info!("Ticket {} paid by traveler {} at {}", ticket_id, traveler_id, held.price);
        self.emit(ReservationEvent::TicketPaid {
            traveler_id,
            flight_id,
            ticket_id,
            price: held.price,
            timestamp: Utc::now().timestamp(),
        });

        Ok(true)
    }

    /// Gives back a ticket the traveler holds or has paid for.
    pub async fn cancel_ticket_order(&self, traveler_id: TravelerId, ticket_id: TicketId) -> BookingResult<bool> {
        if self.storage.get_traveler_by_id(traveler_id).await?.is_none() {
            return Err(BookingError::TravelerInvalid(format!("traveler {}", traveler_id)));
        }
        let Some(ticket) = self.storage.get_ticket_by_id(ticket_id).await? else {
            return Err(BookingError::TicketInvalid(format!("ticket {}", ticket_id)));
        };

        let owns = ticket.sold_to(traveler_id)
            || self
                .lock
                .get_traveler_locked_ticket(traveler_id)
                .await?
                .is_some_and(|held| held.id == ticket_id);
        if !owns {
            return Err(BookingError::ResourceInvalid(format!(
                "ticket {} is not owned by traveler {}",
                ticket_id, traveler_id
            )));
        }

        let flight_id = ticket.flight_id();
        self.storage.cancel_ticket_order(ticket_id).await?;

        // Storage is authoritative from here on: the rest is best effort.
        if let Err(e) = self.lock.unlock_traveler(traveler_id, ticket_id).await {
            error!("Failed to unlock traveler {} from ticket {}: {}", traveler_id, ticket_id, e);
        }
        self.unlock_and_requeue(traveler_id, flight_id, ticket_id).await;

        info!("Ticket {} cancelled by traveler {}", ticket_id, traveler_id);
        self.emit(ReservationEvent::TicketCancelled {
            traveler_id,
            flight_id,
            ticket_id,
            timestamp: Utc::now().timestamp(),
        });

        Ok(true)
    }

    /// Pops until a ticket lock is won, then marks the ticket held in the queue.
    ///
    /// A ticket whose lock was lost stays out of the queue: its holder
    /// re-queues it on release.
    async fn claim_ticket(
        &self,
        traveler_id: TravelerId,
        flight_id: FlightId,
        expires_at: DateTime<Utc>,
    ) -> BookingResult<TicketId> {
        for attempt in 1..=self.rules.max_claim_attempts {
            let Some(ticket_id) = self.queue.pop(flight_id).await? else {
                return Err(BookingError::FlightStock(format!("flight {}", flight_id)));
            };

            let locked = match self.lock.lock_ticket(traveler_id, ticket_id, expires_at).await {
                Ok(locked) => locked,
                Err(e) => {
                    // The lock may have been taken anyway: come back once it would expire.
                    self.requeue(flight_id, ticket_id, self.rules.hold_seconds).await;
                    return Err(e.into());
                }
            };
            if !locked {
                debug!("Ticket {} already locked, attempt {} on flight {}", ticket_id, attempt, flight_id);
                continue;
            }

            if let Err(e) = self.queue.push(flight_id, ticket_id, self.rules.hold_seconds).await {
                self.release_ticket(traveler_id, flight_id, ticket_id, "queue failure").await;
                return Err(e.into());
            }
            return Ok(ticket_id);
        }

        warn!(
            "Gave up on flight {} after {} contended claims",
            flight_id, self.rules.max_claim_attempts
        );
        Err(BookingError::FlightStock(format!("flight {}", flight_id)))
    }

    /// The traveler's hold when it is on `flight_id`.
    async fn existing_hold(&self, traveler_id: TravelerId, flight_id: FlightId) -> BookingResult<Ticket> {
        match self.lock.get_traveler_locked_ticket(traveler_id).await? {
            Some(held) if held.flight_id() == flight_id => {
                debug!("Traveler {} re-entered hold on ticket {}", traveler_id, held.id);
                Ok(held)
            }
            _ => Err(BookingError::TravelerBooked(format!("traveler {}", traveler_id))),
        }
    }

    async fn verify_hold(&self, traveler_id: TravelerId, ticket_id: TicketId) -> BookingResult<Ticket> {
        let Some(held) = self.lock.get_traveler_locked_ticket(traveler_id).await? else {
            return Err(BookingError::TicketUnbooked(format!("traveler {} holds no ticket", traveler_id)));
        };
        if held.id != ticket_id {
            return Err(BookingError::TicketUnbooked(format!(
                "traveler {} holds ticket {}, not {}",
                traveler_id, held.id, ticket_id
            )));
        }
        if self.storage.get_traveler_by_id(traveler_id).await?.is_none() {
            return Err(BookingError::TravelerInvalid(format!("traveler {}", traveler_id)));
        }
        Ok(held)
    }

    /// Records the sale and takes the ticket out of the queue for good. On
    /// error the ticket is left unsold and still held in the queue.
    async fn settle(
        &self,
        traveler_id: TravelerId,
        flight_id: FlightId,
        ticket_id: TicketId,
        price: f64,
    ) -> StoreResult<()> {
        self.storage.pay_ticket_order(traveler_id, ticket_id, price).await?;

        if let Err(e) = self.queue.fix(flight_id, ticket_id).await {
            if let Err(undo) = self.storage.cancel_ticket_order(ticket_id).await {
                error!("Failed to undo sale of ticket {} to traveler {}: {}", ticket_id, traveler_id, undo);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Undoes the ticket lock and the held mark. Failures are logged, the
    /// caller's error wins.
    async fn release_ticket(&self, traveler_id: TravelerId, flight_id: FlightId, ticket_id: TicketId, reason: &str) {
        self.unlock_and_requeue(traveler_id, flight_id, ticket_id).await;

        info!("Rolled back ticket {} for traveler {}: {}", ticket_id, traveler_id, reason);
        self.emit(ReservationEvent::HoldRolledBack {
            traveler_id,
            flight_id,
            ticket_id,
            reason: reason.to_string(),
            timestamp: Utc::now().timestamp(),
        });
    }

    /// Undoes both locks and the held mark.
    async fn release_hold(&self, traveler_id: TravelerId, flight_id: FlightId, ticket_id: TicketId, reason: &str) {
        if let Err(e) = self.lock.unlock_traveler(traveler_id, ticket_id).await {
            error!("Failed to unlock traveler {} from ticket {}: {}", traveler_id, ticket_id, e);
        }
        self.release_ticket(traveler_id, flight_id, ticket_id, reason).await;
    }

    /// Releases the ticket lock and makes the ticket available again, after
    /// the hold window if the lock could not be released.
    async fn unlock_and_requeue(&self, traveler_id: TravelerId, flight_id: FlightId, ticket_id: TicketId) {
        let delay_seconds = match self.lock.unlock_ticket(traveler_id, ticket_id).await {
            Ok(()) => 0,
            Err(e) => {
                error!("Failed to unlock ticket {} for traveler {}: {}", ticket_id, traveler_id, e);
                self.rules.hold_seconds
            }
        };
        self.requeue(flight_id, ticket_id, delay_seconds).await;
    }

    async fn requeue(&self, flight_id: FlightId, ticket_id: TicketId, delay_seconds: u64) {
        if let Err(e) = self.queue.push(flight_id, ticket_id, delay_seconds).await {
            error!("Failed to requeue ticket {} on flight {}: {}", ticket_id, flight_id, e);
        }
    }

    async fn compensate(&self, compensations: &[LockCompensation]) {
        for compensation in compensations {
            debug!("Compensating: {}", compensation);
            if let Err(e) = self.lock.compensate(compensation).await {
                error!("Compensation failed ({}): {}", compensation, e);
            }
        }
    }

    fn emit(&self, event: ReservationEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
