use crate::booking::{Booking, BookingStatus, FareType};
use crate::flight::{CabinClass, Flight, SeatStatus};
use crate::profile::{LoyaltyTier, UserProfile};
use crate::schedule;
use chrono::{NaiveDate, Utc};

/// Single mutable source of truth for one session's flights, bookings and
/// active profile. Every committed mutation fans out synchronously to all
/// subscribers; a subscriber that panics takes the fan-out down with it
/// (known quirk, see DESIGN.md).
pub struct InventoryStore {
    session_date: NaiveDate,
    flights: Vec<Flight>,
    bookings: Vec<Booking>,
    profile: UserProfile,
    subscribers: Vec<Box<dyn Fn() + Send>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("Flight {flight} does not offer {cabin}")]
    CabinNotOffered { flight: String, cabin: CabinClass },

    #[error("No available {cabin} seats on flight {flight}")]
    NoSeatsAvailable { flight: String, cabin: CabinClass },

    #[error("No booking found for reference: {0}")]
    BookingNotFound(String),

    #[error("Seat {seat} is not available on flight {flight}")]
    SeatUnavailable { flight: String, seat: String },
}

pub fn default_profile() -> UserProfile {
    let mut profile = UserProfile::new(
        "cust-morgan",
        "Alex Morgan",
        "alex.morgan@example.com",
        LoyaltyTier::Gold,
        128_450,
    );
    profile
        .preferences
        .insert("seat".to_string(), "window".to_string());
    profile
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    /// Build a store pinned to a specific session date. Tests use this to
    /// keep schedules and date resolution deterministic.
    pub fn for_date(session_date: NaiveDate) -> Self {
        let mut store = Self {
            session_date,
            flights: schedule::baseline_day(session_date),
            bookings: Vec::new(),
            profile: default_profile(),
            subscribers: Vec::new(),
        };
        store.seed_baseline();
        store
    }

    /// The session-relative "today" that free-text dates resolve against.
    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    pub fn active_profile(&self) -> &UserProfile {
        &self.profile
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn list_flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn get_flight(&self, flight_number: &str) -> Option<&Flight> {
        self.flights
            .iter()
            .find(|f| f.flight_number.eq_ignore_ascii_case(flight_number))
    }

    /// Bookings scoped to the active profile's customer id.
    pub fn list_bookings(&self) -> Vec<&Booking> {
        self.bookings
            .iter()
            .filter(|b| b.customer_id == self.profile.customer_id)
            .collect()
    }

    /// A confirmed or changed booking owned by the active customer.
    /// Cancelled bookings are invisible here, which is what makes a second
    /// cancel of the same reference fail.
    pub fn find_active_booking(&self, reference: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| {
            b.reference.eq_ignore_ascii_case(reference)
                && b.customer_id == self.profile.customer_id
                && b.is_active()
        })
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Book the first available seat of `cabin` on `flight_number`.
    ///
    /// The seat flip and the booking append commit together before any
    /// subscriber sees the new state.
    pub fn create_booking(
        &mut self,
        flight_number: &str,
        cabin: CabinClass,
    ) -> Result<String, StoreError> {
        let idx = self
            .flight_index(flight_number)
            .ok_or_else(|| StoreError::FlightNotFound(flight_number.to_string()))?;

        if !self.flights[idx].offers_cabin(cabin) {
            return Err(StoreError::CabinNotOffered {
                flight: self.flights[idx].flight_number.clone(),
                cabin,
            });
        }

        let seat = self.flights[idx]
            .first_available(cabin)
            .cloned()
            .ok_or_else(|| StoreError::NoSeatsAvailable {
                flight: self.flights[idx].flight_number.clone(),
                cabin,
            })?;

        self.flights[idx].set_seat_status(&seat.number, SeatStatus::Occupied);

        let mut snapshot = seat;
        snapshot.status = SeatStatus::Occupied;
        let fare_type = fare_for_cabin(cabin);
        let booking = Booking::new(
            &self.profile.customer_id,
            &self.profile.name,
            &self.flights[idx],
            cabin,
            snapshot,
            fare_type,
        );
        let reference = booking.reference.clone();
        tracing::info!(%reference, flight = %flight_number, cabin = %cabin, "booking created");
        self.bookings.push(booking);

        self.recompute_projection();
        self.profile.log_activity(format!(
            "Booked {} on flight {} ({})",
            cabin,
            flight_number.to_uppercase(),
            reference
        ));
        self.notify();
        Ok(reference)
    }

    /// Cancel a booking. Terminal: the reference cannot be cancelled twice.
    ///
    /// The assigned seat intentionally stays occupied — cancellation does
    /// not return inventory to sale (known quirk, see DESIGN.md).
    pub fn cancel_booking(&mut self, reference: &str) -> Result<(), StoreError> {
        let booking_idx = self
            .booking_index(reference)
            .ok_or_else(|| StoreError::BookingNotFound(reference.to_string()))?;

        let booking = &mut self.bookings[booking_idx];
        booking.status = BookingStatus::Cancelled;
        let reference = booking.reference.clone();
        tracing::info!(%reference, "booking cancelled");

        self.recompute_projection();
        self.profile
            .log_activity(format!("Cancelled booking {}", reference));
        self.notify();
        Ok(())
    }

    /// Move a booking to another flight in the same cabin.
    ///
    /// The seat on the superseded flight stays occupied (known quirk,
    /// see DESIGN.md); a fresh first-available seat is taken on the target.
    pub fn change_flight(
        &mut self,
        reference: &str,
        new_flight_number: &str,
    ) -> Result<(), StoreError> {
        let booking_idx = self
            .booking_index(reference)
            .ok_or_else(|| StoreError::BookingNotFound(reference.to_string()))?;
        let cabin = self.bookings[booking_idx].cabin;

        let idx = self
            .flight_index(new_flight_number)
            .ok_or_else(|| StoreError::FlightNotFound(new_flight_number.to_string()))?;

        if !self.flights[idx].offers_cabin(cabin) {
            return Err(StoreError::CabinNotOffered {
                flight: self.flights[idx].flight_number.clone(),
                cabin,
            });
        }
        let seat = self.flights[idx]
            .first_available(cabin)
            .cloned()
            .ok_or_else(|| StoreError::NoSeatsAvailable {
                flight: self.flights[idx].flight_number.clone(),
                cabin,
            })?;

        self.flights[idx].set_seat_status(&seat.number, SeatStatus::Occupied);
        let mut snapshot = seat;
        snapshot.status = SeatStatus::Occupied;

        let flight = self.flights[idx].clone();
        let booking = &mut self.bookings[booking_idx];
        booking.move_to(&flight, snapshot, cabin);
        let reference = booking.reference.clone();
        tracing::info!(%reference, new_flight = %new_flight_number, "booking moved");

        self.recompute_projection();
        self.profile.log_activity(format!(
            "Changed booking {} to flight {}",
            reference,
            new_flight_number.to_uppercase()
        ));
        self.notify();
        Ok(())
    }

    /// Reassign a booking to a named seat on its current flight.
    ///
    /// This is the one mutation that releases the previously held seat.
    pub fn change_seat(&mut self, reference: &str, new_seat_number: &str) -> Result<(), StoreError> {
        let booking_idx = self
            .booking_index(reference)
            .ok_or_else(|| StoreError::BookingNotFound(reference.to_string()))?;
        let flight_number = self.bookings[booking_idx].flight_number.clone();
        let old_seat_number = self.bookings[booking_idx].seat.number.clone();

        let idx = self
            .flight_index(&flight_number)
            .ok_or_else(|| StoreError::FlightNotFound(flight_number.clone()))?;

        let (new_cabin, new_seat) = match self.flights[idx].find_seat(new_seat_number) {
            Some((cabin, seat)) if seat.is_available() => (cabin, seat.clone()),
            _ => {
                return Err(StoreError::SeatUnavailable {
                    flight: flight_number,
                    seat: new_seat_number.to_string(),
                })
            }
        };

        self.flights[idx].set_seat_status(&old_seat_number, SeatStatus::Available);
        self.flights[idx].set_seat_status(&new_seat.number, SeatStatus::Occupied);

        let mut snapshot = new_seat;
        snapshot.status = SeatStatus::Occupied;
        let booking = &mut self.bookings[booking_idx];
        let seat_number = snapshot.number.clone();
        booking.seat = snapshot;
        booking.cabin = new_cabin;
        tracing::info!(reference = %booking.reference, seat = %seat_number, "seat changed");

        self.recompute_projection();
        self.profile
            .log_activity(format!("Moved booking {} to seat {}", reference, seat_number));
        self.notify();
        Ok(())
    }

    /// Flag a booking as checked in.
    pub fn check_in(&mut self, reference: &str) -> Result<(), StoreError> {
        let booking_idx = self
            .booking_index(reference)
            .ok_or_else(|| StoreError::BookingNotFound(reference.to_string()))?;

        let booking = &mut self.bookings[booking_idx];
        booking.checked_in = true;
        let reference = booking.reference.clone();

        self.recompute_projection();
        self.profile
            .log_activity(format!("Checked in for booking {}", reference));
        self.notify();
        Ok(())
    }

    /// Insert synthesized flights, skipping numbers already present.
    /// Search synthesis calls this so later lookups can find its flights.
    pub fn upsert_flights(&mut self, flights: Vec<Flight>) {
        let mut inserted = 0usize;
        for flight in flights {
            if self.flight_index(&flight.flight_number).is_none() {
                self.flights.push(flight);
                inserted += 1;
            }
        }
        if inserted > 0 {
            tracing::debug!(inserted, "synthesized flights added to inventory");
            self.notify();
        }
    }

    /// Swap the active customer context.
    pub fn set_active_profile(&mut self, profile: UserProfile) {
        self.profile = profile;
        self.recompute_projection();
        self.notify();
    }

    /// Regenerate the schedule for the current date and restore the
    /// baseline booking set and default profile.
    pub fn reset(&mut self) {
        self.session_date = Utc::now().date_naive();
        self.flights = schedule::baseline_day(self.session_date);
        self.bookings.clear();
        self.profile = default_profile();
        self.seed_baseline();
        self.notify();
    }

    pub fn subscribe(&mut self, listener: impl Fn() + Send + 'static) {
        self.subscribers.push(Box::new(listener));
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn flight_index(&self, flight_number: &str) -> Option<usize> {
        self.flights
            .iter()
            .position(|f| f.flight_number.eq_ignore_ascii_case(flight_number))
    }

    fn booking_index(&self, reference: &str) -> Option<usize> {
        self.bookings.iter().position(|b| {
            b.reference.eq_ignore_ascii_case(reference)
                && b.customer_id == self.profile.customer_id
                && b.is_active()
        })
    }

    /// One pre-existing reservation so a fresh session has something to
    /// cancel, change and check in against.
    fn seed_baseline(&mut self) {
        let Some(idx) = self.flight_index("DL100") else {
            return;
        };
        let Some(seat) = self.flights[idx].first_available(CabinClass::Economy).cloned() else {
            return;
        };
        self.flights[idx].set_seat_status(&seat.number, SeatStatus::Occupied);
        let mut snapshot = seat;
        snapshot.status = SeatStatus::Occupied;
        let booking = Booking::new(
            &self.profile.customer_id,
            &self.profile.name,
            &self.flights[idx],
            CabinClass::Economy,
            snapshot,
            FareType::NonRefundable,
        );
        self.bookings.push(booking);
        self.recompute_projection();
    }

    /// `upcoming_flights` is always the non-cancelled bookings of the
    /// active customer, recomputed wholesale. Never hand-edited.
    fn recompute_projection(&mut self) {
        self.profile.upcoming_flights = self
            .bookings
            .iter()
            .filter(|b| b.customer_id == self.profile.customer_id && b.is_active())
            .cloned()
            .collect();
    }

    fn notify(&self) {
        for listener in &self.subscribers {
            listener();
        }
    }
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn fare_for_cabin(cabin: CabinClass) -> FareType {
    match cabin {
        CabinClass::Economy => FareType::NonRefundable,
        _ => FareType::Refundable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn store() -> InventoryStore {
        InventoryStore::for_date(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())
    }

    /// No occupied seat without exactly one active booking holding it,
    /// except seats retained by the cancel/change-flight quirk.
    fn assert_seat_consistency(store: &InventoryStore) {
        for booking in store.list_bookings() {
            if !booking.is_active() {
                continue;
            }
            let flight = store.get_flight(&booking.flight_number).unwrap();
            let (_, seat) = flight.find_seat(&booking.seat.number).unwrap();
            assert_eq!(
                seat.status,
                SeatStatus::Occupied,
                "active booking {} holds a seat that is not occupied",
                booking.reference
            );
            let holders = store
                .list_bookings()
                .iter()
                .filter(|b| {
                    b.is_active()
                        && b.flight_number == booking.flight_number
                        && b.seat.number == booking.seat.number
                })
                .count();
            assert_eq!(holders, 1, "seat {} double-booked", booking.seat.number);
        }
    }

    #[test]
    fn test_booking_round_trip() {
        let mut store = store();
        let before = store.list_bookings().len();

        let reference = store.create_booking("DL100", CabinClass::Economy).unwrap();

        let bookings = store.list_bookings();
        assert_eq!(bookings.len(), before + 1);
        let booking = bookings
            .iter()
            .find(|b| b.reference == reference)
            .expect("new booking listed");
        assert_eq!(booking.flight_number, "DL100");
        assert_eq!(booking.cabin, CabinClass::Economy);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_seat_consistency(&store);
    }

    #[test]
    fn test_projection_tracks_mutations() {
        let mut store = store();
        let reference = store.create_booking("DL200", CabinClass::First).unwrap();
        assert!(store
            .active_profile()
            .upcoming_flights
            .iter()
            .any(|b| b.reference == reference));

        store.cancel_booking(&reference).unwrap();
        assert!(!store
            .active_profile()
            .upcoming_flights
            .iter()
            .any(|b| b.reference == reference));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut store = store();
        let reference = store.create_booking("DL100", CabinClass::Economy).unwrap();

        store.cancel_booking(&reference).unwrap();
        let second = store.cancel_booking(&reference);
        assert!(matches!(second, Err(StoreError::BookingNotFound(_))));
    }

    #[test]
    fn test_cancel_retains_seat() {
        // Known quirk: cancellation does not release the seat.
        let mut store = store();
        let reference = store.create_booking("DL100", CabinClass::Economy).unwrap();
        let seat_number = store
            .list_bookings()
            .iter()
            .find(|b| b.reference == reference)
            .unwrap()
            .seat
            .number
            .clone();

        store.cancel_booking(&reference).unwrap();
        let flight = store.get_flight("DL100").unwrap();
        let (_, seat) = flight.find_seat(&seat_number).unwrap();
        assert_eq!(seat.status, SeatStatus::Occupied);
    }

    #[test]
    fn test_change_flight_takes_new_seat_keeps_old() {
        let mut store = store();
        let reference = store.create_booking("DL100", CabinClass::Economy).unwrap();
        let old_seat = store
            .find_active_booking(&reference)
            .unwrap()
            .seat
            .number
            .clone();

        store.change_flight(&reference, "DL300").unwrap();

        let booking = store.find_active_booking(&reference).unwrap();
        assert_eq!(booking.flight_number, "DL300");
        assert_eq!(booking.status, BookingStatus::Changed);
        assert_eq!(booking.cabin, CabinClass::Economy);

        // Known quirk: the seat on the superseded flight stays occupied.
        let old_flight = store.get_flight("DL100").unwrap();
        let (_, seat) = old_flight.find_seat(&old_seat).unwrap();
        assert_eq!(seat.status, SeatStatus::Occupied);
    }

    #[test]
    fn test_change_flight_requires_cabin_availability() {
        let mut store = store();
        let reference = store.create_booking("DL100", CabinClass::DeltaOne).unwrap();
        // DL810 exists but check an unknown flight first
        assert!(matches!(
            store.change_flight(&reference, "DL999"),
            Err(StoreError::FlightNotFound(_))
        ));
        store.change_flight(&reference, "DL810").unwrap();
        assert_eq!(
            store.find_active_booking(&reference).unwrap().flight_number,
            "DL810"
        );
    }

    #[test]
    fn test_change_seat_releases_old_seat() {
        let mut store = store();
        let reference = store.create_booking("DL200", CabinClass::Economy).unwrap();
        let old_seat = store
            .find_active_booking(&reference)
            .unwrap()
            .seat
            .number
            .clone();

        // Move into First; pool search finds the seat's cabin.
        let target = store
            .get_flight("DL200")
            .unwrap()
            .first_available(CabinClass::First)
            .unwrap()
            .number
            .clone();
        store.change_seat(&reference, &target).unwrap();

        let flight = store.get_flight("DL200").unwrap();
        let (_, released) = flight.find_seat(&old_seat).unwrap();
        assert_eq!(released.status, SeatStatus::Available);

        let booking = store.find_active_booking(&reference).unwrap();
        assert_eq!(booking.seat.number, target);
        assert_eq!(booking.cabin, CabinClass::First);
        assert_seat_consistency(&store);
    }

    #[test]
    fn test_change_seat_rejects_occupied() {
        let mut store = store();
        let first = store.create_booking("DL300", CabinClass::Economy).unwrap();
        let second = store.create_booking("DL300", CabinClass::Economy).unwrap();
        let taken = store
            .find_active_booking(&first)
            .unwrap()
            .seat
            .number
            .clone();

        let result = store.change_seat(&second, &taken);
        assert!(matches!(result, Err(StoreError::SeatUnavailable { .. })));
        assert_seat_consistency(&store);
    }

    #[test]
    fn test_distinct_failures() {
        let mut store = store();
        assert!(matches!(
            store.create_booking("ZZ999", CabinClass::Economy),
            Err(StoreError::FlightNotFound(_))
        ));
        assert!(matches!(
            store.cancel_booking("NOPE01"),
            Err(StoreError::BookingNotFound(_))
        ));
    }

    #[test]
    fn test_upsert_is_idempotent_on_flight_number() {
        let mut store = store();
        let date = store.session_date();
        let before = store.list_flights().len();

        let synthesized = crate::schedule::synthesize_route("Denver", "Boston", date);
        let count = synthesized.len();
        store.upsert_flights(synthesized.clone());
        assert_eq!(store.list_flights().len(), before + count);

        // Same flight numbers again: no duplicates
        store.upsert_flights(synthesized);
        assert_eq!(store.list_flights().len(), before + count);
    }

    #[test]
    fn test_subscribers_fire_on_every_mutation() {
        let mut store = store();
        let counter = Arc::new(AtomicUsize::new(0));
        let observed = counter.clone();
        store.subscribe(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        let reference = store.create_booking("DL100", CabinClass::Economy).unwrap();
        store.cancel_booking(&reference).unwrap();
        store.reset();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reset_restores_baseline() {
        let mut store = store();
        let reference = store.create_booking("DL400", CabinClass::ComfortPlus).unwrap();
        store.reset();

        assert!(store.find_active_booking(&reference).is_none());
        // Baseline: default profile with its one seeded reservation
        assert_eq!(store.active_profile().customer_id, "cust-morgan");
        assert_eq!(store.list_bookings().len(), 1);
        assert!(store.get_flight("DL100").is_some());
    }

    #[test]
    fn test_profile_swap_recomputes_projection() {
        let mut store = store();
        let other = UserProfile::new("cust-osei", "Maya Osei", "maya@example.com", LoyaltyTier::Silver, 8_200);
        store.set_active_profile(other);

        // No bookings belong to the new customer yet
        assert!(store.list_bookings().is_empty());
        assert!(store.active_profile().upcoming_flights.is_empty());

        let reference = store.create_booking("DL100", CabinClass::Economy).unwrap();
        assert_eq!(store.active_profile().upcoming_flights.len(), 1);
        assert_eq!(store.active_profile().upcoming_flights[0].reference, reference);
    }
}
