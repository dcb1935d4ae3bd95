use crate::action::{ActionKind, ActionOutcome, ActionRequest};
use crate::confirmation::{assess_refund, PendingAction, SeatFlowStage};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use meridian_inventory::flight::{CabinClass, Flight, CABIN_SEARCH_ORDER};
use meridian_inventory::schedule;
use meridian_inventory::store::{InventoryStore, StoreError};
use meridian_shared::app_config::BusinessRules;
use serde_json::json;

/// What staging a request produced: either a finished envelope, or a
/// pending action that must be confirmed before anything mutates.
#[derive(Debug, Clone)]
pub enum Staged {
    Immediate(ActionOutcome),
    Confirm(PendingAction),
}

/// Stateless translation from structured action requests to inventory
/// queries and mutations. This is the no-surprise boundary: every failure
/// comes back as a `{success: false, message}` envelope, never an error
/// type, and callers branch only on the boolean.
pub struct ActionExecutor {
    rules: BusinessRules,
}

impl ActionExecutor {
    pub fn new(rules: BusinessRules) -> Self {
        Self { rules }
    }

    /// Validate a request and, for transactional kinds, capture a pending
    /// action instead of mutating. Non-confirmable kinds run immediately.
    pub fn stage(&self, store: &mut InventoryStore, request: &ActionRequest) -> Staged {
        match request.kind {
            ActionKind::SearchFlights | ActionKind::CheckIn | ActionKind::TrackBaggage => {
                Staged::Immediate(self.execute(store, request))
            }
            ActionKind::BookFlight => self.stage_book(store, request),
            ActionKind::CancelBooking => self.stage_cancel(store, request),
            ActionKind::ChangeFlight => self.stage_change_flight(store, request),
            ActionKind::ChangeSeat => self.stage_change_seat(store, request),
        }
    }

    /// Perform a request against the store. For transactional kinds this is
    /// the call a confirmed resolution makes — exactly one per confirmation.
    pub fn execute(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        match request.kind {
            ActionKind::SearchFlights => self.search_flights(store, request),
            ActionKind::BookFlight => self.book_flight(store, request),
            ActionKind::CancelBooking => self.cancel_booking(store, request),
            ActionKind::ChangeFlight => self.change_flight(store, request),
            ActionKind::ChangeSeat => self.change_seat(store, request),
            ActionKind::CheckIn => self.check_in(store, request),
            ActionKind::TrackBaggage => self.track_baggage(store, request),
        }
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    fn search_flights(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(from) = request.param("from") else {
            return ActionOutcome::fail("I need a departure city — where are you flying from?");
        };
        let Some(to) = request.param("to") else {
            return ActionOutcome::fail("And where are you headed?");
        };
        let date = request
            .param("date")
            .and_then(|d| resolve_travel_date(d, store.session_date()))
            .unwrap_or_else(|| store.session_date());

        let mut matches = collect_matches(store, from, to, date);

        // A shuttle route with no departures gets its fixed schedule laid
        // down for that day before re-filtering.
        if matches.is_empty() && schedule::is_shuttle_route(from, to) {
            let (canon_from, canon_to) = if from.to_lowercase().contains("atlanta") {
                ("Atlanta", "New York")
            } else {
                ("New York", "Atlanta")
            };
            store.upsert_flights(schedule::shuttle_schedule(canon_from, canon_to, date));
            matches = collect_matches(store, from, to, date);
        }

        // Anything else gets a synthesized schedule, persisted so a later
        // booking can find the flight by number.
        if matches.is_empty() {
            store.upsert_flights(schedule::synthesize_route(
                &title_case(from),
                &title_case(to),
                date,
            ));
            matches = collect_matches(store, from, to, date);
        }

        matches.truncate(self.rules.search_result_cap);

        let payload = json!({
            "date": date.to_string(),
            "flights": matches.iter().map(flight_payload).collect::<Vec<_>>(),
        });
        let message = if matches.is_empty() {
            format!("I couldn't find flights from {} to {} on {}.", from, to, date)
        } else {
            format!(
                "Found {} flight{} from {} to {} on {}.",
                matches.len(),
                if matches.len() == 1 { "" } else { "s" },
                from,
                to,
                date
            )
        };
        ActionOutcome::ok_with(message, payload)
    }

    // ------------------------------------------------------------------
    // Transactional kinds — execute paths
    // ------------------------------------------------------------------

    fn book_flight(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(flight_number) = request.param("flightNumber") else {
            return ActionOutcome::fail("Which flight would you like to book?");
        };
        let Some(class_param) = request.param("seatClass") else {
            return ActionOutcome::fail("Which cabin would you like — economy, comfortPlus, first, or deltaOne?");
        };
        let Some(cabin) = CabinClass::parse(class_param) else {
            return ActionOutcome::fail(format!(
                "\"{}\" isn't a cabin we offer. Choose economy, comfortPlus, first, or deltaOne.",
                class_param
            ));
        };

        match store.create_booking(flight_number, cabin) {
            Ok(reference) => ActionOutcome::ok_with(
                format!(
                    "You're booked in {} on flight {}. Your reference is {}.",
                    cabin.label(),
                    flight_number.to_uppercase(),
                    reference
                ),
                json!({
                    "bookingReference": reference,
                    "flightNumber": flight_number.to_uppercase(),
                    "seatClass": cabin.as_str(),
                }),
            ),
            Err(err) => store_failure(err),
        }
    }

    fn cancel_booking(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(reference) = request.param("bookingReference") else {
            return ActionOutcome::fail("Which booking reference should I cancel?");
        };
        match store.cancel_booking(reference) {
            Ok(()) => ActionOutcome::ok_with(
                format!("Booking {} has been cancelled.", reference.to_uppercase()),
                json!({ "bookingReference": reference.to_uppercase() }),
            ),
            Err(err) => store_failure(err),
        }
    }

    fn change_flight(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(reference) = request.param("bookingReference") else {
            return ActionOutcome::fail("Which booking should I move?");
        };
        let Some(new_flight) = request.param("newFlightNumber") else {
            return ActionOutcome::fail("Which flight should I move it to?");
        };
        match store.change_flight(reference, new_flight) {
            Ok(()) => ActionOutcome::ok_with(
                format!(
                    "Booking {} is now on flight {}.",
                    reference.to_uppercase(),
                    new_flight.to_uppercase()
                ),
                json!({
                    "bookingReference": reference.to_uppercase(),
                    "newFlightNumber": new_flight.to_uppercase(),
                }),
            ),
            Err(err) => store_failure(err),
        }
    }

    fn change_seat(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(reference) = request.param("bookingReference") else {
            return ActionOutcome::fail("Which booking's seat should I change?");
        };
        let Some(seat_number) = request.param("newSeatNumber") else {
            // A bare preference cannot mutate; the seat sub-flow narrows it
            // to a concrete seat before this call.
            return ActionOutcome::fail(
                "I need a specific seat number, or a preference so I can show you what's open.",
            );
        };
        match store.change_seat(reference, seat_number) {
            Ok(()) => ActionOutcome::ok_with(
                format!(
                    "Booking {} is now in seat {}.",
                    reference.to_uppercase(),
                    seat_number.to_uppercase()
                ),
                json!({
                    "bookingReference": reference.to_uppercase(),
                    "newSeatNumber": seat_number.to_uppercase(),
                }),
            ),
            Err(err) => store_failure(err),
        }
    }

    fn check_in(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(reference) = request.param("bookingReference") else {
            return ActionOutcome::fail("Which booking reference should I check in?");
        };
        match store.check_in(reference) {
            Ok(()) => {
                let booking = store.find_active_booking(reference);
                let flight = booking.and_then(|b| store.get_flight(&b.flight_number));
                let gate = flight
                    .and_then(|f| f.gate.as_deref())
                    .unwrap_or("assigned at the airport");
                ActionOutcome::ok_with(
                    format!(
                        "You're checked in for booking {}. Gate {}.",
                        reference.to_uppercase(),
                        gate
                    ),
                    json!({ "bookingReference": reference.to_uppercase(), "gate": gate }),
                )
            }
            Err(err) => store_failure(err),
        }
    }

    fn track_baggage(&self, store: &mut InventoryStore, request: &ActionRequest) -> ActionOutcome {
        let Some(reference) = request.param("bookingReference") else {
            return ActionOutcome::fail("Which booking reference should I track bags for?");
        };
        let Some(booking) = store.find_active_booking(reference) else {
            return ActionOutcome::fail(format!(
                "I couldn't find an active booking under {}.",
                reference.to_uppercase()
            ));
        };

        // Mock tracking data, deterministic per reference.
        let bag_count = 1 + (booking.reference.bytes().map(u32::from).sum::<u32>() % 2);
        let (status, location) = if booking.checked_in {
            ("LOADED", format!("{} — aircraft hold", booking.flight_number))
        } else {
            ("AT_SORT_FACILITY", {
                let city = store
                    .get_flight(&booking.flight_number)
                    .map(|f| f.departure_city.clone())
                    .unwrap_or_else(|| "origin".to_string());
                format!("{} sort facility", city)
            })
        };
        ActionOutcome::ok_with(
            format!(
                "{} bag{} on booking {}: {}, last scanned at {}.",
                bag_count,
                if bag_count == 1 { "" } else { "s" },
                booking.reference,
                status,
                location
            ),
            json!({
                "bookingReference": booking.reference,
                "bagCount": bag_count,
                "status": status,
                "lastScan": location,
            }),
        )
    }

    // ------------------------------------------------------------------
    // Transactional kinds — staging paths (validate, never mutate)
    // ------------------------------------------------------------------

    fn stage_book(&self, store: &InventoryStore, request: &ActionRequest) -> Staged {
        let Some(flight_number) = request.param("flightNumber") else {
            return Staged::Immediate(ActionOutcome::fail("Which flight would you like to book?"));
        };
        let Some(class_param) = request.param("seatClass") else {
            return Staged::Immediate(ActionOutcome::fail(
                "Which cabin would you like — economy, comfortPlus, first, or deltaOne?",
            ));
        };
        let Some(cabin) = CabinClass::parse(class_param) else {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "\"{}\" isn't a cabin we offer. Choose economy, comfortPlus, first, or deltaOne.",
                class_param
            )));
        };
        let Some(flight) = store.get_flight(flight_number) else {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "I couldn't find flight {}.",
                flight_number.to_uppercase()
            )));
        };
        if !flight.offers_cabin(cabin) {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "Flight {} doesn't offer {}.",
                flight.flight_number,
                cabin.label()
            )));
        }
        if flight.first_available(cabin).is_none() {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "{} is sold out on flight {}.",
                cabin.label(),
                flight.flight_number
            )));
        }
        // Full snapshot so the confirmation renders without another lookup
        Staged::Confirm(PendingAction::BookFlight {
            flight: flight.clone(),
            cabin,
        })
    }

    fn stage_cancel(&self, store: &InventoryStore, request: &ActionRequest) -> Staged {
        let Some(reference) = request.param("bookingReference") else {
            return Staged::Immediate(ActionOutcome::fail(
                "Which booking reference should I cancel?",
            ));
        };
        let Some(booking) = store.find_active_booking(reference) else {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "I couldn't find an active booking under {}. It may already be cancelled.",
                reference.to_uppercase()
            )));
        };
        Staged::Confirm(PendingAction::CancelBooking {
            reference: booking.reference.clone(),
            flight_number: booking.flight_number.clone(),
            refund: assess_refund(booking, Utc::now(), &self.rules),
        })
    }

    fn stage_change_flight(&self, store: &InventoryStore, request: &ActionRequest) -> Staged {
        let Some(reference) = request.param("bookingReference") else {
            return Staged::Immediate(ActionOutcome::fail("Which booking should I move?"));
        };
        let Some(new_flight_number) = request.param("newFlightNumber") else {
            return Staged::Immediate(ActionOutcome::fail("Which flight should I move it to?"));
        };
        let Some(booking) = store.find_active_booking(reference) else {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "I couldn't find an active booking under {}.",
                reference.to_uppercase()
            )));
        };
        let Some(flight) = store.get_flight(new_flight_number) else {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "I couldn't find flight {}.",
                new_flight_number.to_uppercase()
            )));
        };
        if flight.first_available(booking.cabin).is_none() {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "Flight {} has no open {} seats.",
                flight.flight_number,
                booking.cabin.label()
            )));
        }
        Staged::Confirm(PendingAction::ChangeFlight {
            reference: booking.reference.clone(),
            new_flight: flight.clone(),
        })
    }

    fn stage_change_seat(&self, store: &InventoryStore, request: &ActionRequest) -> Staged {
        let Some(reference) = request.param("bookingReference") else {
            return Staged::Immediate(ActionOutcome::fail(
                "Which booking's seat should I change?",
            ));
        };
        let Some(booking) = store.find_active_booking(reference) else {
            return Staged::Immediate(ActionOutcome::fail(format!(
                "I couldn't find an active booking under {}.",
                reference.to_uppercase()
            )));
        };
        let reference = booking.reference.clone();

        if let Some(seat_number) = request.param("newSeatNumber") {
            let available = store
                .get_flight(&booking.flight_number)
                .and_then(|f| f.find_seat(seat_number))
                .map(|(_, seat)| seat.is_available())
                .unwrap_or(false);
            if !available {
                return Staged::Immediate(ActionOutcome::fail(format!(
                    "Seat {} isn't available on flight {}.",
                    seat_number.to_uppercase(),
                    booking.flight_number
                )));
            }
            return Staged::Confirm(PendingAction::ChangeSeat {
                reference,
                stage: SeatFlowStage::Ready {
                    seat_number: seat_number.to_uppercase(),
                },
            });
        }

        let preference = request
            .param("seatPreference")
            .or_else(|| request.param("targetClass"));
        match preference {
            Some(p) => Staged::Confirm(PendingAction::ChangeSeat {
                reference,
                stage: SeatFlowStage::SelectingSeat {
                    preference: Some(p.to_string()),
                },
            }),
            None => Staged::Immediate(ActionOutcome::fail(
                "Tell me a seat number, or what kind of seat you'd like, and I'll take a look.",
            )),
        }
    }
}

/// Map a store error onto the plain-language failure the user sees.
fn store_failure(err: StoreError) -> ActionOutcome {
    let message = match &err {
        StoreError::FlightNotFound(number) => {
            format!("I couldn't find flight {}.", number.to_uppercase())
        }
        StoreError::CabinNotOffered { flight, cabin } => {
            format!("Flight {} doesn't offer {}.", flight, cabin.label())
        }
        StoreError::NoSeatsAvailable { flight, cabin } => {
            format!("{} is sold out on flight {}.", cabin.label(), flight)
        }
        StoreError::BookingNotFound(reference) => format!(
            "I couldn't find an active booking under {}. It may already be cancelled.",
            reference.to_uppercase()
        ),
        StoreError::SeatUnavailable { flight, seat } => {
            format!("Seat {} isn't available on flight {}.", seat, flight)
        }
    };
    tracing::debug!(error = %err, "action failed");
    ActionOutcome::fail(message)
}

fn collect_matches(store: &InventoryStore, from: &str, to: &str, date: NaiveDate) -> Vec<Flight> {
    store
        .list_flights()
        .iter()
        .filter(|f| {
            city_matches(&f.departure_city, from)
                && city_matches(&f.arrival_city, to)
                && f.scheduled_departure.date_naive() == date
        })
        .cloned()
        .collect()
}

fn city_matches(city: &str, query: &str) -> bool {
    let city = city.to_lowercase();
    let query = query.trim().to_lowercase();
    !query.is_empty() && (city.contains(&query) || query.contains(&city))
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn flight_payload(flight: &Flight) -> serde_json::Value {
    let available: serde_json::Map<String, serde_json::Value> = CABIN_SEARCH_ORDER
        .iter()
        .map(|cabin| {
            (
                cabin.as_str().to_string(),
                json!(flight.available_count(*cabin)),
            )
        })
        .collect();
    json!({
        "flightNumber": flight.flight_number,
        "from": flight.departure_city,
        "to": flight.arrival_city,
        "departure": flight.scheduled_departure.to_rfc3339(),
        "status": flight.status,
        "aircraft": flight.aircraft,
        "availableSeats": available,
    })
}

/// Resolve a free-text travel date against the session's "today":
/// `today`, `tomorrow`, `next <weekday>`, or an ISO date.
pub fn resolve_travel_date(expr: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = expr.trim().to_lowercase();
    match text.as_str() {
        "" | "today" => Some(today),
        "tomorrow" => today.succ_opt(),
        _ => {
            if let Some(rest) = text.strip_prefix("next ") {
                parse_weekday(rest).map(|wd| next_occurrence(today, wd))
            } else {
                NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok()
            }
        }
    }
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Strictly future: "next friday" on a Friday lands a week out.
fn next_occurrence(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let delta = (weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    today + chrono::Duration::days(if delta == 0 { 7 } else { delta })
}
