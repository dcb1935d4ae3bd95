use crate::action::{ActionKind, ActionOutcome, ActionRequest};
use crate::executor::ActionExecutor;
use chrono::{DateTime, Duration, Utc};
use meridian_inventory::booking::{Booking, FareType};
use meridian_inventory::flight::{CabinClass, Flight, CABIN_SEARCH_ORDER};
use meridian_inventory::profile::UpgradeEntitlement;
use meridian_inventory::store::InventoryStore;
use meridian_shared::app_config::BusinessRules;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Where a refund would land if this cancellation goes through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundMethod {
    OriginalPayment,
    ECredit,
}

/// Derived, never persisted: recomputed every time a cancellation is staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundAssessment {
    pub method: RefundMethod,
    pub refundable_fare: bool,
    pub qualifies_for_24_hour_refund: bool,
}

/// The 24-hour rule: a booking made within the refund window, for a flight
/// departing beyond the minimum lead time, refunds in full regardless of fare.
pub fn assess_refund(booking: &Booking, now: DateTime<Utc>, rules: &BusinessRules) -> RefundAssessment {
    let refundable_fare = booking.fare_type == FareType::Refundable;
    let booked_recently = now - booking.created_at <= Duration::hours(rules.refund_window_hours);
    let departs_far_out =
        booking.scheduled_departure - now > Duration::days(rules.refund_min_days_out);
    let qualifies = booked_recently && departs_far_out;

    RefundAssessment {
        method: if refundable_fare || qualifies {
            RefundMethod::OriginalPayment
        } else {
            RefundMethod::ECredit
        },
        refundable_fare,
        qualifies_for_24_hour_refund: qualifies,
    }
}

/// Progress of the seat-change sub-flow. The final confirm always carries a
/// concrete seat number, never a bare preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SeatFlowStage {
    SelectingSeat { preference: Option<String> },
    UpgradeOffer {
        seat_number: String,
        offered_cabin: CabinClass,
        fee_cents: i32,
    },
    Ready { seat_number: String },
}

/// A staged transactional action, one variant per confirmable kind, each
/// carrying only the fields it needs to execute and to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PendingAction {
    BookFlight { flight: Flight, cabin: CabinClass },
    CancelBooking {
        reference: String,
        flight_number: String,
        refund: RefundAssessment,
    },
    ChangeFlight { reference: String, new_flight: Flight },
    ChangeSeat { reference: String, stage: SeatFlowStage },
}

impl PendingAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::BookFlight { .. } => ActionKind::BookFlight,
            Self::CancelBooking { .. } => ActionKind::CancelBooking,
            Self::ChangeFlight { .. } => ActionKind::ChangeFlight,
            Self::ChangeSeat { .. } => ActionKind::ChangeSeat,
        }
    }
}

/// One staged action awaiting resolution, keyed by a stable transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub action: PendingAction,
}

impl PendingConfirmation {
    /// The question the assistant asks before committing.
    pub fn prompt(&self, store: &InventoryStore) -> String {
        match &self.action {
            PendingAction::BookFlight { flight, cabin } => {
                let seat_preview = flight
                    .first_available(*cabin)
                    .map(|s| format!(" Seat {} is first available.", s.number))
                    .unwrap_or_default();
                format!(
                    "You're booking {} on flight {} ({}), departing {}.{} Shall I confirm?",
                    cabin.label(),
                    flight.flight_number,
                    flight.route(),
                    flight.scheduled_departure.format("%H:%M on %b %-d"),
                    seat_preview
                )
            }
            PendingAction::CancelBooking {
                reference,
                flight_number,
                refund,
            } => {
                let refund_text = if refund.refundable_fare {
                    "Your fare is refundable; the full amount returns to your original payment method."
                } else if refund.qualifies_for_24_hour_refund {
                    "You're within the 24-hour booking window, so this refunds in full to your original payment method."
                } else {
                    "This fare is non-refundable; you'll receive an eCredit for the value instead."
                };
                format!(
                    "Cancel booking {} on flight {}? {} Shall I go ahead?",
                    reference, flight_number, refund_text
                )
            }
            PendingAction::ChangeFlight {
                reference,
                new_flight,
            } => format!(
                "Move booking {} to flight {} ({}), departing {}? Shall I confirm the change?",
                reference,
                new_flight.flight_number,
                new_flight.route(),
                new_flight.scheduled_departure.format("%H:%M on %b %-d"),
            ),
            PendingAction::ChangeSeat { reference, stage } => match stage {
                SeatFlowStage::SelectingSeat { preference } => {
                    let grid = seat_grid(store, reference);
                    let lead = match preference {
                        Some(p) => format!("Looking for a {} seat for booking {}.", p, reference),
                        None => format!("Let's pick a new seat for booking {}.", reference),
                    };
                    format!("{} Here's what's open:\n{}\nWhich seat would you like?", lead, grid)
                }
                SeatFlowStage::UpgradeOffer {
                    seat_number,
                    offered_cabin,
                    fee_cents,
                } => {
                    if *fee_cents == 0 {
                        format!(
                            "Seat {} is yours. As a thank-you for your loyalty, I can move you up to {} at no charge instead — interested?",
                            seat_number,
                            offered_cabin.label()
                        )
                    } else {
                        format!(
                            "Seat {} is yours. I can also offer an upgrade to {} for ${:.2} — interested?",
                            seat_number,
                            offered_cabin.label(),
                            *fee_cents as f64 / 100.0
                        )
                    }
                }
                SeatFlowStage::Ready { seat_number } => format!(
                    "Move booking {} to seat {}? Shall I confirm?",
                    reference, seat_number
                ),
            },
        }
    }
}

/// Available seats on the booking's flight, a few per cabin.
fn seat_grid(store: &InventoryStore, reference: &str) -> String {
    let Some(booking) = store.find_active_booking(reference) else {
        return "(booking no longer available)".to_string();
    };
    let Some(flight) = store.get_flight(&booking.flight_number) else {
        return "(flight no longer scheduled)".to_string();
    };

    let mut lines = Vec::new();
    for cabin in CABIN_SEARCH_ORDER {
        let open: Vec<&str> = flight
            .seats
            .get(&cabin)
            .map(|pool| {
                pool.iter()
                    .filter(|s| s.is_available())
                    .take(6)
                    .map(|s| s.number.as_str())
                    .collect()
            })
            .unwrap_or_default();
        if !open.is_empty() {
            lines.push(format!("  {}: {}", cabin.label(), open.join(", ")));
        }
    }
    lines.join("\n")
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Confirmed(ActionOutcome),
    Declined,
}

/// What the seat sub-flow wants to say next.
#[derive(Debug, Clone)]
pub enum SeatFlowEvent {
    UpgradeOffered(String),
    ReadyToConfirm(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    #[error("No pending confirmation for transaction {0} (already resolved?)")]
    NotFound(Uuid),

    #[error("A seat has not been chosen yet for this change")]
    AwaitingSeatSelection,

    #[error("This confirmation is not in a seat-selection stage")]
    InvalidStage,

    #[error("Seat {0} is not available")]
    SeatUnavailable(String),

    #[error("Booking {0} is no longer active")]
    BookingGone(String),
}

/// Holds staged actions and guarantees each resolves exactly once:
/// NONE → PENDING(kind) → RESOLVED(confirmed|declined).
pub struct ConfirmationManager {
    pending: HashMap<Uuid, PendingConfirmation>,
    rules: BusinessRules,
}

impl ConfirmationManager {
    pub fn new(rules: BusinessRules) -> Self {
        Self {
            pending: HashMap::new(),
            rules,
        }
    }

    pub fn stage(&mut self, action: PendingAction) -> Uuid {
        let id = Uuid::new_v4();
        tracing::debug!(%id, kind = ?action.kind(), "confirmation staged");
        self.pending.insert(
            id,
            PendingConfirmation {
                id,
                created_at: Utc::now(),
                action,
            },
        );
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&PendingConfirmation> {
        self.pending.get(id)
    }

    /// Resolve a pending confirmation. The pending entry is destroyed on the
    /// way in — a second confirm or decline of the same id finds nothing.
    /// Executor failure on confirm still counts as resolved; it surfaces in
    /// the returned outcome, never by re-entering PENDING.
    pub fn resolve(
        &mut self,
        id: Uuid,
        approve: bool,
        executor: &ActionExecutor,
        store: &mut InventoryStore,
    ) -> Result<Resolution, ConfirmationError> {
        let pending = self
            .pending
            .remove(&id)
            .ok_or(ConfirmationError::NotFound(id))?;

        if !approve {
            tracing::info!(%id, kind = ?pending.action.kind(), "confirmation declined");
            return Ok(Resolution::Declined);
        }

        let request = match request_for(&pending.action) {
            Ok(request) => request,
            Err(err) => {
                // A seat flow mid-selection cannot commit; keep it pending.
                self.pending.insert(id, pending);
                return Err(err);
            }
        };

        tracing::info!(%id, kind = ?request.kind, "confirmation approved, executing");
        let outcome = executor.execute(store, &request);
        Ok(Resolution::Confirmed(outcome))
    }

    /// Seat sub-flow: the user picked a concrete seat. Depending on tier and
    /// cabin availability this either arms the final confirm or offers an
    /// upgrade first.
    pub fn select_seat(
        &mut self,
        id: Uuid,
        seat_number: &str,
        store: &InventoryStore,
    ) -> Result<SeatFlowEvent, ConfirmationError> {
        let pending = self
            .pending
            .get_mut(&id)
            .ok_or(ConfirmationError::NotFound(id))?;

        let PendingAction::ChangeSeat { reference, stage } = &mut pending.action else {
            return Err(ConfirmationError::InvalidStage);
        };
        if !matches!(stage, SeatFlowStage::SelectingSeat { .. }) {
            return Err(ConfirmationError::InvalidStage);
        }

        let booking = store
            .find_active_booking(reference)
            .ok_or_else(|| ConfirmationError::BookingGone(reference.clone()))?;
        let flight = store
            .get_flight(&booking.flight_number)
            .ok_or_else(|| ConfirmationError::BookingGone(reference.clone()))?;

        let seat_cabin = match flight.find_seat(seat_number) {
            Some((cabin, seat)) if seat.is_available() => cabin,
            _ => return Err(ConfirmationError::SeatUnavailable(seat_number.to_string())),
        };

        let entitlement = store.active_profile().tier.upgrade_entitlement();
        let upgrade_cabin = if seat_cabin == booking.cabin
            && entitlement != UpgradeEntitlement::NotOffered
        {
            booking
                .cabin
                .next_up()
                .filter(|up| flight.available_count(*up) > 0)
        } else {
            None
        };

        *stage = match upgrade_cabin {
            Some(offered_cabin) => SeatFlowStage::UpgradeOffer {
                seat_number: seat_number.to_string(),
                offered_cabin,
                fee_cents: match entitlement {
                    UpgradeEntitlement::Complimentary => 0,
                    _ => self.rules.upgrade_fee_cents,
                },
            },
            None => SeatFlowStage::Ready {
                seat_number: seat_number.to_string(),
            },
        };

        let prompt = self.pending[&id].prompt(store);
        match &self.pending[&id].action {
            PendingAction::ChangeSeat {
                stage: SeatFlowStage::UpgradeOffer { .. },
                ..
            } => Ok(SeatFlowEvent::UpgradeOffered(prompt)),
            _ => Ok(SeatFlowEvent::ReadyToConfirm(prompt)),
        }
    }

    /// Seat sub-flow: answer to the upgrade offer. Accepting swaps the chosen
    /// seat for the first open seat in the offered cabin.
    pub fn respond_upgrade(
        &mut self,
        id: Uuid,
        accept: bool,
        store: &InventoryStore,
    ) -> Result<SeatFlowEvent, ConfirmationError> {
        let pending = self
            .pending
            .get_mut(&id)
            .ok_or(ConfirmationError::NotFound(id))?;

        let PendingAction::ChangeSeat { reference, stage } = &mut pending.action else {
            return Err(ConfirmationError::InvalidStage);
        };
        let SeatFlowStage::UpgradeOffer {
            seat_number,
            offered_cabin,
            ..
        } = stage.clone()
        else {
            return Err(ConfirmationError::InvalidStage);
        };

        let final_seat = if accept {
            let booking = store
                .find_active_booking(reference)
                .ok_or_else(|| ConfirmationError::BookingGone(reference.clone()))?;
            let flight = store
                .get_flight(&booking.flight_number)
                .ok_or_else(|| ConfirmationError::BookingGone(reference.clone()))?;
            flight
                .first_available(offered_cabin)
                .map(|s| s.number.clone())
                .ok_or_else(|| ConfirmationError::SeatUnavailable(format!("{}", offered_cabin)))?
        } else {
            seat_number
        };

        *stage = SeatFlowStage::Ready {
            seat_number: final_seat,
        };
        Ok(SeatFlowEvent::ReadyToConfirm(self.pending[&id].prompt(store)))
    }
}

/// Build the single executor call a confirm resolves into, from the
/// parameters captured at staging time.
fn request_for(action: &PendingAction) -> Result<ActionRequest, ConfirmationError> {
    Ok(match action {
        PendingAction::BookFlight { flight, cabin } => ActionRequest::new(ActionKind::BookFlight)
            .with("flightNumber", &flight.flight_number)
            .with("seatClass", cabin.as_str()),
        PendingAction::CancelBooking { reference, .. } => {
            ActionRequest::new(ActionKind::CancelBooking).with("bookingReference", reference)
        }
        PendingAction::ChangeFlight {
            reference,
            new_flight,
        } => ActionRequest::new(ActionKind::ChangeFlight)
            .with("bookingReference", reference)
            .with("newFlightNumber", &new_flight.flight_number),
        PendingAction::ChangeSeat { reference, stage } => match stage {
            SeatFlowStage::Ready { seat_number } => ActionRequest::new(ActionKind::ChangeSeat)
                .with("bookingReference", reference)
                .with("newSeatNumber", seat_number),
            _ => return Err(ConfirmationError::AwaitingSeatSelection),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_inventory::booking::BookingStatus;

    fn rules() -> BusinessRules {
        BusinessRules::default()
    }

    fn store() -> InventoryStore {
        InventoryStore::for_date(Utc::now().date_naive())
    }

    fn booking_departing_in(days: i64) -> Booking {
        let mut store =
            InventoryStore::for_date(Utc::now().date_naive() + Duration::days(days));
        let reference = store
            .create_booking("DL100", CabinClass::Economy)
            .unwrap();
        store.find_active_booking(&reference).unwrap().clone()
    }

    #[test]
    fn test_24_hour_rule_far_departure() {
        let booking = booking_departing_in(10);
        let assessment = assess_refund(&booking, Utc::now(), &rules());
        assert!(assessment.qualifies_for_24_hour_refund);
        assert_eq!(assessment.method, RefundMethod::OriginalPayment);
    }

    #[test]
    fn test_24_hour_rule_near_departure() {
        let booking = booking_departing_in(3);
        let assessment = assess_refund(&booking, Utc::now(), &rules());
        assert!(!assessment.qualifies_for_24_hour_refund);
        // Economy fares are non-refundable, so this falls to eCredit
        assert_eq!(assessment.method, RefundMethod::ECredit);
    }

    #[test]
    fn test_refundable_fare_wins_regardless() {
        let mut booking = booking_departing_in(3);
        booking.fare_type = FareType::Refundable;
        let assessment = assess_refund(&booking, Utc::now(), &rules());
        assert_eq!(assessment.method, RefundMethod::OriginalPayment);
    }

    #[test]
    fn test_stale_booking_does_not_qualify() {
        let mut booking = booking_departing_in(10);
        booking.created_at = Utc::now() - Duration::hours(30);
        let assessment = assess_refund(&booking, Utc::now(), &rules());
        assert!(!assessment.qualifies_for_24_hour_refund);
    }

    #[test]
    fn test_confirmation_resolves_exactly_once() {
        let mut store = store();
        let executor = ActionExecutor::new(rules());
        let mut manager = ConfirmationManager::new(rules());

        let reference = store.create_booking("DL200", CabinClass::Economy).unwrap();
        let booking = store.find_active_booking(&reference).unwrap().clone();
        let id = manager.stage(PendingAction::CancelBooking {
            reference: reference.clone(),
            flight_number: booking.flight_number.clone(),
            refund: assess_refund(&booking, Utc::now(), &rules()),
        });

        let first = manager.resolve(id, true, &executor, &mut store).unwrap();
        assert!(matches!(first, Resolution::Confirmed(outcome) if outcome.success));
        assert!(store.find_active_booking(&reference).is_none());

        // Second resolution of the same transaction finds nothing
        let second = manager.resolve(id, true, &executor, &mut store);
        assert!(matches!(second, Err(ConfirmationError::NotFound(_))));
    }

    #[test]
    fn test_decline_never_touches_inventory() {
        let mut store = store();
        let executor = ActionExecutor::new(rules());
        let mut manager = ConfirmationManager::new(rules());

        let reference = store.create_booking("DL300", CabinClass::First).unwrap();
        let booking = store.find_active_booking(&reference).unwrap().clone();
        let id = manager.stage(PendingAction::CancelBooking {
            reference: reference.clone(),
            flight_number: booking.flight_number.clone(),
            refund: assess_refund(&booking, Utc::now(), &rules()),
        });

        let resolution = manager.resolve(id, false, &executor, &mut store).unwrap();
        assert!(matches!(resolution, Resolution::Declined));
        assert_eq!(
            store.find_active_booking(&reference).unwrap().status,
            BookingStatus::Confirmed
        );
    }

    #[test]
    fn test_confirm_failure_still_resolves() {
        let mut store = store();
        let executor = ActionExecutor::new(rules());
        let mut manager = ConfirmationManager::new(rules());

        let reference = store.create_booking("DL400", CabinClass::Economy).unwrap();
        let booking = store.find_active_booking(&reference).unwrap().clone();
        let id = manager.stage(PendingAction::CancelBooking {
            reference: reference.clone(),
            flight_number: booking.flight_number.clone(),
            refund: assess_refund(&booking, Utc::now(), &rules()),
        });

        // Cancel out from under the pending confirmation
        store.cancel_booking(&reference).unwrap();

        let resolution = manager.resolve(id, true, &executor, &mut store).unwrap();
        match resolution {
            Resolution::Confirmed(outcome) => assert!(!outcome.success),
            Resolution::Declined => panic!("expected a confirmed resolution"),
        }
        // Failure did not re-arm the pending state
        assert!(manager.get(&id).is_none());
    }

    #[test]
    fn test_seat_flow_upgrade_path() {
        let mut store = store();
        let executor = ActionExecutor::new(rules());
        let mut manager = ConfirmationManager::new(rules());

        // Default profile is Gold: complimentary upgrades
        let reference = store.create_booking("DL500", CabinClass::Economy).unwrap();
        let id = manager.stage(PendingAction::ChangeSeat {
            reference: reference.clone(),
            stage: SeatFlowStage::SelectingSeat {
                preference: Some("window".to_string()),
            },
        });

        // Confirming before a seat is chosen keeps the flow pending
        let premature = manager.resolve(id, true, &executor, &mut store);
        assert!(matches!(
            premature,
            Err(ConfirmationError::AwaitingSeatSelection)
        ));
        assert!(manager.get(&id).is_some());

        // Pick an open economy seat; an upgrade should be offered
        let open_seat = store
            .get_flight("DL500")
            .unwrap()
            .first_available(CabinClass::Economy)
            .unwrap()
            .number
            .clone();
        let event = manager.select_seat(id, &open_seat, &store).unwrap();
        assert!(matches!(event, SeatFlowEvent::UpgradeOffered(_)));

        // Accept: the final seat lands in Comfort+
        let event = manager.respond_upgrade(id, true, &store).unwrap();
        let SeatFlowEvent::ReadyToConfirm(_) = event else {
            panic!("expected the flow to be ready");
        };

        let resolution = manager.resolve(id, true, &executor, &mut store).unwrap();
        assert!(matches!(resolution, Resolution::Confirmed(outcome) if outcome.success));
        let booking = store.find_active_booking(&reference).unwrap();
        assert_eq!(booking.cabin, CabinClass::ComfortPlus);
    }

    #[test]
    fn test_seat_flow_rejects_taken_seat() {
        let mut store = store();
        let mut manager = ConfirmationManager::new(rules());

        let first = store.create_booking("DL100", CabinClass::Economy).unwrap();
        let taken = store.find_active_booking(&first).unwrap().seat.number.clone();
        let second = store.create_booking("DL100", CabinClass::Economy).unwrap();

        let id = manager.stage(PendingAction::ChangeSeat {
            reference: second,
            stage: SeatFlowStage::SelectingSeat { preference: None },
        });
        let result = manager.select_seat(id, &taken, &store);
        assert!(matches!(result, Err(ConfirmationError::SeatUnavailable(_))));
    }
}
