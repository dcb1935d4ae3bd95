use crate::flight::{CabinClass, Flight, Seat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Changed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FareType {
    Refundable,
    NonRefundable,
}

/// A passenger's reservation on a flight.
///
/// `scheduled_departure` and `seat` are snapshots taken at booking (or last
/// change) time; the flight record stays the source of truth for live status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub reference: String,
    pub customer_id: String,
    pub flight_number: String,
    pub passenger_name: String,
    pub scheduled_departure: DateTime<Utc>,
    pub status: BookingStatus,
    pub seat: Seat,
    pub checked_in: bool,
    pub cabin: CabinClass,
    pub created_at: DateTime<Utc>,
    pub fare_type: FareType,
}

impl Booking {
    pub fn new(
        customer_id: &str,
        passenger_name: &str,
        flight: &Flight,
        cabin: CabinClass,
        seat: Seat,
        fare_type: FareType,
    ) -> Self {
        let now = Utc::now();
        Self {
            reference: generate_reference(customer_id, now),
            customer_id: customer_id.to_string(),
            flight_number: flight.flight_number.clone(),
            passenger_name: passenger_name.to_string(),
            scheduled_departure: flight.scheduled_departure,
            status: BookingStatus::Confirmed,
            seat,
            checked_in: false,
            cabin,
            created_at: now,
            fare_type,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    /// Point the booking at a new flight, keeping the reference stable.
    pub fn move_to(&mut self, flight: &Flight, seat: Seat, cabin: CabinClass) {
        self.flight_number = flight.flight_number.clone();
        self.scheduled_departure = flight.scheduled_departure;
        self.seat = seat;
        self.cabin = cabin;
        self.status = BookingStatus::Changed;
    }
}

/// Booking references look like `MDAL7K3F9Q`: a fixed prefix, two characters
/// of the owning customer id, and the creation time in base36.
pub fn generate_reference(customer_id: &str, at: DateTime<Utc>) -> String {
    let initials: String = customer_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(2)
        .collect::<String>()
        .to_ascii_uppercase();

    let mut stamp = at.timestamp_millis() as u64 % 36u64.pow(6);
    let mut encoded = String::new();
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    for _ in 0..6 {
        encoded.insert(0, ALPHABET[(stamp % 36) as usize] as char);
        stamp /= 36;
    }

    format!("MD{}{}", initials, encoded)
}

/// Loose shape check used by the chat fast path: something a user pasted
/// that plausibly is one of our references.
pub fn looks_like_reference(token: &str) -> bool {
    let token = token.trim();
    (6..=12).contains(&token.len())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_alphabetic())
}
