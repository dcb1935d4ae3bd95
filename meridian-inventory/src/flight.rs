use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cabin classes partitioning each flight's seat pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CabinClass {
    #[serde(rename = "economy")]
    Economy,
    #[serde(rename = "comfortPlus")]
    ComfortPlus,
    #[serde(rename = "first")]
    First,
    #[serde(rename = "deltaOne")]
    DeltaOne,
}

/// Pool search order used wherever a seat is looked up without a class.
pub const CABIN_SEARCH_ORDER: [CabinClass; 4] = [
    CabinClass::Economy,
    CabinClass::ComfortPlus,
    CabinClass::First,
    CabinClass::DeltaOne,
];

impl CabinClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "economy" => Some(Self::Economy),
            "comfortPlus" => Some(Self::ComfortPlus),
            "first" => Some(Self::First),
            "deltaOne" => Some(Self::DeltaOne),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::ComfortPlus => "comfortPlus",
            Self::First => "first",
            Self::DeltaOne => "deltaOne",
        }
    }

    /// Human-readable label for chat responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Economy => "Economy",
            Self::ComfortPlus => "Comfort+",
            Self::First => "First Class",
            Self::DeltaOne => "Delta One",
        }
    }

    /// The next cabin up, if any, in upgrade order.
    pub fn next_up(&self) -> Option<CabinClass> {
        match self {
            Self::Economy => Some(Self::ComfortPlus),
            Self::ComfortPlus => Some(Self::First),
            Self::First => Some(Self::DeltaOne),
            Self::DeltaOne => None,
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    OnTime,
    Delayed,
    Cancelled,
    Departed,
    Arrived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Occupied,
    Selected,
}

/// A single seat within one flight's cabin pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub number: String,
    pub cabin: CabinClass,
    pub status: SeatStatus,
    pub price_cents: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Seat {
    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }
}

/// A scheduled flight and its seat inventory, keyed by flight number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub flight_number: String,
    pub departure_city: String,
    pub arrival_city: String,
    pub scheduled_departure: DateTime<Utc>,
    pub status: FlightStatus,
    pub aircraft: String,
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    pub seats: BTreeMap<CabinClass, Vec<Seat>>,
}

impl Flight {
    /// Whether this flight sells the given cabin at all.
    pub fn offers_cabin(&self, cabin: CabinClass) -> bool {
        self.seats.get(&cabin).map(|pool| !pool.is_empty()).unwrap_or(false)
    }

    /// First available seat in a cabin, in pool order.
    pub fn first_available(&self, cabin: CabinClass) -> Option<&Seat> {
        self.seats.get(&cabin)?.iter().find(|s| s.is_available())
    }

    pub fn available_count(&self, cabin: CabinClass) -> usize {
        self.seats
            .get(&cabin)
            .map(|pool| pool.iter().filter(|s| s.is_available()).count())
            .unwrap_or(0)
    }

    /// Locate a seat by number across all pools, economy first.
    pub fn find_seat(&self, seat_number: &str) -> Option<(CabinClass, &Seat)> {
        for cabin in CABIN_SEARCH_ORDER {
            if let Some(seat) = self
                .seats
                .get(&cabin)
                .and_then(|pool| pool.iter().find(|s| s.number == seat_number))
            {
                return Some((cabin, seat));
            }
        }
        None
    }

    pub fn set_seat_status(&mut self, seat_number: &str, status: SeatStatus) -> bool {
        for cabin in CABIN_SEARCH_ORDER {
            if let Some(seat) = self
                .seats
                .get_mut(&cabin)
                .and_then(|pool| pool.iter_mut().find(|s| s.number == seat_number))
            {
                seat.status = status;
                return true;
            }
        }
        false
    }

    /// Route summary for chat responses, eg "Atlanta → New York".
    pub fn route(&self) -> String {
        format!("{} → {}", self.departure_city, self.arrival_city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_flight() -> Flight {
        let mut seats = BTreeMap::new();
        seats.insert(
            CabinClass::Economy,
            vec![
                Seat {
                    number: "20A".to_string(),
                    cabin: CabinClass::Economy,
                    status: SeatStatus::Occupied,
                    price_cents: 12_500,
                    features: vec![],
                },
                Seat {
                    number: "20B".to_string(),
                    cabin: CabinClass::Economy,
                    status: SeatStatus::Available,
                    price_cents: 12_500,
                    features: vec!["window".to_string()],
                },
            ],
        );
        seats.insert(
            CabinClass::First,
            vec![Seat {
                number: "2A".to_string(),
                cabin: CabinClass::First,
                status: SeatStatus::Available,
                price_cents: 48_000,
                features: vec!["lie-flat".to_string()],
            }],
        );
        Flight {
            flight_number: "DL100".to_string(),
            departure_city: "Atlanta".to_string(),
            arrival_city: "New York".to_string(),
            scheduled_departure: Utc.with_ymd_and_hms(2026, 3, 10, 13, 0, 0).unwrap(),
            status: FlightStatus::OnTime,
            aircraft: "Boeing 757-200".to_string(),
            duration_minutes: 135,
            gate: Some("A12".to_string()),
            seats,
        }
    }

    #[test]
    fn test_first_available_skips_occupied() {
        let flight = test_flight();
        let seat = flight.first_available(CabinClass::Economy).unwrap();
        assert_eq!(seat.number, "20B");
    }

    #[test]
    fn test_find_seat_searches_all_pools() {
        let flight = test_flight();
        let (cabin, seat) = flight.find_seat("2A").unwrap();
        assert_eq!(cabin, CabinClass::First);
        assert_eq!(seat.price_cents, 48_000);
        assert!(flight.find_seat("99Z").is_none());
    }

    #[test]
    fn test_offers_cabin() {
        let flight = test_flight();
        assert!(flight.offers_cabin(CabinClass::Economy));
        assert!(!flight.offers_cabin(CabinClass::DeltaOne));
    }

    #[test]
    fn test_cabin_class_wire_names() {
        assert_eq!(
            serde_json::to_string(&CabinClass::ComfortPlus).unwrap(),
            "\"comfortPlus\""
        );
        assert_eq!(CabinClass::parse("deltaOne"), Some(CabinClass::DeltaOne));
        assert_eq!(CabinClass::parse("business"), None);
    }
}
