use crate::flight::{CabinClass, Flight, FlightStatus, Seat, SeatStatus};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rand::Rng;
use std::collections::BTreeMap;

/// Seat-pool dimensions for one aircraft type.
struct CabinLayout {
    cabin: CabinClass,
    rows: std::ops::RangeInclusive<u32>,
    letters: &'static [char],
    base_price_cents: i32,
}

fn narrowbody_layout() -> Vec<CabinLayout> {
    vec![
        CabinLayout {
            cabin: CabinClass::DeltaOne,
            rows: 1..=2,
            letters: &['A', 'B'],
            base_price_cents: 89_000,
        },
        CabinLayout {
            cabin: CabinClass::First,
            rows: 3..=4,
            letters: &['A', 'B', 'C'],
            base_price_cents: 54_000,
        },
        CabinLayout {
            cabin: CabinClass::ComfortPlus,
            rows: 10..=12,
            letters: &['A', 'B', 'C', 'D'],
            base_price_cents: 28_500,
        },
        CabinLayout {
            cabin: CabinClass::Economy,
            rows: 20..=26,
            letters: &['A', 'B', 'C', 'D', 'E', 'F'],
            base_price_cents: 18_900,
        },
    ]
}

fn build_seat_pools(layouts: &[CabinLayout]) -> BTreeMap<CabinClass, Vec<Seat>> {
    let mut pools = BTreeMap::new();
    for layout in layouts {
        let mut pool = Vec::new();
        for row in layout.rows.clone() {
            for letter in layout.letters {
                let mut features = Vec::new();
                if *letter == *layout.letters.first().unwrap()
                    || *letter == *layout.letters.last().unwrap()
                {
                    features.push("window".to_string());
                }
                if row == *layout.rows.start() {
                    features.push("extra-legroom".to_string());
                }
                pool.push(Seat {
                    number: format!("{}{}", row, letter),
                    cabin: layout.cabin,
                    status: SeatStatus::Available,
                    price_cents: layout.base_price_cents,
                    features,
                });
            }
        }
        pools.insert(layout.cabin, pool);
    }
    pools
}

fn departure_at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).expect("valid time"))
}

fn build_flight(
    flight_number: &str,
    from: &str,
    to: &str,
    departure: DateTime<Utc>,
    aircraft: &str,
    duration_minutes: i64,
    gate: Option<&str>,
) -> Flight {
    Flight {
        flight_number: flight_number.to_string(),
        departure_city: from.to_string(),
        arrival_city: to.to_string(),
        scheduled_departure: departure,
        status: FlightStatus::OnTime,
        aircraft: aircraft.to_string(),
        duration_minutes,
        gate: gate.map(|g| g.to_string()),
        seats: build_seat_pools(&narrowbody_layout()),
    }
}

/// Whether a city pair is the fixed shuttle route, in either direction.
pub fn is_shuttle_route(from: &str, to: &str) -> bool {
    let matches = |city: &str, target: &str| city.to_lowercase().contains(target);
    (matches(from, "atlanta") && matches(to, "new york"))
        || (matches(from, "new york") && matches(to, "atlanta"))
}

/// The fixed five-flight Atlanta↔New York shuttle for a given day.
pub fn shuttle_schedule(from: &str, to: &str, date: NaiveDate) -> Vec<Flight> {
    let slots: [(&str, u32, u32, &str, &str); 5] = [
        ("DL100", 6, 30, "Boeing 757-200", "A12"),
        ("DL200", 9, 15, "Airbus A321", "A17"),
        ("DL300", 12, 0, "Boeing 737-900", "B3"),
        ("DL400", 15, 45, "Airbus A321", "B8"),
        ("DL500", 19, 30, "Boeing 757-200", "A22"),
    ];

    slots
        .iter()
        .map(|(number, hour, minute, aircraft, gate)| {
            build_flight(
                number,
                from,
                to,
                departure_at(date, *hour, *minute),
                aircraft,
                135,
                Some(gate),
            )
        })
        .collect()
}

/// Synthesize 3–5 plausible flights for an arbitrary city pair and date.
pub fn synthesize_route(from: &str, to: &str, date: NaiveDate) -> Vec<Flight> {
    let mut rng = rand::thread_rng();
    let aircraft = [
        "Boeing 737-800",
        "Boeing 757-200",
        "Airbus A321",
        "Airbus A330-900",
    ];

    let count = rng.gen_range(3..=5);
    let mut flights = Vec::with_capacity(count);
    for i in 0..count {
        let number = format!("DL{}", rng.gen_range(1000..10000));
        // Spread departures across the day, jittered within each slot
        let hour = 6 + (i as u32 * 14) / count as u32 + rng.gen_range(0..2);
        let minute = *[0, 15, 30, 45].get(rng.gen_range(0..4)).unwrap_or(&0);
        flights.push(build_flight(
            &number,
            from,
            to,
            departure_at(date, hour.min(22), minute),
            aircraft[rng.gen_range(0..aircraft.len())],
            rng.gen_range(90..360),
            None,
        ));
    }
    flights
}

/// The schedule a fresh session starts with: the shuttle plus a few
/// longer-haul departures out of the hub.
pub fn baseline_day(date: NaiveDate) -> Vec<Flight> {
    let mut flights = shuttle_schedule("Atlanta", "New York", date);
    flights.push(build_flight(
        "DL810",
        "Atlanta",
        "Los Angeles",
        departure_at(date, 8, 5),
        "Airbus A330-900",
        305,
        Some("E6"),
    ));
    flights.push(build_flight(
        "DL920",
        "Atlanta",
        "Seattle",
        departure_at(date, 11, 40),
        "Boeing 757-200",
        330,
        Some("E11"),
    ));
    flights.push(build_flight(
        "DL640",
        "New York",
        "Miami",
        departure_at(date, 14, 20),
        "Airbus A321",
        195,
        Some("C4"),
    ));
    flights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn test_shuttle_schedule_is_fixed() {
        let flights = shuttle_schedule("Atlanta", "New York", day());
        assert_eq!(flights.len(), 5);
        assert_eq!(flights[0].flight_number, "DL100");
        assert_eq!(flights[4].flight_number, "DL500");
        // Every slot departs on the requested day
        for flight in &flights {
            assert_eq!(flight.scheduled_departure.date_naive(), day());
        }
    }

    #[test]
    fn test_shuttle_route_detection() {
        assert!(is_shuttle_route("Atlanta", "New York"));
        assert!(is_shuttle_route("new york city", "atlanta"));
        assert!(!is_shuttle_route("Atlanta", "Miami"));
    }

    #[test]
    fn test_synthesized_route_shape() {
        let flights = synthesize_route("Denver", "Boston", day());
        assert!((3..=5).contains(&flights.len()));
        for flight in &flights {
            assert_eq!(flight.departure_city, "Denver");
            assert_eq!(flight.arrival_city, "Boston");
            assert!(flight.flight_number.starts_with("DL"));
            assert!(flight.offers_cabin(CabinClass::Economy));
            assert!(flight.first_available(CabinClass::Economy).is_some());
        }
    }

    #[test]
    fn test_seat_pools_cover_all_cabins() {
        let flights = shuttle_schedule("Atlanta", "New York", day());
        let flight = &flights[0];
        for cabin in crate::flight::CABIN_SEARCH_ORDER {
            assert!(flight.offers_cabin(cabin), "missing {} pool", cabin);
        }
        // Economy is the largest pool
        assert!(
            flight.seats[&CabinClass::Economy].len() > flight.seats[&CabinClass::DeltaOne].len()
        );
    }
}
