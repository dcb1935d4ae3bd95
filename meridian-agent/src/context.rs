use meridian_inventory::booking::Booking;
use meridian_inventory::flight::Flight;
use meridian_inventory::store::InventoryStore;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Fields still being gathered for an in-progress trip request.
#[derive(Debug, Clone, Default)]
pub struct TripDraft {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
    pub passengers: Option<u32>,
    pub special_assistance: Option<String>,
    pub meal_preference: Option<String>,
}

/// Questions the assistant still owes the user, asked FIFO before any
/// model delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileQuestion {
    DepartureCity,
    DestinationCity,
    TravelDate,
    PassengerCount,
    SpecialAssistance,
    MealPreference,
}

impl ProfileQuestion {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::DepartureCity => "Which city are you departing from?",
            Self::DestinationCity => "Where would you like to fly to?",
            Self::TravelDate => "What day would you like to travel?",
            Self::PassengerCount => "How many passengers are travelling?",
            Self::SpecialAssistance => {
                "Will anyone in your party need special assistance at the airport?"
            }
            Self::MealPreference => "Any meal preference for the group?",
        }
    }
}

/// Session-lifetime conversational state: what was searched, what was
/// pointed at, what still needs asking. Reset whenever the active profile
/// changes or the conversation is explicitly reset.
#[derive(Default)]
pub struct ConversationContext {
    pub last_search_results: Vec<Flight>,
    pub selected_flight: Option<Flight>,
    pub question_queue: VecDeque<ProfileQuestion>,
    pub trip_draft: TripDraft,
    pub recent_flights: HashMap<String, Flight>,
    pub recent_bookings: HashMap<String, Booking>,
    /// Set after the assistant asked for a booking reference to cancel.
    pub awaiting_cancellation_reference: bool,
    /// The confirmation the next free-text turn will be matched against.
    pub active_confirmation: Option<Uuid>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Remember search results for later ordinal references ("the second
    /// flight") and flight-number lookups.
    pub fn remember_search(&mut self, results: Vec<Flight>) {
        for flight in &results {
            self.recent_flights
                .insert(flight.flight_number.to_uppercase(), flight.clone());
        }
        self.last_search_results = results;
    }

    pub fn remember_booking(&mut self, booking: Booking) {
        self.recent_bookings
            .insert(booking.reference.to_uppercase(), booking);
    }

    /// Resolve a flight mention in free text.
    ///
    /// Precedence: an explicit flight-number token always wins (checked
    /// against recently-mentioned flights, then the full inventory), then
    /// ordinals against the last search results, then demonstratives
    /// against the currently selected flight.
    pub fn resolve_flight_reference(&self, text: &str, store: &InventoryStore) -> Option<Flight> {
        for token in tokens_of(text) {
            if is_flight_number(&token) {
                let key = token.to_uppercase();
                if let Some(flight) = self.recent_flights.get(&key) {
                    return Some(flight.clone());
                }
                if let Some(flight) = store.get_flight(&key) {
                    return Some(flight.clone());
                }
            }
        }

        let lowered = text.to_lowercase();
        if lowered.contains("flight") {
            if let Some(index) = ordinal_index(&lowered) {
                return self.last_search_results.get(index).cloned();
            }
            if lowered.contains("last flight") {
                return self.last_search_results.last().cloned();
            }
            if lowered.contains("that flight") || lowered.contains("this flight") {
                return self.selected_flight.clone();
            }
        }
        None
    }
}

fn tokens_of(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// One to three letters followed by two to four digits, eg "DL100".
pub fn is_flight_number(token: &str) -> bool {
    let letters: String = token.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let rest = &token[letters.len()..];
    (1..=3).contains(&letters.len())
        && (2..=4).contains(&rest.len())
        && rest.chars().all(|c| c.is_ascii_digit())
}

fn ordinal_index(text: &str) -> Option<usize> {
    const ORDINALS: [(&str, usize); 10] = [
        ("first", 0),
        ("1st", 0),
        ("second", 1),
        ("2nd", 1),
        ("third", 2),
        ("3rd", 2),
        ("fourth", 3),
        ("4th", 3),
        ("fifth", 4),
        ("5th", 4),
    ];
    ORDINALS
        .iter()
        .find(|(word, _)| text.contains(word))
        .map(|(_, index)| *index)
}
