use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The action vocabulary shared between the chat-model contract and the
/// executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    SearchFlights,
    BookFlight,
    CancelBooking,
    ChangeFlight,
    ChangeSeat,
    CheckIn,
    TrackBaggage,
}

impl ActionKind {
    /// Actions that mutate inventory only after explicit user approval.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            Self::BookFlight | Self::CancelBooking | Self::ChangeFlight | Self::ChangeSeat
        )
    }
}

/// Typed action contract at the chat-model boundary.
///
/// The model replies with structured JSON — `{"kind": "BOOK_FLIGHT",
/// "flightNumber": "DL100", "seatClass": "economy"}` — rather than
/// embedding a directive mini-language in prose. A reply that fails to
/// parse degrades to content-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ActionDirective {
    SearchFlights {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
    },
    BookFlight {
        flight_number: String,
        seat_class: String,
    },
    CancelBooking {
        booking_reference: String,
    },
    ChangeFlight {
        booking_reference: String,
        new_flight_number: String,
    },
    ChangeSeat {
        booking_reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_seat_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seat_preference: Option<String>,
    },
    CheckIn {
        booking_reference: String,
    },
    TrackBaggage {
        booking_reference: String,
    },
}

impl ActionDirective {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SearchFlights { .. } => ActionKind::SearchFlights,
            Self::BookFlight { .. } => ActionKind::BookFlight,
            Self::CancelBooking { .. } => ActionKind::CancelBooking,
            Self::ChangeFlight { .. } => ActionKind::ChangeFlight,
            Self::ChangeSeat { .. } => ActionKind::ChangeSeat,
            Self::CheckIn { .. } => ActionKind::CheckIn,
            Self::TrackBaggage { .. } => ActionKind::TrackBaggage,
        }
    }

    /// Flatten into the executor's string-keyed parameter map.
    pub fn into_request(self) -> ActionRequest {
        let kind = self.kind();
        let mut params = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                params.insert(key.to_string(), v);
            }
        };
        match self {
            Self::SearchFlights { from, to, date } => {
                put("from", Some(from));
                put("to", Some(to));
                put("date", date);
            }
            Self::BookFlight {
                flight_number,
                seat_class,
            } => {
                put("flightNumber", Some(flight_number));
                put("seatClass", Some(seat_class));
            }
            Self::CancelBooking { booking_reference } => {
                put("bookingReference", Some(booking_reference));
            }
            Self::ChangeFlight {
                booking_reference,
                new_flight_number,
            } => {
                put("bookingReference", Some(booking_reference));
                put("newFlightNumber", Some(new_flight_number));
            }
            Self::ChangeSeat {
                booking_reference,
                new_seat_number,
                seat_preference,
            } => {
                put("bookingReference", Some(booking_reference));
                put("newSeatNumber", new_seat_number);
                put("seatPreference", seat_preference);
            }
            Self::CheckIn { booking_reference } | Self::TrackBaggage { booking_reference } => {
                put("bookingReference", Some(booking_reference));
            }
        }
        ActionRequest { kind, params }
    }
}

/// A structured request into the executor: action kind plus a string-keyed
/// parameter map. Required-parameter validation happens in the executor,
/// never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub params: HashMap<String, String>,
}

impl ActionRequest {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
    }
}

/// Uniform result envelope. Callers branch on `success` and the optional
/// payload; failure detail lives only in `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_wire_format() {
        let json = r#"{"kind":"BOOK_FLIGHT","flightNumber":"DL100","seatClass":"comfortPlus"}"#;
        let directive: ActionDirective = serde_json::from_str(json).unwrap();
        assert_eq!(
            directive,
            ActionDirective::BookFlight {
                flight_number: "DL100".to_string(),
                seat_class: "comfortPlus".to_string(),
            }
        );
        assert!(directive.kind().requires_confirmation());
    }

    #[test]
    fn test_directive_optional_fields() {
        let json = r#"{"kind":"CHANGE_SEAT","bookingReference":"MDCU1A2B3C","seatPreference":"window"}"#;
        let directive: ActionDirective = serde_json::from_str(json).unwrap();
        let request = directive.into_request();
        assert_eq!(request.kind, ActionKind::ChangeSeat);
        assert_eq!(request.param("seatPreference"), Some("window"));
        assert_eq!(request.param("newSeatNumber"), None);
    }

    #[test]
    fn test_blank_params_read_as_missing() {
        let request = ActionRequest::new(ActionKind::SearchFlights).with("from", "  ");
        assert_eq!(request.param("from"), None);
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        let json = r#"{"kind":"UPGRADE_CABIN","bookingReference":"X1"}"#;
        assert!(serde_json::from_str::<ActionDirective>(json).is_err());
    }
}
