use crate::action::{ActionKind, ActionOutcome, ActionRequest};
use crate::confirmation::{
    ConfirmationError, ConfirmationManager, PendingAction, Resolution, SeatFlowEvent,
    SeatFlowStage,
};
use crate::context::{is_flight_number, ConversationContext, ProfileQuestion};
use crate::executor::{ActionExecutor, Staged};
use crate::extractor::{ExtractedFields, FieldExtractor, HeuristicExtractor};
use crate::llm::{ChatModel, ModelTurn};
use crate::policy::{context_injection, PolicyIndex};
use meridian_inventory::booking::looks_like_reference;
use meridian_inventory::flight::Flight;
use meridian_inventory::store::InventoryStore;
use meridian_shared::app_config::BusinessRules;
use meridian_shared::models::chat::{ChatMessage, HistoryEntry};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// How many transcript entries ride along as model history.
const HISTORY_WINDOW: usize = 12;

const APOLOGY: &str = "I'm sorry — I'm having trouble on my end right now. \
Let me connect you with a team member who can help.";

/// What one user turn produced: the assistant messages to render, and
/// whether the conversation should be handed to a human.
#[derive(Debug)]
pub struct TurnOutcome {
    pub messages: Vec<ChatMessage>,
    pub handoff: bool,
}

impl TurnOutcome {
    fn messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            handoff: false,
        }
    }
}

/// Owns the conversational session: the inventory store, the per-turn
/// context, staged confirmations and the two external collaborators.
/// Decides per turn whether to answer locally or delegate to the model.
pub struct Orchestrator {
    store: InventoryStore,
    context: ConversationContext,
    confirmations: ConfirmationManager,
    executor: ActionExecutor,
    extractor: Box<dyn FieldExtractor>,
    model: Arc<dyn ChatModel>,
    policy: Arc<dyn PolicyIndex>,
    transcript: Vec<ChatMessage>,
}

impl Orchestrator {
    pub fn new(
        store: InventoryStore,
        model: Arc<dyn ChatModel>,
        policy: Arc<dyn PolicyIndex>,
        rules: BusinessRules,
    ) -> Self {
        Self {
            store,
            context: ConversationContext::new(),
            confirmations: ConfirmationManager::new(rules.clone()),
            executor: ActionExecutor::new(rules),
            extractor: Box::new(HeuristicExtractor),
            model,
            policy,
            transcript: Vec::new(),
        }
    }

    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut InventoryStore {
        &mut self.store
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Wipe the conversation and regenerate inventory.
    pub fn reset_session(&mut self) {
        self.store.reset();
        self.context.reset();
        self.transcript.clear();
    }

    /// Process one user turn.
    pub async fn handle_turn(&mut self, text: &str) -> TurnOutcome {
        self.transcript.push(ChatMessage::user(text));

        // 1. A pending confirmation intercepts the turn before anything else.
        if let Some(id) = self.context.active_confirmation {
            if let Some(outcome) = self.handle_pending_turn(id, text) {
                return outcome;
            }
        }

        // 2. PNR fast path: the turn after we asked for a reference.
        if self.context.awaiting_cancellation_reference {
            if let Some(reference) = reference_token(text) {
                self.context.awaiting_cancellation_reference = false;
                let request = ActionRequest::new(ActionKind::CancelBooking)
                    .with("bookingReference", reference);
                return self.stage_and_reply(None, &request);
            }
        }

        let fields = self.extractor.extract(text);

        // 3. Cancellation intent short-circuits the model entirely.
        if fields.wants_cancellation && self.context.question_queue.is_empty() {
            if let Some(reference) = reference_token(text) {
                let request = ActionRequest::new(ActionKind::CancelBooking)
                    .with("bookingReference", reference);
                return self.stage_and_reply(None, &request);
            }
            self.context.awaiting_cancellation_reference = true;
            return TurnOutcome::messages(vec![self.say(
                "Of course — which booking reference would you like to cancel?",
            )]);
        }

        // 4. Deictic references update the selection before anything reads it.
        let referenced = self.context.resolve_flight_reference(text, &self.store);
        if let Some(flight) = &referenced {
            self.context.selected_flight = Some(flight.clone());
        }

        // 5. Progressive gathering: keep asking until the trip is specified.
        let gathering = !self.context.question_queue.is_empty()
            || (fields.wants_trip && referenced.is_none() && !has_flight_token(text));
        if gathering {
            if let Some(outcome) = self.gather_trip_details(text, &fields) {
                return outcome;
            }
        }

        // 6. Everything else goes to the model.
        self.delegate_to_model(text).await
    }

    /// Structured resolution path (confirmation buttons in a UI).
    pub fn resolve_confirmation(
        &mut self,
        id: Uuid,
        approve: bool,
    ) -> Result<Vec<ChatMessage>, ConfirmationError> {
        let resolution = self
            .confirmations
            .resolve(id, approve, &self.executor, &mut self.store)?;
        self.finish_resolution(id);

        let message = match resolution {
            Resolution::Confirmed(outcome) => {
                self.note_booking_from(&outcome);
                self.say(outcome.message)
            }
            Resolution::Declined => {
                self.say("Understood — I haven't changed anything. Anything else I can help with?")
            }
        };
        Ok(vec![message])
    }

    // ------------------------------------------------------------------
    // Pending-confirmation interception
    // ------------------------------------------------------------------

    /// Interpret a free-text turn against the active confirmation. Returns
    /// None when the marker is stale and the turn should fall through.
    fn handle_pending_turn(&mut self, id: Uuid, text: &str) -> Option<TurnOutcome> {
        enum PendingShape {
            SeatSelecting,
            SeatUpgrade,
            Plain,
        }

        let shape = match self.confirmations.get(&id) {
            None => {
                self.context.active_confirmation = None;
                return None;
            }
            Some(pending) => match &pending.action {
                PendingAction::ChangeSeat { stage, .. } => match stage {
                    SeatFlowStage::SelectingSeat { .. } => PendingShape::SeatSelecting,
                    SeatFlowStage::UpgradeOffer { .. } => PendingShape::SeatUpgrade,
                    SeatFlowStage::Ready { .. } => PendingShape::Plain,
                },
                _ => PendingShape::Plain,
            },
        };

        // Seat sub-flow stages route the reply into the flow instead of
        // straight to confirm/decline.
        match shape {
            PendingShape::SeatSelecting => {
                if let Some(seat) = seat_token(text) {
                    let event = self.confirmations.select_seat(id, &seat, &self.store);
                    return Some(self.seat_flow_reply(event));
                }
                if is_negative(text) {
                    return Some(self.decline_pending(id));
                }
                return Some(TurnOutcome::messages(vec![self.say(
                    "Just give me a seat number from the list — 20B, for example — or say \"never mind\" to leave things as they are.",
                )]));
            }
            PendingShape::SeatUpgrade => {
                if is_affirmative(text) || is_negative(text) {
                    let event = self
                        .confirmations
                        .respond_upgrade(id, is_affirmative(text), &self.store);
                    return Some(self.seat_flow_reply(event));
                }
                return Some(TurnOutcome::messages(vec![self.say(
                    "Should I include the upgrade? A yes or no works.",
                )]));
            }
            PendingShape::Plain => {}
        }

        if is_affirmative(text) {
            return Some(match self.resolve_confirmation(id, true) {
                Ok(messages) => TurnOutcome::messages(messages),
                Err(ConfirmationError::AwaitingSeatSelection) => TurnOutcome::messages(vec![
                    self.say("Pick a seat first and then I'll confirm the change."),
                ]),
                Err(_) => TurnOutcome::messages(vec![self.say(APOLOGY)]),
            });
        }
        if is_negative(text) {
            return Some(self.decline_pending(id));
        }

        let reminder = format!(
            "Before we move on — {} A yes or no will do.",
            self.confirmations
                .get(&id)
                .map(|p| p.prompt(&self.store))
                .unwrap_or_default()
        );
        Some(TurnOutcome::messages(vec![self.say(reminder)]))
    }

    fn decline_pending(&mut self, id: Uuid) -> TurnOutcome {
        match self.resolve_confirmation(id, false) {
            Ok(messages) => TurnOutcome::messages(messages),
            Err(_) => TurnOutcome::messages(vec![self.say(APOLOGY)]),
        }
    }

    fn seat_flow_reply(
        &mut self,
        event: Result<SeatFlowEvent, ConfirmationError>,
    ) -> TurnOutcome {
        let message = match event {
            Ok(SeatFlowEvent::UpgradeOffered(prompt)) | Ok(SeatFlowEvent::ReadyToConfirm(prompt)) => {
                self.say(prompt)
            }
            Err(ConfirmationError::SeatUnavailable(seat)) => self.say(format!(
                "Seat {} isn't open — pick another from the list?",
                seat
            )),
            Err(err) => {
                tracing::warn!(%err, "seat flow error");
                self.say(APOLOGY)
            }
        };
        TurnOutcome::messages(vec![message])
    }

    /// Clear the pending marker from the owning message, whatever happened.
    fn finish_resolution(&mut self, id: Uuid) {
        if let Some(message) = self
            .transcript
            .iter_mut()
            .find(|m| m.pending == Some(id))
        {
            message.clear_pending();
        }
        if self.context.active_confirmation == Some(id) {
            self.context.active_confirmation = None;
        }
    }

    // ------------------------------------------------------------------
    // Progressive information gathering
    // ------------------------------------------------------------------

    /// Fill the trip draft from this turn, then either ask the next queued
    /// question or, once everything is known, run the search directly.
    /// Returns None when the turn doesn't belong to the gathering flow.
    fn gather_trip_details(&mut self, text: &str, fields: &ExtractedFields) -> Option<TurnOutcome> {
        let front = self.context.question_queue.front().copied();
        let acks = self.absorb_answers(front, text, fields);
        self.rebuild_question_queue();

        if let Some(question) = self.context.question_queue.front() {
            let prompt = match acks.is_empty() {
                true => question.prompt().to_string(),
                false => format!("{} {}", acks.join(" "), question.prompt()),
            };
            return Some(TurnOutcome::messages(vec![self.say(prompt)]));
        }

        // Draft complete: run the search without a model round-trip.
        let draft = self.context.trip_draft.clone();
        let mut request = ActionRequest::new(ActionKind::SearchFlights)
            .with("from", draft.from.as_deref().unwrap_or_default())
            .with("to", draft.to.as_deref().unwrap_or_default());
        if let Some(date) = &draft.date {
            request = request.with("date", date);
        }
        let outcome = self.executor.execute(&mut self.store, &request);
        let results = self.flights_from_outcome(&outcome);
        self.context.remember_search(results.clone());
        self.context.trip_draft = Default::default();

        let mut content = outcome.message.clone();
        if !results.is_empty() {
            content.push('\n');
            content.push_str(&render_results(&results));
            content.push_str("\nSay the word and I'll book one of these.");
        }
        Some(TurnOutcome::messages(vec![self.say(content)]))
    }

    /// Merge extracted fields (or a direct answer to the question we just
    /// asked) into the draft. Returns acknowledgment fragments.
    fn absorb_answers(
        &mut self,
        front: Option<ProfileQuestion>,
        text: &str,
        fields: &ExtractedFields,
    ) -> Vec<String> {
        let mut acks = Vec::new();
        let draft = &mut self.context.trip_draft;

        if let Some(from) = &fields.from {
            draft.from = Some(from.clone());
            acks.push(format!("Got it — departing {}.", from));
        }
        if let Some(to) = &fields.to {
            draft.to = Some(to.clone());
            acks.push(format!("Heading to {}.", to));
        }
        if let Some(date) = &fields.date_phrase {
            draft.date = Some(date.clone());
            acks.push(format!("Travelling {}.", date));
        }
        if let Some(count) = fields.passengers {
            draft.passengers = Some(count);
            acks.push(format!("{} passengers.", count));
        }

        // A bare answer to the question we just asked.
        let bare = text.trim();
        let short = !bare.is_empty() && bare.split_whitespace().count() <= 4;
        match front {
            Some(ProfileQuestion::DepartureCity) if draft.from.is_none() && short => {
                draft.from = Some(title_case(bare));
                acks.push(format!("Got it — departing {}.", title_case(bare)));
            }
            Some(ProfileQuestion::DestinationCity) if draft.to.is_none() && short => {
                draft.to = Some(title_case(bare));
                acks.push(format!("Heading to {}.", title_case(bare)));
            }
            Some(ProfileQuestion::TravelDate) if draft.date.is_none() && short => {
                draft.date = Some(bare.to_lowercase());
            }
            Some(ProfileQuestion::PassengerCount) if draft.passengers.is_none() => {
                if let Some(count) = bare
                    .split_whitespace()
                    .find_map(|w| w.parse::<u32>().ok())
                {
                    draft.passengers = Some(count);
                }
            }
            Some(ProfileQuestion::SpecialAssistance) if draft.special_assistance.is_none() => {
                draft.special_assistance = Some(bare.to_string());
            }
            Some(ProfileQuestion::MealPreference) if draft.meal_preference.is_none() => {
                draft.meal_preference = Some(bare.to_string());
            }
            _ => {}
        }
        acks
    }

    /// The queue always reflects what the draft is still missing, in a
    /// fixed order. Group questions only appear once the party size is
    /// known to be more than one.
    fn rebuild_question_queue(&mut self) {
        let draft = &self.context.trip_draft;
        let mut queue = VecDeque::new();
        if draft.from.is_none() {
            queue.push_back(ProfileQuestion::DepartureCity);
        }
        if draft.to.is_none() {
            queue.push_back(ProfileQuestion::DestinationCity);
        }
        if draft.date.is_none() {
            queue.push_back(ProfileQuestion::TravelDate);
        }
        if draft.passengers.is_none() {
            queue.push_back(ProfileQuestion::PassengerCount);
        }
        if draft.passengers.map(|n| n > 1).unwrap_or(false) {
            if draft.special_assistance.is_none() {
                queue.push_back(ProfileQuestion::SpecialAssistance);
            }
            if draft.meal_preference.is_none() {
                queue.push_back(ProfileQuestion::MealPreference);
            }
        }
        self.context.question_queue = queue;
    }

    // ------------------------------------------------------------------
    // Model delegation
    // ------------------------------------------------------------------

    async fn delegate_to_model(&mut self, text: &str) -> TurnOutcome {
        // Policy context is best-effort; failures inject nothing.
        let policy_chunks = self.policy.search(text).await.unwrap_or_default();

        let turn = ModelTurn {
            message: text.to_string(),
            context_data: self.context_payload(&context_injection(&policy_chunks)),
            history: self
                .transcript
                .iter()
                .rev()
                .take(HISTORY_WINDOW)
                .rev()
                .map(HistoryEntry::from)
                .collect(),
        };

        let reply = match self.model.complete(turn).await {
            Ok(reply) => reply,
            Err(err) => {
                // No retry: apologize and raise the human-handoff flag.
                tracing::error!(%err, "chat model call failed");
                return TurnOutcome {
                    messages: vec![self.say(APOLOGY)],
                    handoff: true,
                };
            }
        };

        match reply.action {
            Some(directive) => {
                let request = directive.into_request();
                if request.kind.requires_confirmation() {
                    self.stage_and_reply(Some(reply.reply), &request)
                } else {
                    let outcome = self.executor.execute(&mut self.store, &request);
                    if request.kind == ActionKind::SearchFlights && outcome.success {
                        let results = self.flights_from_outcome(&outcome);
                        self.context.remember_search(results);
                    }
                    let content = join_nonempty(&reply.reply, &outcome.message);
                    TurnOutcome::messages(vec![self.say(content)])
                }
            }
            None => TurnOutcome::messages(vec![self.say(reply.reply)]),
        }
    }

    /// Stage a transactional request; on success the reply carries the
    /// confirmation question and the pending marker.
    fn stage_and_reply(&mut self, lead: Option<String>, request: &ActionRequest) -> TurnOutcome {
        match self.executor.stage(&mut self.store, request) {
            Staged::Confirm(action) => {
                let id = self.confirmations.stage(action);
                let prompt = self
                    .confirmations
                    .get(&id)
                    .map(|p| p.prompt(&self.store))
                    .unwrap_or_default();
                let content = match &lead {
                    Some(lead) => join_nonempty(lead, &prompt),
                    None => prompt,
                };
                let message = ChatMessage::assistant_pending(content, id);
                self.transcript.push(message.clone());
                self.context.active_confirmation = Some(id);
                TurnOutcome::messages(vec![message])
            }
            Staged::Immediate(outcome) => {
                let content = match &lead {
                    Some(lead) => join_nonempty(lead, &outcome.message),
                    None => outcome.message,
                };
                TurnOutcome::messages(vec![self.say(content)])
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn say(&mut self, content: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::assistant(content);
        self.transcript.push(message.clone());
        message
    }

    fn context_payload(&self, policy_context: &str) -> serde_json::Value {
        let profile = self.store.active_profile();
        json!({
            "profile": {
                "name": profile.name,
                "tier": profile.tier,
                "loyaltyPoints": profile.loyalty_points,
            },
            "upcomingFlights": profile
                .upcoming_flights
                .iter()
                .map(|b| json!({
                    "reference": b.reference,
                    "flightNumber": b.flight_number,
                    "departure": b.scheduled_departure.to_rfc3339(),
                }))
                .collect::<Vec<_>>(),
            "selectedFlight": self
                .context
                .selected_flight
                .as_ref()
                .map(|f| f.flight_number.clone()),
            "lastSearch": self
                .context
                .last_search_results
                .iter()
                .map(|f| f.flight_number.clone())
                .collect::<Vec<_>>(),
            "policyContext": policy_context,
        })
    }

    /// Materialize the flights named in a search payload back into full
    /// records for the context.
    fn flights_from_outcome(&self, outcome: &ActionOutcome) -> Vec<Flight> {
        outcome
            .data
            .as_ref()
            .and_then(|data| data["flights"].as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry["flightNumber"].as_str())
                    .filter_map(|number| self.store.get_flight(number).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// After a confirmed booking, remember it for reference resolution.
    fn note_booking_from(&mut self, outcome: &ActionOutcome) {
        let Some(reference) = outcome
            .data
            .as_ref()
            .and_then(|d| d["bookingReference"].as_str())
        else {
            return;
        };
        if let Some(booking) = self.store.find_active_booking(reference) {
            self.context.remember_booking(booking.clone());
        }
    }
}

fn join_nonempty(lead: &str, tail: &str) -> String {
    match (lead.trim().is_empty(), tail.trim().is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => lead.to_string(),
        _ => format!("{}\n\n{}", lead.trim(), tail.trim()),
    }
}

fn render_results(flights: &[Flight]) -> String {
    flights
        .iter()
        .map(|f| {
            format!(
                "  {} — {}, departs {}",
                f.flight_number,
                f.route(),
                f.scheduled_departure.format("%H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_affirmative(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    matches!(
        t.as_str(),
        "yes" | "y" | "yeah" | "yep" | "sure" | "ok" | "okay" | "confirm" | "confirmed"
            | "do it" | "go ahead" | "please do" | "yes please"
    ) || t.starts_with("yes,")
        || t.starts_with("yes ")
}

fn is_negative(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    matches!(
        t.as_str(),
        "no" | "n" | "nope" | "decline" | "cancel that" | "never mind" | "nevermind"
            | "don't" | "do not" | "no thanks" | "no thank you"
    ) || t.starts_with("no,")
        || t.starts_with("no ")
}

/// First token in the text shaped like a booking reference. Flight-number
/// tokens are excluded so "cancel DL100" asks for a reference instead of
/// treating the flight as one.
fn reference_token(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .find(|t| looks_like_reference(t) && !is_flight_number(t))
        .map(|t| t.to_uppercase())
}

fn has_flight_token(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .any(is_flight_number)
}

/// Seat tokens are one or two digits followed by a single letter, eg "20B".
fn seat_token(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .find(|t| {
            let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
            (1..=2).contains(&digits.len())
                && t.len() == digits.len() + 1
                && t.chars().last().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
        })
        .map(|t| t.to_uppercase())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionDirective;
    use crate::llm::{CollaboratorError, ScriptedChatModel};
    use crate::policy::NullPolicyIndex;
    use chrono::NaiveDate;
    use meridian_inventory::flight::CabinClass;

    fn orchestrator(replies: Vec<Result<crate::llm::ModelReply, CollaboratorError>>) -> Orchestrator {
        let store = InventoryStore::for_date(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        Orchestrator::new(
            store,
            Arc::new(ScriptedChatModel::new(replies)),
            Arc::new(NullPolicyIndex),
            BusinessRules::default(),
        )
    }

    #[tokio::test]
    async fn test_model_failure_apologizes_and_hands_off() {
        let mut orch = orchestrator(vec![Err(CollaboratorError::Http("boom".to_string()))]);
        let outcome = orch.handle_turn("what's the weather in Atlanta?").await;
        assert!(outcome.handoff);
        assert!(outcome.messages[0].content.contains("sorry"));
    }

    #[tokio::test]
    async fn test_plain_reply_passes_through() {
        let mut orch = orchestrator(vec![ScriptedChatModel::reply("Happy to help!")]);
        let outcome = orch.handle_turn("hello there").await;
        assert!(!outcome.handoff);
        assert_eq!(outcome.messages[0].content, "Happy to help!");
    }

    #[tokio::test]
    async fn test_booking_directive_confirms_then_books() {
        let mut orch = orchestrator(vec![ScriptedChatModel::reply_with_action(
            "Comfort+ on DL100 it is.",
            ActionDirective::BookFlight {
                flight_number: "DL100".to_string(),
                seat_class: "comfortPlus".to_string(),
            },
        )]);

        let before = orch.store().list_bookings().len();
        let staged = orch.handle_turn("book DL100 in comfort plus").await;
        assert!(staged.messages[0].pending.is_some());
        // Nothing mutated yet
        assert_eq!(orch.store().list_bookings().len(), before);

        let confirmed = orch.handle_turn("yes").await;
        assert!(confirmed.messages[0].content.contains("booked"));
        assert_eq!(orch.store().list_bookings().len(), before + 1);

        let upcoming = &orch.store().active_profile().upcoming_flights;
        assert!(upcoming.iter().any(|b| b.cabin == CabinClass::ComfortPlus));
    }

    #[tokio::test]
    async fn test_decline_leaves_inventory_alone() {
        let mut orch = orchestrator(vec![ScriptedChatModel::reply_with_action(
            "Booking Delta One on DL200.",
            ActionDirective::BookFlight {
                flight_number: "DL200".to_string(),
                seat_class: "deltaOne".to_string(),
            },
        )]);

        let before = orch.store().list_bookings().len();
        orch.handle_turn("book DL200 delta one").await;
        let declined = orch.handle_turn("no thanks").await;
        assert!(declined.messages[0].content.contains("haven't changed"));
        assert_eq!(orch.store().list_bookings().len(), before);

        // The pending marker resolved exactly once; nothing left to decline
        assert!(orch.context.active_confirmation.is_none());
    }

    #[tokio::test]
    async fn test_pnr_fast_path_skips_model() {
        // No scripted replies: any model call would error the turn.
        let mut orch = orchestrator(vec![]);
        let reference = orch.store().list_bookings()[0].reference.clone();

        let ask = orch.handle_turn("I need to cancel my booking").await;
        assert!(ask.messages[0].content.contains("booking reference"));

        let staged = orch.handle_turn(&reference).await;
        assert!(staged.messages[0].pending.is_some());
        assert!(staged.messages[0].content.contains("Cancel booking"));

        let done = orch.handle_turn("yes").await;
        assert!(done.messages[0].content.contains("cancelled"));
        assert!(orch.store().find_active_booking(&reference).is_none());
    }

    #[tokio::test]
    async fn test_progressive_gathering_flow() {
        let mut orch = orchestrator(vec![]);

        let q1 = orch.handle_turn("I want to book a flight").await;
        assert!(q1.messages[0].content.contains("departing from"));

        let q2 = orch.handle_turn("from Atlanta").await;
        assert!(q2.messages[0].content.contains("fly to"));

        let q3 = orch.handle_turn("New York").await;
        assert!(q3.messages[0].content.contains("What day"));

        let q4 = orch.handle_turn("today").await;
        assert!(q4.messages[0].content.contains("How many passengers"));

        // A party of three unlocks the group questions
        let q5 = orch.handle_turn("3 people").await;
        assert!(q5.messages[0].content.contains("special assistance"));

        let q6 = orch.handle_turn("no assistance needed").await;
        assert!(q6.messages[0].content.contains("meal preference"));

        let results = orch.handle_turn("vegetarian please").await;
        assert!(results.messages[0].content.contains("Found"));
        assert!(!orch.context.last_search_results.is_empty());
        assert!(orch.context.question_queue.is_empty());
    }

    #[tokio::test]
    async fn test_ordinal_booking_after_gathered_search() {
        let mut orch = orchestrator(vec![ScriptedChatModel::reply_with_action(
            "The first one is a great pick.",
            ActionDirective::BookFlight {
                flight_number: "DL100".to_string(),
                seat_class: "economy".to_string(),
            },
        )]);

        // Single-passenger trip: from + to + date + count in two turns
        orch.handle_turn("I need a flight from Atlanta to New York today")
            .await;
        let results = orch.handle_turn("just 1 person").await;
        assert!(results.messages[0].content.contains("Found"));

        // Ordinal reference resolves against the search; model books it
        let staged = orch.handle_turn("take the first flight please").await;
        assert_eq!(
            orch.context.selected_flight.as_ref().unwrap().flight_number,
            "DL100"
        );
        assert!(staged.messages[0].pending.is_some());
    }

    #[tokio::test]
    async fn test_seat_change_subflow_end_to_end() {
        let mut orch = orchestrator(vec![ScriptedChatModel::reply_with_action(
            "Let's find you a better seat.",
            ActionDirective::ChangeSeat {
                booking_reference: String::new(), // patched below
                new_seat_number: None,
                seat_preference: Some("window".to_string()),
            },
        )]);
        let reference = orch.store().list_bookings()[0].reference.clone();

        // Patch the scripted directive with the real reference
        orch.model = Arc::new(ScriptedChatModel::new(vec![
            ScriptedChatModel::reply_with_action(
                "Let's find you a better seat.",
                ActionDirective::ChangeSeat {
                    booking_reference: reference.clone(),
                    new_seat_number: None,
                    seat_preference: Some("window".to_string()),
                },
            ),
        ]));

        let grid = orch.handle_turn("can I get a window seat?").await;
        assert!(grid.messages[0].content.contains("Which seat"));

        // Pick an open economy seat; Gold profile gets an upgrade offer
        let open = orch
            .store()
            .get_flight("DL100")
            .unwrap()
            .first_available(CabinClass::Economy)
            .unwrap()
            .number
            .clone();
        let offer = orch.handle_turn(&open).await;
        assert!(offer.messages[0].content.contains("no charge"));

        let ready = orch.handle_turn("no").await;
        assert!(ready.messages[0].content.contains(&open));

        let done = orch.handle_turn("yes").await;
        assert!(done.messages[0].content.contains("now in seat"));
        let booking = orch.store().find_active_booking(&reference).unwrap();
        assert_eq!(booking.seat.number, open);
    }

    #[tokio::test]
    async fn test_resolve_confirmation_is_exactly_once() {
        let mut orch = orchestrator(vec![ScriptedChatModel::reply_with_action(
            "On it.",
            ActionDirective::BookFlight {
                flight_number: "DL300".to_string(),
                seat_class: "first".to_string(),
            },
        )]);
        let staged = orch.handle_turn("book DL300 first class").await;
        let id = staged.messages[0].pending.unwrap();

        orch.resolve_confirmation(id, true).unwrap();
        let again = orch.resolve_confirmation(id, true);
        assert!(matches!(again, Err(ConfirmationError::NotFound(_))));

        // The owning message no longer carries the marker
        assert!(orch.transcript().iter().all(|m| m.pending.is_none()));
    }
}
