use serde::Serialize;

/// Structured fields pulled out of one free-text turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date_phrase: Option<String>,
    pub passengers: Option<u32>,
    pub wants_trip: bool,
    pub wants_cancellation: bool,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.from.is_none()
            && self.to.is_none()
            && self.date_phrase.is_none()
            && self.passengers.is_none()
    }
}

/// Best-effort field extraction from free text. Deliberately shallow —
/// phrase capture, not a grammar — and replaceable behind this trait.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, text: &str) -> ExtractedFields;
}

pub struct HeuristicExtractor;

/// Words that terminate a captured city phrase.
const PHRASE_STOPS: [&str; 10] = [
    "to", "from", "on", "for", "with", "next", "today", "tomorrow", "leaving", "departing",
];

/// "want to", "need to" and friends: the "to" of an infinitive, not a route.
const INFINITIVE_CUES: [&str; 6] = ["want", "need", "like", "going", "trying", "plan"];

/// Words that can follow "to"/"from" without being part of a city name.
const NON_CITY_WORDS: [&str; 13] = [
    "book", "get", "fly", "go", "travel", "find", "take", "see", "check", "cancel", "a", "the",
    "my",
];

impl FieldExtractor for HeuristicExtractor {
    fn extract(&self, text: &str) -> ExtractedFields {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == '?' || c == '!')
            .filter(|w| !w.is_empty())
            .collect();

        let mut fields = ExtractedFields {
            wants_trip: ["fly", "flight", "flights", "travel", "trip", "book"]
                .iter()
                .any(|k| words.contains(k)),
            wants_cancellation: lowered.contains("cancel"),
            ..Default::default()
        };

        fields.from = capture_after(&words, "from");
        fields.to = capture_after(&words, "to");
        fields.date_phrase = capture_date(&words);
        fields.passengers = capture_passengers(&words);
        fields
    }
}

/// Capture the word run following `keyword`, stopping at the next keyword.
/// Occurrences that read as an infinitive ("want to book") or lead into a
/// verb rather than a place are skipped.
fn capture_after(words: &[&str], keyword: &str) -> Option<String> {
    for (i, word) in words.iter().enumerate() {
        if *word != keyword {
            continue;
        }
        if keyword == "to" && i > 0 && INFINITIVE_CUES.contains(&words[i - 1]) {
            continue;
        }

        let mut captured = Vec::new();
        for next in &words[i + 1..] {
            if PHRASE_STOPS.contains(next)
                || NON_CITY_WORDS.contains(next)
                || next.chars().any(|c| c.is_ascii_digit())
            {
                break;
            }
            captured.push(*next);
            if captured.len() == 3 {
                break;
            }
        }
        if !captured.is_empty() {
            return Some(
                captured
                    .iter()
                    .map(|w| title_word(w))
                    .collect::<Vec<_>>()
                    .join(" "),
            );
        }
    }
    None
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capture_date(words: &[&str]) -> Option<String> {
    for (i, word) in words.iter().enumerate() {
        match *word {
            "today" | "tomorrow" => return Some(word.to_string()),
            "next" => {
                if let Some(day) = words.get(i + 1) {
                    return Some(format!("next {}", day));
                }
            }
            w if w.len() == 10 && w.chars().filter(|c| *c == '-').count() == 2 => {
                return Some(w.to_string());
            }
            _ => {}
        }
    }
    None
}

fn capture_passengers(words: &[&str]) -> Option<u32> {
    // A triplet on board means three kids plus the adult booking them.
    if words.iter().any(|w| *w == "triplet" || *w == "triplets") {
        return Some(4);
    }

    const NUMBER_WORDS: [(&str, u32); 6] = [
        ("one", 1),
        ("two", 2),
        ("three", 3),
        ("four", 4),
        ("five", 5),
        ("six", 6),
    ];

    for (i, word) in words.iter().enumerate() {
        let next_is_people = words
            .get(i + 1)
            .map(|w| matches!(*w, "people" | "passengers" | "travelers" | "travellers" | "adults" | "of" | "us"))
            .unwrap_or(false);
        if !next_is_people {
            continue;
        }
        if let Ok(n) = word.parse::<u32>() {
            return Some(n);
        }
        if let Some((_, n)) = NUMBER_WORDS.iter().find(|(w, _)| w == word) {
            return Some(*n);
        }
    }
    None
}
