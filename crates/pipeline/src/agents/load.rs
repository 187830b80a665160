//! Load extraction: lanes, equipment, weight, commodity, pickup window.
//!
//! Fields are populated first-mention-wins from explicit lexical cues. On a
//! multi-load call the transcript is segmented at ordinal markers ("second
//! load") and at repeated lane pairs, one `ExtractedLoad` per segment; loads
//! with no populated field are dropped.

use async_trait::async_trait;

use loadcall_core::{
    ClassificationResult, ConfidenceScore, ExtractedLoad, FieldValue, LoadExtractionOutput,
    Utterance,
};

use crate::agents::lexicon::{parse_integer, spoken_number, trim_punctuation};
use crate::agents::{Agent, AgentError};
use crate::context::AgentContext;
use crate::output::AgentId;
use crate::registry::AgentDescriptor;

/// Both endpoints named in one `from X to Y` pattern.
const LANE_PAIR_CONFIDENCE: f64 = 0.8;

/// A single-endpoint cue such as `picking up in X`.
const SINGLE_CUE_PLACE_CONFIDENCE: f64 = 0.65;

const EQUIPMENT_CONFIDENCE: f64 = 0.85;
const WEIGHT_CONFIDENCE: f64 = 0.8;
const COMMODITY_CONFIDENCE: f64 = 0.6;
const PICKUP_WINDOW_CONFIDENCE: f64 = 0.6;

/// Weight sanity bounds in pounds; numbers outside are not load weights.
const WEIGHT_MIN_LBS: u32 = 100;
const WEIGHT_MAX_LBS: u32 = 80_000;

const EQUIPMENT_TYPES: &[&str] = &[
    "dry van", "reefer", "flatbed", "step deck", "power only", "box truck", "conestoga", "hotshot",
];

/// Ordinal markers that open a new load segment on a multi-load call. First
/// markers are absent on purpose: preamble fields belong to the first load.
const SUBSEQUENT_LOAD_MARKERS: &[&str] = &[
    "second load",
    "second one",
    "second shipment",
    "third load",
    "third one",
    "third shipment",
    "fourth load",
    "another load",
    "next load",
    "next one",
    "the other one",
];

/// Phrases accepted as a pickup window, longest first.
const TIME_PHRASES: &[&str] = &[
    "tomorrow morning",
    "tomorrow afternoon",
    "tomorrow night",
    "this afternoon",
    "this evening",
    "first thing",
    "end of the week",
    "tomorrow",
    "tonight",
    "today",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const PICKUP_CUES: &[&str] = &["pick", "ready", "loads at", "appointment"];

const PLACE_STOPWORDS: &[&str] = &[
    "the",
    "a",
    "an",
    "our",
    "your",
    "my",
    "their",
    "here",
    "there",
    "that",
    "this",
    "it",
    "you",
    "us",
    "me",
    "them",
    "tomorrow",
    "today",
    "tonight",
    "morning",
    "afternoon",
    "evening",
    "noon",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const COMMODITY_STOPWORDS: &[&str] = &["the", "a", "an", "it", "that", "ready", "going", "out"];

/// Extracts one or more shipments described on the call.
#[derive(Clone, Debug, Default)]
pub struct LoadExtractionAgent;

#[async_trait]
impl Agent for LoadExtractionAgent {
    type Output = LoadExtractionOutput;

    const ID: AgentId = AgentId::LoadExtraction;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor::new(
            AgentId::LoadExtraction,
            &[AgentId::Classification],
            "load_extraction_output",
        )
    }

    async fn run(&self, context: &AgentContext) -> Result<Self::Output, AgentError> {
        let classification = context.classification();
        Ok(extract_loads(context.utterances(), classification.as_ref()))
    }
}

pub fn extract_loads(
    utterances: &[Utterance],
    classification: Option<&ClassificationResult>,
) -> LoadExtractionOutput {
    let multi_load = classification.map(|result| result.multi_load_call).unwrap_or(false);

    let mut loads: Vec<ExtractedLoad> = Vec::new();
    let mut current = ExtractedLoad::default();

    for utterance in utterances {
        let lower = utterance.text.to_ascii_lowercase();

        if multi_load
            && !current.is_empty()
            && SUBSEQUENT_LOAD_MARKERS.iter().any(|marker| lower.contains(marker))
        {
            loads.push(std::mem::take(&mut current));
        }

        apply_utterance(&mut current, &mut loads, &utterance.text, &lower, multi_load);
    }

    if !current.is_empty() {
        loads.push(current);
    }

    LoadExtractionOutput { loads }
}

fn apply_utterance(
    current: &mut ExtractedLoad,
    loads: &mut Vec<ExtractedLoad>,
    text: &str,
    lower: &str,
    multi_load: bool,
) {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    for (origin, destination) in lane_pairs(&tokens) {
        let lane_started = current.origin.is_some() || current.destination.is_some();
        if multi_load && lane_started {
            loads.push(std::mem::take(current));
        } else if lane_started {
            // Single-load call: first lane wins.
            continue;
        }
        current.origin = Some(place_field(origin, LANE_PAIR_CONFIDENCE));
        current.destination = Some(place_field(destination, LANE_PAIR_CONFIDENCE));
    }

    scan_single_place_cues(current, &tokens);

    if current.equipment.is_none() {
        if let Some(equipment) = EQUIPMENT_TYPES.iter().find(|name| lower.contains(**name)) {
            current.equipment = Some(FieldValue::new(
                (*equipment).to_string(),
                ConfidenceScore::from_value(EQUIPMENT_CONFIDENCE),
            ));
        }
    }

    if current.weight_lbs.is_none() {
        if let Some(weight) = extract_weight(&tokens) {
            current.weight_lbs =
                Some(FieldValue::new(weight, ConfidenceScore::from_value(WEIGHT_CONFIDENCE)));
        }
    }

    if current.commodity.is_none() {
        if let Some(commodity) = extract_commodity(&tokens) {
            current.commodity =
                Some(FieldValue::new(commodity, ConfidenceScore::from_value(COMMODITY_CONFIDENCE)));
        }
    }

    if current.pickup_window.is_none() && PICKUP_CUES.iter().any(|cue| lower.contains(cue)) {
        if let Some(phrase) = TIME_PHRASES.iter().find(|phrase| lower.contains(**phrase)) {
            current.pickup_window = Some(FieldValue::new(
                (*phrase).to_string(),
                ConfidenceScore::from_value(PICKUP_WINDOW_CONFIDENCE),
            ));
        }
    }
}

/// Every `from <place> ... to <place>` pattern in one utterance, in order.
fn lane_pairs(tokens: &[&str]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        if !trim_punctuation(token).eq_ignore_ascii_case("from") {
            continue;
        }
        let Some(origin) = capture_place(tokens, index + 1) else { continue };
        let window_end = (index + 6).min(tokens.len());
        let Some(to_index) = (index + 2..window_end)
            .find(|candidate| trim_punctuation(tokens[*candidate]).eq_ignore_ascii_case("to"))
        else {
            continue;
        };
        let Some(destination) = capture_place(tokens, to_index + 1) else { continue };
        pairs.push((origin, destination));
    }
    pairs
}

fn scan_single_place_cues(current: &mut ExtractedLoad, tokens: &[&str]) {
    for index in 0..tokens.len() {
        let word = trim_punctuation(tokens[index]).to_ascii_lowercase();
        let previous =
            index.checked_sub(1).map(|prev| trim_punctuation(tokens[prev]).to_ascii_lowercase());
        let previous = previous.as_deref();

        let origin_cue = (word == "of" && previous == Some("out"))
            || (word == "in"
                && (previous == Some("pickup")
                    || (previous == Some("up")
                        && index >= 2
                        && matches!(
                            trim_punctuation(tokens[index - 2]).to_ascii_lowercase().as_str(),
                            "picking" | "picks" | "pick"
                        ))));
        if origin_cue && current.origin.is_none() {
            if let Some(place) = capture_place(tokens, index + 1) {
                current.origin = Some(place_field(place, SINGLE_CUE_PLACE_CONFIDENCE));
            }
            continue;
        }

        let destination_cue = (word == "to"
            && matches!(previous, Some("going" | "headed" | "delivers" | "delivering" | "deliver")))
            || (word == "in" && matches!(previous, Some("delivery" | "dropping" | "drop")));
        if destination_cue && current.destination.is_none() {
            if let Some(place) = capture_place(tokens, index + 1) {
                current.destination = Some(place_field(place, SINGLE_CUE_PLACE_CONFIDENCE));
            }
        }
    }
}

/// The token after a place cue, with a comma pulling in a state token
/// ("Memphis, Tennessee").
fn capture_place(tokens: &[&str], start: usize) -> Option<String> {
    let raw = tokens.get(start)?;
    let first = trim_punctuation(raw);
    if first.is_empty() || PLACE_STOPWORDS.contains(&first.to_ascii_lowercase().as_str()) {
        return None;
    }
    if raw.ends_with(',') {
        if let Some(next_raw) = tokens.get(start + 1) {
            let next = trim_punctuation(next_raw);
            if next.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                return Some(format!("{first}, {next}"));
            }
        }
    }
    Some(first.to_string())
}

fn place_field(place: String, confidence: f64) -> FieldValue<String> {
    FieldValue::new(place, ConfidenceScore::from_value(confidence))
}

/// `<number> pounds`, `<number> thousand pounds`, digits or spoken tens.
fn extract_weight(tokens: &[&str]) -> Option<u32> {
    for index in 0..tokens.len() {
        let word = trim_punctuation(tokens[index]).to_ascii_lowercase();
        if !matches!(word.as_str(), "pounds" | "lbs" | "lb") || index == 0 {
            continue;
        }
        let previous = trim_punctuation(tokens[index - 1]).to_ascii_lowercase();
        let weight = if previous == "thousand" && index >= 2 {
            let base = trim_punctuation(tokens[index - 2]).to_ascii_lowercase();
            parse_integer(&base).or_else(|| spoken_number(&base)).map(|value| value * 1_000)
        } else {
            parse_integer(&previous)
        };
        if let Some(weight) = weight.filter(|w| (WEIGHT_MIN_LBS..=WEIGHT_MAX_LBS).contains(w)) {
            return Some(weight);
        }
    }
    None
}

/// `pallets of <commodity>` and similar container cues; up to two tokens.
fn extract_commodity(tokens: &[&str]) -> Option<String> {
    for index in 0..tokens.len() {
        let word = trim_punctuation(tokens[index]).to_ascii_lowercase();
        if word != "of" || index == 0 {
            continue;
        }
        let previous = trim_punctuation(tokens[index - 1]).to_ascii_lowercase();
        if !matches!(
            previous.as_str(),
            "pallets" | "skids" | "truckload" | "load" | "loads" | "shipment" | "pounds" | "lbs"
        ) {
            continue;
        }

        let mut words = Vec::new();
        for raw in tokens.iter().skip(index + 1).take(2) {
            let cleaned = trim_punctuation(raw);
            if cleaned.is_empty()
                || COMMODITY_STOPWORDS.contains(&cleaned.to_ascii_lowercase().as_str())
            {
                break;
            }
            words.push(cleaned.to_ascii_lowercase());
            if raw.ends_with(|c: char| c.is_ascii_punctuation()) {
                break;
            }
        }
        if !words.is_empty() {
            return Some(words.join(" "));
        }
    }
    None
}
