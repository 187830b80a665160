//! Call-type classification from weighted lexical indicators.
//!
//! Every matched phrase contributes a fixed weight to one candidate call
//! type; the candidate with the highest aggregate wins. The confidence value
//! is the winner's share of the total matched weight, damped by evidence
//! volume so a single stray phrase cannot produce a high-confidence result.
//! The weights are product-tunable constants, not statistically derived.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use loadcall_core::{CallType, ClassificationResult, ConfidenceScore, Utterance};

use crate::agents::{Agent, AgentError};
use crate::context::AgentContext;
use crate::output::AgentId;
use crate::registry::AgentDescriptor;

/// Matched weight at which the evidence-volume damping saturates.
const INDICATOR_SATURATION_WEIGHT: f64 = 4.0;

/// Distinct multi-load markers required to flag a multi-load call.
const MULTI_LOAD_MIN_MARKERS: usize = 2;

const CARRIER_QUOTE_INDICATORS: &[(&str, f64)] = &[
    ("got a truck", 2.0),
    ("have a truck", 2.0),
    ("truck available", 2.0),
    ("i'm empty", 1.5),
    ("empty in", 1.5),
    ("deadhead", 1.0),
    ("what's it paying", 2.0),
    ("what does it pay", 2.0),
    ("what's the rate", 1.5),
    ("can you do", 1.5),
    ("all in", 0.5),
    ("my driver can", 1.0),
    ("we can cover", 1.5),
];

const NEW_BOOKING_INDICATORS: &[(&str, f64)] = &[
    ("we need to ship", 2.0),
    ("need to move", 2.0),
    ("we have a shipment", 2.0),
    ("shipment", 1.0),
    ("pallets", 1.5),
    ("pounds", 1.0),
    ("lbs", 1.0),
    ("commodity", 1.0),
    ("can you quote", 1.5),
    ("quote us", 1.5),
    ("our dock", 1.0),
    ("loading dock", 1.0),
    ("we manufacture", 1.0),
];

const CHECK_CALL_INDICATORS: &[(&str, f64)] = &[
    ("checking in", 2.0),
    ("check call", 2.0),
    ("where's the driver", 2.0),
    ("any update", 1.5),
    ("eta", 1.5),
    ("on schedule", 1.5),
    ("in transit", 1.5),
    ("loaded and rolling", 1.5),
    ("delivered yet", 1.5),
    ("running late", 1.0),
];

const WRONG_NUMBER_INDICATORS: &[(&str, f64)] = &[
    ("wrong number", 3.0),
    ("misdialed", 2.0),
    ("no one here by that name", 2.0),
    ("didn't call", 1.5),
    ("never called", 1.5),
    ("who is this", 1.5),
    ("didn't mean to call", 1.5),
    ("take me off", 1.5),
];

const RATE_NEGOTIATION_MARKERS: &[&str] = &[
    "can you do",
    "best i can do",
    "how about",
    "meet in the middle",
    "split the difference",
    "counter",
];

const EQUIPMENT_MARKERS: &[&str] =
    &["dry van", "reefer", "flatbed", "step deck", "power only", "box truck", "conestoga"];

const MULTI_LOAD_MARKERS: &[&str] = &[
    "first load",
    "second load",
    "third load",
    "first one",
    "second one",
    "third one",
    "first shipment",
    "second shipment",
    "third shipment",
    "another load",
    "two loads",
    "three loads",
];

/// First required agent; determines the call's primary type.
#[derive(Clone, Debug, Default)]
pub struct ClassificationAgent;

#[async_trait]
impl Agent for ClassificationAgent {
    type Output = ClassificationResult;

    const ID: AgentId = AgentId::Classification;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor::new(AgentId::Classification, &[], "classification_result")
    }

    async fn run(&self, context: &AgentContext) -> Result<Self::Output, AgentError> {
        Ok(classify_utterances(context.utterances()))
    }
}

/// Classify a diarized utterance sequence. Never fails: an empty transcript
/// yields `Other` at low confidence.
pub fn classify_utterances(utterances: &[Utterance]) -> ClassificationResult {
    if utterances.is_empty() {
        return ClassificationResult {
            primary_type: CallType::Other,
            sub_types: BTreeSet::new(),
            confidence: ConfidenceScore::low(),
            indicators: Vec::new(),
            multi_load_call: false,
        };
    }

    let normalized = normalize_transcript(utterances);

    let mut scores: BTreeMap<CallType, (f64, Vec<String>)> = BTreeMap::new();
    for (call_type, table) in [
        (CallType::CarrierQuote, CARRIER_QUOTE_INDICATORS),
        (CallType::NewBooking, NEW_BOOKING_INDICATORS),
        (CallType::CheckCall, CHECK_CALL_INDICATORS),
        (CallType::WrongNumber, WRONG_NUMBER_INDICATORS),
    ] {
        let (weight, matched) = match_indicator_table(&normalized, table);
        if weight > 0.0 {
            scores.insert(call_type, (weight, matched));
        }
    }

    let total_weight: f64 = scores.values().map(|(weight, _)| *weight).sum();
    let multi_load_call = detect_multi_load(&normalized);

    let mut sub_types = BTreeSet::new();
    if multi_load_call {
        sub_types.insert("multi_load".to_string());
    }
    if RATE_NEGOTIATION_MARKERS.iter().any(|marker| normalized.contains(marker)) {
        sub_types.insert("rate_negotiation".to_string());
    }
    if EQUIPMENT_MARKERS.iter().any(|marker| normalized.contains(marker)) {
        sub_types.insert("equipment_discussion".to_string());
    }

    // Candidates iterate in fixed order; strictly-greater keeps ties
    // deterministic.
    let mut winner: Option<(CallType, f64)> = None;
    for call_type in
        [CallType::CarrierQuote, CallType::NewBooking, CallType::CheckCall, CallType::WrongNumber]
    {
        let weight = scores.get(&call_type).map(|(weight, _)| *weight).unwrap_or(0.0);
        if weight > winner.map(|(_, best)| best).unwrap_or(0.0) {
            winner = Some((call_type, weight));
        }
    }

    match winner {
        Some((primary_type, weight)) => {
            let share = weight / total_weight;
            let volume_factor = (weight / INDICATOR_SATURATION_WEIGHT).min(1.0);
            let indicators =
                scores.get(&primary_type).map(|(_, matched)| matched.clone()).unwrap_or_default();

            ClassificationResult {
                primary_type,
                sub_types,
                confidence: ConfidenceScore::from_value(share * volume_factor),
                indicators,
                multi_load_call,
            }
        }
        None => ClassificationResult {
            primary_type: CallType::Other,
            sub_types,
            confidence: ConfidenceScore::low(),
            indicators: Vec::new(),
            multi_load_call,
        },
    }
}

fn normalize_transcript(utterances: &[Utterance]) -> String {
    let mut normalized = String::new();
    for utterance in utterances {
        normalized.push_str(&utterance.text.to_ascii_lowercase());
        normalized.push(' ');
    }
    normalized
}

fn match_indicator_table(normalized: &str, table: &[(&str, f64)]) -> (f64, Vec<String>) {
    let mut weight = 0.0;
    let mut matched = Vec::new();
    for (phrase, phrase_weight) in table {
        if normalized.contains(phrase) {
            weight += phrase_weight;
            matched.push((*phrase).to_string());
        }
    }
    (weight, matched)
}

fn detect_multi_load(normalized: &str) -> bool {
    let marker_count =
        MULTI_LOAD_MARKERS.iter().filter(|marker| normalized.contains(**marker)).count();
    marker_count >= MULTI_LOAD_MIN_MARKERS || distinct_lane_pairs(normalized) >= 2
}

/// Distinct `from <place> to <place>` pairs in the transcript.
fn distinct_lane_pairs(normalized: &str) -> usize {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let mut pairs = BTreeSet::new();
    for (index, token) in tokens.iter().enumerate() {
        if *token != "from" {
            continue;
        }
        let window_end = (index + 5).min(tokens.len());
        if let Some(to_index) =
            (index + 2..window_end).find(|candidate| tokens[*candidate] == "to")
        {
            if to_index + 1 < tokens.len() {
                pairs.insert((tokens[index + 1], tokens[to_index + 1]));
            }
        }
    }
    pairs.len()
}
