//! Speaker role assignment under uncertainty.
//!
//! Each distinct speaker label accumulates role-signal scores from line-level
//! phrase heuristics conditioned on the already-known call type. Exactly one
//! non-broker role is plausible per call type (carrier for carrier quotes and
//! check calls, shipper for new bookings); the speaker with the strongest
//! signal for it wins that role and the rest default to broker. Confidence is
//! the normalized margin between a speaker's winning role score and its
//! runner-up, so a near-tie lands in the low bucket.

use async_trait::async_trait;

use loadcall_core::{
    CallType, ClassificationResult, ConfidenceScore, SpeakerAssignment, SpeakerRole,
    SpeakerRoleMap, Utterance,
};

use crate::agents::{Agent, AgentError};
use crate::context::AgentContext;
use crate::output::AgentId;
use crate::registry::AgentDescriptor;

/// Confidence given to a speaker assigned broker purely by elimination.
const BROKER_FALLBACK_CONFIDENCE: f64 = 0.4;

/// Utterances carrying at least one role signal required before any role is
/// assigned at all; below this the call is treated as indistinguishable.
const MIN_SIGNAL_TURNS: usize = 2;

const CARRIER_SIGNALS: &[(&str, f64)] = &[
    ("got a truck", 2.0),
    ("have a truck", 2.0),
    ("i'm empty", 2.0),
    ("my truck", 1.5),
    ("my trailer", 1.5),
    ("my driver", 1.5),
    ("we can cover", 1.5),
    ("what's it paying", 2.0),
    ("what does it pay", 2.0),
    ("our mc", 1.5),
    ("mc number is", 1.5),
    ("i can pick it up", 1.5),
    ("i'll take it", 1.0),
];

const BROKER_SIGNALS: &[(&str, f64)] = &[
    ("we have a load", 2.0),
    ("got a load", 2.0),
    ("i've got one going", 1.5),
    ("the load pays", 2.0),
    ("it pays", 1.5),
    ("picks up", 1.0),
    ("delivers", 1.0),
    ("send me your mc", 2.0),
    ("rate confirmation", 1.5),
    ("rate con", 1.5),
    ("i'll get you set up", 1.5),
    ("best i can do", 1.5),
    ("book it", 1.0),
];

const SHIPPER_SIGNALS: &[(&str, f64)] = &[
    ("we need to ship", 2.0),
    ("we have a shipment", 2.0),
    ("need to move", 1.5),
    ("our product", 1.5),
    ("we manufacture", 1.5),
    ("pallets of", 1.5),
    ("our dock", 1.5),
    ("our warehouse", 1.5),
    ("ready for pickup", 1.0),
];

/// Assigns a business role to each diarized speaker label. Requires the
/// classification output as a hard dependency in pipeline runs.
#[derive(Clone, Debug, Default)]
pub struct SpeakerIdentificationAgent;

#[async_trait]
impl Agent for SpeakerIdentificationAgent {
    type Output = SpeakerRoleMap;

    const ID: AgentId = AgentId::SpeakerIdentification;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor::new(
            AgentId::SpeakerIdentification,
            &[AgentId::Classification],
            "speaker_role_map",
        )
    }

    async fn run(&self, context: &AgentContext) -> Result<Self::Output, AgentError> {
        let classification = context.classification();
        Ok(assign_roles(context.utterances(), classification.as_ref()))
    }
}

#[derive(Clone, Debug, Default)]
struct RoleScores {
    target: f64,
    broker: f64,
}

/// Assign a role per observed speaker label. Degrades instead of guessing:
/// without a classification result, or with too little signal to distinguish
/// speakers, every label comes back `Unknown` at low confidence.
pub fn assign_roles(
    utterances: &[Utterance],
    classification: Option<&ClassificationResult>,
) -> SpeakerRoleMap {
    let labels = observed_labels(utterances);

    let Some(target_role) = classification.and_then(|result| plausible_role(result.primary_type))
    else {
        return all_unknown(&labels);
    };

    let target_signals = match target_role {
        SpeakerRole::Carrier => CARRIER_SIGNALS,
        _ => SHIPPER_SIGNALS,
    };

    let mut scores: Vec<(String, RoleScores)> =
        labels.iter().map(|label| (label.clone(), RoleScores::default())).collect();
    let mut signal_turns = 0usize;

    for utterance in utterances {
        let line = utterance.text.to_ascii_lowercase();
        let target = table_weight(&line, target_signals);
        let broker = table_weight(&line, BROKER_SIGNALS);
        if target > 0.0 || broker > 0.0 {
            signal_turns += 1;
        }
        if let Some((_, speaker_scores)) =
            scores.iter_mut().find(|(label, _)| *label == utterance.speaker_label)
        {
            speaker_scores.target += target;
            speaker_scores.broker += broker;
        }
    }

    if utterances.len() < 2 || signal_turns < MIN_SIGNAL_TURNS {
        return all_unknown(&labels);
    }

    // Highest target-role score wins that role; strictly-greater keeps
    // first-appearance order on exact ties.
    let mut winner: Option<(&str, f64)> = None;
    for (label, speaker_scores) in &scores {
        if speaker_scores.target > 0.0
            && speaker_scores.target > winner.map(|(_, best)| best).unwrap_or(0.0)
        {
            winner = Some((label, speaker_scores.target));
        }
    }
    let winner_label = winner.map(|(label, _)| label.to_string());

    let mut assignments = SpeakerRoleMap::new();
    for (label, speaker_scores) in &scores {
        let assignment = if Some(label) == winner_label.as_ref() {
            SpeakerAssignment {
                role: target_role,
                confidence: margin_confidence(speaker_scores.target, speaker_scores.broker),
            }
        } else if speaker_scores.broker > 0.0 || speaker_scores.target > 0.0 {
            // Remaining speakers default to broker; confidence reflects how
            // broker-like their own signals actually were.
            SpeakerAssignment {
                role: SpeakerRole::Broker,
                confidence: margin_confidence(speaker_scores.broker, speaker_scores.target),
            }
        } else if winner_label.is_some() {
            SpeakerAssignment {
                role: SpeakerRole::Broker,
                confidence: ConfidenceScore::from_value(BROKER_FALLBACK_CONFIDENCE),
            }
        } else {
            SpeakerAssignment { role: SpeakerRole::Unknown, confidence: ConfidenceScore::low() }
        };
        assignments.insert(label.clone(), assignment);
    }

    assignments
}

/// The single non-broker role worth contesting for a call type, if any.
fn plausible_role(call_type: CallType) -> Option<SpeakerRole> {
    match call_type {
        CallType::CarrierQuote | CallType::CheckCall => Some(SpeakerRole::Carrier),
        CallType::NewBooking => Some(SpeakerRole::Shipper),
        CallType::WrongNumber | CallType::Other => None,
    }
}

/// Normalized margin between the winning role's score and the runner-up's,
/// mapped into [0, 1]: a clean sweep scores 1.0, an exact tie 0.5 (low).
fn margin_confidence(winning: f64, runner_up: f64) -> ConfidenceScore {
    let total = winning + runner_up;
    if total <= 0.0 {
        return ConfidenceScore::low();
    }
    ConfidenceScore::from_value(0.5 + (winning - runner_up) / total / 2.0)
}

fn table_weight(line: &str, table: &[(&str, f64)]) -> f64 {
    table
        .iter()
        .filter(|(phrase, _)| line.contains(phrase))
        .map(|(_, weight)| *weight)
        .sum()
}

fn observed_labels(utterances: &[Utterance]) -> Vec<String> {
    let mut labels = Vec::new();
    for utterance in utterances {
        if !labels.contains(&utterance.speaker_label) {
            labels.push(utterance.speaker_label.clone());
        }
    }
    labels
}

fn all_unknown(labels: &[String]) -> SpeakerRoleMap {
    labels
        .iter()
        .map(|label| {
            (
                label.clone(),
                SpeakerAssignment {
                    role: SpeakerRole::Unknown,
                    confidence: ConfidenceScore::low(),
                },
            )
        })
        .collect()
}
