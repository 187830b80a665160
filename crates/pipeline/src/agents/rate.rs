//! Rate-negotiation analysis: dollar mentions, opening offer, agreed rate.
//!
//! Amounts come from lexical token parsing, never inference. A bare number
//! only counts as money when the utterance carries a rate cue, so MC numbers
//! and phone digits do not pollute the mention list.

use async_trait::async_trait;
use rust_decimal::Decimal;

use loadcall_core::{
    ConfidenceScore, FieldValue, RateMention, RateNegotiationOutput, SpeakerRole, SpeakerRoleMap,
    Utterance,
};

use crate::agents::lexicon::{parse_integer, spoken_number, trim_punctuation};
use crate::agents::{Agent, AgentError};
use crate::context::AgentContext;
use crate::output::AgentId;
use crate::registry::AgentDescriptor;

/// Linehaul sanity bounds; amounts outside are treated as non-rate numbers.
const RATE_MIN_DOLLARS: u32 = 50;
const RATE_MAX_DOLLARS: u32 = 100_000;

/// Confidence for the opening rate when the speaker's role is known.
const OPENING_RATE_CONFIDENCE: f64 = 0.7;

/// Confidence for a rate whose speaker has no role assignment.
const UNATTRIBUTED_RATE_CONFIDENCE: f64 = 0.5;

/// Agreement confirmed by the counterparty, not the quoting speaker.
const CONFIRMED_RATE_CONFIDENCE: f64 = 0.85;

/// Agreement phrase and last rate came from the same speaker.
const SAME_SPEAKER_AGREEMENT_CONFIDENCE: f64 = 0.65;

const AGREEMENT_PHRASES: &[&str] = &[
    "book it",
    "we'll take it",
    "i'll take it",
    "let's do it",
    "that works",
    "sounds good",
    "you got a deal",
    "it's a deal",
    "send the rate con",
];

/// Words that mark an utterance as rate talk, qualifying bare numbers.
const RATE_CUE_WORDS: &[&str] = &[
    "pay", "paying", "pays", "rate", "offer", "counter", "price", "dollars", "bucks", "grand",
    "all in", "can you do", "how about",
];

/// Extracts every dollar amount and resolves the negotiation outcome.
#[derive(Clone, Debug, Default)]
pub struct RateNegotiationAgent;

#[async_trait]
impl Agent for RateNegotiationAgent {
    type Output = RateNegotiationOutput;

    const ID: AgentId = AgentId::RateNegotiation;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor::new(
            AgentId::RateNegotiation,
            &[AgentId::Classification, AgentId::SpeakerIdentification],
            "rate_negotiation_output",
        )
    }

    async fn run(&self, context: &AgentContext) -> Result<Self::Output, AgentError> {
        let roles = context.speaker_roles();
        Ok(extract_rates(context.utterances(), roles.as_ref()))
    }
}

/// Walk the transcript once, in order. Mentions accumulate; the last
/// agreement phrase seen settles the deal at the most recent prior rate.
pub fn extract_rates(
    utterances: &[Utterance],
    roles: Option<&SpeakerRoleMap>,
) -> RateNegotiationOutput {
    let mut mentioned_rates: Vec<RateMention> = Vec::new();
    let mut agreed_rate: Option<FieldValue<Decimal>> = None;
    let mut rate_agreed = false;

    for utterance in utterances {
        let lower = utterance.text.to_ascii_lowercase();

        for amount in amounts_in(&lower) {
            mentioned_rates.push(RateMention {
                amount,
                speaker_label: utterance.speaker_label.clone(),
                speaker_role: role_of(roles, &utterance.speaker_label),
            });
        }

        if AGREEMENT_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
            if let Some(last) = mentioned_rates.last() {
                let confidence = if last.speaker_label == utterance.speaker_label {
                    SAME_SPEAKER_AGREEMENT_CONFIDENCE
                } else {
                    CONFIRMED_RATE_CONFIDENCE
                };
                agreed_rate =
                    Some(FieldValue::new(last.amount, ConfidenceScore::from_value(confidence)));
                rate_agreed = true;
            }
        }
    }

    let opening_rate = mentioned_rates.first().map(|first| {
        let confidence = if first.speaker_role == SpeakerRole::Unknown {
            UNATTRIBUTED_RATE_CONFIDENCE
        } else {
            OPENING_RATE_CONFIDENCE
        };
        FieldValue::new(first.amount, ConfidenceScore::from_value(confidence))
    });

    RateNegotiationOutput { mentioned_rates, opening_rate, agreed_rate, rate_agreed }
}

fn role_of(roles: Option<&SpeakerRoleMap>, label: &str) -> SpeakerRole {
    roles
        .and_then(|map| map.get(label))
        .map(|assignment| assignment.role)
        .unwrap_or(SpeakerRole::Unknown)
}

/// Plausible dollar amounts in one lowercased utterance, in token order.
fn amounts_in(lower: &str) -> Vec<Decimal> {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let has_rate_cue = RATE_CUE_WORDS.iter().any(|cue| lower.contains(cue));

    let mut amounts = Vec::new();
    for (index, raw) in tokens.iter().enumerate() {
        let token = trim_punctuation(raw);

        if let Some(amount) = parse_money_token(token) {
            // A bare number quantifying a unit ("42,000 pounds") is not money;
            // magnitude words are handled on their own token below.
            let quantifies_unit = !token.starts_with('$')
                && tokens.get(index + 1).is_some_and(|next| {
                    matches!(
                        trim_punctuation(next).to_ascii_lowercase().as_str(),
                        "pounds"
                            | "lbs"
                            | "lb"
                            | "miles"
                            | "mile"
                            | "pallets"
                            | "stops"
                            | "percent"
                            | "hundred"
                            | "thousand"
                            | "grand"
                    )
                });
            if !quantifies_unit && (token.starts_with('$') || has_rate_cue) && plausible_rate(amount)
            {
                amounts.push(amount);
            }
            continue;
        }

        // Spoken magnitudes: "twenty-four hundred", "3 grand".
        if index > 0 {
            let multiplier = match token {
                "hundred" => Some(Decimal::from(100)),
                "thousand" | "grand" => Some(Decimal::from(1_000)),
                _ => None,
            };
            if let (Some(multiplier), Some(base)) =
                (multiplier, magnitude_base(trim_punctuation(tokens[index - 1])))
            {
                let amount = base * multiplier;
                if has_rate_cue && plausible_rate(amount) {
                    amounts.push(amount);
                }
            }
        }
    }
    amounts
}

/// Parse a single token as a dollar amount: optional `$` prefix, thousands
/// commas, optional `k` suffix.
fn parse_money_token(token: &str) -> Option<Decimal> {
    let token = token.strip_prefix('$').unwrap_or(token);
    let (digits, multiplier) = match token.strip_suffix('k') {
        Some(stripped) => (stripped, Decimal::from(1_000)),
        None => (token, Decimal::ONE),
    };
    let cleaned: String = digits.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    cleaned.parse::<Decimal>().ok().map(|amount| amount * multiplier)
}

/// Number preceding a magnitude word, spoken ("twenty-four") or digits ("24").
fn magnitude_base(token: &str) -> Option<Decimal> {
    parse_integer(token).or_else(|| spoken_number(token)).map(Decimal::from)
}

fn plausible_rate(amount: Decimal) -> bool {
    amount >= Decimal::from(RATE_MIN_DOLLARS) && amount <= Decimal::from(RATE_MAX_DOLLARS)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use loadcall_core::{
        ConfidenceLevel, ConfidenceScore, SpeakerAssignment, SpeakerRole, SpeakerRoleMap,
        Utterance,
    };

    use super::{extract_rates, parse_money_token};

    #[test]
    fn counter_offer_sequence_settles_on_last_rate_before_agreement() {
        let output = extract_rates(
            &script(&[
                ("broker1", "It pays $2,400 all in."),
                ("carrier1", "Can you do twenty-eight hundred?"),
                ("broker1", "Best I can do is $2,600."),
                ("carrier1", "Alright, book it."),
            ]),
            Some(&two_party_roles()),
        );

        let amounts: Vec<Decimal> =
            output.mentioned_rates.iter().map(|mention| mention.amount).collect();
        assert_eq!(amounts, vec![dollars(2_400), dollars(2_800), dollars(2_600)]);

        assert!(output.rate_agreed);
        let agreed = output.agreed_rate.expect("agreement phrase should settle a rate");
        assert_eq!(agreed.value, dollars(2_600));
        assert!(agreed.confidence.is_high());

        let opening = output.opening_rate.expect("first mention is the opening rate");
        assert_eq!(opening.value, dollars(2_400));
    }

    #[test]
    fn mentions_carry_speaker_attribution() {
        let output = extract_rates(
            &script(&[("broker1", "We can offer $1,950 on that lane.")]),
            Some(&two_party_roles()),
        );

        let mention = &output.mentioned_rates[0];
        assert_eq!(mention.speaker_label, "broker1");
        assert_eq!(mention.speaker_role, SpeakerRole::Broker);
    }

    #[test]
    fn spoken_magnitudes_parse_as_amounts() {
        let output = extract_rates(
            &script(&[("broker1", "It pays twenty-four fifty, call it 3 grand with detention.")]),
            None,
        );

        let amounts: Vec<Decimal> =
            output.mentioned_rates.iter().map(|mention| mention.amount).collect();
        assert!(amounts.contains(&dollars(3_000)));
    }

    #[test]
    fn same_speaker_agreement_gets_reduced_confidence() {
        let output = extract_rates(
            &script(&[("carrier1", "I can do it for $2,100, that works for me.")]),
            Some(&two_party_roles()),
        );

        assert!(output.rate_agreed);
        let agreed = output.agreed_rate.expect("agreed");
        assert_eq!(agreed.confidence.level, ConfidenceLevel::Medium);
    }

    #[test]
    fn agreement_without_any_rate_is_not_a_deal() {
        let output = extract_rates(&script(&[("carrier1", "Sounds good, talk soon.")]), None);

        assert!(!output.rate_agreed);
        assert!(output.agreed_rate.is_none());
        assert!(output.opening_rate.is_none());
        assert!(output.mentioned_rates.is_empty());
    }

    #[test]
    fn non_rate_numbers_are_filtered() {
        let output = extract_rates(
            &script(&[("carrier1", "Our MC is 987654, and the rate we need is $2,400.")]),
            None,
        );

        let amounts: Vec<Decimal> =
            output.mentioned_rates.iter().map(|mention| mention.amount).collect();
        assert_eq!(amounts, vec![dollars(2_400)]);
    }

    #[test]
    fn unit_quantities_are_not_money() {
        let output = extract_rates(
            &script(&[("broker1", "It pays $2,400 for 42,000 pounds over 600 miles.")]),
            None,
        );

        let amounts: Vec<Decimal> =
            output.mentioned_rates.iter().map(|mention| mention.amount).collect();
        assert_eq!(amounts, vec![dollars(2_400)]);
    }

    #[test]
    fn unattributed_opening_rate_stays_below_high() {
        let output = extract_rates(&script(&[("spk_0", "The rate is $1,800.")]), None);

        let opening = output.opening_rate.expect("opening");
        assert_eq!(opening.confidence.level, ConfidenceLevel::Low);
    }

    #[test]
    fn money_token_forms() {
        assert_eq!(parse_money_token("$2,400"), Some(dollars(2_400)));
        assert_eq!(parse_money_token("2.4k"), Some(dollars(2_400)));
        assert_eq!(parse_money_token("1800"), Some(dollars(1_800)));
        assert_eq!(parse_money_token("atlanta"), None);
        assert_eq!(parse_money_token("$"), None);
    }

    fn dollars(amount: u32) -> Decimal {
        Decimal::from(amount)
    }

    fn two_party_roles() -> SpeakerRoleMap {
        SpeakerRoleMap::from([
            (
                "broker1".to_string(),
                SpeakerAssignment {
                    role: SpeakerRole::Broker,
                    confidence: ConfidenceScore::from_value(0.9),
                },
            ),
            (
                "carrier1".to_string(),
                SpeakerAssignment {
                    role: SpeakerRole::Carrier,
                    confidence: ConfidenceScore::from_value(0.9),
                },
            ),
        ])
    }

    fn script(lines: &[(&str, &str)]) -> Vec<Utterance> {
        lines
            .iter()
            .enumerate()
            .map(|(index, (speaker, text))| {
                let start = index as u64 * 2_000;
                Utterance::new(*speaker, *text, start, start + 1_900)
            })
            .collect()
    }
}
