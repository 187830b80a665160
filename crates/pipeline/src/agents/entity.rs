//! Entity extraction: company names, MC numbers, phone numbers, reference ids.
//!
//! Companies are found by suffix-window matching: a capitalized run ending in
//! a corporate or freight suffix. Numbers are format-matched, never guessed
//! from context alone.

use std::collections::BTreeSet;

use async_trait::async_trait;

use loadcall_core::{ConfidenceScore, EntityExtractionOutput, FieldValue, Utterance};

use crate::agents::lexicon::trim_punctuation;
use crate::agents::{Agent, AgentError};
use crate::context::AgentContext;
use crate::output::AgentId;
use crate::registry::AgentDescriptor;

const COMPANY_CONFIDENCE: f64 = 0.7;
const MC_NUMBER_CONFIDENCE: f64 = 0.9;
const PHONE_NUMBER_CONFIDENCE: f64 = 0.8;
const REFERENCE_ID_CONFIDENCE: f64 = 0.65;

/// FMCSA motor-carrier numbers run five to eight digits.
const MC_NUMBER_MIN_DIGITS: usize = 5;
const MC_NUMBER_MAX_DIGITS: usize = 8;

const COMPANY_SUFFIXES: &[&str] = &[
    "inc",
    "llc",
    "corp",
    "co",
    "logistics",
    "trucking",
    "transport",
    "transportation",
    "freight",
    "carriers",
    "express",
    "lines",
];

const COMPANY_STOPWORDS: &[&str] =
    &["the", "a", "an", "our", "your", "my", "with", "for", "from", "at", "to", "of", "this", "that"];

const REFERENCE_CUES: &[&str] = &["order", "po", "ref", "reference", "confirmation", "load"];

/// Pulls out the parties and identifiers mentioned on the call.
#[derive(Clone, Debug, Default)]
pub struct EntityExtractionAgent;

#[async_trait]
impl Agent for EntityExtractionAgent {
    type Output = EntityExtractionOutput;

    const ID: AgentId = AgentId::EntityExtraction;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor::new(
            AgentId::EntityExtraction,
            &[AgentId::Classification],
            "entity_extraction_output",
        )
    }

    async fn run(&self, context: &AgentContext) -> Result<Self::Output, AgentError> {
        Ok(extract_entities(context.utterances()))
    }
}

pub fn extract_entities(utterances: &[Utterance]) -> EntityExtractionOutput {
    let mut output = EntityExtractionOutput::default();
    let mut seen_companies = BTreeSet::new();
    let mut seen_numbers = BTreeSet::new();

    for utterance in utterances {
        let tokens: Vec<&str> = utterance.text.split_whitespace().collect();

        extract_companies(&tokens, &mut seen_companies, &mut output.companies);
        extract_mc_numbers(&tokens, &mut seen_numbers, &mut output.mc_numbers);
        extract_reference_ids(&tokens, &mut seen_numbers, &mut output.reference_ids);

        for candidate in phone_candidates(&utterance.text) {
            if seen_numbers.insert(candidate.clone()) {
                output.phone_numbers.push(FieldValue::new(
                    candidate,
                    ConfidenceScore::from_value(PHONE_NUMBER_CONFIDENCE),
                ));
            }
        }
    }

    output
}

/// Capitalized tokens ending in a corporate suffix; adjacent suffixes extend
/// the match ("Swift Trucking Inc").
fn extract_companies(
    tokens: &[&str],
    seen: &mut BTreeSet<String>,
    companies: &mut Vec<FieldValue<String>>,
) {
    let mut index = 0;
    while index < tokens.len() {
        if !is_company_suffix(tokens[index]) {
            index += 1;
            continue;
        }

        let mut start = index;
        while start > 0 {
            let previous = tokens[start - 1];
            let cleaned = trim_punctuation(previous);
            let capitalized = cleaned.chars().next().is_some_and(|c| c.is_ascii_uppercase());
            if !capitalized
                || COMPANY_STOPWORDS.contains(&cleaned.to_ascii_lowercase().as_str())
                || index - start >= 2
            {
                break;
            }
            start -= 1;
        }
        if start == index {
            // A bare suffix word is not a company name.
            index += 1;
            continue;
        }

        let mut end = index;
        while end + 1 < tokens.len() && is_company_suffix(tokens[end + 1]) {
            end += 1;
        }

        let name =
            tokens[start..=end].iter().map(|token| trim_punctuation(token)).collect::<Vec<_>>();
        let name = name.join(" ");
        if seen.insert(name.to_ascii_lowercase()) {
            companies.push(FieldValue::new(name, ConfidenceScore::from_value(COMPANY_CONFIDENCE)));
        }
        index = end + 1;
    }
}

fn is_company_suffix(token: &str) -> bool {
    COMPANY_SUFFIXES.contains(&trim_punctuation(token).to_ascii_lowercase().as_str())
}

/// `MC 987654`, `MC number is 987654`, `MC#987654`, `MC987654`.
fn extract_mc_numbers(
    tokens: &[&str],
    seen: &mut BTreeSet<String>,
    mc_numbers: &mut Vec<FieldValue<String>>,
) {
    for (index, token) in tokens.iter().enumerate() {
        let lower = trim_punctuation(token).to_ascii_lowercase();

        let digits = if lower == "mc" || lower == "mc#" {
            let mut next = index + 1;
            while next < tokens.len()
                && matches!(
                    trim_punctuation(tokens[next]).to_ascii_lowercase().as_str(),
                    "number" | "is" | "#"
                )
            {
                next += 1;
            }
            tokens.get(next).map(|t| trim_punctuation(t).trim_start_matches('#').to_string())
        } else {
            lower.strip_prefix("mc").map(|rest| rest.trim_start_matches('#').to_string())
        };

        let Some(digits) = digits else { continue };
        if !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && (MC_NUMBER_MIN_DIGITS..=MC_NUMBER_MAX_DIGITS).contains(&digits.len())
            && seen.insert(digits.clone())
        {
            mc_numbers
                .push(FieldValue::new(digits, ConfidenceScore::from_value(MC_NUMBER_CONFIDENCE)));
        }
    }
}

/// An order/PO/reference cue followed by an alphanumeric id with digits.
fn extract_reference_ids(
    tokens: &[&str],
    seen: &mut BTreeSet<String>,
    reference_ids: &mut Vec<FieldValue<String>>,
) {
    for (index, token) in tokens.iter().enumerate() {
        let lower = trim_punctuation(token).to_ascii_lowercase();
        if !REFERENCE_CUES.contains(&lower.as_str()) {
            continue;
        }

        let mut next = index + 1;
        while next < tokens.len()
            && matches!(
                trim_punctuation(tokens[next]).to_ascii_lowercase().as_str(),
                "number" | "is" | "#"
            )
        {
            next += 1;
        }

        let Some(candidate) = tokens.get(next) else { continue };
        let candidate = trim_punctuation(candidate).trim_start_matches('#');
        if candidate.len() >= 4
            && candidate.len() <= 12
            && candidate.chars().all(|c| c.is_ascii_alphanumeric())
            && candidate.chars().any(|c| c.is_ascii_digit())
            && seen.insert(candidate.to_string())
        {
            reference_ids.push(FieldValue::new(
                candidate.to_string(),
                ConfidenceScore::from_value(REFERENCE_ID_CONFIDENCE),
            ));
        }
    }
}

/// Digit runs of US phone length. Dashes, dots, parens, and spaces join
/// groups; any other character ends the run.
fn phone_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if matches!(c, '-' | '.' | '(' | ')' | ' ') && !digits.is_empty() {
            continue;
        } else {
            flush_phone_run(&mut digits, &mut candidates);
        }
    }
    flush_phone_run(&mut digits, &mut candidates);
    candidates
}

fn flush_phone_run(digits: &mut String, candidates: &mut Vec<String>) {
    let run = std::mem::take(digits);
    if run.len() == 10 || (run.len() == 11 && run.starts_with('1')) {
        candidates.push(run);
    }
}
