//! Typed analysis results produced by the pipeline agents.
//!
//! These are the payloads the CRM-persistence collaborator consumes. Every
//! extracted business field carries its own confidence so the caller can gate
//! auto-population per field rather than per call.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceScore;

/// Primary kind of sales call the classifier detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// A carrier calling about (or being offered) an available load.
    CarrierQuote,
    /// A shipper booking a new shipment.
    NewBooking,
    /// A status check on an in-transit load.
    CheckCall,
    /// Misdialed call with no business content.
    WrongNumber,
    Other,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::CarrierQuote => "carrier_quote",
            CallType::NewBooking => "new_booking",
            CallType::CheckCall => "check_call",
            CallType::WrongNumber => "wrong_number",
            CallType::Other => "other",
        }
    }
}

impl std::fmt::Display for CallType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Output of the classification agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub primary_type: CallType,
    /// Secondary tags such as `rate_negotiation` or `multi_load`.
    pub sub_types: BTreeSet<String>,
    pub confidence: ConfidenceScore,
    /// Literal matched phrases, kept for audit/explainability.
    pub indicators: Vec<String>,
    /// True when the conversation covers more than one distinct shipment.
    pub multi_load_call: bool,
}

/// Business role assigned to a diarized speaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Broker,
    Carrier,
    Shipper,
    Unknown,
}

/// Role plus how sure the agent is about it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeakerAssignment {
    pub role: SpeakerRole,
    pub confidence: ConfidenceScore,
}

/// Speaker label -> role assignment. At minimum one entry per observed label;
/// never assumes a two-party call.
pub type SpeakerRoleMap = BTreeMap<String, SpeakerAssignment>;

/// An extracted value with its own confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldValue<T> {
    pub value: T,
    pub confidence: ConfidenceScore,
}

impl<T> FieldValue<T> {
    pub fn new(value: T, confidence: ConfidenceScore) -> Self {
        Self { value, confidence }
    }
}

/// A dollar rate heard during the call, attributed to the speaker who said it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateMention {
    pub amount: Decimal,
    pub speaker_label: String,
    pub speaker_role: SpeakerRole,
}

/// Output of the rate-negotiation agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateNegotiationOutput {
    /// Every dollar amount heard, in utterance order.
    pub mentioned_rates: Vec<RateMention>,
    pub opening_rate: Option<FieldValue<Decimal>>,
    pub agreed_rate: Option<FieldValue<Decimal>>,
    pub rate_agreed: bool,
}

/// A single shipment described on the call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLoad {
    pub origin: Option<FieldValue<String>>,
    pub destination: Option<FieldValue<String>>,
    pub equipment: Option<FieldValue<String>>,
    pub weight_lbs: Option<FieldValue<u32>>,
    pub commodity: Option<FieldValue<String>>,
    pub pickup_window: Option<FieldValue<String>>,
}

impl ExtractedLoad {
    /// A load with no populated field carries no CRM value.
    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.destination.is_none()
            && self.equipment.is_none()
            && self.weight_lbs.is_none()
            && self.commodity.is_none()
            && self.pickup_window.is_none()
    }
}

/// Output of the load-extraction agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadExtractionOutput {
    pub loads: Vec<ExtractedLoad>,
}

/// Output of the entity-extraction agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityExtractionOutput {
    pub companies: Vec<FieldValue<String>>,
    pub mc_numbers: Vec<FieldValue<String>>,
    pub phone_numbers: Vec<FieldValue<String>>,
    pub reference_ids: Vec<FieldValue<String>>,
}

#[cfg(test)]
mod tests {
    use super::{CallType, ExtractedLoad};

    #[test]
    fn call_type_names_are_stable_wire_values() {
        assert_eq!(CallType::CarrierQuote.as_str(), "carrier_quote");
        assert_eq!(CallType::WrongNumber.to_string(), "wrong_number");
    }

    #[test]
    fn default_load_is_empty() {
        assert!(ExtractedLoad::default().is_empty());
    }
}
