//! The seven analysis stations.
//!
//! ```text
//!  1 text_analysis ──► 2 conceptual ──► 3 network_builder ──► 4 efficiency
//!                                              │                   │
//!                                              ▼                   ▼
//!                        7 finalization ◄── 6 treatment ◄──── 5 dynamics
//! ```
//!
//! Stations 1 to 5 consult the oracle. Stations 6 and 7 are pure functions
//! of the network and earlier outputs (station 7 also writes artifacts).

pub mod conceptual;
pub mod dynamics;
pub mod efficiency;
pub mod finalization;
pub mod network_builder;
pub mod text_analysis;
pub mod treatment;

pub use conceptual::{ConceptualInput, ConceptualOutput, ConceptualStation};
pub use dynamics::{DynamicsInput, DynamicsOutput, DynamicsStation};
pub use efficiency::{EfficiencyInput, EfficiencyOutput, EfficiencyStation};
pub use finalization::{FinalizationInput, FinalizationOutput, FinalizationStation};
pub use network_builder::{NetworkBuilderInput, NetworkBuilderOutput, NetworkBuilderStation};
pub use text_analysis::{TextAnalysisInput, TextAnalysisOutput, TextAnalysisStation};
pub use treatment::{TreatmentInput, TreatmentOutput, TreatmentStation};

use crate::oracle::{is_raw, Oracle, OracleRequest};
use crate::station::{StageStatus, StationError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// The leading `max_chars` characters of `text`.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Send a request and return only the parsed content.
pub(crate) async fn ask(oracle: &dyn Oracle, request: OracleRequest) -> Result<Value, StationError> {
    Ok(oracle.generate(request).await?.content)
}

/// Deserialize a payload into `T`, using `T::default()` when it does not fit.
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(value: &Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

/// `Partial` when any payload came back as unparsed text.
pub(crate) fn payload_status<'a>(payloads: impl IntoIterator<Item = &'a Value>) -> StageStatus {
    if payloads.into_iter().any(is_raw) {
        StageStatus::Partial
    } else {
        StageStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("مرحبا بالعالم", 5), "مرحبا");
        assert_eq!(excerpt("short", 100), "short");
    }

    #[test]
    fn test_payload_status() {
        let good = json!({"a": 1});
        let raw = json!({"raw": "not json"});
        assert_eq!(payload_status([&good]), StageStatus::Success);
        assert_eq!(payload_status([&good, &raw]), StageStatus::Partial);
    }
}
