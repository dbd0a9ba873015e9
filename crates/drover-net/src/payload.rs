//! Wire payloads for the backend endpoints.

use std::collections::BTreeMap;

use drover::lookup::ChoiceOption;
use drover::submit::{BusinessRuleDetail, EntityRef, SubmitOutcome};
use serde::Deserialize;

/// One reference-data option as the backend returns it.
///
/// Unknown attributes are kept and exposed through
/// [`ChoiceOption::extra`] so screens can render stock counts,
/// withdrawal periods and the like without the client knowing about them.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionPayload {
    /// Entity identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Any additional attributes.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl From<OptionPayload> for ChoiceOption {
    fn from(payload: OptionPayload) -> Self {
        let extra = payload
            .extra
            .into_iter()
            .map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, text)
            })
            .collect();
        ChoiceOption {
            id: payload.id,
            label: payload.label,
            extra,
        }
    }
}

/// Answer of the uniqueness endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UniquePayload {
    /// Whether the candidate value already exists.
    pub exists: bool,
}

/// Entity reference inside a successful submit envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityPayload {
    /// Identifier assigned by the backend.
    pub id: String,
    /// Display label, when the backend returns one.
    #[serde(default)]
    pub label: Option<String>,
}

/// One item of a business-rule rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailPayload {
    /// Stable item code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// The three-way submit envelope, discriminated by `status`.
///
/// Transport-level failures (non-2xx statuses, unreachable backend) are not
/// part of the envelope; they surface as errors before parsing.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitEnvelope {
    /// The record was persisted.
    Ok {
        /// The resulting entity.
        entity: EntityPayload,
    },
    /// A business rule rejected the record.
    BusinessRule {
        /// The reported items.
        details: Vec<DetailPayload>,
    },
}

impl From<SubmitEnvelope> for SubmitOutcome {
    fn from(envelope: SubmitEnvelope) -> Self {
        match envelope {
            SubmitEnvelope::Ok { entity } => SubmitOutcome::Accepted {
                entity: EntityRef {
                    id: entity.id,
                    label: entity.label,
                },
            },
            SubmitEnvelope::BusinessRule { details } => SubmitOutcome::BusinessRule {
                details: details
                    .into_iter()
                    .map(|d| BusinessRuleDetail {
                        code: d.code,
                        message: d.message,
                    })
                    .collect(),
            },
        }
    }
}
