//! Field validation, synchronous and asynchronous.
//!
//! Synchronous rules (requiredness, type, range, option set, pattern) run
//! immediately and deterministically via [`validate_value`]. Fields that
//! declare a uniqueness rule additionally go through [`AsyncValidation`],
//! which issues a debounced remote check per stabilized value and resolves
//! the field from `Pending` to `Valid`/`Invalid` when the response returns.
//!
//! # Staleness
//!
//! Every scheduled check carries a per-field generation number. A check only
//! applies its result if its generation is still the newest for that field,
//! so the last-issued request is authoritative regardless of arrival order.
//! Rapid edits inside the debounce window coalesce: a superseded task wakes
//! from its quiet-window sleep, notices the newer generation and exits
//! without ever calling the remote authority.
//!
//! # Failure mode
//!
//! A check that errors or exceeds the bounded verification wait resolves to
//! [`InvalidReason::Unverifiable`] - never silently to valid, and never to a
//! field stuck in `Pending`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use drover_core::Signal;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::outcome::{InvalidReason, Outcome};
use crate::record::Record;
use crate::schema::{FieldDescriptor, FieldKind, Schema};
use crate::value::Value;

// ============================================================================
// Synchronous validation
// ============================================================================

/// Validate one value against its descriptor's synchronous rules.
///
/// `required` is the field's effective requirement for the live record, as
/// derived by the schema.
pub fn validate_value(descriptor: &FieldDescriptor, value: &Value, required: bool) -> Outcome {
    if value.is_empty() {
        return if required {
            Outcome::Invalid(InvalidReason::Missing)
        } else {
            Outcome::Valid
        };
    }

    match descriptor.kind() {
        FieldKind::Text { pattern } => {
            let Some(text) = value.as_text() else {
                return type_mismatch("text", value);
            };
            if let Some(pattern) = pattern
                && !pattern.is_match(text)
            {
                return Outcome::Invalid(InvalidReason::PatternMismatch);
            }
            Outcome::Valid
        }
        FieldKind::Integer { min, max } => {
            let Some(n) = value.as_integer() else {
                return type_mismatch("integer", value);
            };
            if let Some(min) = min
                && n < *min
            {
                return Outcome::Invalid(InvalidReason::BelowMinimum {
                    minimum: min.to_string(),
                });
            }
            if let Some(max) = max
                && n > *max
            {
                return Outcome::Invalid(InvalidReason::AboveMaximum {
                    maximum: max.to_string(),
                });
            }
            Outcome::Valid
        }
        FieldKind::Decimal { min, max } => {
            let Some(d) = value.as_decimal() else {
                return type_mismatch("decimal", value);
            };
            if !d.is_finite() {
                return Outcome::Invalid(InvalidReason::NotFinite);
            }
            if let Some(min) = min
                && d < *min
            {
                return Outcome::Invalid(InvalidReason::BelowMinimum {
                    minimum: min.to_string(),
                });
            }
            if let Some(max) = max
                && d > *max
            {
                return Outcome::Invalid(InvalidReason::AboveMaximum {
                    maximum: max.to_string(),
                });
            }
            Outcome::Valid
        }
        FieldKind::Flag => {
            if value.as_flag().is_none() {
                return type_mismatch("flag", value);
            }
            Outcome::Valid
        }
        FieldKind::Date => {
            if value.as_date().is_none() {
                return type_mismatch("date", value);
            }
            Outcome::Valid
        }
        FieldKind::Choice { options } => {
            let Some(text) = value.as_text() else {
                return type_mismatch("text", value);
            };
            if options.iter().any(|o| o == text) {
                Outcome::Valid
            } else {
                Outcome::Invalid(InvalidReason::NotInChoices)
            }
        }
        FieldKind::Reference { .. } => {
            if value.as_reference_id().is_none() {
                return type_mismatch("reference", value);
            }
            Outcome::Valid
        }
    }
}

fn type_mismatch(expected: &'static str, value: &Value) -> Outcome {
    Outcome::Invalid(InvalidReason::TypeMismatch {
        expected,
        actual: value.type_name(),
    })
}

/// Validate every schema field of a record synchronously.
///
/// Returns a map from field name to outcome; fields without problems map to
/// `Valid`.
pub fn validate_record(schema: &Schema, record: &Record) -> BTreeMap<String, Outcome> {
    schema
        .fields()
        .map(|descriptor| {
            let required = schema.is_required(descriptor.name(), record);
            let outcome = validate_value(descriptor, record.get(descriptor.name()), required);
            (descriptor.name().to_string(), outcome)
        })
        .collect()
}

/// Merge a field's synchronous outcome with its async check state.
///
/// A synchronous failure wins (it is cheap, deterministic and actionable);
/// otherwise the async state - pending or resolved - is authoritative.
pub fn merge_outcomes(sync: Outcome, remote: Option<Outcome>) -> Outcome {
    if sync.is_invalid() {
        return sync;
    }
    remote.unwrap_or(sync)
}

// ============================================================================
// UniquenessProbe
// ============================================================================

/// Error raised when a uniqueness check cannot be completed.
#[derive(Debug, Clone)]
pub enum ProbeError {
    /// The remote authority could not be reached or answered abnormally.
    Unavailable(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "uniqueness check unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Boundary trait for remote uniqueness checks.
///
/// Implementations must be idempotent and side-effect-free on the server;
/// the engine may call them repeatedly for the same value.
pub trait UniquenessProbe: Send + Sync {
    /// Check whether `candidate` already exists under `kind`.
    ///
    /// Resolves to `true` when the value is taken.
    fn check_unique(&self, kind: &str, candidate: &str) -> BoxFuture<'static, Result<bool, ProbeError>>;
}

// ============================================================================
// AsyncValidation
// ============================================================================

/// Per-field state of the async check machinery.
#[derive(Debug, Default)]
struct FieldCheckState {
    /// Issuance counter; only the newest generation may apply its result.
    generation: u64,
    /// Latest resolved (or pending) outcome.
    outcome: Option<Outcome>,
}

/// Debounced, staleness-safe remote validation for unique fields.
///
/// Owned by the wizard; shared with its spawned check tasks via `Arc`.
pub struct AsyncValidation {
    probe: Arc<dyn UniquenessProbe>,
    handle: tokio::runtime::Handle,
    debounce: Duration,
    verify_timeout: Duration,
    states: Mutex<HashMap<String, FieldCheckState>>,
    /// Emitted whenever a field's async outcome changes (including the
    /// transition to `Pending` when a check is scheduled).
    pub outcome_changed: Signal<(String, Outcome)>,
}

impl AsyncValidation {
    /// Create the machinery around a probe.
    ///
    /// Check tasks are spawned onto `handle`.
    pub fn new(
        probe: Arc<dyn UniquenessProbe>,
        handle: tokio::runtime::Handle,
        debounce: Duration,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            probe,
            handle,
            debounce,
            verify_timeout,
            states: Mutex::new(HashMap::new()),
            outcome_changed: Signal::new(),
        }
    }

    /// The current async outcome for a field, if a check was ever scheduled.
    pub fn outcome(&self, field: &str) -> Option<Outcome> {
        self.states.lock().get(field).and_then(|s| s.outcome.clone())
    }

    /// Drop the async state for a field.
    ///
    /// Bumps the generation so any in-flight check for the old value is
    /// discarded on arrival. Used when the value becomes empty or fails
    /// synchronous validation.
    pub fn clear(&self, field: &str) {
        let mut states = self.states.lock();
        if let Some(state) = states.get_mut(field) {
            state.generation += 1;
            state.outcome = None;
        }
    }

    /// Schedule a uniqueness check for a field's current value.
    ///
    /// The field transitions to `Pending` immediately. After the debounce
    /// window, exactly one remote check is issued for the value - unless a
    /// newer edit superseded it, in which case nothing is sent.
    pub fn schedule(self: &Arc<Self>, field: &str, kind: &str, candidate: &str) {
        let generation = {
            let mut states = self.states.lock();
            let state = states.entry(field.to_string()).or_default();
            state.generation += 1;
            state.outcome = Some(Outcome::Pending);
            state.generation
        };
        self.outcome_changed
            .emit((field.to_string(), Outcome::Pending));

        tracing::debug!(
            target: "drover::validate",
            field,
            kind,
            generation,
            "scheduled uniqueness check"
        );

        let this = Arc::clone(self);
        let field = field.to_string();
        let kind = kind.to_string();
        let candidate = candidate.to_string();
        self.handle.spawn(async move {
            tokio::time::sleep(this.debounce).await;

            // Superseded during the quiet window: no request leaves the client.
            if this.current_generation(&field) != Some(generation) {
                tracing::trace!(
                    target: "drover::validate",
                    field,
                    generation,
                    "check superseded before dispatch"
                );
                return;
            }

            let check = this.probe.check_unique(&kind, &candidate);
            let outcome = match tokio::time::timeout(this.verify_timeout, check).await {
                Ok(Ok(true)) => Outcome::Invalid(InvalidReason::AlreadyExists),
                Ok(Ok(false)) => Outcome::Valid,
                Ok(Err(err)) => {
                    tracing::warn!(
                        target: "drover::validate",
                        field,
                        error = %err,
                        "uniqueness check failed"
                    );
                    Outcome::Invalid(InvalidReason::Unverifiable)
                }
                Err(_) => {
                    tracing::warn!(
                        target: "drover::validate",
                        field,
                        "uniqueness check timed out"
                    );
                    Outcome::Invalid(InvalidReason::Unverifiable)
                }
            };

            this.resolve(&field, generation, outcome);
        });
    }

    fn current_generation(&self, field: &str) -> Option<u64> {
        self.states.lock().get(field).map(|s| s.generation)
    }

    /// Apply a check result if its generation is still the newest.
    fn resolve(&self, field: &str, generation: u64, outcome: Outcome) {
        {
            let mut states = self.states.lock();
            let Some(state) = states.get_mut(field) else {
                return;
            };
            if state.generation != generation {
                tracing::trace!(
                    target: "drover::validate",
                    field,
                    generation,
                    newest = state.generation,
                    "discarding stale check result"
                );
                return;
            }
            state.outcome = Some(outcome.clone());
        }
        self.outcome_changed.emit((field.to_string(), outcome));
    }

    /// Whether any field has a check still in flight.
    pub fn any_pending(&self) -> bool {
        self.states
            .lock()
            .values()
            .any(|s| s.outcome == Some(Outcome::Pending))
    }
}
