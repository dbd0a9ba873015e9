//! Step-gated navigation.
//!
//! A wizard is an ordered sequence of steps, each governing a subset of the
//! record's fields and optionally carrying a gate predicate for cross-field
//! business rules ("at least one treatment entered"). Forward navigation is
//! allowed only when every governed field resolves valid - not invalid, not
//! pending - against the live record *and* the gate holds. Backward
//! navigation is always allowed and never re-validates, so users can return
//! to fix earlier data even while the current step is invalid.
//!
//! Both the field outcomes and the gate are re-evaluated fresh on every
//! attempted advance; collection edits and async checks can change validity
//! between renders, so cached results are never trusted.
//!
//! The controller never advances on its own - every transition is a
//! discrete user action.

use std::fmt;
use std::sync::Arc;

use drover_core::{Property, Signal};

use crate::outcome::Outcome;
use crate::record::Record;

/// A cross-field business rule gating one step.
///
/// Returns `Err(message)` when the gate blocks; the message feeds the
/// blocked-advance summary.
pub type GatePredicate = Arc<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

/// Definition of one wizard step.
#[derive(Clone)]
pub struct StepDef {
    title: String,
    fields: Vec<String>,
    gate: Option<GatePredicate>,
}

impl StepDef {
    /// Create a step with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            gate: None,
        }
    }

    /// Set the fields this step governs.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the step's gate predicate.
    pub fn with_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// The step title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The fields this step governs.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl fmt::Debug for StepDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDef")
            .field("title", &self.title)
            .field("fields", &self.fields)
            .field("has_gate", &self.gate.is_some())
            .finish()
    }
}

/// Details of a refused forward transition.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedAdvance {
    /// Index of the step that refused.
    pub step: usize,
    /// The governed fields that blocked, with their outcomes.
    pub field_failures: Vec<(String, Outcome)>,
    /// The gate's message, if the gate blocked.
    pub gate_message: Option<String>,
}

impl BlockedAdvance {
    /// One user-facing summary line for the whole refusal.
    ///
    /// A single notification, never one per invalid field.
    pub fn summary(&self) -> String {
        match (&self.field_failures[..], &self.gate_message) {
            ([], Some(message)) => message.clone(),
            (failures, None) => {
                format!("{} field(s) need attention before continuing", failures.len())
            }
            (failures, Some(message)) => {
                format!(
                    "{} field(s) need attention before continuing; {}",
                    failures.len(),
                    message
                )
            }
        }
    }
}

/// The wizard's navigation state machine.
///
/// # Signals
///
/// - `step_changed(usize)`: the current step index changed
/// - `advance_blocked(BlockedAdvance)`: a forward transition was refused
pub struct StepController {
    steps: Vec<StepDef>,
    current: Property<usize>,
    visited: Vec<bool>,

    /// Signal emitted when the current step changes.
    pub step_changed: Signal<usize>,
    /// Signal emitted when a forward transition is refused.
    pub advance_blocked: Signal<BlockedAdvance>,
}

impl StepController {
    /// Create a controller over an ordered step list.
    pub fn new(steps: Vec<StepDef>) -> Self {
        let mut visited = vec![false; steps.len()];
        if let Some(first) = visited.first_mut() {
            *first = true;
        }
        Self {
            steps,
            current: Property::new(0),
            visited,
            step_changed: Signal::new(),
            advance_blocked: Signal::new(),
        }
    }

    /// The current step index.
    pub fn current(&self) -> usize {
        self.current.get()
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get a step definition by index.
    pub fn step(&self, index: usize) -> Option<&StepDef> {
        self.steps.get(index)
    }

    /// The current step definition.
    pub fn current_step(&self) -> Option<&StepDef> {
        self.steps.get(self.current.get())
    }

    /// Whether the current step is the last.
    pub fn is_last(&self) -> bool {
        self.current.get() + 1 >= self.steps.len()
    }

    /// Whether a step has ever been visited.
    pub fn is_visited(&self, index: usize) -> bool {
        self.visited.get(index).copied().unwrap_or(false)
    }

    /// Attempt to advance to the next step.
    ///
    /// `evaluate` must resolve a governed field's outcome against the live
    /// record; it is consulted fresh for every field on every attempt. On
    /// refusal the `advance_blocked` signal fires once with the full
    /// picture; the caller is responsible for marking fields touched and
    /// surfacing the summary.
    pub fn advance<F>(&mut self, record: &Record, evaluate: F) -> Result<usize, BlockedAdvance>
    where
        F: Fn(&str) -> Outcome,
    {
        let index = self.current.get();
        let Some(step) = self.steps.get(index) else {
            return Err(BlockedAdvance {
                step: index,
                field_failures: Vec::new(),
                gate_message: None,
            });
        };
        if index + 1 >= self.steps.len() {
            tracing::debug!(target: "drover::steps", index, "advance refused: already on last step");
            return Err(BlockedAdvance {
                step: index,
                field_failures: Vec::new(),
                gate_message: Some("already on the final step".to_string()),
            });
        }

        let field_failures: Vec<(String, Outcome)> = step
            .fields
            .iter()
            .map(|f| (f.clone(), evaluate(f)))
            .filter(|(_, outcome)| outcome.is_blocking())
            .collect();

        let gate_message = match &step.gate {
            Some(gate) => gate(record).err(),
            None => None,
        };

        if !field_failures.is_empty() || gate_message.is_some() {
            let blocked = BlockedAdvance {
                step: index,
                field_failures,
                gate_message,
            };
            tracing::debug!(
                target: "drover::steps",
                index,
                failing = blocked.field_failures.len(),
                gated = blocked.gate_message.is_some(),
                "advance refused"
            );
            self.advance_blocked.emit(blocked.clone());
            return Err(blocked);
        }

        let next = index + 1;
        self.current.set(next);
        self.visited[next] = true;
        self.step_changed.emit(next);
        tracing::debug!(target: "drover::steps", from = index, to = next, "advanced");
        Ok(next)
    }

    /// Return to the previous step.
    ///
    /// Always allowed for any step but the first; never re-validates.
    pub fn retreat(&mut self) -> bool {
        let index = self.current.get();
        if index == 0 {
            return false;
        }
        let prev = index - 1;
        self.current.set(prev);
        self.step_changed.emit(prev);
        tracing::debug!(target: "drover::steps", from = index, to = prev, "retreated");
        true
    }
}

impl fmt::Debug for StepController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepController")
            .field("steps", &self.steps.len())
            .field("current", &self.current.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::InvalidReason;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn three_steps() -> StepController {
        StepController::new(vec![
            StepDef::new("Identity").with_fields(["code"]),
            StepDef::new("Origin").with_fields(["origin_type", "origin_detail"]),
            StepDef::new("Review"),
        ])
    }

    #[test]
    fn test_advance_when_valid() {
        let mut controller = three_steps();
        let record = Record::new();

        assert_eq!(controller.advance(&record, |_| Outcome::Valid), Ok(1));
        assert_eq!(controller.current(), 1);
        assert!(controller.is_visited(1));
    }

    #[test]
    fn test_advance_blocked_by_invalid_field() {
        let mut controller = three_steps();
        let record = Record::new();

        let blocked = controller
            .advance(&record, |_| Outcome::Invalid(InvalidReason::Missing))
            .unwrap_err();
        assert_eq!(blocked.step, 0);
        assert_eq!(blocked.field_failures.len(), 1);
        assert_eq!(controller.current(), 0);
    }

    #[test]
    fn test_advance_blocked_by_pending_field() {
        let mut controller = three_steps();
        let record = Record::new();

        let blocked = controller.advance(&record, |_| Outcome::Pending).unwrap_err();
        assert_eq!(blocked.field_failures[0].1, Outcome::Pending);
    }

    #[test]
    fn test_advance_blocked_by_gate() {
        let mut controller = StepController::new(vec![
            StepDef::new("Treatments").with_gate(|record: &Record| {
                if record.collection("treatments").is_some_and(|c| !c.is_empty()) {
                    Ok(())
                } else {
                    Err("select at least one treatment".to_string())
                }
            }),
            StepDef::new("Review"),
        ]);
        let record = Record::new();

        let blocked = controller.advance(&record, |_| Outcome::Valid).unwrap_err();
        assert_eq!(
            blocked.gate_message.as_deref(),
            Some("select at least one treatment")
        );
        assert_eq!(blocked.summary(), "select at least one treatment");
    }

    #[test]
    fn test_gate_reevaluated_fresh() {
        let mut controller = StepController::new(vec![
            StepDef::new("Treatments").with_gate(|record: &Record| {
                if record.collection("treatments").is_some_and(|c| !c.is_empty()) {
                    Ok(())
                } else {
                    Err("select at least one treatment".to_string())
                }
            }),
            StepDef::new("Review"),
        ]);
        let mut record = Record::new();

        assert!(controller.advance(&record, |_| Outcome::Valid).is_err());

        // Mutating the record between attempts changes the gate's answer
        record
            .collection_mut("treatments")
            .push(crate::record::Entry::new());
        assert_eq!(controller.advance(&record, |_| Outcome::Valid), Ok(1));
    }

    #[test]
    fn test_fields_reevaluated_on_every_attempt() {
        let mut controller = three_steps();
        let record = Record::new();
        let evaluations = AtomicU32::new(0);

        let _ = controller.advance(&record, |_| {
            evaluations.fetch_add(1, Ordering::SeqCst);
            Outcome::Invalid(InvalidReason::Missing)
        });
        let _ = controller.advance(&record, |_| {
            evaluations.fetch_add(1, Ordering::SeqCst);
            Outcome::Invalid(InvalidReason::Missing)
        });
        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retreat_always_allowed() {
        let mut controller = three_steps();
        let record = Record::new();

        controller.advance(&record, |_| Outcome::Valid).unwrap();
        // Current step invalid - retreat must still work
        assert!(controller.retreat());
        assert_eq!(controller.current(), 0);
        // Off the front
        assert!(!controller.retreat());
    }

    #[test]
    fn test_blocked_signal_fires_once_per_attempt() {
        let mut controller = three_steps();
        let record = Record::new();

        let blocked_count = std::sync::Arc::new(AtomicU32::new(0));
        let blocked_clone = blocked_count.clone();
        controller.advance_blocked.connect(move |_| {
            blocked_clone.fetch_add(1, Ordering::SeqCst);
        });

        let _ = controller.advance(&record, |_| Outcome::Invalid(InvalidReason::Missing));
        assert_eq!(blocked_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_advance_past_last_step() {
        let mut controller = three_steps();
        let record = Record::new();

        controller.advance(&record, |_| Outcome::Valid).unwrap();
        controller.advance(&record, |_| Outcome::Valid).unwrap();
        assert!(controller.is_last());
        assert!(controller.advance(&record, |_| Outcome::Valid).is_err());
    }

    #[test]
    fn test_summary_wording() {
        let blocked = BlockedAdvance {
            step: 0,
            field_failures: vec![
                ("a".to_string(), Outcome::Invalid(InvalidReason::Missing)),
                ("b".to_string(), Outcome::Pending),
            ],
            gate_message: None,
        };
        assert_eq!(blocked.summary(), "2 field(s) need attention before continuing");
    }
}
