//! Submission orchestration.
//!
//! The orchestrator owns the wizard's terminal transition: the confirmation
//! dialog for consequential records, the single-dispatch guard, and the
//! three-way classification of the remote authority's answer. A structured
//! business-rule rejection is routed to a dedicated recovery dialog - never
//! to the generic failure notification - and always leaves the record
//! editable with the user's input intact.
//!
//! Dialog state is an explicit finite enum owned here; there is no shared
//! bag of boolean modal flags.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use drover_core::Signal;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::alert::{AlertChannel, AlertLevel};
use crate::record::Record;

// ============================================================================
// Gateway boundary
// ============================================================================

/// Reference to the entity created or updated by a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    /// Identifier assigned by the remote authority.
    pub id: String,
    /// Display label, when the authority returns one.
    pub label: Option<String>,
}

/// One machine-readable item of a business-rule rejection (e.g. a missing
/// prerequisite resource).
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRuleDetail {
    /// Stable code identifying the item ("medication_stock", ...).
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// The remote authority's structured answer to a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The record was persisted.
    Accepted {
        /// The resulting entity.
        entity: EntityRef,
    },
    /// A business rule rejected the record; the listed items explain what
    /// is missing. Not an error - the user can act on it.
    BusinessRule {
        /// The reported items, exactly as the authority listed them.
        details: Vec<BusinessRuleDetail>,
    },
}

/// Transport-level submission failures.
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// The request never completed (connection, timeout, ...).
    Transport(String),
    /// The authority answered with an error status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Body excerpt, if any.
        message: Option<String>,
    },
    /// The response body could not be understood.
    InvalidResponse(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "submission failed: {msg}"),
            Self::Status { status, message } => match message {
                Some(msg) => write!(f, "submission rejected with status {status}: {msg}"),
                None => write!(f, "submission rejected with status {status}"),
            },
            Self::InvalidResponse(msg) => write!(f, "unreadable submission response: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Boundary trait for the remote mutation.
pub trait SubmitGateway: Send + Sync {
    /// Persist the finalized record payload.
    fn submit(&self, payload: serde_json::Value)
    -> BoxFuture<'static, Result<SubmitOutcome, GatewayError>>;
}

// ============================================================================
// Confirmation gate
// ============================================================================

/// Human-readable summary of the consequential fields shown before a
/// confirmed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationSummary {
    /// Dialog headline ("This action cannot be undone").
    pub title: String,
    /// Label/value pairs of the consequential fields.
    pub lines: Vec<(String, String)>,
}

/// Derives whether a record needs an explicit confirmation step, and if so
/// what to show. `None` means no confirmation is required.
pub type ConfirmationGate = Arc<dyn Fn(&Record) -> Option<ConfirmationSummary> + Send + Sync>;

// ============================================================================
// Dialog state
// ============================================================================

/// The orchestrator's dialog, as an explicit finite state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DialogState {
    /// No dialog is open.
    #[default]
    Idle,
    /// Waiting for the user to confirm a consequential submission.
    ConfirmingSubmission(ConfirmationSummary),
    /// Showing the business-rule recovery view with the reported items.
    BusinessRuleRecovery(Vec<BusinessRuleDetail>),
}

// ============================================================================
// Report
// ============================================================================

/// Terminal classification of one dispatch, delivered via signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionReport {
    /// The record was persisted; the wizard is done.
    Accepted {
        /// The resulting entity.
        entity: EntityRef,
    },
    /// A business rule rejected the record; the recovery dialog is open.
    BusinessRule {
        /// The reported items.
        details: Vec<BusinessRuleDetail>,
    },
    /// Transport or unclassified failure; the record is untouched and
    /// submission can be retried.
    Failed {
        /// Human-readable failure description.
        message: String,
    },
}

// ============================================================================
// SubmissionOrchestrator
// ============================================================================

struct OrchestratorShared {
    in_flight: AtomicBool,
    submitted: AtomicBool,
    dialog: Mutex<DialogState>,
    dialog_changed: Signal<DialogState>,
    finished: Signal<SubmissionReport>,
}

impl OrchestratorShared {
    fn set_dialog(&self, state: DialogState) {
        *self.dialog.lock() = state.clone();
        self.dialog_changed.emit(state);
    }
}

/// Owns the terminal transition of one wizard instance.
pub struct SubmissionOrchestrator {
    gateway: Arc<dyn SubmitGateway>,
    confirmation: Option<ConfirmationGate>,
    alerts: AlertChannel,
    alert_duration: Duration,
    handle: tokio::runtime::Handle,
    shared: Arc<OrchestratorShared>,
}

impl SubmissionOrchestrator {
    /// Create an orchestrator around a gateway.
    pub fn new(
        gateway: Arc<dyn SubmitGateway>,
        confirmation: Option<ConfirmationGate>,
        alerts: AlertChannel,
        alert_duration: Duration,
        handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            gateway,
            confirmation,
            alerts,
            alert_duration,
            handle,
            shared: Arc::new(OrchestratorShared {
                in_flight: AtomicBool::new(false),
                submitted: AtomicBool::new(false),
                dialog: Mutex::new(DialogState::Idle),
                dialog_changed: Signal::new(),
                finished: Signal::new(),
            }),
        }
    }

    /// Whether a dispatch is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Whether a submission has been accepted (terminal state).
    pub fn is_submitted(&self) -> bool {
        self.shared.submitted.load(Ordering::SeqCst)
    }

    /// The current dialog state.
    pub fn dialog(&self) -> DialogState {
        self.shared.dialog.lock().clone()
    }

    /// Signal emitted when the dialog state changes.
    pub fn dialog_changed(&self) -> &Signal<DialogState> {
        &self.shared.dialog_changed
    }

    /// Signal emitted when a dispatch finishes, with its classification.
    pub fn finished(&self) -> &Signal<SubmissionReport> {
        &self.shared.finished
    }

    /// Evaluate the confirmation gate against the record.
    pub fn needs_confirmation(&self, record: &Record) -> Option<ConfirmationSummary> {
        self.confirmation.as_ref().and_then(|gate| gate(record))
    }

    /// Open the confirmation dialog.
    pub fn open_confirmation(&self, summary: ConfirmationSummary) {
        self.shared
            .set_dialog(DialogState::ConfirmingSubmission(summary));
    }

    /// Cancel a pending confirmation; the record stays editable, unchanged.
    ///
    /// Returns `false` if no confirmation was open.
    pub fn cancel_confirmation(&self) -> bool {
        self.close_confirmation()
    }

    /// Take the confirmation dialog down in preparation for dispatch.
    ///
    /// Returns `false` if no confirmation was open.
    pub fn consume_confirmation(&self) -> bool {
        self.close_confirmation()
    }

    fn close_confirmation(&self) -> bool {
        let mut dialog = self.shared.dialog.lock();
        if matches!(*dialog, DialogState::ConfirmingSubmission(_)) {
            *dialog = DialogState::Idle;
            drop(dialog);
            self.shared.dialog_changed.emit(DialogState::Idle);
            true
        } else {
            false
        }
    }

    /// Close the business-rule recovery dialog after the user has seen it.
    ///
    /// Returns `false` if the recovery dialog was not open.
    pub fn acknowledge_recovery(&self) -> bool {
        let mut dialog = self.shared.dialog.lock();
        if matches!(*dialog, DialogState::BusinessRuleRecovery(_)) {
            *dialog = DialogState::Idle;
            drop(dialog);
            self.shared.dialog_changed.emit(DialogState::Idle);
            true
        } else {
            false
        }
    }

    /// Dispatch exactly one mutation for the payload.
    ///
    /// Returns `false` without side effects when a dispatch is already in
    /// flight or the orchestrator is already in its terminal state -
    /// re-entrant submits are ignored, not queued.
    pub fn dispatch(&self, payload: serde_json::Value) -> bool {
        if self.shared.submitted.load(Ordering::SeqCst) {
            return false;
        }
        if self.shared.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: "drover::submit", "dispatch ignored: submission in flight");
            return false;
        }

        tracing::info!(target: "drover::submit", "dispatching submission");
        let shared = Arc::clone(&self.shared);
        let gateway = Arc::clone(&self.gateway);
        let alerts = self.alerts.clone();
        let alert_duration = self.alert_duration;
        self.handle.spawn(async move {
            let result = gateway.submit(payload).await;

            let report = match result {
                Ok(SubmitOutcome::Accepted { entity }) => {
                    shared.submitted.store(true, Ordering::SeqCst);
                    alerts.notify(AlertLevel::Success, "Saved", Some(alert_duration));
                    SubmissionReport::Accepted { entity }
                }
                Ok(SubmitOutcome::BusinessRule { details }) => {
                    // Dedicated recovery view; deliberately no generic alert.
                    shared.set_dialog(DialogState::BusinessRuleRecovery(details.clone()));
                    SubmissionReport::BusinessRule { details }
                }
                Err(err) => {
                    tracing::warn!(target: "drover::submit", error = %err, "submission failed");
                    let message = err.to_string();
                    alerts.notify(AlertLevel::Error, message.clone(), Some(alert_duration));
                    SubmissionReport::Failed { message }
                }
            };

            shared.in_flight.store(false, Ordering::SeqCst);
            shared.finished.emit(report);
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Gateway double with a scripted outcome, a response delay and a call
    /// counter.
    struct TestGateway {
        outcome: Mutex<Option<Result<SubmitOutcome, GatewayError>>>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl TestGateway {
        fn accepting(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(Some(Ok(SubmitOutcome::Accepted {
                    entity: EntityRef {
                        id: "a-1".to_string(),
                        label: None,
                    },
                }))),
                delay,
                calls: AtomicU32::new(0),
            })
        }

        fn with(outcome: Result<SubmitOutcome, GatewayError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(Some(outcome)),
                delay: Duration::from_millis(5),
                calls: AtomicU32::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SubmitGateway for TestGateway {
        fn submit(
            &self,
            _payload: serde_json::Value,
        ) -> BoxFuture<'static, Result<SubmitOutcome, GatewayError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcome.lock().take().unwrap_or(Err(
                GatewayError::Transport("gateway exhausted".to_string()),
            ));
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                outcome
            })
        }
    }

    fn orchestrator(gateway: Arc<TestGateway>) -> SubmissionOrchestrator {
        let handle = tokio::runtime::Handle::current();
        SubmissionOrchestrator::new(
            gateway,
            None,
            AlertChannel::new(handle.clone()),
            Duration::from_millis(50),
            handle,
        )
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 1s");
    }

    #[tokio::test]
    async fn test_accepted_reaches_terminal_state() {
        let gateway = TestGateway::accepting(Duration::from_millis(5));
        let orchestrator = orchestrator(gateway.clone());

        let report = Arc::new(Mutex::new(None));
        let report_clone = report.clone();
        orchestrator.finished().connect(move |r| {
            *report_clone.lock() = Some(r.clone());
        });

        assert!(orchestrator.dispatch(serde_json::json!({})));
        wait_until(|| orchestrator.is_submitted()).await;
        wait_until(|| report.lock().is_some()).await;

        match report.lock().clone() {
            Some(SubmissionReport::Accepted { entity }) => assert_eq!(entity.id, "a-1"),
            other => panic!("unexpected report: {other:?}"),
        }
        assert!(!orchestrator.is_in_flight());
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_is_ignored() {
        let gateway = TestGateway::accepting(Duration::from_millis(60));
        let orchestrator = orchestrator(gateway.clone());

        assert!(orchestrator.dispatch(serde_json::json!({})));
        // Re-entrant click while the first is in flight
        assert!(!orchestrator.dispatch(serde_json::json!({})));

        wait_until(|| orchestrator.is_submitted()).await;
        assert_eq!(gateway.call_count(), 1);

        // Terminal state also refuses
        assert!(!orchestrator.dispatch(serde_json::json!({})));
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_business_rule_opens_recovery_not_alert() {
        let details = vec![BusinessRuleDetail {
            code: "medication_stock".to_string(),
            message: "Penicillin out of stock".to_string(),
        }];
        let gateway = TestGateway::with(Ok(SubmitOutcome::BusinessRule {
            details: details.clone(),
        }));
        let orchestrator = orchestrator(gateway);

        assert!(orchestrator.dispatch(serde_json::json!({})));
        wait_until(|| !orchestrator.is_in_flight()).await;

        assert_eq!(
            orchestrator.dialog(),
            DialogState::BusinessRuleRecovery(details)
        );
        // Business-rule rejections never produce the generic alert path
        assert_eq!(orchestrator.alerts.active_count(), 0);
        // And the wizard is not in the terminal state - the record stays
        // editable
        assert!(!orchestrator.is_submitted());

        assert!(orchestrator.acknowledge_recovery());
        assert_eq!(orchestrator.dialog(), DialogState::Idle);
    }

    #[tokio::test]
    async fn test_transport_failure_notifies_and_keeps_record() {
        let gateway = TestGateway::with(Err(GatewayError::Transport(
            "connection reset".to_string(),
        )));
        let orchestrator = orchestrator(gateway);

        let report = Arc::new(Mutex::new(None));
        let report_clone = report.clone();
        orchestrator.finished().connect(move |r| {
            *report_clone.lock() = Some(r.clone());
        });

        assert!(orchestrator.dispatch(serde_json::json!({})));
        wait_until(|| report.lock().is_some()).await;

        assert!(matches!(
            report.lock().clone(),
            Some(SubmissionReport::Failed { .. })
        ));
        assert!(!orchestrator.is_submitted());
        assert_eq!(orchestrator.dialog(), DialogState::Idle);
        // Generic failure path posts a transient alert
        assert_eq!(orchestrator.alerts.active_count(), 1);

        // A retry dispatches again
        assert!(orchestrator.dispatch(serde_json::json!({})));
    }

    #[tokio::test]
    async fn test_confirmation_dialog_lifecycle() {
        let gateway = TestGateway::accepting(Duration::from_millis(5));
        let handle = tokio::runtime::Handle::current();
        let gate: ConfirmationGate = Arc::new(|record: &Record| {
            record.get("slaughtered").as_flag().filter(|b| *b).map(|_| {
                ConfirmationSummary {
                    title: "This action cannot be undone".to_string(),
                    lines: vec![("Slaughtered".to_string(), "yes".to_string())],
                }
            })
        });
        let orchestrator = SubmissionOrchestrator::new(
            gateway,
            Some(gate),
            AlertChannel::new(handle.clone()),
            Duration::from_millis(50),
            handle,
        );

        let mut record = Record::new();
        assert!(orchestrator.needs_confirmation(&record).is_none());

        record.set("slaughtered", crate::value::Value::Flag(true));
        let summary = orchestrator.needs_confirmation(&record).unwrap();
        orchestrator.open_confirmation(summary.clone());
        assert_eq!(
            orchestrator.dialog(),
            DialogState::ConfirmingSubmission(summary)
        );

        // Cancel returns to the editable record, no dispatch happened
        assert!(orchestrator.cancel_confirmation());
        assert_eq!(orchestrator.dialog(), DialogState::Idle);
        assert!(!orchestrator.cancel_confirmation());
    }
}
