//! The wizard facade.
//!
//! [`Wizard`] ties the engine together around one record: field edits route
//! through schema re-derivation, synchronous validation, debounced
//! uniqueness checks and prefetch bindings; navigation goes through the
//! step controller; the terminal transition goes through the submission
//! orchestrator. Hosts build one instance per open form via
//! [`WizardBuilder`] and discard it when the form closes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use drover::prelude::*;
//!
//! # fn gateway() -> Arc<dyn SubmitGateway> { unimplemented!() }
//! # fn probe() -> Arc<dyn UniquenessProbe> { unimplemented!() }
//! # fn demo() -> drover::error::Result<()> {
//! let mut schema = SchemaBuilder::new();
//! schema.field(FieldDescriptor::text("code").required().unique("animal_code"))?;
//! schema.field(FieldDescriptor::choice("origin_type", ["born", "purchased", "other"]).required())?;
//! schema.field(
//!     FieldDescriptor::text("origin_detail")
//!         .required_when(Predicate::equals("origin_type", Value::text("other"))),
//! )?;
//!
//! let mut wizard = WizardBuilder::new()
//!     .with_schema(schema.build())
//!     .with_step(StepDef::new("Identity").with_fields(["code"]))
//!     .with_step(StepDef::new("Origin").with_fields(["origin_type", "origin_detail"]))
//!     .with_gateway(gateway())
//!     .with_probe(probe())
//!     .build()?;
//!
//! wizard.set_field("code", Value::text("PIG-001"));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use drover_core::Signal;
use futures_util::future::BoxFuture;

use crate::alert::{AlertChannel, AlertLevel};
use crate::collection::{CollectionEditor, CommitError};
use crate::config::WizardConfig;
use crate::error::{Result, WizardError};
use crate::lookup::{
    ActingUser, ChoiceOption, LookupError, OptionsBinding, OptionsCache, OptionsProvider,
};
use crate::outcome::{InvalidReason, Outcome};
use crate::record::{EntryKey, Record};
use crate::schema::Schema;
use crate::step::{BlockedAdvance, StepController, StepDef};
use crate::submit::{
    ConfirmationGate, ConfirmationSummary, DialogState, SubmissionOrchestrator, SubmissionReport,
    SubmitGateway,
};
use crate::validate::{AsyncValidation, ProbeError, UniquenessProbe, merge_outcomes, validate_value};
use crate::value::Value;

// ============================================================================
// SubmitAttempt
// ============================================================================

/// What happened when submission was requested.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitAttempt {
    /// Full-record validation failed; nothing was dispatched.
    Blocked(SubmissionBlocked),
    /// The confirmation gate fired; an explicit
    /// [`confirm_submission`](Wizard::confirm_submission) is required.
    ConfirmationRequired(ConfirmationSummary),
    /// Exactly one mutation was dispatched.
    Dispatched,
    /// A dispatch is already in flight; this request was ignored.
    InFlight,
    /// The wizard is already in its terminal state.
    AlreadySubmitted,
}

/// Everything that blocked a submission attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmissionBlocked {
    /// Top-level fields that are invalid or pending.
    pub field_failures: Vec<(String, Outcome)>,
    /// Committed collection entries that are invalid, per collection.
    pub entry_failures: Vec<(String, EntryKey, Vec<(String, InvalidReason)>)>,
}

impl SubmissionBlocked {
    /// Whether nothing blocked.
    pub fn is_empty(&self) -> bool {
        self.field_failures.is_empty() && self.entry_failures.is_empty()
    }

    /// One user-facing summary line for the whole refusal.
    pub fn summary(&self) -> String {
        let total = self.field_failures.len() + self.entry_failures.len();
        format!("{total} item(s) need attention before the record can be saved")
    }
}

// ============================================================================
// Boundary fallbacks
// ============================================================================

/// Probe used when the schema has no uniqueness rules. Unreachable in a
/// correctly built wizard; answers unverifiable just in case.
struct NoProbe;

impl UniquenessProbe for NoProbe {
    fn check_unique(
        &self,
        _kind: &str,
        _candidate: &str,
    ) -> BoxFuture<'static, std::result::Result<bool, ProbeError>> {
        Box::pin(async { Err(ProbeError::Unavailable("no probe configured".to_string())) })
    }
}

/// Provider used when no bindings are declared.
struct NoProvider;

impl OptionsProvider for NoProvider {
    fn fetch_options(
        &self,
        _kind: &str,
        _params: &[(String, String)],
    ) -> BoxFuture<'static, std::result::Result<Vec<ChoiceOption>, LookupError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

// ============================================================================
// Wizard
// ============================================================================

/// One guarded multi-step form instance.
///
/// # Signals
///
/// - `field_changed((String, Value))`: a field edit landed in the record
/// - [`outcome_changed`](Self::outcome_changed): an async check resolved
/// - step signals on [`steps`](Self::steps)
/// - submission signals via [`submission_finished`](Self::submission_finished)
///   and [`dialog_changed`](Self::dialog_changed)
pub struct Wizard {
    schema: Arc<Schema>,
    record: Record,
    steps: StepController,
    editors: BTreeMap<String, CollectionEditor>,
    checks: Arc<AsyncValidation>,
    options: OptionsCache,
    bindings: Vec<OptionsBinding>,
    orchestrator: SubmissionOrchestrator,
    alerts: AlertChannel,
    acting_user: Option<ActingUser>,

    /// Signal emitted when a field edit lands in the record.
    pub field_changed: Signal<(String, Value)>,
}

impl Wizard {
    /// Start building a wizard.
    pub fn builder() -> WizardBuilder {
        WizardBuilder::new()
    }

    // =========================================================================
    // Record access
    // =========================================================================

    /// The record under edit.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// The schema governing the record.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Set a field of the record.
    ///
    /// Routes the edit through schema re-derivation, synchronous
    /// validation, the debounced uniqueness check (for unique fields) and
    /// any prefetch bindings triggered by this field. Edits after the
    /// terminal submission are ignored.
    pub fn set_field(&mut self, field: &str, value: Value) {
        if self.orchestrator.is_submitted() {
            tracing::warn!(target: "drover::submit", field, "edit ignored: record already submitted");
            return;
        }
        let Some(descriptor) = self.schema.descriptor(field) else {
            tracing::warn!(target: "drover::schema", field, "edit ignored: unknown field");
            return;
        };
        let unique_kind = descriptor.unique_kind().map(str::to_string);

        if !self.record.set(field, value.clone()) {
            return;
        }

        if let Some(kind) = unique_kind {
            let required = self.schema.is_required(field, &self.record);
            let current = self.record.get(field);
            let sync = validate_value(descriptor, current, required);
            if current.is_empty() || sync.is_invalid() {
                // Nothing worth verifying; also invalidates any in-flight check.
                self.checks.clear(field);
            } else {
                self.checks.schedule(field, &kind, &candidate_repr(current));
            }
        }

        let refreshes: Vec<(String, Vec<(String, String)>)> = self
            .bindings
            .iter()
            .filter(|b| b.trigger() == field)
            .map(|b| (b.kind().to_string(), b.params(&self.record)))
            .collect();
        for (kind, params) in refreshes {
            self.options.refresh(&kind, params);
        }

        self.field_changed.emit((field.to_string(), value));
    }

    /// Mark a field as touched (e.g. on input blur) so inline errors render.
    pub fn touch_field(&mut self, field: &str) {
        self.record.mark_touched(field);
    }

    /// Whether a field is currently required, per the live record.
    pub fn is_required(&self, field: &str) -> bool {
        self.schema.is_required(field, &self.record)
    }

    /// The current validation outcome of a field.
    ///
    /// Synchronous rules are evaluated fresh against the live record; for
    /// unique fields the async check state is merged in (a synchronous
    /// failure wins, otherwise pending/resolved remote state is
    /// authoritative). For collection fields the outcome aggregates the
    /// validity of every committed entry.
    pub fn outcome(&self, field: &str) -> Outcome {
        if let Some(editor) = self.editors.get(field) {
            let failing = editor.committed_failures(&self.record).len();
            return if failing == 0 {
                Outcome::Valid
            } else {
                Outcome::Invalid(InvalidReason::InvalidEntries { count: failing })
            };
        }

        let Some(descriptor) = self.schema.descriptor(field) else {
            return Outcome::Valid;
        };
        let required = self.schema.is_required(field, &self.record);
        let sync = validate_value(descriptor, self.record.get(field), required);
        let remote = if descriptor.unique_kind().is_some() {
            self.checks.outcome(field)
        } else {
            None
        };
        merge_outcomes(sync, remote)
    }

    /// Stamp an audit field with the acting user (e.g. "detected by").
    ///
    /// Returns `false` when no acting user was injected.
    pub fn stamp_audit_field(&mut self, field: &str) -> bool {
        let Some(user) = self.acting_user.clone() else {
            tracing::warn!(target: "drover::lookup", field, "no acting user to stamp");
            return false;
        };
        self.set_field(field, Value::reference(user.id, user.display_name));
        true
    }

    /// The acting user, if one was injected.
    pub fn acting_user(&self) -> Option<&ActingUser> {
        self.acting_user.as_ref()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// The step controller (current index, step definitions, signals).
    pub fn steps(&self) -> &StepController {
        &self.steps
    }

    /// Attempt to advance to the next step.
    ///
    /// Every governed field's outcome and the step's gate are evaluated
    /// fresh. On refusal, all governed fields are marked touched and a
    /// single sticky summary alert is posted - one notification for the
    /// whole refusal, never one per field.
    pub fn advance(&mut self) -> std::result::Result<usize, BlockedAdvance> {
        let fields: Vec<String> = self
            .steps
            .current_step()
            .map(|s| s.fields().to_vec())
            .unwrap_or_default();
        let outcomes: BTreeMap<String, Outcome> = fields
            .iter()
            .map(|f| (f.clone(), self.outcome(f)))
            .collect();

        let result = self.steps.advance(&self.record, |f| {
            outcomes.get(f).cloned().unwrap_or_default()
        });

        if let Err(blocked) = &result {
            for field in &fields {
                self.record.mark_touched(field);
            }
            self.alerts
                .notify(AlertLevel::Warning, blocked.summary(), None);
        }
        result
    }

    /// Return to the previous step. Always allowed; never re-validates.
    pub fn retreat(&mut self) -> bool {
        self.steps.retreat()
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// The editor of a collection field.
    pub fn collection_editor(&self, field: &str) -> Option<&CollectionEditor> {
        self.editors.get(field)
    }

    /// Begin composing a new entry for a collection field.
    pub fn start_draft(&mut self, collection: &str) -> bool {
        match self.editors.get_mut(collection) {
            Some(editor) => {
                editor.start_draft();
                true
            }
            None => false,
        }
    }

    /// Set a field of the collection's current draft.
    pub fn edit_draft(&mut self, collection: &str, field: &str, value: Value) -> bool {
        match self.editors.get_mut(collection) {
            Some(editor) => {
                editor.edit_draft(field, value);
                true
            }
            None => false,
        }
    }

    /// Commit the collection's draft into the record.
    pub fn commit_draft(&mut self, collection: &str) -> std::result::Result<EntryKey, CommitError> {
        match self.editors.get_mut(collection) {
            Some(editor) => editor.commit_draft(&mut self.record),
            None => Err(CommitError::NoDraft),
        }
    }

    /// Discard the collection's draft.
    pub fn discard_draft(&mut self, collection: &str) -> bool {
        match self.editors.get_mut(collection) {
            Some(editor) => {
                editor.discard_draft();
                true
            }
            None => false,
        }
    }

    /// Remove a committed entry from a collection.
    pub fn remove_entry(&mut self, collection: &str, key: EntryKey) -> bool {
        match self.editors.get(collection) {
            Some(editor) => editor.remove_entry(&mut self.record, key),
            None => false,
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Request submission of the record.
    ///
    /// Re-validates the *entire* record - every step's fields and every
    /// committed collection entry, not just the current step - then runs
    /// the confirmation gate, then dispatches exactly one mutation.
    /// Re-entrant requests while a dispatch is in flight are no-ops.
    pub fn submit(&mut self) -> SubmitAttempt {
        if self.orchestrator.is_submitted() {
            return SubmitAttempt::AlreadySubmitted;
        }
        if self.orchestrator.is_in_flight() {
            tracing::debug!(target: "drover::submit", "submit ignored: dispatch in flight");
            return SubmitAttempt::InFlight;
        }

        let blocked = self.full_validation();
        if !blocked.is_empty() {
            for (field, _) in &blocked.field_failures {
                self.record.mark_touched(field);
            }
            self.alerts
                .notify(AlertLevel::Warning, blocked.summary(), None);
            return SubmitAttempt::Blocked(blocked);
        }

        if let DialogState::ConfirmingSubmission(summary) = self.orchestrator.dialog() {
            // Already waiting on the user; don't stack dialogs.
            return SubmitAttempt::ConfirmationRequired(summary);
        }
        if let Some(summary) = self.orchestrator.needs_confirmation(&self.record) {
            self.orchestrator.open_confirmation(summary.clone());
            return SubmitAttempt::ConfirmationRequired(summary);
        }

        self.orchestrator.dispatch(self.record.to_json());
        SubmitAttempt::Dispatched
    }

    /// Explicitly confirm a consequential submission and dispatch it.
    ///
    /// Returns `false` when no confirmation dialog is open.
    pub fn confirm_submission(&mut self) -> bool {
        if self.orchestrator.is_in_flight() || self.orchestrator.is_submitted() {
            return false;
        }
        if !self.orchestrator.consume_confirmation() {
            return false;
        }
        self.orchestrator.dispatch(self.record.to_json())
    }

    /// Cancel a pending confirmation; the record stays editable, unchanged.
    pub fn cancel_submission(&self) -> bool {
        self.orchestrator.cancel_confirmation()
    }

    /// Close the business-rule recovery dialog.
    pub fn acknowledge_recovery(&self) -> bool {
        self.orchestrator.acknowledge_recovery()
    }

    /// Validate every field and every committed entry.
    pub fn full_validation(&self) -> SubmissionBlocked {
        let mut blocked = SubmissionBlocked::default();
        for descriptor in self.schema.fields() {
            let outcome = self.outcome(descriptor.name());
            if outcome.is_blocking() {
                blocked
                    .field_failures
                    .push((descriptor.name().to_string(), outcome));
            }
        }
        for (field, editor) in &self.editors {
            for (key, failures) in editor.committed_failures(&self.record) {
                blocked.entry_failures.push((field.clone(), key, failures));
            }
        }
        blocked
    }

    /// Whether the record is currently submittable.
    pub fn is_submittable(&self) -> bool {
        self.full_validation().is_empty()
    }

    /// Whether a dispatch is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.orchestrator.is_in_flight()
    }

    /// Whether the wizard reached its terminal submitted state.
    pub fn is_submitted(&self) -> bool {
        self.orchestrator.is_submitted()
    }

    /// The current dialog state.
    pub fn dialog(&self) -> DialogState {
        self.orchestrator.dialog()
    }

    // =========================================================================
    // Channels and signals
    // =========================================================================

    /// The notification sink.
    pub fn alerts(&self) -> &AlertChannel {
        &self.alerts
    }

    /// The reference-data cache.
    pub fn options(&self) -> &OptionsCache {
        &self.options
    }

    /// Signal emitted when a field's async check state changes.
    pub fn outcome_changed(&self) -> &Signal<(String, Outcome)> {
        &self.checks.outcome_changed
    }

    /// Signal emitted when a dispatch finishes, with its classification.
    pub fn submission_finished(&self) -> &Signal<SubmissionReport> {
        self.orchestrator.finished()
    }

    /// Signal emitted when the dialog state changes.
    pub fn dialog_changed(&self) -> &Signal<DialogState> {
        self.orchestrator.dialog_changed()
    }
}

/// The string a uniqueness check sends for a value.
fn candidate_repr(value: &Value) -> String {
    match value {
        Value::Empty => String::new(),
        Value::Text(s) => s.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Flag(b) => b.to_string(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Reference { id, .. } => id.clone(),
    }
}

// ============================================================================
// WizardBuilder
// ============================================================================

/// Builder for [`Wizard`].
#[derive(Default)]
pub struct WizardBuilder {
    schema: Option<Schema>,
    steps: Vec<StepDef>,
    collections: Vec<(String, Schema)>,
    gateway: Option<Arc<dyn SubmitGateway>>,
    probe: Option<Arc<dyn UniquenessProbe>>,
    provider: Option<Arc<dyn OptionsProvider>>,
    bindings: Vec<OptionsBinding>,
    confirmation: Option<ConfirmationGate>,
    acting_user: Option<ActingUser>,
    record: Option<Record>,
    config: WizardConfig,
}

impl WizardBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            config: WizardConfig::default(),
            ..Self::default()
        }
    }

    /// Set the record schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Append a step.
    pub fn with_step(mut self, step: StepDef) -> Self {
        self.steps.push(step);
        self
    }

    /// Declare a collection field with its entry schema.
    pub fn with_collection(mut self, field: impl Into<String>, entry_schema: Schema) -> Self {
        self.collections.push((field.into(), entry_schema));
        self
    }

    /// Set the submit gateway.
    pub fn with_gateway(mut self, gateway: Arc<dyn SubmitGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the uniqueness probe. Required when the schema declares unique
    /// fields.
    pub fn with_probe(mut self, probe: Arc<dyn UniquenessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set the reference-data provider. Required when bindings are declared.
    pub fn with_options_provider(mut self, provider: Arc<dyn OptionsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Declare a prefetch binding.
    pub fn with_options_binding(mut self, binding: OptionsBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Set the confirmation gate.
    pub fn with_confirmation<F>(mut self, gate: F) -> Self
    where
        F: Fn(&Record) -> Option<ConfirmationSummary> + Send + Sync + 'static,
    {
        self.confirmation = Some(Arc::new(gate));
        self
    }

    /// Inject the acting user for audit stamping.
    pub fn with_acting_user(mut self, user: ActingUser) -> Self {
        self.acting_user = Some(user);
        self
    }

    /// Seed the wizard from an existing entity (edit mode).
    pub fn with_record(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: WizardConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the wizard.
    ///
    /// Must be called inside a tokio runtime context - the engine captures
    /// the current handle for its background tasks (debounced checks,
    /// submission dispatch, alert expiry, prefetches).
    pub fn build(self) -> Result<Wizard> {
        let schema = self.schema.ok_or(WizardError::MissingSchema)?;
        let gateway = self.gateway.ok_or(WizardError::MissingGateway)?;
        if self.steps.is_empty() {
            return Err(WizardError::NoSteps);
        }

        let collection_names: Vec<&str> =
            self.collections.iter().map(|(f, _)| f.as_str()).collect();

        // Every governed field must be a schema field or a declared collection.
        for step in &self.steps {
            for field in step.fields() {
                if schema.descriptor(field).is_none() && !collection_names.contains(&field.as_str())
                {
                    return Err(WizardError::UnknownField {
                        field: field.clone(),
                    });
                }
            }
        }
        for binding in &self.bindings {
            if schema.descriptor(binding.trigger()).is_none() {
                return Err(WizardError::UnknownField {
                    field: binding.trigger().to_string(),
                });
            }
        }

        let has_unique = schema.fields().any(|d| d.unique_kind().is_some());
        if has_unique && self.probe.is_none() {
            return Err(WizardError::MissingProbe);
        }
        if !self.bindings.is_empty() && self.provider.is_none() {
            return Err(WizardError::MissingProvider);
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|_| WizardError::NoRuntime)?;

        let alerts = AlertChannel::new(handle.clone());
        let probe = self.probe.unwrap_or_else(|| Arc::new(NoProbe));
        let provider = self.provider.unwrap_or_else(|| Arc::new(NoProvider));
        let checks = Arc::new(AsyncValidation::new(
            probe,
            handle.clone(),
            self.config.debounce,
            self.config.verify_timeout,
        ));
        let options = OptionsCache::new(provider, handle.clone());
        let orchestrator = SubmissionOrchestrator::new(
            gateway,
            self.confirmation,
            alerts.clone(),
            self.config.alert_duration,
            handle,
        );

        let editors = self
            .collections
            .into_iter()
            .map(|(field, entry_schema)| {
                let editor = CollectionEditor::new(&field, Arc::new(entry_schema));
                (field, editor)
            })
            .collect();

        tracing::debug!(
            target: "drover::steps",
            fields = schema.len(),
            steps = self.steps.len(),
            "wizard built"
        );

        Ok(Wizard {
            schema: Arc::new(schema),
            record: self.record.unwrap_or_default(),
            steps: StepController::new(self.steps),
            editors,
            checks,
            options,
            bindings: self.bindings,
            orchestrator,
            alerts,
            acting_user: self.acting_user,
            field_changed: Signal::new(),
        })
    }
}
