//! Drover - a guarded multi-step form-wizard engine.
//!
//! Management consoles are full of near-identical CRUD screens, and the one
//! recurring subsystem with real engineering weight in them is the guarded
//! multi-step form: step-gated navigation, validation schemas whose
//! required fields depend on the values of *other* fields, remote
//! uniqueness checks that must not freeze the UI, nested entry lists with
//! their own draft/commit lifecycle, confirmation gates for irreversible
//! actions, and a submission pipeline that has to tell "your input is
//! wrong" apart from "the backend refused for a business reason".
//!
//! Drover is that subsystem as a library. It owns the state, transition and
//! validation contract; rendering stays with the host. The engine emits
//! `(field, value)` change events and per-field validation outcomes, and
//! consumes user actions (edits, next/back, submit, confirm) - it does not
//! dictate widget types.
//!
//! # Components
//!
//! - [`schema`]: field descriptors with declarative conditional rules;
//!   required-field sets are re-derived from the live record on demand
//! - [`validate`]: synchronous rules plus debounced, staleness-safe remote
//!   uniqueness checks
//! - [`collection`]: draft/commit editing of nested entry lists
//! - [`step`]: the gated navigation state machine
//! - [`submit`]: confirmation gate, single-dispatch guard, three-way result
//!   classification
//! - [`alert`]: timed, dismissible notifications
//! - [`lookup`]: reference-data prefetch bindings and the acting user
//! - [`wizard`]: the facade tying one record's edit session together
//!
//! # Concurrency model
//!
//! Single-threaded and cooperative: "concurrent" work is multiplexed
//! asynchronous tasks spawned onto the tokio runtime the wizard was built
//! in. A new request for the same logical slot (same field, same
//! submission) supersedes the previous one; stale resolutions are
//! discarded by issuance order, not arrival order.

pub mod alert;
pub mod collection;
pub mod config;
pub mod error;
pub mod lookup;
pub mod outcome;
pub mod record;
pub mod schema;
pub mod step;
pub mod submit;
pub mod validate;
pub mod value;
pub mod wizard;

pub use alert::{Alert, AlertChannel, AlertId, AlertLevel};
pub use collection::{CollectionEditor, CommitError};
pub use config::WizardConfig;
pub use error::{Result, WizardError};
pub use lookup::{ActingUser, ChoiceOption, LookupError, OptionsBinding, OptionsCache, OptionsProvider};
pub use outcome::{InvalidReason, Outcome};
pub use record::{Entry, EntryKey, EntryList, Record, RecordMode};
pub use schema::{
    ConditionalRule, FieldDescriptor, FieldKind, Predicate, Requirement, Schema, SchemaBuilder,
    SchemaError,
};
pub use step::{BlockedAdvance, GatePredicate, StepController, StepDef};
pub use submit::{
    BusinessRuleDetail, ConfirmationGate, ConfirmationSummary, DialogState, EntityRef,
    GatewayError, SubmissionOrchestrator, SubmissionReport, SubmitGateway, SubmitOutcome,
};
pub use validate::{AsyncValidation, ProbeError, UniquenessProbe};
pub use value::Value;
pub use wizard::{SubmissionBlocked, SubmitAttempt, Wizard, WizardBuilder};

/// Convenience re-exports for hosts wiring up a wizard.
pub mod prelude {
    pub use crate::alert::{Alert, AlertChannel, AlertId, AlertLevel};
    pub use crate::collection::CommitError;
    pub use crate::config::WizardConfig;
    pub use crate::lookup::{ActingUser, ChoiceOption, OptionsBinding, OptionsProvider};
    pub use crate::outcome::{InvalidReason, Outcome};
    pub use crate::record::{Entry, EntryKey, Record};
    pub use crate::schema::{FieldDescriptor, Predicate, Schema, SchemaBuilder};
    pub use crate::step::StepDef;
    pub use crate::submit::{
        ConfirmationSummary, DialogState, SubmissionReport, SubmitGateway, SubmitOutcome,
    };
    pub use crate::validate::UniquenessProbe;
    pub use crate::value::Value;
    pub use crate::wizard::{SubmitAttempt, Wizard, WizardBuilder};
}
