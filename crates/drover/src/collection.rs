//! Collection sub-editor.
//!
//! Nested list fields (e.g. the treatments of a sickness case) are edited
//! through a [`CollectionEditor`]: a new entry is composed in a draft
//! staging area, validated as a whole on commit, and only then appended to
//! the record's collection. There is no partial commit - an entry either
//! lands fully valid or not at all.
//!
//! Committed entries are addressed by their stable [`EntryKey`], so two
//! identical entries remain distinguishable and independently removable.

use std::fmt;
use std::sync::Arc;

use drover_core::Signal;

use crate::outcome::InvalidReason;
use crate::record::{Entry, EntryKey, Record};
use crate::schema::Schema;
use crate::validate::validate_value;
use crate::value::Value;

/// Why a draft could not be committed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitError {
    /// No draft is currently being composed.
    NoDraft,
    /// One or more draft fields failed validation; nothing was committed.
    Invalid {
        /// The failing fields with their reasons.
        failures: Vec<(String, InvalidReason)>,
    },
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDraft => write!(f, "no draft entry is being composed"),
            Self::Invalid { failures } => {
                write!(f, "draft entry is not valid ({} field(s))", failures.len())
            }
        }
    }
}

impl std::error::Error for CommitError {}

/// Editor for one collection field of the parent record.
///
/// The editor owns the draft staging area and the entry schema; committed
/// entries live in the record itself.
///
/// # Signals
///
/// - `entry_committed(EntryKey)`: a draft became a committed entry
/// - `entry_removed(EntryKey)`: a committed entry was removed
/// - `draft_discarded(())`: the draft was thrown away
pub struct CollectionEditor {
    /// The record field this editor manages.
    field: String,
    /// Schema governing each entry's own field set.
    entry_schema: Arc<Schema>,
    /// The entry being composed, if any.
    draft: Option<Entry>,

    /// Signal emitted when a draft is committed.
    pub entry_committed: Signal<EntryKey>,
    /// Signal emitted when a committed entry is removed.
    pub entry_removed: Signal<EntryKey>,
    /// Signal emitted when a draft is discarded.
    pub draft_discarded: Signal<()>,
}

impl CollectionEditor {
    /// Create an editor for `field`, with entries governed by `entry_schema`.
    pub fn new(field: impl Into<String>, entry_schema: Arc<Schema>) -> Self {
        Self {
            field: field.into(),
            entry_schema,
            draft: None,
            entry_committed: Signal::new(),
            entry_removed: Signal::new(),
            draft_discarded: Signal::new(),
        }
    }

    /// The record field this editor manages.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The schema governing each entry.
    pub fn entry_schema(&self) -> &Schema {
        &self.entry_schema
    }

    // =========================================================================
    // Draft lifecycle
    // =========================================================================

    /// Begin composing a new entry.
    ///
    /// An existing draft is replaced.
    pub fn start_draft(&mut self) {
        self.draft = Some(Entry::new());
    }

    /// Whether a draft is currently being composed.
    pub fn has_draft(&self) -> bool {
        self.draft.is_some()
    }

    /// The current draft, if any.
    pub fn draft(&self) -> Option<&Entry> {
        self.draft.as_ref()
    }

    /// Set a field of the current draft.
    ///
    /// A no-op (with a warning) when no draft is active.
    pub fn edit_draft(&mut self, field: impl Into<String>, value: Value) {
        match &mut self.draft {
            Some(draft) => draft.set(field, value),
            None => {
                tracing::warn!(
                    target: "drover::collection",
                    collection = %self.field,
                    "edit_draft called with no active draft"
                );
            }
        }
    }

    /// Validate the draft's fields without committing.
    ///
    /// Returns the failing fields; empty means the draft would commit.
    pub fn draft_failures(&self) -> Vec<(String, InvalidReason)> {
        let Some(draft) = &self.draft else {
            return Vec::new();
        };
        let view = draft.as_record();
        let mut failures = Vec::new();
        for descriptor in self.entry_schema.fields() {
            let required = self.entry_schema.is_required(descriptor.name(), &view);
            let outcome = validate_value(descriptor, draft.get(descriptor.name()), required);
            if let Some(reason) = outcome.reason() {
                failures.push((descriptor.name().to_string(), reason.clone()));
            }
        }
        failures
    }

    /// Commit the draft into the record's collection.
    ///
    /// Re-validates every draft field against the entry schema first; if any
    /// field fails, nothing is committed and the failures are returned. On
    /// success the draft is consumed and exactly one entry is appended.
    pub fn commit_draft(&mut self, record: &mut Record) -> Result<EntryKey, CommitError> {
        if self.draft.is_none() {
            return Err(CommitError::NoDraft);
        }

        let failures = self.draft_failures();
        if !failures.is_empty() {
            tracing::debug!(
                target: "drover::collection",
                collection = %self.field,
                failing = failures.len(),
                "refusing to commit invalid draft"
            );
            return Err(CommitError::Invalid { failures });
        }

        let Some(draft) = self.draft.take() else {
            return Err(CommitError::NoDraft);
        };
        let key = record.collection_mut(&self.field).push(draft);
        self.entry_committed.emit(key);
        tracing::debug!(
            target: "drover::collection",
            collection = %self.field,
            "draft committed"
        );
        Ok(key)
    }

    /// Throw away the current draft.
    pub fn discard_draft(&mut self) {
        if self.draft.take().is_some() {
            self.draft_discarded.emit(());
        }
    }

    // =========================================================================
    // Committed entries
    // =========================================================================

    /// Remove a committed entry by its stable key.
    ///
    /// Returns `false` if the key is stale.
    pub fn remove_entry(&self, record: &mut Record, key: EntryKey) -> bool {
        let removed = record.collection_mut(&self.field).remove(key).is_some();
        if removed {
            self.entry_removed.emit(key);
        }
        removed
    }

    /// Validate every committed entry in the record.
    ///
    /// Returns, per failing entry, its key and the failing fields. Used by
    /// the submission orchestrator - a committed entry that has gone invalid
    /// (e.g. a referenced item no longer available) blocks final submission.
    pub fn committed_failures(&self, record: &Record) -> Vec<(EntryKey, Vec<(String, InvalidReason)>)> {
        let Some(list) = record.collection(&self.field) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (key, entry) in list.iter() {
            let view = entry.as_record();
            let mut failures = Vec::new();
            for descriptor in self.entry_schema.fields() {
                let required = self.entry_schema.is_required(descriptor.name(), &view);
                let outcome = validate_value(descriptor, entry.get(descriptor.name()), required);
                if let Some(reason) = outcome.reason() {
                    failures.push((descriptor.name().to_string(), reason.clone()));
                }
            }
            if !failures.is_empty() {
                out.push((key, failures));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, SchemaBuilder};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn treatment_schema() -> Arc<Schema> {
        let mut builder = SchemaBuilder::new();
        builder
            .field(FieldDescriptor::reference("medication", "medication").required())
            .unwrap();
        builder
            .field(
                FieldDescriptor::decimal("dose")
                    .with_decimal_range(0.1, 100.0)
                    .required(),
            )
            .unwrap();
        builder
            .field(FieldDescriptor::choice("route", ["oral", "injection", "topical"]).required())
            .unwrap();
        builder.build().into()
    }

    fn valid_draft(editor: &mut CollectionEditor) {
        editor.start_draft();
        editor.edit_draft("medication", Value::reference("m-1", "Penicillin"));
        editor.edit_draft("dose", Value::Decimal(2.0));
        editor.edit_draft("route", Value::text("injection"));
    }

    #[test]
    fn test_commit_valid_draft_appends_one_entry() {
        let mut editor = CollectionEditor::new("treatments", treatment_schema());
        let mut record = Record::new();

        let committed = Arc::new(AtomicU32::new(0));
        let committed_clone = committed.clone();
        editor.entry_committed.connect(move |_| {
            committed_clone.fetch_add(1, Ordering::SeqCst);
        });

        valid_draft(&mut editor);
        let key = editor.commit_draft(&mut record).unwrap();

        assert_eq!(record.collection("treatments").unwrap().len(), 1);
        assert!(record.collection("treatments").unwrap().get(key).is_some());
        assert_eq!(committed.load(Ordering::SeqCst), 1);
        assert!(!editor.has_draft());
    }

    #[test]
    fn test_commit_refused_when_required_field_missing() {
        let mut editor = CollectionEditor::new("treatments", treatment_schema());
        let mut record = Record::new();

        editor.start_draft();
        editor.edit_draft("medication", Value::reference("m-1", "Penicillin"));
        editor.edit_draft("dose", Value::Decimal(2.0));
        // administration route left unset

        let err = editor.commit_draft(&mut record).unwrap_err();
        match err {
            CommitError::Invalid { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "route");
                assert_eq!(failures[0].1, InvalidReason::Missing);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing landed in the record; the draft is still editable
        assert!(record.collection("treatments").is_none());
        assert!(editor.has_draft());

        // Fixing the failure makes the commit succeed
        editor.edit_draft("route", Value::text("oral"));
        editor.commit_draft(&mut record).unwrap();
        assert_eq!(record.collection("treatments").unwrap().len(), 1);
    }

    #[test]
    fn test_commit_without_draft() {
        let mut editor = CollectionEditor::new("treatments", treatment_schema());
        let mut record = Record::new();
        assert_eq!(editor.commit_draft(&mut record), Err(CommitError::NoDraft));
    }

    #[test]
    fn test_discard_draft() {
        let mut editor = CollectionEditor::new("treatments", treatment_schema());
        let mut record = Record::new();

        valid_draft(&mut editor);
        editor.discard_draft();
        assert!(!editor.has_draft());
        assert_eq!(editor.commit_draft(&mut record), Err(CommitError::NoDraft));
    }

    #[test]
    fn test_duplicate_entries_removable_independently() {
        let mut editor = CollectionEditor::new("treatments", treatment_schema());
        let mut record = Record::new();

        valid_draft(&mut editor);
        let k1 = editor.commit_draft(&mut record).unwrap();
        valid_draft(&mut editor);
        let k2 = editor.commit_draft(&mut record).unwrap();

        assert!(editor.remove_entry(&mut record, k1));
        let list = record.collection("treatments").unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.get(k2).is_some());

        // Stale key
        assert!(!editor.remove_entry(&mut record, k1));
    }

    #[test]
    fn test_committed_entry_rot_detected() {
        let mut editor = CollectionEditor::new("treatments", treatment_schema());
        let mut record = Record::new();

        // Commit an entry whose dose later turns out to be out of range by
        // building it directly - simulating schema-legal data going stale.
        valid_draft(&mut editor);
        let key = editor.commit_draft(&mut record).unwrap();
        assert!(editor.committed_failures(&record).is_empty());

        let mut rotten = Entry::new();
        rotten.set("medication", Value::reference("m-2", "Withdrawn product"));
        rotten.set("dose", Value::Decimal(500.0));
        rotten.set("route", Value::text("oral"));
        let rotten_key = record.collection_mut("treatments").push(rotten);

        let failures = editor.committed_failures(&record);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, rotten_key);
        assert_ne!(failures[0].0, key);
    }
}
