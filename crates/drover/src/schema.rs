//! Field descriptors and the conditional validation schema.
//!
//! A [`Schema`] is the static definition of a record's fields: name, kind,
//! base constraints, and zero or more [`ConditionalRule`]s that override a
//! field's requiredness based on the current values of *other* fields.
//!
//! Conditional rules are data, not branching code: each rule pairs a pure
//! [`Predicate`] over the record with the requirement that applies while the
//! predicate holds. The schema re-derives the required-field set from the
//! live record on demand - the derivation is pure, deterministic and cheap
//! enough to run on every keystroke-driven mutation.
//!
//! # Precedence
//!
//! When several rules target one field, the rule with the narrowest
//! predicate (most atomic conditions) wins. Rule sets where two rules of
//! equal specificity disagree are a configuration error and are rejected
//! when the field is registered, never at runtime.
//!
//! # Example
//!
//! ```
//! use drover::schema::{FieldDescriptor, Predicate, SchemaBuilder};
//! use drover::record::Record;
//! use drover::value::Value;
//!
//! let mut builder = SchemaBuilder::new();
//! builder.field(FieldDescriptor::choice(
//!     "origin_type",
//!     ["born", "purchased", "other"],
//! ).required()).unwrap();
//! builder.field(
//!     FieldDescriptor::text("origin_detail")
//!         .required_when(Predicate::equals("origin_type", Value::text("other"))),
//! ).unwrap();
//! let schema = builder.build();
//!
//! let mut record = Record::new();
//! record.set("origin_type", Value::text("other"));
//! assert!(schema.is_required("origin_detail", &record));
//!
//! record.set("origin_type", Value::text("born"));
//! assert!(!schema.is_required("origin_detail", &record));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::record::Record;
use crate::value::Value;

// ============================================================================
// Requirement
// ============================================================================

/// Whether a field must carry a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// The field may be left empty.
    #[default]
    Optional,
    /// The field must carry a non-empty value.
    Required,
}

// ============================================================================
// Predicate
// ============================================================================

/// A pure condition over the current record.
///
/// Predicates have no side effects and no hidden state, so re-evaluating
/// them is deterministic and idempotent.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The named field equals the given value.
    Equals {
        /// Field to inspect.
        field: String,
        /// Value to compare against.
        value: Value,
    },
    /// The named field carries a non-empty value.
    NotEmpty {
        /// Field to inspect.
        field: String,
    },
    /// The named field is empty.
    IsEmpty {
        /// Field to inspect.
        field: String,
    },
    /// The named flag field is set.
    FlagSet {
        /// Field to inspect.
        field: String,
    },
    /// Every inner predicate holds.
    All(Vec<Predicate>),
    /// At least one inner predicate holds.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Shorthand for [`Predicate::Equals`].
    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        Self::Equals {
            field: field.into(),
            value,
        }
    }

    /// Shorthand for [`Predicate::NotEmpty`].
    pub fn not_empty(field: impl Into<String>) -> Self {
        Self::NotEmpty {
            field: field.into(),
        }
    }

    /// Shorthand for [`Predicate::IsEmpty`].
    pub fn is_empty(field: impl Into<String>) -> Self {
        Self::IsEmpty {
            field: field.into(),
        }
    }

    /// Shorthand for [`Predicate::FlagSet`].
    pub fn flag_set(field: impl Into<String>) -> Self {
        Self::FlagSet {
            field: field.into(),
        }
    }

    /// Evaluate the predicate against the live record.
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::Equals { field, value } => record.get(field) == value,
            Self::NotEmpty { field } => !record.get(field).is_empty(),
            Self::IsEmpty { field } => record.get(field).is_empty(),
            Self::FlagSet { field } => record.get(field).as_flag() == Some(true),
            Self::All(inner) => inner.iter().all(|p| p.evaluate(record)),
            Self::Any(inner) => inner.iter().any(|p| p.evaluate(record)),
        }
    }

    /// Specificity of the predicate: the number of atomic conditions a
    /// matching record is guaranteed to satisfy.
    ///
    /// `All` sums its arms; `Any` counts as its weakest arm, since a match
    /// only guarantees that one.
    pub fn specificity(&self) -> usize {
        match self {
            Self::Equals { .. } | Self::NotEmpty { .. } | Self::IsEmpty { .. } | Self::FlagSet { .. } => 1,
            Self::All(inner) => inner.iter().map(Predicate::specificity).sum(),
            Self::Any(inner) => inner.iter().map(Predicate::specificity).min().unwrap_or(0),
        }
    }

    /// Collect the names of all fields this predicate inspects.
    pub fn referenced_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Equals { field, .. }
            | Self::NotEmpty { field }
            | Self::IsEmpty { field }
            | Self::FlagSet { field } => {
                out.insert(field.clone());
            }
            Self::All(inner) | Self::Any(inner) => {
                for p in inner {
                    p.referenced_fields(out);
                }
            }
        }
    }
}

// ============================================================================
// ConditionalRule
// ============================================================================

/// A requiredness override that applies while its predicate holds.
#[derive(Debug, Clone)]
pub struct ConditionalRule {
    /// Condition over the record.
    pub when: Predicate,
    /// Requirement that applies while the condition holds.
    pub then: Requirement,
}

// ============================================================================
// FieldKind
// ============================================================================

/// The shape and static constraints of one field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Free-form text, optionally constrained by a pattern.
    Text {
        /// Pattern the complete value must match, if any.
        pattern: Option<regex::Regex>,
    },
    /// Whole number within optional inclusive bounds.
    Integer {
        /// Minimum acceptable value.
        min: Option<i64>,
        /// Maximum acceptable value.
        max: Option<i64>,
    },
    /// Decimal number within optional inclusive bounds.
    Decimal {
        /// Minimum acceptable value.
        min: Option<f64>,
        /// Maximum acceptable value.
        max: Option<f64>,
    },
    /// Boolean toggle.
    Flag,
    /// Calendar date.
    Date,
    /// One of a fixed option set.
    Choice {
        /// The acceptable values.
        options: Vec<String>,
    },
    /// A reference into a lookup kind (selected from fetched options).
    Reference {
        /// Lookup kind the reference points into.
        kind: String,
    },
}

// ============================================================================
// FieldDescriptor
// ============================================================================

/// Static definition of one record field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    label: String,
    kind: FieldKind,
    base: Requirement,
    rules: Vec<ConditionalRule>,
    unique_kind: Option<String>,
}

impl FieldDescriptor {
    /// Create a descriptor with an explicit kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            base: Requirement::Optional,
            rules: Vec::new(),
            unique_kind: None,
        }
    }

    /// A free-text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text { pattern: None })
    }

    /// An integer field without bounds.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer { min: None, max: None })
    }

    /// A decimal field without bounds.
    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Decimal { min: None, max: None })
    }

    /// A flag field.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Flag)
    }

    /// A date field.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// A fixed-choice field.
    pub fn choice<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Choice {
                options: options.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// A reference field into a lookup kind.
    pub fn reference(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Reference { kind: kind.into() },
        )
    }

    // =========================================================================
    // Builder Pattern Methods
    // =========================================================================

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Mark the field as unconditionally required.
    pub fn required(mut self) -> Self {
        self.base = Requirement::Required;
        self
    }

    /// Set bounds on an integer field.
    ///
    /// Has no effect on other kinds.
    pub fn with_integer_range(mut self, min: i64, max: i64) -> Self {
        if let FieldKind::Integer { min: lo, max: hi } = &mut self.kind {
            *lo = Some(min.min(max));
            *hi = Some(min.max(max));
        }
        self
    }

    /// Set bounds on a decimal field.
    ///
    /// Has no effect on other kinds.
    pub fn with_decimal_range(mut self, min: f64, max: f64) -> Self {
        if let FieldKind::Decimal { min: lo, max: hi } = &mut self.kind {
            *lo = Some(min.min(max));
            *hi = Some(min.max(max));
        }
        self
    }

    /// Constrain a text field to a pattern.
    ///
    /// Has no effect on other kinds.
    pub fn with_pattern(mut self, pattern: regex::Regex) -> Self {
        if let FieldKind::Text { pattern: slot } = &mut self.kind {
            *slot = Some(pattern);
        }
        self
    }

    /// Add a rule making the field required while the predicate holds.
    pub fn required_when(mut self, when: Predicate) -> Self {
        self.rules.push(ConditionalRule {
            when,
            then: Requirement::Required,
        });
        self
    }

    /// Add a rule making the field optional while the predicate holds.
    pub fn optional_when(mut self, when: Predicate) -> Self {
        self.rules.push(ConditionalRule {
            when,
            then: Requirement::Optional,
        });
        self
    }

    /// Declare an asynchronous uniqueness rule for this field.
    ///
    /// The value must not already exist under the given kind at the remote
    /// authority; the check runs through the engine's debounced async
    /// validation.
    pub fn unique(mut self, kind: impl Into<String>) -> Self {
        self.unique_kind = Some(kind.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The field kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// The base requirement, before conditional rules.
    pub fn base_requirement(&self) -> Requirement {
        self.base
    }

    /// The conditional rules.
    pub fn rules(&self) -> &[ConditionalRule] {
        &self.rules
    }

    /// The uniqueness kind, if this field carries an async rule.
    pub fn unique_kind(&self) -> Option<&str> {
        self.unique_kind.as_deref()
    }

    /// The requirement that applies for the given live record.
    ///
    /// Conditional rules whose predicates hold compete by specificity; the
    /// narrowest wins. Ties cannot disagree - [`SchemaBuilder::field`]
    /// rejects such rule sets at authoring time.
    pub fn effective_requirement(&self, record: &Record) -> Requirement {
        let mut winner: Option<(usize, Requirement)> = None;
        for rule in &self.rules {
            if rule.when.evaluate(record) {
                let narrowness = rule.when.specificity();
                match winner {
                    Some((best, _)) if best >= narrowness => {}
                    _ => winner = Some((narrowness, rule.then)),
                }
            }
        }
        winner.map(|(_, req)| req).unwrap_or(self.base)
    }
}

// ============================================================================
// SchemaError
// ============================================================================

/// Schema authoring errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A field with this name has already been registered.
    DuplicateField {
        /// The offending field name.
        field: String,
    },
    /// Two conditional rules of equal specificity disagree on the field's
    /// requirement. The winner would depend on registration order, which is
    /// a configuration error.
    AmbiguousRules {
        /// The offending field name.
        field: String,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateField { field } => {
                write!(f, "field '{field}' is already registered")
            }
            Self::AmbiguousRules { field } => {
                write!(
                    f,
                    "field '{field}' has conflicting conditional rules of equal specificity"
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {}

// ============================================================================
// Schema
// ============================================================================

/// The full set of field descriptors for a record.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    index: BTreeMap<String, usize>,
}

impl Schema {
    /// Look up a descriptor by field name.
    pub fn descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|i| &self.fields[*i])
    }

    /// Iterate over all descriptors in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether a field is required for the given live record.
    ///
    /// Unknown fields are never required.
    pub fn is_required(&self, name: &str, record: &Record) -> bool {
        self.descriptor(name)
            .map(|d| d.effective_requirement(record) == Requirement::Required)
            .unwrap_or(false)
    }

    /// Derive the set of currently required field names from the live record.
    pub fn required_fields(&self, record: &Record) -> BTreeSet<String> {
        let set: BTreeSet<String> = self
            .fields
            .iter()
            .filter(|d| d.effective_requirement(record) == Requirement::Required)
            .map(|d| d.name().to_string())
            .collect();
        tracing::trace!(
            target: "drover::schema",
            required = set.len(),
            total = self.fields.len(),
            "derived required-field set"
        );
        set
    }

    /// Collect all fields referenced by any conditional rule's predicate.
    ///
    /// A mutation of one of these fields can change the required-field set;
    /// mutations of other fields cannot.
    pub fn condition_inputs(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for descriptor in &self.fields {
            for rule in descriptor.rules() {
                rule.when.referenced_fields(&mut out);
            }
        }
        out
    }
}

// ============================================================================
// SchemaBuilder
// ============================================================================

/// Builder that validates descriptors as they are registered.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldDescriptor>,
    index: BTreeMap<String, usize>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field descriptor.
    ///
    /// Rejects duplicate names and ambiguous conditional rule sets (two
    /// rules of equal specificity with different requirements).
    pub fn field(&mut self, descriptor: FieldDescriptor) -> Result<&mut Self, SchemaError> {
        if self.index.contains_key(descriptor.name()) {
            return Err(SchemaError::DuplicateField {
                field: descriptor.name().to_string(),
            });
        }

        let rules = descriptor.rules();
        for (i, a) in rules.iter().enumerate() {
            for b in &rules[i + 1..] {
                if a.when.specificity() == b.when.specificity() && a.then != b.then {
                    return Err(SchemaError::AmbiguousRules {
                        field: descriptor.name().to_string(),
                    });
                }
            }
        }

        self.index
            .insert(descriptor.name().to_string(), self.fields.len());
        self.fields.push(descriptor);
        Ok(self)
    }

    /// Finish the schema.
    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
            index: self.index,
        }
    }
}
