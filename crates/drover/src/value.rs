//! Dynamic field values.
//!
//! A record under edit is a mapping from field names to [`Value`]s. The
//! variant set mirrors the input widgets a data-entry console actually
//! ships: free text, integers, decimals, checkboxes, date pickers and
//! reference selectors.

use chrono::NaiveDate;

/// The value of a single record field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value entered yet.
    #[default]
    Empty,
    /// Free-form text.
    Text(String),
    /// Whole number (counts, weights in grams, pen numbers).
    Integer(i64),
    /// Decimal number (doses, prices).
    Decimal(f64),
    /// Boolean toggle.
    Flag(bool),
    /// Calendar date, no time component.
    Date(NaiveDate),
    /// A reference to an entity selected from a lookup (id + display label).
    Reference {
        /// Identifier of the referenced entity.
        id: String,
        /// Human-readable label at selection time.
        label: String,
    },
}

impl Value {
    /// Create a text value, mapping the empty string to [`Value::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Self::Empty } else { Self::Text(s) }
    }

    /// Create a reference value.
    pub fn reference(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Reference {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Whether this value counts as "not entered" for requiredness checks.
    ///
    /// Whitespace-only text counts as empty; `Flag(false)` does not (an
    /// unchecked checkbox is a real answer).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Reference { id, .. } => id.is_empty(),
            _ => false,
        }
    }

    /// Get the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the decimal content, widening integers.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get the flag content, if this is a flag value.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the date content, if this is a date value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the referenced entity id, if this is a reference value.
    pub fn as_reference_id(&self) -> Option<&str> {
        match self {
            Self::Reference { id, .. } => Some(id),
            _ => None,
        }
    }

    /// A short name of the variant, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Flag(_) => "flag",
            Self::Date(_) => "date",
            Self::Reference { .. } => "reference",
        }
    }

    /// Convert to a JSON value for submission payloads.
    ///
    /// Dates serialize as ISO-8601 strings; references serialize as their id.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Empty => serde_json::Value::Null,
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Decimal(d) => serde_json::Value::from(*d),
            Self::Flag(b) => serde_json::Value::Bool(*b),
            Self::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Reference { id, .. } => serde_json::Value::String(id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detection() {
        assert!(Value::Empty.is_empty());
        assert!(Value::text("").is_empty());
        assert!(Value::Text("   ".to_string()).is_empty());
        assert!(!Value::text("x").is_empty());
        assert!(!Value::Flag(false).is_empty());
        assert!(!Value::Integer(0).is_empty());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::text("abc").as_text(), Some("abc"));
        assert_eq!(Value::Integer(7).as_integer(), Some(7));
        assert_eq!(Value::Integer(7).as_decimal(), Some(7.0));
        assert_eq!(Value::Decimal(2.5).as_decimal(), Some(2.5));
        assert_eq!(Value::Flag(true).as_flag(), Some(true));
        assert_eq!(Value::reference("m-1", "Penicillin").as_reference_id(), Some("m-1"));
        assert_eq!(Value::text("abc").as_integer(), None);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Empty.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Integer(3).to_json(), serde_json::json!(3));
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).to_json(),
            serde_json::json!("2024-03-09")
        );
        assert_eq!(
            Value::reference("u-2", "Ann").to_json(),
            serde_json::json!("u-2")
        );
    }
}
