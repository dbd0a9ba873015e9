//! The record under edit.
//!
//! A [`Record`] is the single source of truth for the entity being built or
//! edited by a wizard instance: a flat mapping from field names to
//! [`Value`]s, plus zero or more nested collections (e.g. the treatment
//! list of a sickness case). The record is plain data - change notification
//! and validation live in the components that own it.
//!
//! Collection entries are keyed by a stable [`EntryKey`] so duplicate
//! entries remain distinguishable and independently removable.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use slotmap::{SlotMap, new_key_type};

use crate::value::Value;

new_key_type! {
    /// Stable identity of one committed collection entry.
    pub struct EntryKey;
}

/// Whether the wizard is creating a new entity or editing an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// Building a new entity from empty defaults.
    #[default]
    Create,
    /// Editing an existing entity seeded from its current values.
    Edit,
}

/// One item inside a nested collection field.
///
/// An entry has its own field set, independent of the parent record's
/// top-level fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    values: BTreeMap<String, Value>,
}

impl Entry {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value; missing fields read as [`Value::Empty`].
    pub fn get(&self, field: &str) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.values.get(field).unwrap_or(&EMPTY)
    }

    /// Set a field value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Iterate over all set fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Convert to a JSON object for submission payloads.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// View the entry's fields as a standalone record.
    ///
    /// Entry schemas are evaluated with the same machinery as record
    /// schemas; this adapter makes an entry's own field set the record
    /// under validation.
    pub fn as_record(&self) -> Record {
        Record {
            mode: RecordMode::Create,
            values: self.values.clone(),
            collections: BTreeMap::new(),
            touched: BTreeSet::new(),
        }
    }
}

/// An ordered, keyed list of collection entries.
///
/// Entries keep their insertion order for display while removal goes
/// through the slotmap key, never through value equality.
#[derive(Debug, Clone, Default)]
pub struct EntryList {
    entries: SlotMap<EntryKey, Entry>,
    order: Vec<EntryKey>,
}

impl EntryList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its stable key.
    pub fn push(&mut self, entry: Entry) -> EntryKey {
        let key = self.entries.insert(entry);
        self.order.push(key);
        key
    }

    /// Remove an entry by key.
    ///
    /// Returns the removed entry, or `None` if the key is stale.
    pub fn remove(&mut self, key: EntryKey) -> Option<Entry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| *k != key);
        }
        removed
    }

    /// Get an entry by key.
    pub fn get(&self, key: EntryKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryKey, &Entry)> {
        self.order.iter().filter_map(|k| self.entries.get(*k).map(|e| (*k, e)))
    }

    /// Convert to a JSON array in insertion order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.iter().map(|(_, e)| e.to_json()).collect())
    }
}

/// The in-progress entity owned by one wizard instance.
#[derive(Debug, Clone, Default)]
pub struct Record {
    mode: RecordMode,
    values: BTreeMap<String, Value>,
    collections: BTreeMap<String, EntryList>,
    touched: BTreeSet<String>,
}

impl Record {
    /// Create an empty record for a new entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record seeded from an existing entity's values (edit mode).
    pub fn for_edit(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            mode: RecordMode::Edit,
            values: values.into_iter().collect(),
            collections: BTreeMap::new(),
            touched: BTreeSet::new(),
        }
    }

    /// The record's mode.
    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Get a field value; unset fields read as [`Value::Empty`].
    pub fn get(&self, field: &str) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.values.get(field).unwrap_or(&EMPTY)
    }

    /// Set a field value. Returns `true` if the value actually changed.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> bool {
        let field = field.into();
        if self.values.get(&field) == Some(&value) {
            return false;
        }
        if value == Value::Empty {
            // Keep the map sparse; an explicit Empty reads the same as absent.
            self.values.remove(&field).is_some()
        } else {
            self.values.insert(field, value);
            true
        }
    }

    /// Iterate over all set top-level fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Get the collection stored under a field, if any entries exist.
    pub fn collection(&self, field: &str) -> Option<&EntryList> {
        self.collections.get(field)
    }

    /// Get or create the collection stored under a field.
    pub fn collection_mut(&mut self, field: impl Into<String>) -> &mut EntryList {
        self.collections.entry(field.into()).or_default()
    }

    /// Iterate over all collection fields.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &EntryList)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    // =========================================================================
    // Touched tracking
    // =========================================================================

    /// Mark a field as touched so inline errors render for it.
    pub fn mark_touched(&mut self, field: impl Into<String>) {
        self.touched.insert(field.into());
    }

    /// Whether a field has been touched.
    pub fn is_touched(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    // =========================================================================
    // Payload
    // =========================================================================

    /// Convert the record to a JSON object for submission.
    ///
    /// Collections serialize as arrays of entry objects under their field
    /// name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        for (field, list) in &self.collections {
            map.insert(field.clone(), list.to_json());
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_get_set() {
        let mut record = Record::new();
        assert_eq!(*record.get("code"), Value::Empty);

        assert!(record.set("code", Value::text("PIG-001")));
        assert_eq!(record.get("code").as_text(), Some("PIG-001"));

        // Unchanged set reports no change
        assert!(!record.set("code", Value::text("PIG-001")));
    }

    #[test]
    fn test_record_set_empty_clears() {
        let mut record = Record::new();
        record.set("note", Value::text("x"));
        assert!(record.set("note", Value::Empty));
        assert_eq!(*record.get("note"), Value::Empty);
        // Clearing an already-absent field is not a change
        assert!(!record.set("note", Value::Empty));
    }

    #[test]
    fn test_record_edit_mode() {
        let record = Record::for_edit(vec![("code".to_string(), Value::text("PIG-7"))]);
        assert_eq!(record.mode(), RecordMode::Edit);
        assert_eq!(record.get("code").as_text(), Some("PIG-7"));
    }

    #[test]
    fn test_entry_list_push_remove() {
        let mut list = EntryList::new();
        let mut entry = Entry::new();
        entry.set("medication", Value::reference("m-1", "Penicillin"));

        let k1 = list.push(entry.clone());
        let k2 = list.push(entry.clone());
        assert_eq!(list.len(), 2);
        assert_ne!(k1, k2);

        // Duplicates are independently removable by key
        assert!(list.remove(k1).is_some());
        assert_eq!(list.len(), 1);
        assert!(list.get(k2).is_some());

        // Stale key is a no-op
        assert!(list.remove(k1).is_none());
    }

    #[test]
    fn test_entry_list_order_preserved() {
        let mut list = EntryList::new();
        for i in 0..3 {
            let mut entry = Entry::new();
            entry.set("n", Value::Integer(i));
            list.push(entry);
        }
        let order: Vec<i64> = list
            .iter()
            .map(|(_, e)| e.get("n").as_integer().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_touched_tracking() {
        let mut record = Record::new();
        assert!(!record.is_touched("code"));
        record.mark_touched("code");
        assert!(record.is_touched("code"));
    }

    #[test]
    fn test_record_to_json() {
        let mut record = Record::new();
        record.set("code", Value::text("PIG-1"));
        record.set("weight", Value::Integer(32));

        let mut entry = Entry::new();
        entry.set("medication", Value::reference("m-9", "Ivermectin"));
        entry.set("dose", Value::Decimal(1.5));
        record.collection_mut("treatments").push(entry);

        let json = record.to_json();
        assert_eq!(json["code"], serde_json::json!("PIG-1"));
        assert_eq!(json["weight"], serde_json::json!(32));
        assert_eq!(json["treatments"][0]["medication"], serde_json::json!("m-9"));
        assert_eq!(json["treatments"][0]["dose"], serde_json::json!(1.5));
    }
}
