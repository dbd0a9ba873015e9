//! Property system for Drover.
//!
//! This module provides reactive properties with change detection.
//! Properties are the data backbone of the signal/slot system - when a
//! property changes, the owning component emits a signal to notify
//! interested parties.
//!
//! # Example
//!
//! ```
//! use drover_core::{Property, Signal};
//!
//! struct Cursor {
//!     index: Property<usize>,
//!     index_changed: Signal<usize>,
//! }
//!
//! impl Cursor {
//!     fn new() -> Self {
//!         Self {
//!             index: Property::new(0),
//!             index_changed: Signal::new(),
//!         }
//!     }
//!
//!     fn set_index(&self, index: usize) {
//!         if self.index.set(index) {
//!             self.index_changed.emit(index);
//!         }
//!     }
//! }
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A reactive property that tracks changes.
///
/// `Property<T>` wraps a value and provides change detection. When `set()`
/// is called, it compares the new value with the current one and returns
/// whether the value actually changed. This enables efficient change
/// notification.
///
/// # Thread Safety
///
/// `Property<T>` uses interior mutability with `RwLock` and is
/// `Send + Sync` when `T` is.
///
/// # Example
///
/// ```
/// use drover_core::Property;
///
/// let prop = Property::new(42);
/// assert_eq!(prop.get(), 42);
///
/// // Setting same value returns false (no change)
/// assert!(!prop.set(42));
///
/// // Setting different value returns true (changed)
/// assert!(prop.set(100));
/// assert_eq!(prop.get(), 100);
/// ```
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change notification.
    ///
    /// This is useful during initialization or batch updates where you
    /// want to defer notifications.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    ///
    /// This compares the new value with the current one using `PartialEq`.
    /// If they are equal, the value is not updated and `false` is returned.
    ///
    /// The caller should emit the associated notification signal when this
    /// returns `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            let old = std::mem::replace(&mut *current, value);
            Some(old)
        } else {
            None
        }
    }
}

impl<T: Clone> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

/// A read-only view of a property.
///
/// This provides read access without the ability to modify the underlying
/// value. Useful for exposing properties publicly while keeping the setter
/// private.
pub struct ReadOnlyProperty<'a, T> {
    inner: &'a Property<T>,
}

impl<'a, T: Clone> ReadOnlyProperty<'a, T> {
    /// Create a read-only view of a property.
    pub fn new(property: &'a Property<T>) -> Self {
        Self { inner: property }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Access the value through a closure.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.with(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_get_set() {
        let prop = Property::new(10);
        assert_eq!(prop.get(), 10);

        assert!(prop.set(20));
        assert_eq!(prop.get(), 20);
    }

    #[test]
    fn test_property_set_unchanged() {
        let prop = Property::new("same".to_string());
        assert!(!prop.set("same".to_string()));
        assert!(prop.set("different".to_string()));
    }

    #[test]
    fn test_property_replace() {
        let prop = Property::new(1);
        assert_eq!(prop.replace(2), Some(1));
        assert_eq!(prop.replace(2), None);
        assert_eq!(prop.get(), 2);
    }

    #[test]
    fn test_property_with() {
        let prop = Property::new(vec![1, 2, 3]);
        let len = prop.with(|v| v.len());
        assert_eq!(len, 3);
    }

    #[test]
    fn test_property_set_silent() {
        let prop = Property::new(1);
        prop.set_silent(5);
        assert_eq!(prop.get(), 5);
    }

    #[test]
    fn test_read_only_view() {
        let prop = Property::new(7);
        let view = ReadOnlyProperty::new(&prop);
        assert_eq!(view.get(), 7);
        assert_eq!(view.with(|v| v + 1), 8);
    }
}
