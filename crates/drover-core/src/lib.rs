//! Core systems for Drover.
//!
//! This crate provides the foundational components shared by the Drover
//! form-engine crates:
//!
//! - **Signal/Slot System**: Type-safe change notification between components
//! - **Property System**: Reactive values with change detection
//! - **Logging Targets**: Per-subsystem `tracing` target constants
//!
//! # Signal/Slot Example
//!
//! ```
//! use drover_core::Signal;
//!
//! // Create a signal that notifies when a field changes
//! let field_changed = Signal::<String>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = field_changed.connect(|name| {
//!     println!("Field changed: {}", name);
//! });
//!
//! // Emit the signal
//! field_changed.emit("ear_tag".to_string());
//!
//! // Disconnect when done
//! field_changed.disconnect(conn_id);
//! ```
//!
//! # Property Example
//!
//! ```
//! use drover_core::{Property, Signal};
//!
//! // A reactive counter with change notification
//! struct StepCursor {
//!     index: Property<usize>,
//!     index_changed: Signal<usize>,
//! }
//!
//! impl StepCursor {
//!     fn new() -> Self {
//!         Self {
//!             index: Property::new(0),
//!             index_changed: Signal::new(),
//!         }
//!     }
//!
//!     fn move_to(&self, index: usize) {
//!         if self.index.set(index) {
//!             self.index_changed.emit(index);
//!         }
//!     }
//! }
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use property::{Property, ReadOnlyProperty};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
