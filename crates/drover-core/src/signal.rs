//! Signal/slot system for Drover.
//!
//! This module provides a type-safe signal/slot mechanism for communication
//! between form-engine components. Signals are emitted when state changes
//! (a field edit, a validation outcome, a navigation event), and connected
//! slots (callbacks) are invoked in response.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Delivery Model
//!
//! Slots are invoked directly on the emitting thread, in connection order.
//! The form engine runs on a single cooperative event loop, so there is no
//! queued delivery tier; cross-thread emission is still safe because the
//! connection table is lock-protected and slots must be `Send + Sync`.
//!
//! # Example
//!
//! ```
//! use drover_core::Signal;
//!
//! // Create a signal that passes a string argument
//! let outcome_changed = Signal::<String>::new();
//!
//! // Connect a slot (closure)
//! let conn_id = outcome_changed.connect(|field| {
//!     println!("Outcome changed for: {}", field);
//! });
//!
//! // Emit the signal
//! outcome_changed.emit("origin_detail".to_string());
//!
//! // Disconnect when done
//! outcome_changed.disconnect(conn_id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via
    /// [`Signal::disconnect`]. The ID remains valid until the connection is
    /// explicitly disconnected or the signal is dropped.
    pub struct ConnectionId;
}

/// A slot stored in the connection table.
type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// Signals are the core of the observer pattern in Drover. When a signal is
/// emitted, all connected slots are invoked with the provided arguments.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for
///   signals with no arguments, or a tuple like `(String, i32)` for
///   multiple arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync` and can be safely shared between threads.
/// Slots run on the thread that calls [`emit`](Self::emit).
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use drover_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing. This is useful
    /// during initialization or batch updates to prevent cascading
    /// notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots.
    ///
    /// If the signal is blocked, this does nothing. Slots connected or
    /// disconnected from within a slot take effect from the next emission;
    /// the connection table is snapshotted before invocation so a slot may
    /// safely call back into this signal.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: "drover_core::signal", "signal blocked, skipping emit");
            return;
        }

        // Snapshot the slots so a slot can connect/disconnect without
        // deadlocking on the connection table.
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(
            target: "drover_core::signal",
            connection_count = slots.len(),
            "emitting signal"
        );

        for slot in slots {
            slot(&args);
        }
    }

    /// Connect a slot with automatic disconnection when the guard is dropped.
    ///
    /// The guard borrows the signal, so it cannot outlive it.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard { signal: self, id }
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// This is useful for RAII-style connection management, ensuring connections
/// are cleaned up when the receiver goes out of scope. Created via
/// [`Signal::connect_scoped`].
///
/// # Example
///
/// ```
/// use drover_core::Signal;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
///
/// let signal = Signal::<i32>::new();
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42);  // counter = 42
/// }
/// signal.emit(43);  // Nothing happens - connection was dropped
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<'a, Args> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<'_, Args> {
    /// The ID of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        let _ = self.signal.disconnect(self.id);
    }
}
