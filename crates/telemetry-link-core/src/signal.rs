//! Signal/slot system for Telemetry Link.
//!
//! A [`Signal`] owns a set of connected slots (callbacks). Emitting the signal
//! invokes every connected slot, in connection order, on the emitting thread.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Delivery Guarantees
//!
//! - Emissions are serialized: two threads emitting the same signal never
//!   interleave their slot invocations, so every slot observes emissions in
//!   one total order.
//! - Once [`Signal::disconnect`] (or [`ConnectionGuard::disconnect`]) returns,
//!   the disconnected slot is never invoked again. If another thread is in the
//!   middle of an emission, `disconnect` waits for that emission to finish.
//! - A slot may disconnect itself, or any other slot, from inside an emission.
//!   Slots disconnected that way are skipped for the rest of the emission.
//!
//! Waiting for in-flight emissions means a slot must not block on a thread
//! that is itself disconnecting from the same signal.
//!
//! # Example
//!
//! ```
//! use telemetry_link_core::Signal;
//!
//! // Create a signal that passes a string argument
//! let text_changed = Signal::<String>::new();
//!
//! // Connect a slot (closure)
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! // Emit the signal
//! text_changed.emit("Hello, World!".to_string());
//!
//! // Disconnect when done
//! text_changed.disconnect(conn_id);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use slotmap::{SlotMap, new_key_type};

use crate::error::SignalError;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

/// Internal storage for a single connection.
struct Connection<Args> {
    /// The slot function to invoke.
    slot: Arc<dyn Fn(&Args) + Send + Sync>,
    /// Cleared when the connection is removed, so snapshots taken by an
    /// in-flight emission skip it.
    live: Arc<AtomicBool>,
}

impl<Args> Clone for Connection<Args> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            live: self.live.clone(),
        }
    }
}

/// State shared between a signal and its connection guards.
struct SignalShared<Args> {
    connections: Mutex<SlotMap<ConnectionId, Connection<Args>>>,
    /// Held for the duration of every emission. Re-entrant so slots can emit
    /// or disconnect on the emitting thread.
    dispatch: ReentrantMutex<()>,
}

impl<Args> SignalShared<Args> {
    fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().remove(id);
        match removed {
            Some(connection) => {
                connection.live.store(false, Ordering::Release);
                // Wait out any emission running on another thread.
                drop(self.dispatch.lock());
                true
            }
            None => false,
        }
    }
}

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(String, i32)` for multiple arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync` and can be shared between threads. Slots run
/// on whichever thread calls [`emit`](Self::emit).
pub struct Signal<Args> {
    shared: Arc<SignalShared<Args>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SignalShared {
                connections: Mutex::new(SlotMap::with_key()),
                dispatch: ReentrantMutex::new(()),
            }),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use telemetry_link_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let connection = Connection {
            slot: Arc::new(slot),
            live: Arc::new(AtomicBool::new(true)),
        };
        self.shared.connections.lock().insert(connection)
    }

    /// Connect a slot with automatic disconnection when the guard is dropped.
    ///
    /// The guard only holds a weak reference to the signal, so it is safe to
    /// keep it around after the signal itself has been dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use telemetry_link_core::Signal;
    /// use std::sync::atomic::{AtomicI32, Ordering};
    /// use std::sync::Arc;
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
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(&self.shared),
            id,
            armed: true,
        }
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.shared.disconnect(id)
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.lock().len()
    }

    /// Emit the signal, invoking all connected slots in connection order.
    #[tracing::instrument(skip_all, target = "telemetry_link::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        let _dispatch = self.shared.dispatch.lock();

        // Snapshot so slots can connect/disconnect without deadlocking on the map.
        let snapshot: Vec<Connection<Args>> =
            self.shared.connections.lock().values().cloned().collect();
        tracing::trace!(
            target: "telemetry_link::signal",
            connection_count = snapshot.len(),
            "emitting signal"
        );

        for connection in &snapshot {
            if connection.live.load(Ordering::Acquire) {
                (connection.slot)(&args);
            }
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.shared.connections.lock().len())
            .finish()
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]. Call [`disconnect`](Self::disconnect)
/// to disconnect eagerly and observe whether the connection was still active.
pub struct ConnectionGuard<Args> {
    signal: Weak<SignalShared<Args>>,
    id: ConnectionId,
    armed: bool,
}

impl<Args> ConnectionGuard<Args> {
    /// The ID of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Disconnect now, consuming the guard.
    ///
    /// Once this returns, the slot will not be invoked again.
    pub fn disconnect(mut self) -> Result<(), SignalError> {
        self.armed = false;
        let signal = self.signal.upgrade().ok_or(SignalError::SignalDropped)?;
        if signal.disconnect(self.id) {
            Ok(())
        } else {
            Err(SignalError::InvalidConnection)
        }
    }

    /// Keep the connection alive for the signal's lifetime.
    ///
    /// Returns the raw ID for manual disconnection through the signal.
    pub fn detach(mut self) -> ConnectionId {
        self.armed = false;
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(signal) = self.signal.upgrade() {
                let _ = signal.disconnect(self.id);
            }
        }
    }
}

impl<Args> std::fmt::Debug for ConnectionGuard<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}
