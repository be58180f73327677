//! Broker connection status shared by the client, health endpoints and tasks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Notify;

use crate::metrics;

/// Connection status and reconnection coordination.
///
/// # Memory Ordering
///
/// Status flags drive control flow (who reconnects, whether readiness
/// passes), so every access is `SeqCst`.
///
/// # Reconnection Coordination
///
/// At most one task reconnects at a time. It holds a [`ReconnectGuard`];
/// everyone else waits on a `Notify` that fires when the guard drops.
#[derive(Debug)]
pub struct ConnectionState {
    connected: AtomicBool,
    reconnect_attempts: AtomicU32,
    reconnecting: AtomicBool,
    reconnect_complete: Notify,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            reconnecting: AtomicBool::new(false),
            reconnect_complete: Notify::new(),
        }
    }

    /// Record the connection status; a successful connection resets the
    /// attempt counter.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        if connected {
            self.reconnect_attempts.store(0, Ordering::SeqCst);
        }
        metrics::set_connection_status(connected);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Bump and return the attempt number of the running reconnection.
    pub fn increment_attempts(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    /// Claim the reconnection slot and start a fresh attempt count.
    ///
    /// Returns `None` if another task is already reconnecting. The slot is
    /// released, and waiters woken, when the returned guard is dropped, even
    /// if the reconnecting future is cancelled midway.
    pub fn begin_reconnect(&self) -> Option<ReconnectGuard<'_>> {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            None
        } else {
            self.reconnect_attempts.store(0, Ordering::SeqCst);
            Some(ReconnectGuard { state: self })
        }
    }

    /// Wait for an ongoing reconnection to finish.
    ///
    /// Returns immediately if none is in progress.
    pub async fn wait_for_reconnection(&self) {
        // Register before checking, or a wake-up between the two is lost
        let notified = self.reconnect_complete.notified();
        if self.is_reconnecting() {
            notified.await;
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to reconnect. Releases the slot on drop.
#[derive(Debug)]
pub struct ReconnectGuard<'a> {
    state: &'a ConnectionState,
}

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.state.reconnecting.store(false, Ordering::SeqCst);
        self.state.reconnect_complete.notify_waiters();
    }
}
