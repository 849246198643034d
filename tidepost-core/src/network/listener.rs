// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Frame Listeners
//!
//! Listeners declare which frames they care about with a [`FrameFilter`];
//! the registry matches every inbound frame against each filter before
//! invoking the callback, so protocols never see each other's traffic.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::envelope::{self, Opcode};

/// Callback invoked with the raw bytes of every matching frame.
pub type FrameCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Selects the inbound frames a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFilter {
    /// Every frame, including malformed ones.
    Any,
    /// Frames whose opcode byte matches.
    Opcode(Opcode),
    /// Well-formed frames with the opcode whose payload starts with `token`.
    Correlated { opcode: Opcode, token: Vec<u8> },
}

impl FrameFilter {
    /// Returns true if `frame` should be delivered to the listener.
    pub fn matches(&self, frame: &[u8]) -> bool {
        match self {
            FrameFilter::Any => true,
            FrameFilter::Opcode(opcode) => envelope::peek_opcode(frame) == Some(opcode.as_byte()),
            FrameFilter::Correlated { opcode, token } => {
                envelope::peek_opcode(frame) == Some(opcode.as_byte())
                    && envelope::payload_of(frame)
                        .is_some_and(|payload| payload.starts_with(token))
            }
        }
    }
}

struct ListenerEntry {
    id: u64,
    filter: FrameFilter,
    callback: FrameCallback,
}

/// Ordered set of frame listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<ListenerEntry>>,
}

impl ListenerRegistry {
    pub(crate) fn add(self: &Arc<Self>, filter: FrameFilter, callback: FrameCallback) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push(ListenerEntry {
            id,
            filter,
            callback,
        });
        ListenerHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        self.entries.lock().retain(|entry| entry.id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Delivers `frame` to every matching listener in registration order.
    ///
    /// Callbacks run outside the registry lock so they may add or remove
    /// listeners. A panicking callback is logged and skipped.
    pub(crate) fn dispatch(&self, frame: &[u8]) {
        let targets: Vec<(u64, FrameCallback)> = self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.filter.matches(frame))
            .map(|entry| (entry.id, entry.callback.clone()))
            .collect();

        debug!(len = frame.len(), listeners = targets.len(), "dispatching frame");

        for (id, callback) in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(frame))).is_err() {
                warn!(listener = id, "frame listener panicked");
            }
        }
    }
}

/// Registration of one frame listener.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// removes exactly this listener. Use [`detach`](Self::detach) to keep it
/// registered for the lifetime of the socket.
#[must_use = "dropping the handle unregisters the listener"]
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    /// Removes the listener.
    pub fn unsubscribe(self) {}

    /// Leaves the listener registered for as long as the socket lives.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// Channel-backed listener: matching frames are queued for [`recv`](Self::recv).
#[derive(Debug)]
pub struct FrameSubscription {
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
    _handle: ListenerHandle,
}

impl FrameSubscription {
    pub(crate) fn new(registry: &Arc<ListenerRegistry>, filter: FrameFilter) -> Self {
        let (tx, frames) = mpsc::unbounded_channel();
        let handle = registry.add(
            filter,
            Arc::new(move |frame: &[u8]| {
                let _ = tx.send(frame.to_vec());
            }),
        );
        FrameSubscription {
            frames,
            _handle: handle,
        }
    }

    /// Next matching raw frame.
    ///
    /// Pending forever while the socket lives and nothing arrives; wrap in a
    /// timeout.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.frames.recv().await
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.frames.try_recv().ok()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
