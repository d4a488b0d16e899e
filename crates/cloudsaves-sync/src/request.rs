//! Request lifecycle tracking
//!
//! A [`RequestTracker`] owns the single storage request a sync run has in
//! flight. It spawns the request on the Tokio runtime, delivers its
//! completion (and any progress reports) back to the owner, and can
//! force-terminate it.
//!
//! ## Design Notes
//!
//! - Every issued request is tagged with a fresh [`Generation`]. Force
//!   termination advances the generation as well, so a completion that raced
//!   with termination and is already queued is recognised as stale and
//!   dropped instead of acting on state that has since been reset.
//! - A request delivers at most one completion. After it, the tracker is idle
//!   and the next request may be issued.
//! - [`RequestTracker::next`] only awaits the channel receiver, so it is
//!   cancel-safe and can be used inside `tokio::select!`.

use std::fmt::{self, Display, Formatter};
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

// ============================================================================
// Operation
// ============================================================================

/// Kind of storage request issued by a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// List the remote sync folder
    ListDirectory,
    /// Create the remote sync folder
    CreateDirectory,
    /// Download one file by ID
    Download,
    /// Upload one file
    Upload,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ListDirectory => "list directory",
            Self::CreateDirectory => "create remote directory",
            Self::Download => "download a file",
            Self::Upload => "upload a file",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Monotonic tag attached to every issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation following this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// Something a tracked request reported back
#[derive(Debug)]
pub enum Delivery<T> {
    /// Transfer progress of the in-flight request
    Progress { received: u64, total: u64 },
    /// The request's single terminal result
    Completed(T),
}

struct Tagged<T> {
    generation: Generation,
    delivery: Delivery<T>,
}

// ============================================================================
// RequestTracker
// ============================================================================

/// Owner of the single in-flight request of a sync run
pub struct RequestTracker<T> {
    generation: Generation,
    in_flight: Option<(Operation, AbortHandle)>,
    tx: mpsc::UnboundedSender<Tagged<T>>,
    rx: mpsc::UnboundedReceiver<Tagged<T>>,
}

impl<T: Send + 'static> RequestTracker<T> {
    /// Create an idle tracker
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            generation: Generation::default(),
            in_flight: None,
            tx,
            rx,
        }
    }

    /// Generation of the most recently issued (or terminated) request
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The operation currently in flight, if any
    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight.as_ref().map(|(operation, _)| *operation)
    }

    /// Spawn `request` and track it as the in-flight request
    ///
    /// Must be called from within a Tokio runtime. Issuing while another
    /// request is still in flight terminates the older one first.
    pub fn issue<F>(&mut self, operation: Operation, request: F) -> Generation
    where
        F: Future<Output = T> + Send + 'static,
    {
        if let Some(previous) = self.in_flight() {
            warn!(%previous, next = %operation, "Issuing over an in-flight request");
            self.finish();
        }

        self.generation = self.generation.next();
        let generation = self.generation;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let result = request.await;
            // The receiver lives as long as the tracker; a send error only
            // means the tracker is gone.
            let _ = tx.send(Tagged {
                generation,
                delivery: Delivery::Completed(result),
            });
        });

        debug!(%operation, %generation, "Request issued");
        self.in_flight = Some((operation, handle.abort_handle()));
        generation
    }

    /// Progress sink bound to the generation of the next issued request
    ///
    /// Call right before [`RequestTracker::issue`] and hand the sink to the
    /// request being issued.
    pub fn progress_sink(&self) -> impl Fn(u64, u64) + Send + Sync + 'static {
        let generation = self.generation.next();
        let tx = self.tx.clone();
        move |received, total| {
            let _ = tx.send(Tagged {
                generation,
                delivery: Delivery::Progress { received, total },
            });
        }
    }

    /// Force-terminate the in-flight request
    ///
    /// Nothing from the terminated request is delivered afterwards, even a
    /// completion that is already queued. Returns the terminated operation.
    ///
    /// Aborting only stops the task at its next await point. A blocking
    /// filesystem call the runtime already handed to its blocking pool runs
    /// to completion after this returns, so storage adapters must not write
    /// to a download's final path before the transfer is complete.
    pub fn finish(&mut self) -> Option<Operation> {
        self.generation = self.generation.next();
        let (operation, handle) = self.in_flight.take()?;
        handle.abort();
        debug!(%operation, generation = %self.generation, "Request terminated");
        Some(operation)
    }

    /// Wait for the next delivery of the in-flight request
    ///
    /// Returns `None` immediately when no request is in flight.
    pub async fn next(&mut self) -> Option<Delivery<T>> {
        loop {
            self.in_flight.as_ref()?;
            let tagged = self.rx.recv().await?;
            if tagged.generation != self.generation {
                debug!(
                    stale = %tagged.generation,
                    current = %self.generation,
                    "Dropping stale delivery"
                );
                continue;
            }
            if matches!(tagged.delivery, Delivery::Completed(_)) {
                self.in_flight = None;
            }
            return Some(tagged.delivery);
        }
    }
}

impl<T: Send + 'static> Default for RequestTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RequestTracker<T> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.in_flight.take() {
            handle.abort();
        }
    }
}
