//! Cart Sync Engine.
//!
//! Every mutation is applied to the local [`Cart`] synchronously and then the
//! whole resulting cart is pushed to the backend in the background. Local state
//! is never rolled back when a push fails.
//!
//! # Ordering
//!
//! Each mutation bumps a revision. Pushes go through a single gate, one at a
//! time, and each one sends whatever the cart looks like *when it gets through
//! the gate*. A push whose revision is not newer than the last delivered one is
//! dropped as superseded, so the backend only ever sees this client's snapshots
//! in increasing revision order.
//!
//! ```text
//! add(7)  -> rev 1 -> push #1 ─┐
//! add(7)  -> rev 2 -> push #2 ─┤ gate: #1 sends rev 2, #2 is superseded
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use pocket_shop_core::{Cart, CartAction, CartLine, ProductId};

use crate::error::add_breadcrumb;
use crate::gateway::{CartRemote, GatewayError};

/// Errors surfaced by the sync engine. Local state is intact in every case.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Pushing a snapshot failed.
    #[error("Cart push failed at revision {revision}: {source}")]
    Push {
        revision: u64,
        #[source]
        source: GatewayError,
    },

    /// Pulling the remote snapshot failed.
    #[error("Cart pull failed: {0}")]
    Pull(#[source] GatewayError),

    /// The background push task panicked or was aborted.
    #[error("Cart push task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// The gateway failure underneath, if any.
    #[must_use]
    pub const fn gateway(&self) -> Option<&GatewayError> {
        match self {
            Self::Push { source, .. } | Self::Pull(source) => Some(source),
            Self::Task(_) => None,
        }
    }
}

/// The cart at a given revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub revision: u64,
    pub lines: Vec<CartLine>,
}

/// How far the backend lags behind local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Revision of the local cart.
    pub local_revision: u64,
    /// Last revision the backend acknowledged.
    pub acked_revision: u64,
    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// Whether the backend has acknowledged the current local cart.
    #[must_use]
    pub const fn in_sync(&self) -> bool {
        self.acked_revision >= self.local_revision
    }
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The snapshot at `revision` was delivered by this push.
    Delivered { revision: u64 },
    /// A push that ran earlier already delivered `revision`, which includes
    /// this mutation.
    Superseded { revision: u64 },
    /// The mutation did not change the cart, so nothing was sent.
    Unchanged,
}

/// Handle to the background push a mutation started.
///
/// Dropping it does not cancel the push.
#[derive(Debug)]
pub enum PendingPush {
    Spawned(JoinHandle<Result<PushOutcome, SyncError>>),
    Unchanged,
}

impl PendingPush {
    /// Wait for the push to settle.
    ///
    /// # Errors
    ///
    /// Returns the push failure, or `SyncError::Task` if the task died.
    pub async fn wait(self) -> Result<PushOutcome, SyncError> {
        match self {
            Self::Spawned(handle) => handle.await?,
            Self::Unchanged => Ok(PushOutcome::Unchanged),
        }
    }
}

#[derive(Debug, Default)]
struct CartState {
    cart: Cart,
    revision: u64,
    acked: u64,
    last_error: Option<String>,
}

struct CartSyncInner<R> {
    remote: R,
    state: Mutex<CartState>,
    /// Serializes pushes and pulls; holds the last revision the backend
    /// acknowledged through this gate.
    push_gate: tokio::sync::Mutex<u64>,
}

impl<R> CartSyncInner<R> {
    fn state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> CartSnapshot {
        let state = self.state();
        CartSnapshot {
            revision: state.revision,
            lines: state.cart.lines().to_vec(),
        }
    }
}

/// Owns the local cart and keeps the backend's copy up to date.
///
/// Cheap to clone; clones share the same cart.
pub struct CartSync<R> {
    inner: Arc<CartSyncInner<R>>,
}

impl<R> Clone for CartSync<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for CartSync<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("CartSync")
            .field("revision", &state.revision)
            .field("acked", &state.acked)
            .field("lines", &state.cart.lines().len())
            .finish_non_exhaustive()
    }
}

impl<R: CartRemote> CartSync<R> {
    /// Start with an empty cart at revision 0.
    #[must_use]
    pub fn new(remote: R) -> Self {
        Self {
            inner: Arc::new(CartSyncInner {
                remote,
                state: Mutex::new(CartState::default()),
                push_gate: tokio::sync::Mutex::new(0),
            }),
        }
    }

    /// Add one unit of `product_id` and push.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn add(&self, product_id: ProductId, unit_price: Decimal) -> PendingPush {
        self.mutate(CartAction::Add {
            product_id,
            unit_price,
        })
    }

    /// Remove one unit of `product_id` and push. Removing an absent product
    /// pushes nothing.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn remove(&self, product_id: ProductId) -> PendingPush {
        self.mutate(CartAction::Remove { product_id })
    }

    /// Empty the cart and push.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn clear(&self) -> PendingPush {
        self.mutate(CartAction::Clear)
    }

    /// Apply `action` locally, then push in the background.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn mutate(&self, action: CartAction) -> PendingPush {
        let name = action.name();
        let revision = {
            let mut state = self.inner.state();
            if !state.cart.apply(action) {
                debug!(action = name, "Cart unchanged, nothing to push");
                return PendingPush::Unchanged;
            }
            state.revision += 1;
            state.revision
        };

        debug!(action = name, revision, "Cart mutated");
        let revision_str = revision.to_string();
        add_breadcrumb("cart", name, Some(&[("revision", revision_str.as_str())]));

        PendingPush::Spawned(tokio::spawn(push_latest(Arc::clone(&self.inner))))
    }

    /// Replace the local cart with the backend's snapshot.
    ///
    /// Waits for in-flight pushes, then adopts the remote cart unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Pull` if the fetch fails; the local cart is kept.
    #[instrument(skip(self))]
    pub async fn pull(&self) -> Result<CartSnapshot, SyncError> {
        let mut last_delivered = self.inner.push_gate.lock().await;

        let lines = match self.inner.remote.fetch_cart().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Cart pull failed, keeping local cart");
                self.inner.state().last_error = Some(e.to_string());
                return Err(SyncError::Pull(e));
            }
        };

        let snapshot = {
            let mut state = self.inner.state();
            state.cart.replace(lines);
            state.revision += 1;
            state.acked = state.revision;
            state.last_error = None;
            CartSnapshot {
                revision: state.revision,
                lines: state.cart.lines().to_vec(),
            }
        };
        *last_delivered = snapshot.revision;

        debug!(
            revision = snapshot.revision,
            lines = snapshot.lines.len(),
            "Cart replaced from remote"
        );
        Ok(snapshot)
    }

    /// Push the current cart now, if the backend has not acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Push` if the push fails.
    pub async fn flush(&self) -> Result<PushOutcome, SyncError> {
        push_latest(Arc::clone(&self.inner)).await
    }

    /// The cart and its revision.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshot()
    }

    /// A copy of the local cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.state().cart.clone()
    }

    /// Revision bookkeeping and the last failure.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let state = self.inner.state();
        SyncStatus {
            local_revision: state.revision,
            acked_revision: state.acked,
            last_error: state.last_error.clone(),
        }
    }
}

/// Send the latest snapshot through the push gate.
async fn push_latest<R: CartRemote>(
    inner: Arc<CartSyncInner<R>>,
) -> Result<PushOutcome, SyncError> {
    let mut last_delivered = inner.push_gate.lock().await;

    let snapshot = inner.snapshot();
    if snapshot.revision <= *last_delivered {
        debug!(
            revision = snapshot.revision,
            delivered = *last_delivered,
            "Push superseded"
        );
        return Ok(PushOutcome::Superseded {
            revision: *last_delivered,
        });
    }

    match inner.remote.push_cart(&snapshot.lines).await {
        Ok(()) => {
            *last_delivered = snapshot.revision;
            let mut state = inner.state();
            state.acked = state.acked.max(snapshot.revision);
            state.last_error = None;
            debug!(revision = snapshot.revision, "Cart pushed");
            Ok(PushOutcome::Delivered {
                revision: snapshot.revision,
            })
        }
        Err(e) => {
            warn!(
                revision = snapshot.revision,
                error = %e,
                "Cart push failed, local cart kept"
            );
            inner.state().last_error = Some(e.to_string());
            Err(SyncError::Push {
                revision: snapshot.revision,
                source: e,
            })
        }
    }
}
