//! Cluster-wide sold-out flags with watch notifications.
//!
//! The coordination service is a hierarchical, watchable key/value store used
//! as a black box. One node per product records the cluster's last known
//! sold-out decision:
//!
//! - **existence** means "some process observed exhaustion for this product"
//! - **value** is `true` (sold out) or `false` (a process retracted it after a
//!   failed commit)
//!
//! # Watch Semantics
//!
//! Watches are one-shot and belong to the session (process) that armed them:
//!
//! ```text
//! exists(id, watch = true)   arms a watch on /{prefix}/{id}
//!         │
//!         ▼
//! node created or value set  ──► one FlagEvent to this session's subscribers
//!         │
//!         ▼
//! watch disarmed             ──► re-arm with another exists(id, true)
//! ```
//!
//! Delivery is asynchronous and best effort. No ordering is guaranteed between
//! a flag write and another process observing the event.

use crate::error::CoordinationError;
use crate::types::ProductId;
use crate::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Result of an idempotent create.
///
/// Two processes can both observe a missing node and both try to create it;
/// the loser gets [`CreateOutcome::AlreadyExists`], which callers treat as
/// success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call created the node.
    Created,
    /// The node was already there; its value was left untouched.
    AlreadyExists,
}

/// What happened to a watched flag node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagEventKind {
    /// The node was created.
    Created,
    /// The node's value was overwritten.
    ValueChanged,
}

/// Notification delivered to a session that had armed a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEvent {
    /// Product whose flag changed
    pub product_id: ProductId,
    /// Kind of change
    pub kind: FlagEventKind,
    /// Flag value after the change
    pub value: bool,
}

impl FlagEvent {
    /// Returns `true` if this event retracts a sold-out decision.
    #[must_use]
    pub const fn is_retraction(&self) -> bool {
        !self.value
    }
}

/// Cluster-wide coordination of sold-out flags.
///
/// Every process holds its own session (its own implementation instance);
/// nodes are shared, watches are per session.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the orchestrator can hold an
/// `Arc<dyn CoordinationService>`.
pub trait CoordinationService: Send + Sync {
    /// Check whether the flag node exists.
    ///
    /// With `watch = true` this also arms a one-shot watch on the node for the
    /// calling session, whether or not the node exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError`] if the service fails.
    fn exists(
        &self,
        product_id: ProductId,
        watch: bool,
    ) -> BoxFuture<'_, Result<bool, CoordinationError>>;

    /// Create the flag node with an initial value.
    ///
    /// A node that already exists is reported as
    /// [`CreateOutcome::AlreadyExists`], never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError`] if the service fails.
    fn create(
        &self,
        product_id: ProductId,
        value: bool,
    ) -> BoxFuture<'_, Result<CreateOutcome, CoordinationError>>;

    /// Overwrite the value of an existing flag node.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::NoNode`] if the node does not exist, or
    /// another [`CoordinationError`] if the service fails.
    fn set_value(
        &self,
        product_id: ProductId,
        value: bool,
    ) -> BoxFuture<'_, Result<(), CoordinationError>>;

    /// Read the flag value, `None` if the node does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError`] if the service fails.
    fn get_value(
        &self,
        product_id: ProductId,
    ) -> BoxFuture<'_, Result<Option<bool>, CoordinationError>>;

    /// Receive the watch notifications delivered to this session.
    fn subscribe(&self) -> broadcast::Receiver<FlagEvent>;
}
