//! Capability interface over the shared document store.
//!
//! The lifecycle runtime reads component specifications and monitor
//! statuses from, and publishes state-machine states to, a document store
//! addressed by database, collection and a single key/value selector.
//! An in-process implementation for tests lives in [`crate::builtin`].

use {async_trait::async_trait, serde_json::Value};

/// Default database name for the fleet-wide store.
pub const DEFAULT_DB: &str = "robot_store";

/// Default port of the store backend.
pub const DEFAULT_PORT: u16 = 27017;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	/// The backend could not be reached or rejected the operation.
	/// Transient from the runtime's point of view: callers log and retry.
	#[error("store backend error: {0}")]
	Backend(String),
}

/// Find-one / replace-one access to named collections.
///
/// Each background task owns its own handle to avoid contention, so
/// implementations must be cheaply cloneable behind `Arc`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// Returns the first document in `collection` whose `key` field equals
	/// `value`, or `None` when no such document exists.
	async fn find_one(
		&self,
		db: &str,
		collection: &str,
		key: &str,
		value: &str,
	) -> Result<Option<Value>, StoreError>;

	/// Replaces the first document matching the selector with
	/// `replacement`. Never inserts; replacing an absent document is a
	/// no-op.
	async fn replace_one(
		&self,
		db: &str,
		collection: &str,
		key: &str,
		value: &str,
		replacement: Value,
	) -> Result<(), StoreError>;
}
