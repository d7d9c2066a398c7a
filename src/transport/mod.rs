//! Capability interface over the underlying group transport.
//!
//! The messaging layer never talks to a concrete transport directly; it
//! consumes this trait, which covers peer discovery, group membership,
//! broadcast (shout), unicast (whisper) and polled event receive. An
//! in-process implementation for tests lives in [`crate::builtin`].

use {
	async_trait::async_trait,
	core::time::Duration,
	derive_more::{Deref, Display, From, Into},
	serde::{Deserialize, Serialize},
};

mod event;

pub use event::{EventKind, TransportEvent};

/// Opaque transport-assigned identifier for a live peer.
///
/// Distinct from the human node name a peer advertises in its `"name"`
/// header: receiver filtering uses node names, ack delivery uses peer ids.
#[derive(
	Debug,
	Clone,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	Deref,
	Display,
	From,
	Into,
)]
pub struct PeerId(String);

impl PeerId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}
}

impl From<&str> for PeerId {
	fn from(s: &str) -> Self {
		Self::new(s)
	}
}

/// A raw transport event as a sequence of string frames.
///
/// Frame layout depends on the event kind; notably WHISPER carries no
/// group frame. [`TransportEvent::parse`] accounts for the field shift.
pub type RawEvent = Vec<String>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
	#[error("transport node is not started")]
	NotStarted,

	#[error("transport node is already started")]
	AlreadyStarted,

	#[error("unknown peer: {0}")]
	UnknownPeer(PeerId),

	#[error("transport send failed: {0}")]
	Send(String),
}

/// The transport capability consumed by the communicator.
///
/// Implementations are expected to preserve per-sender send order on the
/// wire per group/peer; no ordering is guaranteed across senders. Sends
/// are best-effort and non-blocking.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Sets a peer header advertised to other peers. Headers only take
	/// effect when set before [`Transport::start`].
	async fn set_header(
		&self,
		key: &str,
		value: &str,
	) -> Result<(), TransportError>;

	/// Selects the network interface the node binds to. Only takes
	/// effect when set before [`Transport::start`].
	async fn set_interface(
		&self,
		interface: &str,
	) -> Result<(), TransportError>;

	/// Starts the node: joins the peer network and begins producing
	/// events. Must be called exactly once.
	async fn start(&self) -> Result<(), TransportError>;

	/// Joins a named group.
	async fn join(&self, group: &str) -> Result<(), TransportError>;

	/// Leaves a named group.
	async fn leave(&self, group: &str) -> Result<(), TransportError>;

	/// Broadcasts a message to all members of a group.
	async fn shout(
		&self,
		group: &str,
		message: &str,
	) -> Result<(), TransportError>;

	/// Unicasts a message to a specific peer.
	async fn whisper(
		&self,
		peer: &PeerId,
		message: &str,
	) -> Result<(), TransportError>;

	/// Waits up to `timeout` for the next raw event. `None` on timeout.
	async fn poll(
		&self,
		timeout: Duration,
	) -> Result<Option<RawEvent>, TransportError>;

	/// Resolves a header value a peer advertised before it started, or
	/// `None` when the peer is unknown or never set the header.
	async fn peer_header_value(
		&self,
		peer: &PeerId,
		key: &str,
	) -> Option<String>;

	/// Stops the node. Idempotent.
	async fn stop(&self);
}
