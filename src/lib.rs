//! Infrastructure for fleets of distributed robotic components: a
//! peer-to-peer group-messaging communicator with acknowledged delivery
//! ([`comm`]) and a fault-tolerant state-machine runtime ([`ftsm`]).
//!
//! The underlying group transport and the shared document store are
//! consumed as capability traits ([`transport::Transport`],
//! [`store::DocumentStore`]); in-process implementations for tests live
//! in [`builtin`].

pub mod comm;
pub mod envelope;
pub mod ftsm;
pub mod store;
pub mod transport;

#[cfg(feature = "test-utils")]
pub mod builtin;

pub mod prelude {
	pub use super::{
		comm::{CommHandler, Communicator},
		envelope::Envelope,
		ftsm::{Component, Ftsm, State, SubsystemGate, Transition},
		store::DocumentStore,
		transport::{EventKind, PeerId, Transport, TransportEvent},
	};
}
