//! Built-in in-process implementations of the transport and store
//! capabilities, used by this crate's tests and available to component
//! authors for theirs.

mod memory;
mod store;

pub use {
	memory::{MemoryHub, MemoryTransport},
	store::MemoryStore,
};
