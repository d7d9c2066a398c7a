use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(#[from] TransportError),

	#[error("communicator is shut down")]
	ShutDown,
}
