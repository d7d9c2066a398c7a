#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The locally declared dependencies do not match the stored
	/// component specification. Fatal at construction.
	#[error(
		"[{component}] the component dependencies do not match the \
		 dependencies in the specification; expected {expected}"
	)]
	DependencyMismatch { component: String, expected: String },

	/// The locally declared dependency monitors do not match the stored
	/// component specification. Fatal at construction.
	#[error(
		"[{component}] the dependency monitors do not match the monitors \
		 in the specification; expected {expected}"
	)]
	MonitorMismatch { component: String, expected: String },

	/// No specification document exists for this component.
	#[error("[{component}] no specification found in {collection}")]
	SpecNotFound {
		component: String,
		collection: String,
	},

	/// The stored specification document did not have the expected shape.
	#[error("[{component}] malformed specification document: {reason}")]
	MalformedSpec { component: String, reason: String },

	/// The component entered recovery more often than allowed.
	#[error(
		"[{component}] giving up after {attempts} recovery attempts"
	)]
	RecoveryExhausted { component: String, attempts: u32 },
}
