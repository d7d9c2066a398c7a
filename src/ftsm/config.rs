use {
	super::spec::MonitorTree,
	crate::store::DEFAULT_DB,
	core::time::Duration,
	derive_builder::Builder,
};

/// Configuration options for a fault-tolerant state machine.
#[derive(Debug, Clone, Builder, PartialEq)]
#[builder(pattern = "owned", setter(prefix = "with"), derive(Debug, Clone))]
#[builder_struct_attr(doc(hidden))]
pub struct Config {
	/// Name of this component; also the key under which its spec and
	/// state-machine state live in the store.
	#[builder(setter(into))]
	pub component_name: String,

	/// Components this one depends on. Must equal the stored spec.
	#[builder(default = "Vec::new()")]
	pub dependencies: Vec<String>,

	/// Health monitors per dependency, grouped by monitor type. Must
	/// equal the stored spec.
	#[builder(default = "MonitorTree::new()")]
	pub dependency_monitors: MonitorTree,

	/// Recovery entries allowed before the machine gives up.
	#[builder(default = "1")]
	pub max_recovery_attempts: u32,

	/// Skip spec validation at construction.
	#[builder(default = "false")]
	pub debug: bool,

	#[builder(default = "DEFAULT_DB.to_string()", setter(into))]
	pub db_name: String,

	#[builder(default = "\"components\".to_string()", setter(into))]
	pub component_collection: String,

	#[builder(default = "\"status\".to_string()", setter(into))]
	pub status_collection: String,

	#[builder(default = "\"component_sm_states\".to_string()", setter(into))]
	pub sm_state_collection: String,

	/// Cadence of the background tasks (status reconciler, state
	/// publisher) and of the construction-time spec-read retry.
	#[builder(default = "Duration::from_millis(500)")]
	pub task_period: Duration,

	/// Cadence at which the subsystem liveness gate re-probes a monitor
	/// slot while waiting for an external subsystem to come back.
	#[builder(default = "Duration::from_millis(100)")]
	pub probe_period: Duration,
}

impl Config {
	/// Creates a new config builder with default values.
	pub fn builder() -> ConfigBuilder {
		ConfigBuilder::default()
	}
}
