use {
	super::spec::monitor_types,
	serde_json::Value,
};

/// A liveness gate for an external subsystem observed through one of the
/// declared dependency monitors.
///
/// The gate names a monitor slot and a probe that decides, from the
/// slot's last observed `healthStatus` JSON, whether the subsystem is
/// alive. See [`super::Context::await_subsystem`] for the recovery
/// protocol built on top of it.
#[derive(Debug, Clone)]
pub struct SubsystemGate {
	pub dependency: String,
	pub monitor_type: String,
	pub monitor_spec: String,
	pub probe: fn(&str) -> bool,
}

impl SubsystemGate {
	pub fn new(
		dependency: impl Into<String>,
		monitor_type: impl Into<String>,
		monitor_spec: impl Into<String>,
	) -> Self {
		Self {
			dependency: dependency.into(),
			monitor_type: monitor_type.into(),
			monitor_spec: monitor_spec.into(),
			probe: status_flag_probe,
		}
	}

	/// Replaces the default probe.
	#[must_use]
	pub fn with_probe(mut self, probe: fn(&str) -> bool) -> Self {
		self.probe = probe;
		self
	}

	/// The gate for a ROS master observed through the conventional
	/// heartbeat monitor.
	pub fn ros_master() -> Self {
		Self::new(
			"roscore",
			monitor_types::HEARTBEAT,
			"ros/ros_master_monitor",
		)
	}
}

/// Default probe: the subsystem is alive when the health status parses as
/// JSON and carries a true boolean `status` field. Empty or malformed
/// slots read as dead.
fn status_flag_probe(health: &str) -> bool {
	serde_json::from_str::<Value>(health)
		.ok()
		.and_then(|v| v.get("status")?.as_bool())
		.unwrap_or(false)
}
