use {
	serde::{Deserialize, Serialize},
	std::collections::BTreeMap,
};

/// Sentinel monitor spec meaning "no monitor for this dependency".
pub const MONITOR_NONE: &str = "none";

/// Well-known monitor types.
pub mod monitor_types {
	pub const HEARTBEAT: &str = "heartbeat";
	pub const FUNCTIONAL: &str = "functional";
}

/// Declared dependency monitors:
/// `monitor_type -> dependency_name -> monitor_spec`.
pub type MonitorTree = BTreeMap<String, BTreeMap<String, String>>;

/// Last observed health statuses, keyed like the monitor tree with one
/// more level for the monitor spec:
/// `monitor_type -> dependency_name -> monitor_spec -> healthStatus JSON`.
///
/// Slots start out as empty strings and are filled in by the status
/// reconciler as monitor outputs appear in the store.
pub type DependStatuses =
	BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// A component specification document from the `components` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSpec {
	pub component_name: String,

	#[serde(default)]
	pub dependencies: Vec<String>,

	#[serde(default)]
	pub dependency_monitors: MonitorTree,
}

/// Splits a monitor spec `"<emitter>/<monitor>"` on the first slash.
/// `None` for specs without a slash (including the `"none"` sentinel).
pub fn split_monitor_spec(spec: &str) -> Option<(&str, &str)> {
	spec.split_once('/')
}

/// Builds the initial status tree for a declared monitor tree, with every
/// slot present and empty.
pub fn initial_statuses(monitors: &MonitorTree) -> DependStatuses {
	let mut statuses = DependStatuses::new();
	for (monitor_type, monitors) in monitors {
		let per_type = statuses.entry(monitor_type.clone()).or_default();
		for (dependency, monitor_spec) in monitors {
			per_type
				.entry(dependency.clone())
				.or_default()
				.insert(monitor_spec.clone(), String::new());
		}
	}
	statuses
}

/// Formats a dependency list for mismatch diagnostics, e.g. `[x, y]`.
pub(super) fn format_dependency_list(dependencies: &[String]) -> String {
	format!("[{}]", dependencies.join(", "))
}

/// Formats a monitor tree for mismatch diagnostics.
pub(super) fn format_monitor_tree(monitors: &MonitorTree) -> String {
	let mut out = String::from("{\n");
	for (monitor_type, monitors) in monitors {
		out.push_str(&format!("  {monitor_type}:\n  {{\n"));
		for (dependency, monitor_spec) in monitors {
			out.push_str(&format!("    {dependency}: {monitor_spec}\n"));
		}
		out.push_str("  }\n");
	}
	out.push('}');
	out
}
