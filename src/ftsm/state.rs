use {
	derive_more::Display,
	serde::{Deserialize, Serialize},
};

/// Lifecycle states of a fault-tolerant component.
///
/// Serialized at the store boundary as the lowercase string values the
/// rest of the fleet reads from the state-machine records.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
)]
pub enum State {
	#[serde(rename = "init")]
	#[display("init")]
	Init,

	#[serde(rename = "configuring")]
	#[display("configuring")]
	Configuring,

	#[serde(rename = "ready")]
	#[display("ready")]
	Ready,

	#[serde(rename = "running")]
	#[display("running")]
	Running,

	#[serde(rename = "recovering")]
	#[display("recovering")]
	Recovering,

	#[serde(rename = "stopped")]
	#[display("stopped")]
	Stopped,
}

/// Transitions returned by phase handlers to select the next state.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
)]
pub enum Transition {
	#[serde(rename = "INITIALISED")]
	#[display("INITIALISED")]
	Initialised,

	#[serde(rename = "DONE_CONFIGURING")]
	#[display("DONE_CONFIGURING")]
	DoneConfiguring,

	#[serde(rename = "RUN")]
	#[display("RUN")]
	Run,

	#[serde(rename = "RECOVER")]
	#[display("RECOVER")]
	Recover,

	#[serde(rename = "WAIT")]
	#[display("WAIT")]
	Wait,

	#[serde(rename = "CONTINUE")]
	#[display("CONTINUE")]
	Continue,

	#[serde(rename = "STOP")]
	#[display("STOP")]
	Stop,

	#[serde(rename = "RESTART")]
	#[display("RESTART")]
	Restart,

	#[serde(rename = "FAILED")]
	#[display("FAILED")]
	Failed,
}
