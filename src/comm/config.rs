use {core::time::Duration, derive_builder::Builder, parking_lot::Mutex};

/// Configuration options for a communicator node.
#[derive(Debug, Clone, Builder, PartialEq)]
#[builder(pattern = "owned", setter(prefix = "with"), derive(Debug, Clone))]
#[builder_struct_attr(doc(hidden))]
pub struct Config {
	/// Human-readable node name advertised to peers in the `"name"`
	/// header and used for receiver filtering.
	#[builder(setter(into))]
	pub node_name: String,

	/// Groups joined when the node starts.
	#[builder(default = "Vec::new()")]
	pub groups: Vec<String>,

	/// Message types this node expects acknowledgements for. Shouting or
	/// whispering one of these enqueues it for ack-tracked retransmission.
	/// Adjustable at runtime via `Communicator::set_expect_ack_for`.
	#[builder(default = "Vec::new()")]
	pub expect_ack_for: Vec<String>,

	/// Message types this node acknowledges when it receives them.
	/// Adjustable at runtime via `Communicator::set_send_ack_for`.
	#[builder(default = "Vec::new()")]
	pub send_ack_for: Vec<String>,

	/// Network interface the transport binds to; the transport picks one
	/// when unset.
	#[builder(default = "None", setter(strip_option, into))]
	pub interface: Option<String>,

	/// Extra peer headers advertised before the node starts.
	#[builder(default = "Vec::new()")]
	pub headers: Vec<(String, String)>,

	/// Log every received event except EVASIVE.
	#[builder(default = "false")]
	pub verbose: bool,

	/// Interval between retransmissions of an unacknowledged message.
	#[builder(default = "Duration::from_secs(5)")]
	pub resend_interval: Duration,

	/// Number of retransmissions before a tracked message is dropped and
	/// reported as failed.
	#[builder(default = "5")]
	pub num_retries: u32,

	/// Window within which a repeated message id is a duplicate. Must
	/// exceed `resend_interval * num_retries` so a receiver that already
	/// acknowledged can still reject late retransmissions.
	#[builder(default = "Duration::from_secs(30)")]
	pub max_message_age: Duration,

	/// Timeout of one transport poll; also the cadence at which the
	/// retransmission queue is checked when no events arrive.
	#[builder(default = "Duration::from_secs(1)")]
	pub poll_interval: Duration,

	/// Settle pause after starting the transport node and before the
	/// first callback dispatch.
	#[builder(default = "Duration::from_millis(500)")]
	pub settle_time: Duration,
}

impl Config {
	/// Creates a new config builder with default values.
	pub fn builder() -> ConfigBuilder {
		ConfigBuilder::default()
	}
}

/// The two independent acknowledgement allow-lists, adjustable while the
/// node runs.
pub(super) struct AckPolicy {
	expect: Mutex<Vec<String>>,
	send: Mutex<Vec<String>>,
}

impl AckPolicy {
	pub fn new(config: &Config) -> Self {
		Self {
			expect: Mutex::new(config.expect_ack_for.clone()),
			send: Mutex::new(config.send_ack_for.clone()),
		}
	}

	pub fn expects_ack_for(&self, msg_type: &str) -> bool {
		self.expect.lock().iter().any(|t| t == msg_type)
	}

	pub fn sends_ack_for(&self, msg_type: &str) -> bool {
		self.send.lock().iter().any(|t| t == msg_type)
	}

	pub fn set_expect(&self, types: Vec<String>) {
		*self.expect.lock() = types;
	}

	pub fn set_send(&self, types: Vec<String>) {
		*self.send.lock() = types;
	}
}
