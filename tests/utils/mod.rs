#![allow(unused)]

use {
	async_trait::async_trait,
	fleetlink::{
		comm::CommHandler,
		transport::{EventKind, TransportEvent},
	},
	parking_lot::Mutex,
	serde_json::json,
};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with_test_writer()
		.try_init();
}

/// Records everything the receive loop delivers, for assertions.
#[derive(Default)]
pub struct RecordingHandler {
	pub events: Mutex<Vec<TransportEvent>>,
	pub send_statuses: Mutex<Vec<(String, bool)>>,
}

impl RecordingHandler {
	pub fn message_events(&self) -> Vec<TransportEvent> {
		self
			.events
			.lock()
			.iter()
			.filter(|e| {
				matches!(e.kind, EventKind::Shout | EventKind::Whisper)
			})
			.cloned()
			.collect()
	}

	/// SHOUT/WHISPER deliveries of one message text.
	pub fn deliveries_of(&self, message: &str) -> usize {
		self
			.message_events()
			.iter()
			.filter(|e| e.message.as_deref() == Some(message))
			.count()
	}

	pub fn send_statuses(&self) -> Vec<(String, bool)> {
		self.send_statuses.lock().clone()
	}
}

#[async_trait]
impl CommHandler for RecordingHandler {
	async fn on_message(&self, event: TransportEvent) {
		self.events.lock().push(event);
	}

	async fn on_send_status(&self, msg_id: &str, success: bool) {
		self
			.send_statuses
			.lock()
			.push((msg_id.to_string(), success));
	}
}

/// A wire envelope of the given type addressed to `receivers` (none when
/// empty).
pub fn envelope(msg_type: &str, msg_id: &str, receivers: &[&str]) -> String {
	let mut header = json!({
		"type": msg_type,
		"metamodel": "ropod-msg-schema.json",
		"msgId": msg_id,
		"timestamp": "2024-01-01T00:00:00Z",
	});
	if !receivers.is_empty() {
		header["receiverIds"] = json!(receivers);
	}
	json!({ "header": header, "payload": { "msg": "test" } }).to_string()
}
