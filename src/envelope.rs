use {
	chrono::Utc,
	serde::{Deserialize, Serialize},
	serde_json::Value,
	uuid::Uuid,
};

/// Schema identifier stamped into every envelope produced by this crate.
pub const METAMODEL: &str = "ropod-msg-schema.json";

/// Message type of the acknowledgement envelopes exchanged between peers.
pub const ACKNOWLEDGEMENT: &str = "ACKNOWLEDGEMENT";

/// The JSON envelope carried in every shout and whisper.
///
/// An envelope is uniquely addressable by its `header.msgId` across the
/// known universe; repeated arrivals of the same id within the validity
/// window are duplicates. The payload is opaque to the messaging layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
	pub header: Header,
	pub payload: Value,
}

/// Canonical envelope header.
///
/// Field names follow the wire schema, so serde renames are applied where
/// the Rust name differs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
	/// The message type, e.g. `TASK` or `ACKNOWLEDGEMENT`.
	#[serde(rename = "type")]
	pub msg_type: String,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metamodel: Option<String>,

	/// Unique message id. Messages without one cannot be ack-tracked or
	/// dedup-filtered.
	#[serde(rename = "msgId", default, skip_serializing_if = "Option::is_none")]
	pub msg_id: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<String>,

	/// Node names this message is addressed to. Absent or empty means
	/// every receiver is addressed.
	#[serde(
		rename = "receiverIds",
		default,
		skip_serializing_if = "Option::is_none"
	)]
	pub receiver_ids: Option<Vec<String>>,
}

impl Envelope {
	/// Creates an envelope of the given type with a fresh message id and
	/// the current wall-clock timestamp.
	pub fn new(msg_type: impl Into<String>, payload: Value) -> Self {
		Self {
			header: Header {
				msg_type: msg_type.into(),
				metamodel: Some(METAMODEL.to_string()),
				msg_id: Some(Uuid::new_v4().to_string()),
				timestamp: Some(Utc::now().to_rfc3339()),
				receiver_ids: None,
			},
			payload,
		}
	}

	/// Addresses the envelope to the given receivers.
	#[must_use]
	pub fn with_receivers(mut self, receivers: Vec<String>) -> Self {
		self.header.receiver_ids = Some(receivers);
		self
	}

	/// Builds the acknowledgement envelope for a received message id.
	pub fn ack_for(received_msg_id: &str) -> Self {
		Self::new(
			ACKNOWLEDGEMENT,
			serde_json::json!({ "receivedMsg": received_msg_id }),
		)
	}

	/// Parses an envelope from wire text.
	///
	/// Incoming messages are not required to be envelopes at all; anything
	/// that does not parse yields `None` and is still delivered raw to the
	/// user callback.
	pub fn parse(text: &str) -> Option<Self> {
		serde_json::from_str(text).ok()
	}

	/// Serializes the envelope to its wire form.
	pub fn to_wire(&self) -> String {
		serde_json::to_string(self).unwrap_or_default()
	}

	/// The message id, if the envelope carries one.
	pub fn msg_id(&self) -> Option<&str> {
		self.header.msg_id.as_deref()
	}

	/// Receiver node names, empty when the envelope is unaddressed.
	pub fn receivers(&self) -> &[String] {
		self.header.receiver_ids.as_deref().unwrap_or_default()
	}

	/// True when the envelope addresses the given node, either explicitly
	/// or by not naming receivers at all.
	pub fn addresses(&self, node_name: &str) -> bool {
		let receivers = self.receivers();
		receivers.is_empty() || receivers.iter().any(|r| r == node_name)
	}

	/// For acknowledgements, the id of the message being acknowledged.
	pub fn acknowledged_msg_id(&self) -> Option<&str> {
		if self.header.msg_type != ACKNOWLEDGEMENT {
			return None;
		}
		self.payload.get("receivedMsg")?.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_names_are_camel_case() {
		let env = Envelope::new("TASK", serde_json::json!({"msg": "x"}))
			.with_receivers(vec!["node2".into()]);
		let wire = env.to_wire();

		assert!(wire.contains("\"msgId\""));
		assert!(wire.contains("\"receiverIds\""));
		assert!(wire.contains("\"type\":\"TASK\""));

		let back = Envelope::parse(&wire).unwrap();
		assert_eq!(back, env);
	}

	#[test]
	fn receiver_ids_omitted_when_absent() {
		let env = Envelope::new("TASK", Value::Null);
		assert!(!env.to_wire().contains("receiverIds"));
		assert!(env.addresses("anyone"));
	}

	#[test]
	fn ack_points_back_at_received_msg() {
		let ack = Envelope::ack_for("m1");
		assert_eq!(ack.header.msg_type, ACKNOWLEDGEMENT);
		assert_eq!(ack.acknowledged_msg_id(), Some("m1"));
		assert_eq!(ack.header.metamodel.as_deref(), Some(METAMODEL));
	}

	#[test]
	fn malformed_text_parses_to_none() {
		assert!(Envelope::parse("not json").is_none());
		assert!(Envelope::parse("{\"payload\": {}}").is_none());
	}
}
