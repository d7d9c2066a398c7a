use {
	super::{PeerId, RawEvent},
	derive_more::Display,
};

/// Transport event kinds.
///
/// SHOUT and WHISPER carry application messages and are subject to
/// dedup/ack processing; every other kind is membership bookkeeping and is
/// delivered to the user callback untouched.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum EventKind {
	#[display("ENTER")]
	Enter,
	#[display("EXIT")]
	Exit,
	#[display("JOIN")]
	Join,
	#[display("LEAVE")]
	Leave,
	#[display("SHOUT")]
	Shout,
	#[display("WHISPER")]
	Whisper,
	#[display("EVASIVE")]
	Evasive,
	#[display("STOP")]
	Stop,
	#[display("{_0}")]
	Other(String),
}

impl From<&str> for EventKind {
	fn from(s: &str) -> Self {
		match s {
			"ENTER" => Self::Enter,
			"EXIT" => Self::Exit,
			"JOIN" => Self::Join,
			"LEAVE" => Self::Leave,
			"SHOUT" => Self::Shout,
			"WHISPER" => Self::Whisper,
			"EVASIVE" => Self::Evasive,
			"STOP" => Self::Stop,
			other => Self::Other(other.to_string()),
		}
	}
}

/// A parsed transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
	pub kind: EventKind,
	pub peer: PeerId,
	pub peer_name: String,
	/// Group the event relates to. Absent for WHISPER, ENTER and EXIT.
	pub group: Option<String>,
	/// Message text for SHOUT and WHISPER.
	pub message: Option<String>,
}

impl TransportEvent {
	/// Parses a raw frame sequence into a structured event.
	///
	/// Frame layouts:
	/// - SHOUT:   `[event, peer, name, group, message]`
	/// - WHISPER: `[event, peer, name, message]` (no group frame)
	/// - JOIN/LEAVE: `[event, peer, name, group]`
	/// - ENTER/EXIT/EVASIVE/STOP: `[event, peer, name, ..]`
	///
	/// Returns `None` when the mandatory `event`, `peer` and `name`
	/// frames are missing.
	pub fn parse(frames: &RawEvent) -> Option<Self> {
		let mut frames = frames.iter();
		let kind = EventKind::from(frames.next()?.as_str());
		let peer = PeerId::new(frames.next()?.clone());
		let peer_name = frames.next()?.clone();

		let (group, message) = match kind {
			EventKind::Shout => {
				(frames.next().cloned(), frames.next().cloned())
			}
			// WHISPER has no group frame; the next frame is the message.
			EventKind::Whisper => (None, frames.next().cloned()),
			EventKind::Join | EventKind::Leave => (frames.next().cloned(), None),
			_ => (None, None),
		};

		Some(Self {
			kind,
			peer,
			peer_name,
			group,
			message,
		})
	}
}
