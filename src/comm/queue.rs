use {
	crate::transport::PeerId,
	core::time::Duration,
	parking_lot::Mutex,
	std::collections::HashMap,
	tokio::time::Instant,
};

/// How a tracked message was originally sent, and therefore how it is
/// retransmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Route {
	Shout(String),
	Whisper(PeerId),
}

/// A message awaiting acknowledgement.
///
/// Retransmits reuse the original wire bytes, including the original
/// message id, so late deliveries are dedup-rejected by receivers.
#[derive(Debug, Clone)]
pub(super) struct ResendEntry {
	pub message: String,
	pub route: Route,
	pub retries_left: u32,
	pub next_retry_at: Instant,
	/// Node names that still have to acknowledge. Empty means any single
	/// acknowledgement resolves the entry.
	pub outstanding: Vec<String>,
}

/// A retransmission due now, handed to the worker to send outside the
/// queue lock.
#[derive(Debug)]
pub(super) struct DueResend {
	pub msg_id: String,
	pub message: String,
	pub route: Route,
}

/// Outcome of ingesting one acknowledgement.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum AckOutcome {
	/// The entry is fully acknowledged and has been removed.
	Resolved,
	/// One receiver was crossed off; others are still outstanding.
	Partial,
	/// Unknown message id, unmatched receiver name, or unresolvable
	/// sender identity.
	Ignored,
}

/// The queue of messages awaiting acknowledgement, keyed by message id.
///
/// Enqueue happens on caller tasks (`shout`/`whisper`), ack ingestion and
/// the retransmission tick on the receive loop; one mutex serializes all
/// of it. Sends never happen under the lock.
pub(super) struct MessageQueue {
	entries: Mutex<HashMap<String, ResendEntry>>,
	resend_interval: Duration,
	num_retries: u32,
}

impl MessageQueue {
	pub fn new(resend_interval: Duration, num_retries: u32) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			resend_interval,
			num_retries,
		}
	}

	/// Starts ack-tracking a message. A re-send of an already tracked id
	/// re-arms the entry.
	pub fn track(
		&self,
		msg_id: &str,
		message: &str,
		route: Route,
		outstanding: Vec<String>,
	) {
		let entry = ResendEntry {
			message: message.to_string(),
			route,
			retries_left: self.num_retries,
			next_retry_at: Instant::now() + self.resend_interval,
			outstanding,
		};
		self.entries.lock().insert(msg_id.to_string(), entry);
	}

	/// Ingests an acknowledgement for `msg_id` from the peer advertising
	/// `peer_name`.
	///
	/// With an empty outstanding set any acknowledgement resolves the
	/// entry. Otherwise the sender must be resolvable to a node name that
	/// is still outstanding; an unresolvable sender (`None`) leaves the
	/// entry untouched.
	pub fn ingest_ack(
		&self,
		msg_id: &str,
		peer_name: Option<&str>,
	) -> AckOutcome {
		let mut entries = self.entries.lock();
		let Some(entry) = entries.get_mut(msg_id) else {
			return AckOutcome::Ignored;
		};

		if entry.outstanding.is_empty() {
			entries.remove(msg_id);
			return AckOutcome::Resolved;
		}

		let Some(name) = peer_name else {
			return AckOutcome::Ignored;
		};

		let Some(position) = entry.outstanding.iter().position(|n| n == name)
		else {
			return AckOutcome::Ignored;
		};

		entry.outstanding.remove(position);
		if entry.outstanding.is_empty() {
			entries.remove(msg_id);
			AckOutcome::Resolved
		} else {
			AckOutcome::Partial
		}
	}

	/// Collects everything due for retransmission at `now` and expires
	/// entries whose retries are spent.
	///
	/// The terminal failure for an entry fires together with its last
	/// permitted retransmission, so a message with `num_retries = n` hits
	/// the wire `n + 1` times in total before it is reported as failed.
	pub fn tick(&self, now: Instant) -> (Vec<DueResend>, Vec<String>) {
		let mut entries = self.entries.lock();
		let mut due = Vec::new();
		let mut failed = Vec::new();

		for (msg_id, entry) in entries.iter_mut() {
			if entry.next_retry_at > now {
				continue;
			}
			if entry.retries_left == 0 {
				failed.push(msg_id.clone());
				continue;
			}
			due.push(DueResend {
				msg_id: msg_id.clone(),
				message: entry.message.clone(),
				route: entry.route.clone(),
			});
			entry.next_retry_at += self.resend_interval;
			entry.retries_left -= 1;
			if entry.retries_left == 0 {
				failed.push(msg_id.clone());
			}
		}

		for msg_id in &failed {
			entries.remove(msg_id);
		}
		(due, failed)
	}

	#[cfg(test)]
	pub fn contains(&self, msg_id: &str) -> bool {
		self.entries.lock().contains_key(msg_id)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}
}

/// Duplicate-suppression window for SHOUT/WHISPER message ids, owned by
/// the receive loop.
pub(super) struct DedupWindow {
	first_seen: HashMap<String, Instant>,
	max_message_age: Duration,
}

impl DedupWindow {
	pub fn new(max_message_age: Duration) -> Self {
		Self {
			first_seen: HashMap::new(),
			max_message_age,
		}
	}

	/// Records an arrival of `msg_id` at `now`; true when the id was
	/// already seen within the validity window. Expired records are
	/// pruned on every call.
	pub fn observe(&mut self, msg_id: &str, now: Instant) -> bool {
		let max_age = self.max_message_age;
		self
			.first_seen
			.retain(|_, first_seen| *first_seen + max_age >= now);

		if self.first_seen.contains_key(msg_id) {
			return true;
		}
		self.first_seen.insert(msg_id.to_string(), now);
		false
	}
}
