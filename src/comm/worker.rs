use {
	super::{
		CommHandler,
		Config,
		config::AckPolicy,
		queue::{AckOutcome, DedupWindow, MessageQueue, Route},
	},
	crate::{
		envelope::Envelope,
		transport::{EventKind, RawEvent, Transport, TransportEvent},
	},
	std::sync::Arc,
	tokio::time::Instant,
	tokio_util::sync::CancellationToken,
};

/// The communicator's receive loop.
///
/// A single long-running task that owns the transport poller: it parses
/// raw events, suppresses duplicates, emits and ingests acknowledgements,
/// dispatches user callbacks and drives the retransmission tick. All user
/// callbacks run on this task; user code must not block it.
pub(super) struct WorkerLoop {
	config: Arc<Config>,
	transport: Arc<dyn Transport>,
	handler: Arc<dyn CommHandler>,
	queue: Arc<MessageQueue>,
	policy: Arc<AckPolicy>,
	seen: DedupWindow,
	cancel: CancellationToken,
}

impl WorkerLoop {
	pub(super) fn spawn(
		config: Arc<Config>,
		transport: Arc<dyn Transport>,
		handler: Arc<dyn CommHandler>,
		queue: Arc<MessageQueue>,
		policy: Arc<AckPolicy>,
		cancel: CancellationToken,
	) -> tokio::task::JoinHandle<()> {
		let seen = DedupWindow::new(config.max_message_age);
		let worker = Self {
			config,
			transport,
			handler,
			queue,
			policy,
			seen,
			cancel,
		};
		tokio::spawn(worker.run())
	}

	async fn run(mut self) {
		// settle before the first callback dispatch so that construction
		// cannot race with handler invocation
		tokio::time::sleep(self.config.settle_time).await;

		loop {
			tokio::select! {
				() = self.cancel.cancelled() => {
					tracing::info!(
						node = %self.config.node_name,
						"receive loop terminating"
					);
					return;
				}

				polled = self.transport.poll(self.config.poll_interval) => {
					match polled {
						Ok(Some(frames)) => self.on_raw_event(&frames).await,
						Ok(None) => {}
						Err(e) => {
							tracing::warn!(error = %e, "transport poll failed");
						}
					}
				}
			}

			// runs on every wake, message or poll timeout alike, so
			// retransmissions are checked at least once per poll_interval
			self.tick_resends().await;
		}
	}

	async fn on_raw_event(&mut self, frames: &RawEvent) {
		let Some(event) = TransportEvent::parse(frames) else {
			tracing::warn!(?frames, "unparseable transport event");
			return;
		};

		if self.config.verbose && event.kind != EventKind::Evasive {
			tracing::info!(
				node = %self.config.node_name,
				event = %event.kind,
				peer = %event.peer,
				peer_name = %event.peer_name,
				group = event.group.as_deref().unwrap_or(""),
				message = event.message.as_deref().unwrap_or(""),
				"received event"
			);
		}

		match event.kind {
			EventKind::Shout | EventKind::Whisper => {
				self.on_message_event(event).await;
			}
			// membership events get no dedup/ack processing
			_ => self.handler.on_message(event).await,
		}
	}

	async fn on_message_event(&mut self, event: TransportEvent) {
		let envelope = event.message.as_deref().and_then(Envelope::parse);

		if let Some(msg_id) = envelope.as_ref().and_then(Envelope::msg_id) {
			if self.seen.observe(msg_id, Instant::now()) {
				tracing::debug!(msg_id, "duplicate message suppressed");
				return;
			}
		}

		if let Some(env) = &envelope {
			self.emit_ack(&event, env).await;
			if event.kind == EventKind::Whisper {
				self.ingest_ack(&event, env).await;
			}
		}

		// a malformed envelope skips ack processing but the raw event
		// still reaches the user
		self.handler.on_message(event).await;
	}

	/// Acknowledges an incoming message when its type is in
	/// `send_ack_for` and this node is among the addressed receivers.
	async fn emit_ack(&self, event: &TransportEvent, env: &Envelope) {
		let Some(msg_id) = env.msg_id() else { return };
		if !self.policy.sends_ack_for(&env.header.msg_type) {
			return;
		}
		if !env.addresses(&self.config.node_name) {
			return;
		}

		let ack = Envelope::ack_for(msg_id).to_wire();
		if let Err(e) = self.transport.whisper(&event.peer, &ack).await {
			tracing::warn!(
				error = %e,
				peer = %event.peer,
				msg_id,
				"failed to whisper acknowledgement"
			);
		}
	}

	/// Resolves an incoming acknowledgement against the resend queue.
	///
	/// The sender identity is its self-advertised `"name"` header; a peer
	/// that never set one cannot be crossed off a receiver list and its
	/// acknowledgement is dropped.
	async fn ingest_ack(&self, event: &TransportEvent, env: &Envelope) {
		let Some(orig_msg_id) = env.acknowledged_msg_id() else {
			return;
		};

		let peer_name =
			self.transport.peer_header_value(&event.peer, "name").await;
		if peer_name.is_none() {
			tracing::debug!(
				peer = %event.peer,
				orig_msg_id,
				"acknowledgement from peer without a name header"
			);
		}

		match self.queue.ingest_ack(orig_msg_id, peer_name.as_deref()) {
			AckOutcome::Resolved => {
				tracing::debug!(msg_id = orig_msg_id, "message acknowledged");
				self.handler.on_send_status(orig_msg_id, true).await;
			}
			AckOutcome::Partial => {
				tracing::debug!(
					msg_id = orig_msg_id,
					peer_name = peer_name.as_deref().unwrap_or(""),
					"receiver acknowledged, others outstanding"
				);
			}
			AckOutcome::Ignored => {}
		}
	}

	async fn tick_resends(&self) {
		let (due, failed) = self.queue.tick(Instant::now());

		for resend in due {
			tracing::debug!(msg_id = %resend.msg_id, "retransmitting");
			let result = match &resend.route {
				Route::Shout(group) => {
					self.transport.shout(group, &resend.message).await
				}
				Route::Whisper(peer) => {
					self.transport.whisper(peer, &resend.message).await
				}
			};
			if let Err(e) = result {
				tracing::warn!(
					error = %e,
					msg_id = %resend.msg_id,
					"retransmission failed"
				);
			}
		}

		for msg_id in failed {
			tracing::warn!(%msg_id, "retries exhausted, dropping message");
			self.handler.on_send_status(&msg_id, false).await;
		}
	}
}
