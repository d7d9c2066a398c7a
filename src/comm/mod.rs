//! Peer-to-peer group messaging with acknowledged delivery.
//!
//! A [`Communicator`] wraps an unreliable broadcast/whisper transport and
//! adds acknowledgement-based retransmission, duplicate suppression and
//! receiver filtering. Delivery is at-least-once; idempotence is achieved
//! at the application level through message ids.
//!
//! Two independent type allow-lists drive the acknowledgement machinery:
//! message types in [`Config::expect_ack_for`] are tracked for
//! retransmission when sent, message types in [`Config::send_ack_for`]
//! are acknowledged when received.

use {
	config::AckPolicy,
	crate::{
		envelope::Envelope,
		transport::{PeerId, Transport, TransportEvent},
	},
	async_trait::async_trait,
	parking_lot::Mutex,
	queue::{MessageQueue, Route},
	std::sync::Arc,
	tokio_util::sync::{CancellationToken, DropGuard},
	worker::WorkerLoop,
};

mod config;
mod error;
mod queue;
mod worker;

pub use {
	config::{Config, ConfigBuilder, ConfigBuilderError},
	error::Error,
};

/// User hooks invoked by the receive loop.
///
/// Both callbacks run on the receive-loop task; implementations must not
/// block it.
#[async_trait]
pub trait CommHandler: Send + Sync {
	/// Called for every transport event, including membership events.
	async fn on_message(&self, event: TransportEvent);

	/// Called exactly once per ack-tracked message: `true` when the
	/// message was acknowledged, `false` when its retries were exhausted.
	async fn on_send_status(&self, msg_id: &str, success: bool);
}

/// A started communicator node.
///
/// Cloning is cheap and shares the underlying node. Dropping the last
/// clone aborts the receive loop; for an orderly exit that leaves all
/// joined groups and stops the transport, call [`Communicator::shutdown`].
#[derive(Clone)]
pub struct Communicator {
	inner: Arc<Inner>,
}

struct Inner {
	config: Arc<Config>,
	transport: Arc<dyn Transport>,
	queue: Arc<MessageQueue>,
	policy: Arc<AckPolicy>,
	groups: Mutex<Vec<String>>,
	cancel: CancellationToken,
	_worker: tokio::task::JoinHandle<()>,
	_abort: DropGuard,
}

impl Communicator {
	/// Builds and starts a communicator node: advertises the `"name"` and
	/// `"uuid"` peer headers plus any configured extras, starts the
	/// transport, joins the configured groups and spawns the receive
	/// loop.
	///
	/// The `"name"` header is what other peers use to cross this node off
	/// a receiver list, so it is owned by the library rather than left to
	/// the caller.
	pub async fn start(
		config: Config,
		transport: Arc<dyn Transport>,
		handler: Arc<dyn CommHandler>,
	) -> Result<Self, Error> {
		if config.resend_interval * config.num_retries >= config.max_message_age
		{
			tracing::warn!(
				node = %config.node_name,
				"resend_interval * num_retries should stay below \
				 max_message_age; late retransmissions may escape dedup"
			);
		}

		transport.set_header("name", &config.node_name).await?;
		transport
			.set_header("uuid", &uuid::Uuid::new_v4().to_string())
			.await?;
		for (key, value) in &config.headers {
			transport.set_header(key, value).await?;
		}
		if let Some(interface) = &config.interface {
			transport.set_interface(interface).await?;
		}

		transport.start().await?;
		tokio::time::sleep(config.settle_time).await;

		let mut groups = Vec::new();
		for group in &config.groups {
			transport.join(group).await?;
			groups.push(group.clone());
		}

		let config = Arc::new(config);
		let policy = Arc::new(AckPolicy::new(&config));
		let queue = Arc::new(MessageQueue::new(
			config.resend_interval,
			config.num_retries,
		));
		let cancel = CancellationToken::new();
		let worker = WorkerLoop::spawn(
			Arc::clone(&config),
			Arc::clone(&transport),
			handler,
			Arc::clone(&queue),
			Arc::clone(&policy),
			cancel.child_token(),
		);

		tracing::info!(node = %config.node_name, "communicator started");

		Ok(Self {
			inner: Arc::new(Inner {
				config,
				transport,
				queue,
				policy,
				groups: Mutex::new(groups),
				cancel: cancel.clone(),
				_worker: worker,
				_abort: cancel.drop_guard(),
			}),
		})
	}

	pub fn node_name(&self) -> &str {
		&self.inner.config.node_name
	}

	pub fn joined_groups(&self) -> Vec<String> {
		self.inner.groups.lock().clone()
	}

	/// Number of messages currently awaiting acknowledgement.
	pub fn pending_acks(&self) -> usize {
		self.inner.queue.len()
	}

	/// Replaces the set of message types this node expects
	/// acknowledgements for.
	pub fn set_expect_ack_for(&self, types: Vec<String>) {
		self.inner.policy.set_expect(types);
	}

	/// Replaces the set of message types this node acknowledges when it
	/// receives them.
	pub fn set_send_ack_for(&self, types: Vec<String>) {
		self.inner.policy.set_send(types);
	}

	/// Broadcasts a message to every joined group.
	pub async fn shout(&self, message: &str) -> Result<(), Error> {
		let groups = self.joined_groups();
		self.shout_to_groups(message, &groups).await
	}

	/// Broadcasts a message to one group.
	pub async fn shout_to(
		&self,
		message: &str,
		group: &str,
	) -> Result<(), Error> {
		self.ensure_live()?;
		self.track_if_expected(message, Route::Shout(group.to_string()));
		self.inner.transport.shout(group, message).await?;
		Ok(())
	}

	/// Broadcasts a message to several groups.
	///
	/// An ack-tracked message is queued once, keyed by its message id;
	/// retransmissions go to the first group.
	pub async fn shout_to_groups(
		&self,
		message: &str,
		groups: &[String],
	) -> Result<(), Error> {
		self.ensure_live()?;
		if let Some(first) = groups.first() {
			self.track_if_expected(message, Route::Shout(first.clone()));
		}
		for group in groups {
			self.inner.transport.shout(group, message).await?;
		}
		Ok(())
	}

	/// Unicasts a message to one peer.
	pub async fn whisper(
		&self,
		message: &str,
		peer: &PeerId,
	) -> Result<(), Error> {
		self.ensure_live()?;
		self.track_if_expected(message, Route::Whisper(peer.clone()));
		self.inner.transport.whisper(peer, message).await?;
		Ok(())
	}

	/// Unicasts a message to several peers, tracked once against the
	/// first.
	pub async fn whisper_to_peers(
		&self,
		message: &str,
		peers: &[PeerId],
	) -> Result<(), Error> {
		self.ensure_live()?;
		if let Some(first) = peers.first() {
			self.track_if_expected(message, Route::Whisper(first.clone()));
		}
		for peer in peers {
			self.inner.transport.whisper(peer, message).await?;
		}
		Ok(())
	}

	/// Joins a group. Joining an already joined group is a no-op.
	pub async fn join_group(&self, group: &str) -> Result<(), Error> {
		self.ensure_live()?;
		{
			let groups = self.inner.groups.lock();
			if groups.iter().any(|g| g == group) {
				tracing::warn!(
					node = %self.node_name(),
					group,
					"already joined, doing nothing"
				);
				return Ok(());
			}
		}
		self.inner.transport.join(group).await?;
		self.inner.groups.lock().push(group.to_string());
		Ok(())
	}

	/// Leaves a group. Leaving a group this node is not a member of is a
	/// no-op.
	pub async fn leave_group(&self, group: &str) -> Result<(), Error> {
		self.ensure_live()?;
		let is_member = {
			let mut groups = self.inner.groups.lock();
			match groups.iter().position(|g| g == group) {
				Some(position) => {
					groups.remove(position);
					true
				}
				None => false,
			}
		};
		if !is_member {
			tracing::warn!(
				node = %self.node_name(),
				group,
				"not a member, doing nothing"
			);
			return Ok(());
		}
		self.inner.transport.leave(group).await?;
		Ok(())
	}

	/// Orderly shutdown: leaves every joined group, stops the receive
	/// loop, stops the transport node.
	pub async fn shutdown(&self) {
		let groups = {
			let mut groups = self.inner.groups.lock();
			std::mem::take(&mut *groups)
		};
		for group in groups {
			if let Err(e) = self.inner.transport.leave(&group).await {
				tracing::warn!(error = %e, group, "failed to leave group");
			}
		}
		self.inner.cancel.cancel();
		self.inner.transport.stop().await;
		tracing::info!(node = %self.node_name(), "communicator shut down");
	}

	fn ensure_live(&self) -> Result<(), Error> {
		if self.inner.cancel.is_cancelled() {
			return Err(Error::ShutDown);
		}
		Ok(())
	}

	/// Enqueues a resend entry when the outgoing message's type is in
	/// `expect_ack_for` and it carries a message id. Anything else is
	/// sent once and forgotten.
	fn track_if_expected(&self, message: &str, route: Route) {
		let Some(env) = Envelope::parse(message) else {
			return;
		};
		if !self.inner.policy.expects_ack_for(&env.header.msg_type) {
			return;
		}
		let Some(msg_id) = env.msg_id() else {
			return;
		};
		self
			.inner
			.queue
			.track(msg_id, message, route, env.receivers().to_vec());
	}
}
