use {
	crate::transport::{PeerId, RawEvent, Transport, TransportError},
	async_trait::async_trait,
	core::time::Duration,
	parking_lot::Mutex,
	std::{
		collections::{HashMap, HashSet},
		sync::Arc,
	},
	tokio::sync::mpsc,
	uuid::Uuid,
};

/// An in-process transport hub connecting [`MemoryTransport`] nodes.
///
/// Delivery is frame-faithful to the group transports this crate targets:
/// SHOUT events carry a group frame, WHISPER events do not, and
/// membership changes synthesize ENTER/JOIN/LEAVE/EXIT events. The hub
/// keeps a wire log of every shout and whisper so tests can count
/// transmissions.
#[derive(Clone, Default)]
pub struct MemoryHub {
	state: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
	nodes: HashMap<PeerId, Node>,
	shout_log: Vec<(PeerId, String, String)>,
	whisper_log: Vec<(PeerId, PeerId, String)>,
}

struct Node {
	name: String,
	headers: HashMap<String, String>,
	groups: HashSet<String>,
	interface: Option<String>,
	started: bool,
	events: mpsc::UnboundedSender<RawEvent>,
}

impl MemoryHub {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a node on this hub. The node produces no events until it
	/// is started.
	pub fn create_node(&self, name: &str) -> MemoryTransport {
		let id = PeerId::new(Uuid::new_v4().to_string());
		let (events_tx, events_rx) = mpsc::unbounded_channel();

		self.state.lock().nodes.insert(
			id.clone(),
			Node {
				name: name.to_string(),
				headers: HashMap::new(),
				groups: HashSet::new(),
				interface: None,
				started: false,
				events: events_tx,
			},
		);

		MemoryTransport {
			hub: self.clone(),
			id,
			events: tokio::sync::Mutex::new(events_rx),
		}
	}

	/// Every shout that hit the wire: `(sender, group, message)`.
	pub fn shouts(&self) -> Vec<(PeerId, String, String)> {
		self.state.lock().shout_log.clone()
	}

	/// Every whisper that hit the wire: `(sender, receiver, message)`.
	pub fn whispers(&self) -> Vec<(PeerId, PeerId, String)> {
		self.state.lock().whisper_log.clone()
	}

	/// Groups a node is currently a member of.
	pub fn groups_of(&self, peer: &PeerId) -> Vec<String> {
		self
			.state
			.lock()
			.nodes
			.get(peer)
			.map(|n| n.groups.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// The interface a node selected before starting, if any.
	pub fn interface_of(&self, peer: &PeerId) -> Option<String> {
		self
			.state
			.lock()
			.nodes
			.get(peer)
			.and_then(|n| n.interface.clone())
	}

	/// Whether a node is currently started.
	pub fn is_started(&self, peer: &PeerId) -> bool {
		self
			.state
			.lock()
			.nodes
			.get(peer)
			.is_some_and(|n| n.started)
	}

	/// Shouts of one message text, for counting retransmissions.
	pub fn shout_count_of(&self, message: &str) -> usize {
		self
			.state
			.lock()
			.shout_log
			.iter()
			.filter(|(_, _, m)| m == message)
			.count()
	}

	fn broadcast_to_started(
		state: &HubState,
		sender: &PeerId,
		frames: &RawEvent,
		filter: impl Fn(&Node) -> bool,
	) {
		for (id, node) in &state.nodes {
			if id == sender || !node.started || !filter(node) {
				continue;
			}
			node.events.send(frames.clone()).ok();
		}
	}
}

/// One node attached to a [`MemoryHub`].
pub struct MemoryTransport {
	hub: MemoryHub,
	id: PeerId,
	events: tokio::sync::Mutex<mpsc::UnboundedReceiver<RawEvent>>,
}

impl MemoryTransport {
	pub fn peer_id(&self) -> &PeerId {
		&self.id
	}
}

fn frames(parts: &[&str]) -> RawEvent {
	parts.iter().map(|p| (*p).to_string()).collect()
}

#[async_trait]
impl Transport for MemoryTransport {
	async fn set_header(
		&self,
		key: &str,
		value: &str,
	) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state
			.nodes
			.get_mut(&self.id)
			.ok_or(TransportError::NotStarted)?;
		if node.started {
			return Err(TransportError::AlreadyStarted);
		}
		node.headers.insert(key.to_string(), value.to_string());
		Ok(())
	}

	async fn set_interface(
		&self,
		interface: &str,
	) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state
			.nodes
			.get_mut(&self.id)
			.ok_or(TransportError::NotStarted)?;
		if node.started {
			return Err(TransportError::AlreadyStarted);
		}
		// the hub has no real interfaces; the choice is only recorded
		node.interface = Some(interface.to_string());
		Ok(())
	}

	async fn start(&self) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state
			.nodes
			.get_mut(&self.id)
			.ok_or(TransportError::NotStarted)?;
		if node.started {
			return Err(TransportError::AlreadyStarted);
		}
		node.started = true;
		let name = node.name.clone();

		// mutual ENTER between this node and every already started peer
		let enter = frames(&["ENTER", &self.id, &name]);
		MemoryHub::broadcast_to_started(&state, &self.id, &enter, |_| true);
		let me = &state.nodes[&self.id];
		for (id, node) in &state.nodes {
			if id != &self.id && node.started {
				me.events
					.send(frames(&["ENTER", id, &node.name]))
					.ok();
			}
		}
		Ok(())
	}

	async fn join(&self, group: &str) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state
			.nodes
			.get_mut(&self.id)
			.ok_or(TransportError::NotStarted)?;
		let name = node.name.clone();
		node.groups.insert(group.to_string());

		let join = frames(&["JOIN", &self.id, &name, group]);
		MemoryHub::broadcast_to_started(&state, &self.id, &join, |n| {
			n.groups.contains(group)
		});
		Ok(())
	}

	async fn leave(&self, group: &str) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state
			.nodes
			.get_mut(&self.id)
			.ok_or(TransportError::NotStarted)?;
		let name = node.name.clone();
		node.groups.remove(group);

		let leave = frames(&["LEAVE", &self.id, &name, group]);
		MemoryHub::broadcast_to_started(&state, &self.id, &leave, |n| {
			n.groups.contains(group)
		});
		Ok(())
	}

	async fn shout(
		&self,
		group: &str,
		message: &str,
	) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state.nodes.get(&self.id).ok_or(TransportError::NotStarted)?;
		if !node.started {
			return Err(TransportError::NotStarted);
		}
		let name = node.name.clone();
		state
			.shout_log
			.push((self.id.clone(), group.to_string(), message.to_string()));

		let shout = frames(&["SHOUT", &self.id, &name, group, message]);
		MemoryHub::broadcast_to_started(&state, &self.id, &shout, |n| {
			n.groups.contains(group)
		});
		Ok(())
	}

	async fn whisper(
		&self,
		peer: &PeerId,
		message: &str,
	) -> Result<(), TransportError> {
		let mut state = self.hub.state.lock();
		let node = state.nodes.get(&self.id).ok_or(TransportError::NotStarted)?;
		if !node.started {
			return Err(TransportError::NotStarted);
		}
		let name = node.name.clone();
		state.whisper_log.push((
			self.id.clone(),
			peer.clone(),
			message.to_string(),
		));

		let target = state
			.nodes
			.get(peer)
			.ok_or_else(|| TransportError::UnknownPeer(peer.clone()))?;
		if target.started {
			// no group frame on WHISPER
			target
				.events
				.send(frames(&["WHISPER", &self.id, &name, message]))
				.ok();
		}
		Ok(())
	}

	async fn poll(
		&self,
		timeout: Duration,
	) -> Result<Option<RawEvent>, TransportError> {
		let mut events = self.events.lock().await;
		match tokio::time::timeout(timeout, events.recv()).await {
			Ok(Some(event)) => Ok(Some(event)),
			Ok(None) | Err(_) => Ok(None),
		}
	}

	async fn peer_header_value(
		&self,
		peer: &PeerId,
		key: &str,
	) -> Option<String> {
		self
			.hub
			.state
			.lock()
			.nodes
			.get(peer)?
			.headers
			.get(key)
			.cloned()
	}

	async fn stop(&self) {
		let mut state = self.hub.state.lock();
		let Some(node) = state.nodes.get_mut(&self.id) else {
			return;
		};
		if !node.started {
			return;
		}
		node.started = false;
		let name = node.name.clone();

		let exit = frames(&["EXIT", &self.id, &name]);
		MemoryHub::broadcast_to_started(&state, &self.id, &exit, |_| true);
	}
}
