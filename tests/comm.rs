mod utils;

use {
	core::time::Duration,
	fleetlink::{
		builtin::MemoryHub,
		comm::{Communicator, Config},
		transport::{EventKind, PeerId, Transport},
	},
	std::sync::Arc,
	utils::{RecordingHandler, envelope},
};

const GROUP: &str = "fleet";

async fn start_node(
	hub: &MemoryHub,
	name: &str,
	expect_ack_for: &[&str],
	send_ack_for: &[&str],
) -> anyhow::Result<(Communicator, Arc<RecordingHandler>, PeerId)> {
	let transport = hub.create_node(name);
	let peer_id = transport.peer_id().clone();
	let handler = Arc::new(RecordingHandler::default());

	let config = Config::builder()
		.with_node_name(name)
		.with_groups(vec![GROUP.to_string()])
		.with_expect_ack_for(
			expect_ack_for.iter().map(ToString::to_string).collect(),
		)
		.with_send_ack_for(
			send_ack_for.iter().map(ToString::to_string).collect(),
		)
		.build()?;

	let node =
		Communicator::start(config, Arc::new(transport), handler.clone())
			.await?;
	Ok((node, handler, peer_id))
}

/// An unacknowledged tracked message is retransmitted on the resend
/// interval and reported as failed with its last permitted transmission:
/// `num_retries + 1` wire sends in total.
#[tokio::test(start_paused = true)]
async fn retry_exhaustion_reports_failure() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, handler_a, _) =
		start_node(&hub, "A", &["TASK"], &[]).await?;

	let msg = envelope("TASK", "m1", &["B"]);
	node_a.shout(&msg).await?;
	assert_eq!(node_a.pending_acks(), 1);

	// the original send happened; the first retry is an interval away
	tokio::time::sleep(Duration::from_secs(4)).await;
	assert_eq!(hub.shout_count_of(&msg), 1);
	assert!(handler_a.send_statuses().is_empty());

	// five retries, then terminal failure
	tokio::time::sleep(Duration::from_secs(26)).await;
	assert_eq!(hub.shout_count_of(&msg), 6);
	assert_eq!(
		handler_a.send_statuses(),
		vec![("m1".to_string(), false)]
	);
	assert_eq!(node_a.pending_acks(), 0);

	// and nothing more after that
	tokio::time::sleep(Duration::from_secs(15)).await;
	assert_eq!(hub.shout_count_of(&msg), 6);
	assert_eq!(handler_a.send_statuses().len(), 1);
	Ok(())
}

/// A receiver that joins mid-retry acknowledges a retransmission; the
/// sender stops retransmitting and reports success.
#[tokio::test(start_paused = true)]
async fn late_ack_stops_retransmission() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, handler_a, _) =
		start_node(&hub, "A", &["TASK"], &[]).await?;

	let msg = envelope("TASK", "m1", &["B"]);
	node_a.shout(&msg).await?;

	tokio::time::sleep(Duration::from_secs(6)).await;
	let (_node_b, handler_b, _) =
		start_node(&hub, "B", &[], &["TASK"]).await?;

	tokio::time::sleep(Duration::from_secs(8)).await;
	assert_eq!(
		handler_a.send_statuses(),
		vec![("m1".to_string(), true)]
	);
	assert_eq!(node_a.pending_acks(), 0);
	assert_eq!(handler_b.deliveries_of(&msg), 1);

	// acknowledged: the retransmission stream is over
	let transmitted = hub.shout_count_of(&msg);
	tokio::time::sleep(Duration::from_secs(20)).await;
	assert_eq!(hub.shout_count_of(&msg), transmitted);
	Ok(())
}

/// With several addressed receivers the entry survives the first ack and
/// resolves when the last receiver has acknowledged.
#[tokio::test(start_paused = true)]
async fn entry_resolves_when_all_receivers_acked() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, handler_a, _) =
		start_node(&hub, "A", &["TASK"], &[]).await?;
	let (_node_b, _, _) = start_node(&hub, "B", &[], &["TASK"]).await?;

	let msg = envelope("TASK", "m1", &["B", "C"]);
	node_a.shout(&msg).await?;

	// B acknowledges the original send; C does not exist yet
	tokio::time::sleep(Duration::from_secs(3)).await;
	assert_eq!(node_a.pending_acks(), 1);
	assert!(handler_a.send_statuses().is_empty());

	let (_node_c, _, _) = start_node(&hub, "C", &[], &["TASK"]).await?;
	tokio::time::sleep(Duration::from_secs(8)).await;
	assert_eq!(
		handler_a.send_statuses(),
		vec![("m1".to_string(), true)]
	);
	assert_eq!(node_a.pending_acks(), 0);
	Ok(())
}

/// When only part of the receiver set ever acknowledges, retries exhaust
/// and the send is reported as failed.
#[tokio::test(start_paused = true)]
async fn partial_ack_still_fails_on_exhaustion() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, handler_a, _) =
		start_node(&hub, "A", &["TASK"], &[]).await?;
	let (_node_b, _, _) = start_node(&hub, "B", &[], &["TASK"]).await?;

	let msg = envelope("TASK", "m1", &["B", "C"]);
	node_a.shout(&msg).await?;

	tokio::time::sleep(Duration::from_secs(32)).await;
	assert_eq!(
		handler_a.send_statuses(),
		vec![("m1".to_string(), false)]
	);
	assert_eq!(node_a.pending_acks(), 0);
	Ok(())
}

/// A repeated message id within the validity window is suppressed; after
/// the window it is delivered again.
#[tokio::test(start_paused = true)]
async fn duplicate_suppression_has_a_validity_window() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, _, _) = start_node(&hub, "A", &[], &[]).await?;
	let (_node_b, handler_b, _) = start_node(&hub, "B", &[], &[]).await?;

	let msg = envelope("STATUS", "m1", &[]);
	node_a.shout(&msg).await?;
	tokio::time::sleep(Duration::from_secs(1)).await;
	node_a.shout(&msg).await?;

	tokio::time::sleep(Duration::from_secs(2)).await;
	assert_eq!(handler_b.deliveries_of(&msg), 1);

	// past max_message_age since the first receipt
	tokio::time::sleep(Duration::from_secs(29)).await;
	node_a.shout(&msg).await?;
	tokio::time::sleep(Duration::from_secs(2)).await;
	assert_eq!(handler_b.deliveries_of(&msg), 2);
	Ok(())
}

/// A receiver acknowledges iff its node name is in the receiver list and
/// the type is in its `send_ack_for`.
#[tokio::test(start_paused = true)]
async fn only_addressed_receivers_ack() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, _, peer_a) = start_node(&hub, "A", &["TASK"], &[]).await?;
	let (_node_b, _, peer_b) = start_node(&hub, "B", &[], &["TASK"]).await?;
	let (_node_c, _, peer_c) = start_node(&hub, "C", &[], &["TASK"]).await?;

	let msg = envelope("TASK", "m1", &["C"]);
	node_a.shout(&msg).await?;
	tokio::time::sleep(Duration::from_secs(3)).await;

	let acks_to_a: Vec<_> = hub
		.whispers()
		.into_iter()
		.filter(|(_, to, m)| to == &peer_a && m.contains("ACKNOWLEDGEMENT"))
		.collect();
	assert_eq!(acks_to_a.len(), 1);
	assert_eq!(acks_to_a[0].0, peer_c);
	assert!(acks_to_a.iter().all(|(from, _, _)| from != &peer_b));
	assert_eq!(node_a.pending_acks(), 0);
	Ok(())
}

/// An acknowledgement from a peer that never advertised a name header
/// cannot be matched against a receiver list and is dropped.
#[tokio::test(start_paused = true)]
async fn ack_from_unnamed_peer_is_dropped() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, handler_a, peer_a) =
		start_node(&hub, "A", &["TASK"], &[]).await?;

	// a bare transport node with no headers set
	let rogue = hub.create_node("B");
	rogue.start().await?;

	let msg = envelope("TASK", "m1", &["B"]);
	node_a.shout(&msg).await?;

	let ack = fleetlink::envelope::Envelope::ack_for("m1").to_wire();
	rogue.whisper(&peer_a, &ack).await?;

	tokio::time::sleep(Duration::from_secs(3)).await;
	assert_eq!(node_a.pending_acks(), 1);
	assert!(handler_a.send_statuses().is_empty());
	Ok(())
}

/// A tracked message shouted to several groups is queued once and
/// retransmitted to the first group only.
#[tokio::test(start_paused = true)]
async fn multi_group_shout_tracks_once() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let transport = hub.create_node("A");
	let handler = Arc::new(RecordingHandler::default());
	let config = Config::builder()
		.with_node_name("A")
		.with_groups(vec!["g1".to_string(), "g2".to_string()])
		.with_expect_ack_for(vec!["TASK".to_string()])
		.build()?;
	let node =
		Communicator::start(config, Arc::new(transport), handler).await?;

	let msg = envelope("TASK", "m1", &[]);
	node.shout(&msg).await?;
	assert_eq!(node.pending_acks(), 1);

	tokio::time::sleep(Duration::from_secs(7)).await;
	let per_group = |group: &str| {
		hub
			.shouts()
			.into_iter()
			.filter(|(_, g, m)| g == group && m == &msg)
			.count()
	};
	assert_eq!(per_group("g2"), 1);
	assert!(per_group("g1") >= 2);
	Ok(())
}

/// Double joins and leaves of non-member groups are no-ops; shutdown
/// leaves every joined group and stops the node.
#[tokio::test(start_paused = true)]
async fn group_membership_and_shutdown() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, _, peer_a) = start_node(&hub, "A", &[], &[]).await?;

	node_a.join_group(GROUP).await?;
	assert_eq!(node_a.joined_groups(), vec![GROUP.to_string()]);

	node_a.leave_group("not-a-member").await?;
	assert_eq!(node_a.joined_groups(), vec![GROUP.to_string()]);

	node_a.join_group("extra").await?;
	assert_eq!(node_a.joined_groups().len(), 2);
	node_a.leave_group("extra").await?;
	assert_eq!(node_a.joined_groups().len(), 1);

	node_a.shutdown().await;
	assert!(node_a.joined_groups().is_empty());
	assert!(hub.groups_of(&peer_a).is_empty());
	assert!(!hub.is_started(&peer_a));

	// operations on a shut-down node are rejected up front
	assert!(matches!(
		node_a.shout("late").await,
		Err(fleetlink::comm::Error::ShutDown)
	));
	assert!(matches!(
		node_a.join_group(GROUP).await,
		Err(fleetlink::comm::Error::ShutDown)
	));
	Ok(())
}

/// Ack policies can change while the node runs: a node that joins the
/// group and enables acknowledgements mid-retry resolves the pending
/// send on the next retransmission.
#[tokio::test(start_paused = true)]
async fn ack_policy_changes_at_runtime() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, handler_a, _) =
		start_node(&hub, "A", &["TASK"], &[]).await?;

	// B is up but outside the group and not acknowledging anything
	let transport_b = hub.create_node("B");
	let config_b = Config::builder().with_node_name("B").build()?;
	let node_b = Communicator::start(
		config_b,
		Arc::new(transport_b),
		Arc::new(RecordingHandler::default()),
	)
	.await?;

	let msg = envelope("TASK", "m1", &["B"]);
	node_a.shout(&msg).await?;

	tokio::time::sleep(Duration::from_secs(6)).await;
	node_b.set_send_ack_for(vec!["TASK".to_string()]);
	node_b.join_group(GROUP).await?;

	tokio::time::sleep(Duration::from_secs(8)).await;
	assert_eq!(
		handler_a.send_statuses(),
		vec![("m1".to_string(), true)]
	);
	assert_eq!(node_a.pending_acks(), 0);
	Ok(())
}

/// The configured interface reaches the transport before start.
#[tokio::test(start_paused = true)]
async fn interface_is_applied_before_start() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let transport = hub.create_node("A");
	let peer = transport.peer_id().clone();
	let config = Config::builder()
		.with_node_name("A")
		.with_interface("eth1")
		.build()?;
	let _node = Communicator::start(
		config,
		Arc::new(transport),
		Arc::new(RecordingHandler::default()),
	)
	.await?;
	assert_eq!(hub.interface_of(&peer).as_deref(), Some("eth1"));
	Ok(())
}

/// Membership events reach the user callback untouched, and malformed
/// message bodies are still delivered raw.
#[tokio::test(start_paused = true)]
async fn membership_and_raw_delivery() -> anyhow::Result<()> {
	utils::init_tracing();
	let hub = MemoryHub::new();
	let (node_a, _, _) = start_node(&hub, "A", &[], &[]).await?;
	let (_node_b, handler_b, _) = start_node(&hub, "B", &[], &[]).await?;

	node_a.shout("not an envelope at all").await?;
	tokio::time::sleep(Duration::from_secs(2)).await;

	let events = handler_b.events.lock().clone();
	assert!(
		events
			.iter()
			.any(|e| e.kind == EventKind::Enter && e.peer_name == "A")
	);
	assert!(events.iter().any(|e| {
		e.kind == EventKind::Shout
			&& e.message.as_deref() == Some("not an envelope at all")
	}));
	Ok(())
}
