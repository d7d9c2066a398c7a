use {
	super::{
		Config,
		spec::{self, DependStatuses, MONITOR_NONE},
		state::State,
	},
	crate::store::{DocumentStore, StoreError},
	std::sync::Arc,
	tokio::sync::watch,
	tokio_util::sync::CancellationToken,
};

/// Background task keeping the dependency statuses in sync with the
/// monitor outputs in the store.
///
/// It is the single producer of the status tree: each sweep reads the
/// monitor documents for every declared monitor spec and publishes the
/// updated tree on the watch channel, from which phase handlers take
/// atomic snapshots.
pub(super) struct Reconciler {
	config: Arc<Config>,
	store: Arc<dyn DocumentStore>,
	statuses: watch::Sender<DependStatuses>,
	state: watch::Receiver<State>,
	running: watch::Receiver<bool>,
	cancel: CancellationToken,
}

impl Reconciler {
	pub(super) fn spawn(
		config: Arc<Config>,
		store: Arc<dyn DocumentStore>,
		statuses: watch::Sender<DependStatuses>,
		state: watch::Receiver<State>,
		running: watch::Receiver<bool>,
		cancel: CancellationToken,
	) -> tokio::task::JoinHandle<()> {
		let reconciler = Self {
			config,
			store,
			statuses,
			state,
			running,
			cancel,
		};
		tokio::spawn(reconciler.run())
	}

	async fn run(mut self) {
		// no store reads before the driver marks the component running
		while !*self.running.borrow() {
			if self.pause().await {
				return;
			}
		}

		loop {
			if *self.state.borrow() == State::Stopped
				|| !*self.running.borrow()
			{
				tracing::info!(
					component = %self.config.component_name,
					"status reconciler terminating"
				);
				return;
			}

			if let Err(e) = self.sweep().await {
				tracing::warn!(
					component = %self.config.component_name,
					error = %e,
					"dependency status sweep failed"
				);
			}

			if self.pause().await {
				return;
			}
		}
	}

	/// Sleeps one task period; true when cancelled.
	async fn pause(&self) -> bool {
		tokio::select! {
			() = self.cancel.cancelled() => true,
			() = tokio::time::sleep(self.config.task_period) => false,
		}
	}

	/// One pass over the declared monitor tree.
	///
	/// A dependency whose emitter has no status document yet is skipped:
	/// its status stays unknown. Within one monitor the last matching
	/// `modes` entry wins.
	async fn sweep(&mut self) -> Result<(), StoreError> {
		for (monitor_type, monitors) in &self.config.dependency_monitors {
			for (dependency, monitor_spec) in monitors {
				if monitor_spec == MONITOR_NONE {
					continue;
				}
				let Some((emitter, monitor_name)) =
					spec::split_monitor_spec(monitor_spec)
				else {
					tracing::warn!(
						component = %self.config.component_name,
						monitor_spec,
						"monitor spec has no emitter/monitor separator"
					);
					continue;
				};

				let Some(status_doc) = self
					.store
					.find_one(
						&self.config.db_name,
						&self.config.status_collection,
						"component_id",
						emitter,
					)
					.await?
				else {
					continue;
				};

				let modes = status_doc
					.get("modes")
					.and_then(|m| m.as_array())
					.cloned()
					.unwrap_or_default();

				for mode in &modes {
					if mode.get("monitorName").and_then(|n| n.as_str())
						!= Some(monitor_name)
					{
						continue;
					}
					let Some(health) = mode.get("healthStatus") else {
						continue;
					};
					let health_text = health.to_string();
					self.statuses.send_modify(|statuses| {
						statuses
							.entry(monitor_type.clone())
							.or_default()
							.entry(dependency.clone())
							.or_default()
							.insert(monitor_spec.clone(), health_text.clone());
					});
				}
			}
		}
		Ok(())
	}
}
