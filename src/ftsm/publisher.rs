use {
	super::{Config, state::State},
	crate::store::DocumentStore,
	std::sync::Arc,
	tokio::sync::watch,
	tokio_util::sync::CancellationToken,
};

/// Background task publishing the current state-machine state to the
/// store.
///
/// The publisher only ever replaces an existing record; when no record
/// for the component is present yet it waits for one to appear instead of
/// inserting it. Provisioning the record is the fleet operator's job.
pub(super) struct Publisher {
	config: Arc<Config>,
	store: Arc<dyn DocumentStore>,
	state: watch::Receiver<State>,
	cancel: CancellationToken,
}

impl Publisher {
	pub(super) fn spawn(
		config: Arc<Config>,
		store: Arc<dyn DocumentStore>,
		state: watch::Receiver<State>,
		cancel: CancellationToken,
	) -> tokio::task::JoinHandle<()> {
		let publisher = Self {
			config,
			store,
			state,
			cancel,
		};
		tokio::spawn(publisher.run())
	}

	async fn run(self) {
		loop {
			let state = *self.state.borrow();
			if state == State::Stopped {
				tracing::info!(
					component = %self.config.component_name,
					"state publisher terminating"
				);
				return;
			}

			if let Err(e) = self.publish(state).await {
				tracing::warn!(
					component = %self.config.component_name,
					error = %e,
					"state publish failed"
				);
			}

			tokio::select! {
				() = self.cancel.cancelled() => return,
				() = tokio::time::sleep(self.config.task_period) => {}
			}
		}
	}

	async fn publish(
		&self,
		state: State,
	) -> Result<(), crate::store::StoreError> {
		let existing = self
			.store
			.find_one(
				&self.config.db_name,
				&self.config.sm_state_collection,
				"component_name",
				&self.config.component_name,
			)
			.await?;

		if existing.is_none() {
			tracing::debug!(
				component = %self.config.component_name,
				"no state record yet, not inserting"
			);
			return Ok(());
		}

		self
			.store
			.replace_one(
				&self.config.db_name,
				&self.config.sm_state_collection,
				"component_name",
				&self.config.component_name,
				serde_json::json!({
					"component_name": self.config.component_name,
					"state": state,
				}),
			)
			.await
	}
}
