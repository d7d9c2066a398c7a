//! Fault-tolerant state-machine runtime for fleet components.
//!
//! An [`Ftsm`] fuses a local lifecycle state machine with externally
//! observed dependency health: it validates the component's declared
//! dependency graph against the shared store at construction, then runs
//! two background tasks (a dependency-status reconciler and a state
//! publisher) next to the user-driven phase loop.
//!
//! Unhealthy dependencies never cause transitions by themselves; they
//! update observable status, and the component's
//! [`Component::process_depend_statuses`] decides.

use {
	crate::store::DocumentStore,
	publisher::Publisher,
	reconciler::Reconciler,
	std::sync::Arc,
	tokio::sync::watch,
	tokio_util::sync::{CancellationToken, DropGuard},
};

mod component;
mod config;
mod error;
mod gate;
mod machine;
mod publisher;
mod reconciler;
mod spec;
mod state;

pub use {
	component::Component,
	config::{Config, ConfigBuilder, ConfigBuilderError},
	error::Error,
	gate::SubsystemGate,
	spec::{
		ComponentSpec,
		DependStatuses,
		MONITOR_NONE,
		MonitorTree,
		monitor_types,
		split_monitor_spec,
	},
	state::{State, Transition},
};

/// A constructed fault-tolerant state machine.
///
/// Construction validates the declared spec and spawns the background
/// tasks; [`Ftsm::run`] drives the phase handlers of a [`Component`]
/// until the machine stops. Dropping the machine aborts the background
/// tasks.
pub struct Ftsm {
	config: Arc<Config>,
	state: watch::Sender<State>,
	running: watch::Sender<bool>,
	statuses: watch::Receiver<DependStatuses>,
	_reconciler: tokio::task::JoinHandle<()>,
	_publisher: tokio::task::JoinHandle<()>,
	_abort: DropGuard,
}

impl Ftsm {
	/// Validates the declared spec against the store and spawns the
	/// background tasks.
	///
	/// Store reads retry indefinitely on transient errors with a
	/// `task_period` backoff; a missing or mismatching spec is fatal and
	/// nothing is spawned. With `config.debug` set, validation is
	/// skipped entirely and no store read happens here.
	pub async fn new(
		config: Config,
		store: Arc<dyn DocumentStore>,
	) -> Result<Self, Error> {
		let config = Arc::new(config);

		if !config.debug {
			Self::validate_spec(&config, store.as_ref()).await?;
		}

		let (statuses_tx, statuses_rx) =
			watch::channel(spec::initial_statuses(&config.dependency_monitors));
		let (state_tx, state_rx) = watch::channel(State::Init);
		let (running_tx, running_rx) = watch::channel(false);
		let cancel = CancellationToken::new();

		// each background task owns its own store handle
		let reconciler = Reconciler::spawn(
			Arc::clone(&config),
			Arc::clone(&store),
			statuses_tx,
			state_rx.clone(),
			running_rx,
			cancel.child_token(),
		);
		let publisher = Publisher::spawn(
			Arc::clone(&config),
			store,
			state_rx,
			cancel.child_token(),
		);

		tracing::info!(component = %config.component_name, "ftsm constructed");

		Ok(Self {
			config,
			state: state_tx,
			running: running_tx,
			statuses: statuses_rx,
			_reconciler: reconciler,
			_publisher: publisher,
			_abort: cancel.drop_guard(),
		})
	}

	async fn validate_spec(
		config: &Config,
		store: &dyn DocumentStore,
	) -> Result<(), Error> {
		let stored = Self::read_spec(config, store).await?;

		if config.dependencies != stored.dependencies {
			return Err(Error::DependencyMismatch {
				component: config.component_name.clone(),
				expected: spec::format_dependency_list(&stored.dependencies),
			});
		}

		if config.dependency_monitors != stored.dependency_monitors {
			return Err(Error::MonitorMismatch {
				component: config.component_name.clone(),
				expected: spec::format_monitor_tree(&stored.dependency_monitors),
			});
		}

		Ok(())
	}

	async fn read_spec(
		config: &Config,
		store: &dyn DocumentStore,
	) -> Result<ComponentSpec, Error> {
		loop {
			match store
				.find_one(
					&config.db_name,
					&config.component_collection,
					"component_name",
					&config.component_name,
				)
				.await
			{
				Ok(Some(doc)) => {
					return serde_json::from_value(doc).map_err(|e| {
						Error::MalformedSpec {
							component: config.component_name.clone(),
							reason: e.to_string(),
						}
					});
				}
				Ok(None) => {
					return Err(Error::SpecNotFound {
						component: config.component_name.clone(),
						collection: config.component_collection.clone(),
					});
				}
				Err(e) => {
					tracing::warn!(
						component = %config.component_name,
						error = %e,
						"component spec read failed, retrying"
					);
					tokio::time::sleep(config.task_period).await;
				}
			}
		}
	}

	pub fn component_name(&self) -> &str {
		&self.config.component_name
	}

	pub fn current_state(&self) -> State {
		*self.state.borrow()
	}

	/// Atomic snapshot of the last observed dependency statuses.
	pub fn depend_statuses(&self) -> DependStatuses {
		self.statuses.borrow().clone()
	}

	/// A handle phase handlers use to observe the machine.
	pub fn context(&self) -> Context {
		Context {
			config: Arc::clone(&self.config),
			statuses: self.statuses.clone(),
			state: self.state.subscribe(),
		}
	}

	/// Requests the machine to stop; the driver and both background tasks
	/// observe the stop on their next cycle.
	pub fn stop(&self) {
		self.state.send_replace(State::Stopped);
	}

	/// Drives the component's phase handlers until the machine stops.
	///
	/// On every `Running` cycle [`Component::process_depend_statuses`] is
	/// consulted after the `running` handler; a `Some` return takes
	/// precedence over the handler's own transition. Every entry into
	/// `Recovering` counts against `max_recovery_attempts`; exceeding
	/// the budget stops the machine and reports terminal failure.
	pub async fn run<C: Component + ?Sized>(
		&self,
		component: &mut C,
	) -> Result<(), Error> {
		self.running.send_replace(true);
		let ctx = self.context();
		let mut recovery_attempts: u32 = 0;

		let result = loop {
			let current = self.current_state();
			let transition = match current {
				State::Stopped => break Ok(()),
				State::Init => component.init(&ctx).await,
				State::Configuring => component.configuring(&ctx).await,
				State::Ready => component.ready(&ctx).await,
				State::Running => {
					let own = component.running(&ctx).await;
					match component.process_depend_statuses(&ctx).await {
						Some(depend) => depend,
						None => own,
					}
				}
				State::Recovering => component.recovering(&ctx).await,
			};

			let applied = machine::apply(current, transition);
			if applied.is_none() {
				tracing::warn!(
					component = %self.component_name(),
					state = %current,
					transition = %transition,
					"transition has no entry in this state, staying"
				);
			}
			let next = applied.unwrap_or(current);

			if applied.is_some() && next == State::Recovering {
				recovery_attempts += 1;
				if recovery_attempts > self.config.max_recovery_attempts {
					tracing::error!(
						component = %self.component_name(),
						attempts = recovery_attempts - 1,
						"recovery attempts exhausted"
					);
					break Err(Error::RecoveryExhausted {
						component: self.component_name().to_string(),
						attempts: recovery_attempts - 1,
					});
				}
			} else if current == State::Recovering
				&& matches!(next, State::Running | State::Init)
			{
				recovery_attempts = 0;
			}

			if next != current {
				tracing::debug!(
					component = %self.component_name(),
					from = %current,
					via = %transition,
					to = %next,
					"state transition"
				);
			}

			// an external stop() issued while a handler ran wins over the
			// handler's transition
			self.state.send_modify(|state| {
				if *state != State::Stopped {
					*state = next;
				}
			});

			tokio::task::yield_now().await;
		};

		if result.is_err() {
			self.state.send_replace(State::Stopped);
		}
		self.running.send_replace(false);
		result
	}
}

/// Read-only view of an [`Ftsm`] handed to phase handlers.
#[derive(Clone)]
pub struct Context {
	config: Arc<Config>,
	statuses: watch::Receiver<DependStatuses>,
	state: watch::Receiver<State>,
}

impl Context {
	pub fn component_name(&self) -> &str {
		&self.config.component_name
	}

	pub fn current_state(&self) -> State {
		*self.state.borrow()
	}

	/// Atomic snapshot of the last observed dependency statuses.
	pub fn depend_statuses(&self) -> DependStatuses {
		self.statuses.borrow().clone()
	}

	/// The last observed health status for one monitor slot, if the slot
	/// exists and has been filled.
	pub fn health_status(
		&self,
		monitor_type: &str,
		dependency: &str,
		monitor_spec: &str,
	) -> Option<String> {
		let statuses = self.statuses.borrow();
		let health = statuses
			.get(monitor_type)?
			.get(dependency)?
			.get(monitor_spec)?;
		if health.is_empty() {
			None
		} else {
			Some(health.clone())
		}
	}

	/// Recovery protocol for an external subsystem watched through a
	/// dependency monitor, typically invoked from a component's
	/// `recovering` handler.
	///
	/// Returns immediately when the gate's dependency or monitor type is
	/// not declared, or when the probe already reports the subsystem
	/// alive. Otherwise calls [`Component::teardown`], polls the monitor
	/// slot every `probe_period` until the probe passes, then calls
	/// [`Component::setup`]. The helper never asserts success beyond the
	/// probe.
	pub async fn await_subsystem<C: Component + ?Sized>(
		&self,
		gate: &SubsystemGate,
		component: &mut C,
	) {
		if !self.config.dependencies.iter().any(|d| d == &gate.dependency) {
			return;
		}
		if !self.statuses.borrow().contains_key(&gate.monitor_type) {
			return;
		}

		let probe_slot = || {
			self.health_status(
				&gate.monitor_type,
				&gate.dependency,
				&gate.monitor_spec,
			)
			.is_some_and(|health| (gate.probe)(&health))
		};

		if probe_slot() {
			return;
		}

		component.teardown().await;
		tracing::info!(
			component = %self.component_name(),
			dependency = %gate.dependency,
			monitor_spec = %gate.monitor_spec,
			"waiting for subsystem to come back"
		);

		while !probe_slot() {
			tokio::time::sleep(self.config.probe_period).await;
		}
		component.setup().await;
	}
}
