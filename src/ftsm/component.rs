use {
	super::{Context, state::Transition},
	async_trait::async_trait,
};

/// The overridable lifecycle of a fault-tolerant component.
///
/// The state-machine driver calls the handler matching the current state
/// and applies the returned transition. `running` and `recovering` have
/// no default; everything else falls through to the standard lifecycle.
#[async_trait]
pub trait Component: Send {
	/// Component initialisation.
	async fn init(&mut self, _ctx: &Context) -> Transition {
		Transition::Initialised
	}

	/// Component configuration/reconfiguration.
	async fn configuring(&mut self, _ctx: &Context) -> Transition {
		Transition::DoneConfiguring
	}

	/// Behaviour when ready for operation but not active.
	async fn ready(&mut self, _ctx: &Context) -> Transition {
		Transition::Run
	}

	/// Behaviour during active operation.
	async fn running(&mut self, ctx: &Context) -> Transition;

	/// Component recovery.
	async fn recovering(&mut self, ctx: &Context) -> Transition;

	/// Consulted on every `running` cycle; a `Some` return takes
	/// precedence over the transition returned by `running` itself.
	async fn process_depend_statuses(
		&mut self,
		_ctx: &Context,
	) -> Option<Transition> {
		None
	}

	/// Setup steps for an external subsystem this component talks to.
	/// [`Context::await_subsystem`](super::Context::await_subsystem)
	/// calls this after the watched subsystem comes back.
	async fn setup(&mut self) {}

	/// Cleanup steps when an external subsystem dies, so the component
	/// can re-register once it returns.
	/// [`Context::await_subsystem`](super::Context::await_subsystem)
	/// calls this before waiting for the subsystem.
	async fn teardown(&mut self) {}
}
