use super::state::{State, Transition};

/// The deterministic transition table.
///
/// `Stop` is honored from every state. `None` means the transition has no
/// entry for the current state; the driver warns and stays put.
pub(super) fn apply(state: State, transition: Transition) -> Option<State> {
	use {State as S, Transition as T};

	if transition == T::Stop {
		return Some(S::Stopped);
	}

	match (state, transition) {
		(S::Init, T::Initialised) => Some(S::Configuring),
		(S::Configuring, T::DoneConfiguring) => Some(S::Ready),
		(S::Ready, T::Run) => Some(S::Running),
		(S::Ready, T::Wait) => Some(S::Ready),
		(S::Running, T::Continue) => Some(S::Running),
		(S::Running, T::Recover) => Some(S::Recovering),
		(S::Recovering, T::Continue) => Some(S::Running),
		(S::Recovering, T::Restart) => Some(S::Init),
		// a failing handler sends any non-stopped state into recovery
		(
			S::Init | S::Configuring | S::Ready | S::Running | S::Recovering,
			T::Failed,
		) => Some(S::Recovering),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nominal_lifecycle() {
		let mut state = State::Init;
		for (transition, expected) in [
			(Transition::Initialised, State::Configuring),
			(Transition::DoneConfiguring, State::Ready),
			(Transition::Wait, State::Ready),
			(Transition::Run, State::Running),
			(Transition::Continue, State::Running),
		] {
			state = apply(state, transition).unwrap();
			assert_eq!(state, expected);
		}
	}

	#[test]
	fn recovery_paths() {
		assert_eq!(
			apply(State::Running, Transition::Recover),
			Some(State::Recovering)
		);
		assert_eq!(
			apply(State::Init, Transition::Failed),
			Some(State::Recovering)
		);
		assert_eq!(
			apply(State::Recovering, Transition::Continue),
			Some(State::Running)
		);
		assert_eq!(
			apply(State::Recovering, Transition::Restart),
			Some(State::Init)
		);
		assert_eq!(
			apply(State::Recovering, Transition::Failed),
			Some(State::Recovering)
		);
	}

	#[test]
	fn stop_is_honored_everywhere() {
		for state in [
			State::Init,
			State::Configuring,
			State::Ready,
			State::Running,
			State::Recovering,
			State::Stopped,
		] {
			assert_eq!(apply(state, Transition::Stop), Some(State::Stopped));
		}
	}

	#[test]
	fn unknown_combinations_have_no_entry() {
		assert_eq!(apply(State::Init, Transition::Run), None);
		assert_eq!(apply(State::Ready, Transition::Continue), None);
		assert_eq!(apply(State::Stopped, Transition::Run), None);
	}
}
