//! Teardown actions that run exactly once.
//!
//! Every listener, watch, surface and slot an instance acquires registers its
//! release here. Whichever close path wins (explicit close, parent cascade,
//! fatal error) calls [`DisposerRegistry::drain`]; later drains are no-ops.

use parking_lot::Mutex;

use crate::subscription::Subscription;

type Disposer = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct DisposerState {
	actions: Vec<(&'static str, Disposer)>,
	drained: bool,
}

/// Per-instance registry of teardown actions.
#[derive(Default)]
pub struct DisposerRegistry {
	state: Mutex<DisposerState>,
}

impl DisposerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a teardown action.
	///
	/// If the registry was already drained the action runs immediately, so a
	/// resource acquired while closing is still released.
	pub fn register(&self, label: &'static str, action: impl FnOnce() + Send + 'static) {
		let mut state = self.state.lock();
		if state.drained {
			drop(state);
			tracing::debug!(target = "xframe.disposer", label, "registry already drained; disposing now");
			action();
			return;
		}
		state.actions.push((label, Box::new(action)));
	}

	/// Keeps a subscription alive until the registry is drained.
	pub fn hold(&self, label: &'static str, subscription: Subscription) {
		self.register(label, move || drop(subscription));
	}

	/// Runs every registered action in reverse registration order.
	///
	/// Returns the number of actions run; `0` on every call after the first.
	pub fn drain(&self) -> usize {
		let actions = {
			let mut state = self.state.lock();
			if state.drained {
				return 0;
			}
			state.drained = true;
			std::mem::take(&mut state.actions)
		};

		let count = actions.len();
		for (label, action) in actions.into_iter().rev() {
			tracing::trace!(target = "xframe.disposer", label, "disposing");
			action();
		}
		count
	}

	pub fn is_drained(&self) -> bool {
		self.state.lock().drained
	}

	/// Number of actions waiting for [`drain`](Self::drain).
	pub fn pending(&self) -> usize {
		self.state.lock().actions.len()
	}
}

impl std::fmt::Debug for DisposerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("DisposerRegistry")
			.field("pending", &state.actions.len())
			.field("drained", &state.drained)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	#[test]
	fn drains_once_in_reverse_order() {
		let order = Arc::new(Mutex::new(Vec::new()));
		let registry = DisposerRegistry::new();
		for label in ["listener", "watch", "slot"] {
			let order = Arc::clone(&order);
			registry.register(label, move || order.lock().push(label));
		}

		assert_eq!(registry.pending(), 3);
		assert_eq!(registry.drain(), 3);
		assert_eq!(registry.drain(), 0);
		assert!(registry.is_drained());
		assert_eq!(*order.lock(), ["slot", "watch", "listener"]);
	}

	#[test]
	fn late_registration_runs_immediately() {
		let registry = DisposerRegistry::new();
		registry.drain();

		let ran = Arc::new(Mutex::new(false));
		let flag = Arc::clone(&ran);
		registry.register("late", move || *flag.lock() = true);

		assert!(*ran.lock());
		assert_eq!(registry.pending(), 0);
	}

	#[test]
	fn held_subscription_is_dropped_on_drain() {
		let dropped = Arc::new(Mutex::new(false));
		let flag = Arc::clone(&dropped);
		let registry = DisposerRegistry::new();
		registry.hold(
			"listener",
			Subscription::new(move || *flag.lock() = true),
		);

		assert!(!*dropped.lock());
		registry.drain();
		assert!(*dropped.lock());
	}
}
