//! Guards that undo a listener registration or a liveness watch.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tags one registration so a stale guard cannot remove its replacement.
pub type SubscriptionId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_subscription_id() -> SubscriptionId {
	NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Runs its release action exactly once, when dropped.
///
/// Release actions hold weak references, so a guard outliving the
/// browser context releases nothing.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
	release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
	pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
		Self {
			release: Some(Box::new(release)),
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(release) = self.release.take() {
			release();
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Subscription")
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::AtomicUsize;

	use super::*;

	#[test]
	fn release_runs_once_on_drop() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let guard = Subscription::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		drop(guard);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn ids_do_not_repeat() {
		assert_ne!(next_subscription_id(), next_subscription_id());
	}
}
