//! Close cascade: react to the parent and parent-component windows going away.

use xframe_runtime::{Environment, Error, Subscription, WindowRef};

/// Watches `parent` and, when it is a different window, `parent_component`.
///
/// Each callback receives a [`Error::WindowClosed`] naming the window that
/// disappeared. Dropping the returned subscriptions stops both watches.
pub(crate) fn watch_parents<P, O>(
	env: &Environment,
	parent: &WindowRef,
	parent_component: &WindowRef,
	on_parent_closed: P,
	on_owner_closed: O,
) -> Vec<Subscription>
where
	P: FnOnce(Error) + Send + 'static,
	O: FnOnce(Error) + Send + 'static,
{
	let mut subscriptions = Vec::with_capacity(2);

	let window = parent.clone();
	subscriptions.push(env.liveness().watch(
		parent,
		Box::new(move || {
			tracing::debug!(target = "xframe.cascade", window = %window, "parent window closed");
			on_parent_closed(Error::WindowClosed(format!("parent window {window} closed")));
		}),
	));

	if parent_component != parent {
		let window = parent_component.clone();
		subscriptions.push(env.liveness().watch(
			parent_component,
			Box::new(move || {
				tracing::debug!(target = "xframe.cascade", window = %window, "parent component window closed");
				on_owner_closed(Error::WindowClosed(format!(
					"parent component window {window} closed"
				)));
			}),
		));
	}

	subscriptions
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use tokio::sync::mpsc;
	use xframe_runtime::MemoryBrowser;

	use super::*;

	#[tokio::test]
	async fn same_window_is_watched_once() {
		let browser = MemoryBrowser::new();
		let host = browser.open_window("https://host.example/");
		let child = browser
			.open_frame_window(&host, "https://child.example/", None)
			.unwrap();
		let env = browser.environment(&child);

		let (tx, mut rx) = mpsc::unbounded_channel();
		let owner_tx = tx.clone();
		let subs = watch_parents(
			&env,
			&host,
			&host,
			move |err| {
				let _ = tx.send(("parent", err.to_string()));
			},
			move |err| {
				let _ = owner_tx.send(("owner", err.to_string()));
			},
		);
		assert_eq!(subs.len(), 1);

		browser.close(&host);
		let (which, message) = rx.recv().await.unwrap();
		assert_eq!(which, "parent");
		assert!(message.contains("parent window"), "{message}");
		drop(subs);
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn distinct_owner_reports_separately() {
		let browser = MemoryBrowser::new();
		let owner = browser.open_window("https://owner.example/");
		let middle = browser.open_window("https://middle.example/");
		let child = browser
			.open_frame_window(&middle, "https://child.example/", None)
			.unwrap();
		let env = browser.environment(&child);

		let seen = Arc::new(Mutex::new(Vec::new()));
		let (tx, mut rx) = mpsc::unbounded_channel();
		let parent_seen = Arc::clone(&seen);
		let owner_seen = Arc::clone(&seen);
		let owner_tx = tx.clone();
		let _subs = watch_parents(
			&env,
			&middle,
			&owner,
			move |_| {
				parent_seen.lock().push("parent");
				let _ = tx.send(());
			},
			move |err| {
				assert!(matches!(err, Error::WindowClosed(_)));
				owner_seen.lock().push("owner");
				let _ = owner_tx.send(());
			},
		);

		browser.close(&owner);
		rx.recv().await.unwrap();
		assert_eq!(*seen.lock(), ["owner"]);
		assert!(!browser.is_closed(&middle));
	}
}
