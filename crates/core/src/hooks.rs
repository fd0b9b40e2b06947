//! Lifecycle hook types shared by the child and host sides.

use std::sync::Arc;

use xframe_protocol::{Dimensions, PropsBag};
use xframe_runtime::{Error, Result};

/// Runs once the instance is live.
pub type EnterHook = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Runs after each props merge with the full merged props.
pub type PropsHook = Arc<dyn Fn(&PropsBag) -> Result<()> + Send + Sync>;

/// Runs exactly once when the instance closes.
pub type CloseHook = Arc<dyn Fn(&CloseReason) -> Result<()> + Send + Sync>;

/// Receives failures raised by the instance and its other hooks.
pub type ErrorHook = Arc<dyn Fn(&Error) -> Result<()> + Send + Sync>;

/// Host side: the child completed its handshake.
pub type InitHook = Arc<dyn Fn(&PropsBag) -> Result<()> + Send + Sync>;

/// Host side: the surface was resized at the child's request.
pub type ResizeHook = Arc<dyn Fn(Dimensions) -> Result<()> + Send + Sync>;

/// Why an instance closed.
#[derive(Debug)]
pub enum CloseReason {
	/// `close()` was called locally.
	Requested,
	/// The peer sent CLOSE.
	ClosedByPeer,
	/// The parent window went away.
	ParentClosed(Error),
	/// The parent-component window went away while the parent stayed.
	ParentComponentClosed(Error),
	/// Host side: the child window went away.
	ChildClosed(Error),
	/// A fatal lifecycle failure.
	Failed(String),
}

impl CloseReason {
	/// The error describing the closure, if one caused it.
	pub fn error(&self) -> Option<&Error> {
		match self {
			CloseReason::ParentClosed(err)
			| CloseReason::ParentComponentClosed(err)
			| CloseReason::ChildClosed(err) => Some(err),
			_ => None,
		}
	}

	/// True when the peer must be sent CLOSE before teardown.
	pub fn notifies_peer(&self) -> bool {
		matches!(
			self,
			CloseReason::Requested | CloseReason::ParentComponentClosed(_) | CloseReason::Failed(_)
		)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			CloseReason::Requested => "requested",
			CloseReason::ClosedByPeer => "closed-by-peer",
			CloseReason::ParentClosed(_) => "parent-closed",
			CloseReason::ParentComponentClosed(_) => "parent-component-closed",
			CloseReason::ChildClosed(_) => "child-closed",
			CloseReason::Failed(_) => "failed",
		}
	}
}

impl std::fmt::Display for CloseReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CloseReason::Failed(message) => write!(f, "failed: {message}"),
			other => match other.error() {
				Some(err) => write!(f, "{}: {err}", other.as_str()),
				None => f.write_str(other.as_str()),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn peer_notification() {
		let closed = || Error::WindowClosed("w".into());
		assert!(CloseReason::Requested.notifies_peer());
		assert!(CloseReason::ParentComponentClosed(closed()).notifies_peer());
		assert!(!CloseReason::ParentClosed(closed()).notifies_peer());
		assert!(!CloseReason::ClosedByPeer.notifies_peer());
	}

	#[test]
	fn display_carries_the_cause() {
		let reason = CloseReason::ParentClosed(Error::WindowClosed("parent win-1".into()));
		assert_eq!(reason.to_string(), "parent-closed: Window closed: parent win-1");
	}
}
