//! Child lifecycle states and the transition table.

use std::fmt;

use xframe_runtime::{Error, Result};

/// Lifecycle state of a child instance.
///
/// ```text
/// Created → Validated → WindowResolved → AwaitingInit → Running
///               │              │              │            │
///               └──────────────┴─► Standalone ◄┘            │
///     (any non-closing state) ──────────────► Closing → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
	Created,
	Validated,
	WindowResolved,
	Standalone,
	AwaitingInit,
	Running,
	Closing,
	Closed,
}

impl LifecycleState {
	pub fn as_str(self) -> &'static str {
		match self {
			LifecycleState::Created => "created",
			LifecycleState::Validated => "validated",
			LifecycleState::WindowResolved => "window-resolved",
			LifecycleState::Standalone => "standalone",
			LifecycleState::AwaitingInit => "awaiting-init",
			LifecycleState::Running => "running",
			LifecycleState::Closing => "closing",
			LifecycleState::Closed => "closed",
		}
	}

	/// True once closing has started.
	pub fn is_closing(self) -> bool {
		matches!(self, LifecycleState::Closing | LifecycleState::Closed)
	}

	/// True while the instance is initialized and not closing.
	pub fn is_live(self) -> bool {
		matches!(self, LifecycleState::Running | LifecycleState::Standalone)
	}

	/// Returns true if `self → next` is in the transition table.
	pub fn can_transition(self, next: LifecycleState) -> bool {
		use LifecycleState::*;
		match (self, next) {
			(Created, Validated)
			| (Validated, WindowResolved)
			| (Validated, Standalone)
			| (WindowResolved, Standalone)
			| (WindowResolved, AwaitingInit)
			| (AwaitingInit, Running)
			| (AwaitingInit, Standalone)
			| (Closing, Closed) => true,
			(from, Closing) => !from.is_closing(),
			_ => false,
		}
	}

	/// Checks `self → next` against the table.
	pub fn transition(self, next: LifecycleState) -> Result<LifecycleState> {
		if self.can_transition(next) {
			Ok(next)
		} else {
			Err(Error::InvalidTransition {
				from: self.as_str(),
				to: next.as_str(),
			})
		}
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
