//! Error types for the xframe runtime.

use thiserror::Error;
use xframe_protocol::{ContextType, FormatError, MessageName};

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
	/// Bad options, bad definitions, or a window that does not belong to us.
	Configuration,
	/// The boundary failed: no reply, unreachable target, timeout.
	Delivery,
	/// Raised on purpose by consuming code; safe to forward verbatim.
	Integration,
	/// Anything else. Never forwarded across the boundary as-is.
	Unknown,
}

/// Errors that can occur while running the embedding protocol.
#[derive(Debug, Error)]
pub enum Error {
	/// Options passed to attach or render are invalid.
	#[error("Invalid options: {0}")]
	InvalidOptions(String),

	/// A component definition failed validation.
	#[error("Invalid component definition: {0}")]
	InvalidDefinition(String),

	/// A component with this tag is already registered.
	#[error("Component '{0}' is already registered")]
	DuplicateTag(String),

	/// This execution context already holds an active component instance.
	#[error("A component is already attached in this window (active: '{active}', requested: '{requested}')")]
	AlreadyAttached { active: String, requested: String },

	/// No parent window could be discovered.
	#[error("No parent window discoverable: {0}")]
	NoParent(String),

	/// The window identity belongs to a different component.
	#[error("Window identity tag mismatch: expected '{expected}', found '{found}'")]
	TagMismatch { expected: String, found: String },

	/// The window name carries a malformed identity.
	#[error("Malformed window name: {0}")]
	Format(#[from] FormatError),

	/// The component does not support the requested context.
	#[error("Component '{tag}' does not support the {context} context")]
	ContextNotAllowed { tag: String, context: ContextType },

	/// Props do not match the component's schema.
	#[error("Invalid props: {0}")]
	InvalidProps(String),

	/// A handler table already has a handler for this message.
	#[error("Handler for '{0}' registered twice")]
	DuplicateHandler(MessageName),

	/// A transport already has a listener for this message and source.
	#[error("Listener for '{name}' from window {source_window} already registered")]
	DuplicateListener {
		name: MessageName,
		source_window: String,
	},

	/// A lifecycle transition that is not in the transition table.
	#[error("Invalid lifecycle transition: {from} -> {to}")]
	InvalidTransition { from: &'static str, to: &'static str },

	/// A pre-rendered window could not be asserted same-origin.
	#[error("Pre-render window {0} is not same-origin")]
	CrossOrigin(String),

	/// A message could not be delivered or was not answered.
	#[error("Failed to deliver '{name}' to window {target}: {reason}")]
	Delivery {
		target: String,
		name: MessageName,
		reason: String,
	},

	/// Timeout waiting for a reply or a state change.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// A window went away.
	#[error("Window closed: {0}")]
	WindowClosed(String),

	/// The owning instance or an internal channel was dropped.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Raised by consuming code; forwarded verbatim across the boundary.
	#[error("{message}")]
	Integration {
		message: String,
		stack: Option<String>,
	},

	/// A remote handler answered with a failure.
	#[error("Remote handler failed: {0}")]
	Remote(String),

	/// An error the child reported to its host via the ERROR message.
	#[error("Child reported error: {0}")]
	ChildReported(String),

	/// The operation does not exist for this context type.
	#[error("{operation} is not supported for {context} components")]
	Unsupported {
		operation: &'static str,
		context: ContextType,
	},

	/// A lifecycle hook failed while handling another failure.
	#[error("{hook} hook failed: {source}")]
	Hook {
		hook: &'static str,
		#[source]
		source: Box<Error>,
	},

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Any other failure.
	#[error("{0}")]
	Unknown(String),
}

impl Error {
	/// Creates an integration error without a stack.
	pub fn integration(message: impl Into<String>) -> Self {
		Error::Integration {
			message: message.into(),
			stack: None,
		}
	}

	/// Creates an integration error with a stack or trace.
	pub fn integration_with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
		Error::Integration {
			message: message.into(),
			stack: Some(stack.into()),
		}
	}

	/// Returns the category used for propagation and sanitizing decisions.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Error::InvalidOptions(_)
			| Error::InvalidDefinition(_)
			| Error::DuplicateTag(_)
			| Error::AlreadyAttached { .. }
			| Error::NoParent(_)
			| Error::TagMismatch { .. }
			| Error::Format(_)
			| Error::ContextNotAllowed { .. }
			| Error::InvalidProps(_)
			| Error::DuplicateHandler(_)
			| Error::DuplicateListener { .. }
			| Error::InvalidTransition { .. }
			| Error::CrossOrigin(_) => ErrorCategory::Configuration,
			Error::Delivery { .. }
			| Error::Timeout(_)
			| Error::WindowClosed(_)
			| Error::ChannelClosed
			| Error::Remote(_) => ErrorCategory::Delivery,
			Error::Integration { .. } | Error::ChildReported(_) => ErrorCategory::Integration,
			Error::Unsupported { .. } | Error::Hook { .. } | Error::Json(_) | Error::Unknown(_) => {
				ErrorCategory::Unknown
			}
		}
	}

	/// Returns true for the "no parent discoverable" kind that standalone
	/// mode is allowed to swallow.
	pub fn is_no_parent(&self) -> bool {
		matches!(self, Error::NoParent(_))
	}

	/// Returns true if this is a configuration error.
	pub fn is_configuration(&self) -> bool {
		self.category() == ErrorCategory::Configuration
	}

	/// Returns true if this is a delivery error.
	pub fn is_delivery(&self) -> bool {
		self.category() == ErrorCategory::Delivery
	}

	/// Returns true if this error came out of a failing `on_error` hook and
	/// must not be routed back into `on_error`.
	pub fn is_escaped(&self) -> bool {
		matches!(self, Error::Hook { hook: "on_error", .. })
	}

	/// Returns the stack if this is an integration error that carries one.
	pub fn stack_trace(&self) -> Option<&str> {
		match self {
			Error::Integration { stack, .. } => stack.as_deref(),
			_ => None,
		}
	}
}
