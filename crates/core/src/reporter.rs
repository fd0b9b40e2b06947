//! Forwarding lifecycle errors to the parent component.
//!
//! Only integration errors cross the boundary as-is. Everything else is
//! replaced by [`GENERIC_ERROR_MESSAGE`] and logged locally, so internals of
//! the child never reach a host of unknown trust.

use xframe_protocol::{ErrorReport, MessageName};
use xframe_runtime::{Channel, Error};

/// What the host sees for any error that is not an integration error.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Builds the ERROR payload for `err`.
pub fn sanitize(err: &Error) -> ErrorReport {
	let error = match err {
		Error::Integration { message, stack } => match stack {
			Some(stack) => format!("{message}\n{stack}"),
			None => message.clone(),
		},
		other => {
			tracing::error!(target = "xframe.reporter", error = %other, "sanitizing error before reporting");
			GENERIC_ERROR_MESSAGE.to_string()
		}
	};
	ErrorReport { error }
}

/// Sends ERROR messages over the parent-component channel.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
	channel: Channel,
}

impl ErrorReporter {
	pub fn new(channel: Channel) -> Self {
		Self { channel }
	}

	/// Reports `err` once; a delivery failure is logged and dropped.
	pub async fn report(&self, err: &Error) {
		self.send(sanitize(err)).await;
	}

	/// Sends an already sanitized report.
	pub async fn send(&self, report: ErrorReport) {
		if let Err(e) = self.channel.send_no_result(MessageName::Error, report).await {
			tracing::warn!(
				target = "xframe.reporter",
				window = %self.channel.target(),
				error = %e,
				"failed to report error"
			);
		}
	}
}
