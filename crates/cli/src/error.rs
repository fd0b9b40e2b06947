use std::path::PathBuf;

use thiserror::Error;
use xframe::ErrorCategory;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("failed to read component definition {path}")]
	Definition {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	#[error(transparent)]
	Format(#[from] xframe::FormatError),

	#[error(transparent)]
	Xframe(#[from] xframe::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Structured form for the output envelope.
	pub fn to_command_error(&self) -> CommandError {
		let code = match self {
			CliError::InvalidInput(_) | CliError::Format(_) | CliError::Json(_) => ErrorCode::InvalidInput,
			CliError::Definition { .. } => ErrorCode::IoError,
			CliError::Timeout { .. } => ErrorCode::Timeout,
			CliError::Xframe(err) => library_code(err),
			CliError::Anyhow(err) => err
				.downcast_ref::<xframe::Error>()
				.map_or(ErrorCode::InternalError, library_code),
		};
		let message = match self {
			CliError::Anyhow(err) => format!("{err:#}"),
			other => other.to_string(),
		};

		let details = match self {
			CliError::Definition { path, source } => Some(serde_json::json!({
				"path": path,
				"reason": source.to_string(),
			})),
			_ => None,
		};

		CommandError {
			code,
			message,
			details,
		}
	}
}

fn library_code(err: &xframe::Error) -> ErrorCode {
	match err {
		xframe::Error::Timeout(_) => ErrorCode::Timeout,
		other => match other.category() {
			ErrorCategory::Configuration => ErrorCode::ConfigurationError,
			ErrorCategory::Delivery => ErrorCode::DeliveryError,
			ErrorCategory::Integration => ErrorCode::IntegrationError,
			ErrorCategory::Unknown => ErrorCode::InternalError,
		},
	}
}
