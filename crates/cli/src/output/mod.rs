//! Result envelope shared by every command.
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "simulate",
//!   "data": { ... },
//!   "timings": { "durationMs": 12 }
//! }
//! ```
//!
//! Failures carry `error: { code, message, details? }` instead of `data`.


use std::io::{self, Write};
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xframe::{ContextType, ParentRef, PropsBag};

/// Bumped on breaking changes to the envelope.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON
	#[default]
	Json,
	/// One JSON document per line
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	pub command: String,

	/// Command-specific result, only on success
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

/// Stable codes for scripted consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Bad arguments or a malformed window name
	InvalidInput,
	/// Rejected definition, options, or props
	ConfigurationError,
	/// A message was not delivered or not answered
	DeliveryError,
	/// Raised by component code on purpose
	IntegrationError,
	Timeout,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::ConfigurationError => write!(f, "CONFIGURATION_ERROR"),
			ErrorCode::DeliveryError => write!(f, "DELIVERY_ERROR"),
			ErrorCode::IntegrationError => write!(f, "INTEGRATION_ERROR"),
			ErrorCode::Timeout => write!(f, "TIMEOUT"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
	pub level: DiagnosticLevel,

	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
	Info,
	Warning,
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
			diagnostics: Vec::new(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
			diagnostics: self.diagnostics,
		}
	}
}

/// Prints `result` to stdout in `format`.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(data) = &result.data {
			match serde_json::to_value(data) {
				// Bare strings (an encoded name) print as-is.
				Ok(Value::String(text)) => {
					let _ = writeln!(stdout, "{text}");
				}
				Ok(value) => {
					if let Ok(json) = serde_json::to_string_pretty(&value) {
						let _ = writeln!(stdout, "{json}");
					}
				}
				Err(_) => {}
			}
		}
	} else if let Some(error) = &result.error {
		let _ = writeln!(stdout, "{} [{}]: {}", "error".red().bold(), error.code, error.message);
	}

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info".cyan(),
			DiagnosticLevel::Warning => "warning".yellow(),
		};
		let _ = writeln!(stdout, "[{prefix}] {}", diag.message);
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "error".red().bold(), error.code, error.message);
}

/// Result data for `decode-name`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityData {
	pub tag: String,
	pub context: ContextType,
	pub parent: ParentRef,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prerender_id: Option<String>,
}

/// One message observed on the simulated wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
	pub from: String,
	pub to: String,
	pub name: String,
	#[serde(skip_serializing_if = "Value::is_null")]
	pub data: Value,
}

/// A lifecycle hook firing on either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
	pub side: Side,
	pub hook: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Host,
	Child,
}

/// Result data for `simulate`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateData {
	pub tag: String,
	pub context: ContextType,
	/// Name the host wrote into the surface
	pub window_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prerender_id: Option<String>,
	pub host_props: PropsBag,
	/// Props the child ended with; absent when no child attached
	#[serde(skip_serializing_if = "Option::is_none")]
	pub child_props: Option<PropsBag>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub child_state: Option<String>,
	pub events: Vec<HookEvent>,
	pub messages: Vec<WireMessage>,
}
