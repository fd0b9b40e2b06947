//! Protocol timing configuration.

use std::time::Duration;

/// Environment variable overriding [`ProtocolConfig::handshake_timeout`].
pub const HANDSHAKE_TIMEOUT_ENV: &str = "XFRAME_HANDSHAKE_TIMEOUT_MS";
/// Environment variable overriding [`ProtocolConfig::send_timeout`]; `0` disables it.
pub const SEND_TIMEOUT_ENV: &str = "XFRAME_SEND_TIMEOUT_MS";

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeouts applied to cross-boundary calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
	/// Bound on the INIT request/reply; an unanswered handshake is fatal
	/// unless the child runs standalone.
	pub handshake_timeout: Duration,
	/// Bound on every other request, `None` to wait until the transport
	/// reports a delivery failure.
	pub send_timeout: Option<Duration>,
}

impl Default for ProtocolConfig {
	fn default() -> Self {
		Self {
			handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
			send_timeout: Some(DEFAULT_SEND_TIMEOUT),
		}
	}
}

impl ProtocolConfig {
	/// Defaults overridden by [`HANDSHAKE_TIMEOUT_ENV`] and [`SEND_TIMEOUT_ENV`].
	///
	/// Unparseable values are logged and ignored.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let mut config = Self::default();

		if let Some(ms) = parse_millis(HANDSHAKE_TIMEOUT_ENV, lookup(HANDSHAKE_TIMEOUT_ENV)) {
			if ms == 0 {
				tracing::warn!(
					target = "xframe.config",
					var = HANDSHAKE_TIMEOUT_ENV,
					"handshake timeout cannot be zero; keeping default"
				);
			} else {
				config.handshake_timeout = Duration::from_millis(ms);
			}
		}

		if let Some(ms) = parse_millis(SEND_TIMEOUT_ENV, lookup(SEND_TIMEOUT_ENV)) {
			config.send_timeout = (ms > 0).then(|| Duration::from_millis(ms));
		}

		config
	}

	pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
		self.handshake_timeout = timeout;
		self
	}

	pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.send_timeout = timeout;
		self
	}
}

fn parse_millis(var: &str, raw: Option<String>) -> Option<u64> {
	let raw = raw?;
	match raw.trim().parse::<u64>() {
		Ok(ms) => Some(ms),
		Err(e) => {
			tracing::warn!(target = "xframe.config", var, value = %raw, error = %e, "ignoring invalid timeout");
			None
		}
	}
}
