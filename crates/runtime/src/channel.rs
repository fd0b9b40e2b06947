//! Channel - typed request/reply to one target window.
//!
//! A child holds two channels, one to its parent window and one to its
//! parent-component window; a host holds one to the child it rendered.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use xframe_protocol::MessageName;

use crate::env::Transport;
use crate::error::{Error, Result};
use crate::window::WindowRef;

/// Sends protocol messages to a single target window.
#[derive(Clone)]
pub struct Channel {
	target: WindowRef,
	transport: Arc<dyn Transport>,
	timeout: Option<Duration>,
}

impl Channel {
	/// Creates a channel to `target` with no reply timeout.
	pub fn new(target: WindowRef, transport: Arc<dyn Transport>) -> Self {
		Self {
			target,
			transport,
			timeout: None,
		}
	}

	/// Bounds every request on this channel by `timeout`.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;
		self
	}

	/// Sends a message and awaits the reply.
	pub async fn send<P: Serialize, R: DeserializeOwned>(&self, name: MessageName, payload: P) -> Result<R> {
		let reply = self.send_value(name, serde_json::to_value(payload)?, self.timeout).await?;
		serde_json::from_value(reply).map_err(Into::into)
	}

	/// Sends a message with its own timeout, overriding the channel's.
	pub async fn send_with_timeout<P: Serialize, R: DeserializeOwned>(
		&self,
		name: MessageName,
		payload: P,
		timeout: Duration,
	) -> Result<R> {
		let reply = self
			.send_value(name, serde_json::to_value(payload)?, Some(timeout))
			.await?;
		serde_json::from_value(reply).map_err(Into::into)
	}

	/// Sends a message that carries no payload.
	pub async fn send_no_params<R: DeserializeOwned>(&self, name: MessageName) -> Result<R> {
		self.send(name, Value::Null).await
	}

	/// Sends a message whose reply is ignored.
	pub async fn send_no_result<P: Serialize>(&self, name: MessageName, payload: P) -> Result<()> {
		let _: Value = self.send(name, payload).await?;
		Ok(())
	}

	/// Fire-and-forget send; a failure is logged and dropped.
	pub fn notify<P: Serialize>(&self, name: MessageName, payload: P) {
		let params = match serde_json::to_value(payload) {
			Ok(params) => params,
			Err(e) => {
				tracing::warn!(target = "xframe.channel", message = %name, error = %e, "unserializable payload");
				return;
			}
		};
		let channel = self.clone();
		tokio::spawn(async move {
			if let Err(e) = channel.send_value(name, params, channel.timeout).await {
				tracing::debug!(target = "xframe.channel", window = %channel.target, message = %name, error = %e, "notify dropped");
			}
		});
	}

	async fn send_value(&self, name: MessageName, params: Value, timeout: Option<Duration>) -> Result<Value> {
		tracing::debug!(target = "xframe.channel", window = %self.target, message = %name, "sending");

		let fut = self.transport.send(&self.target, name, params);
		let reply = match timeout {
			Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
				Error::Timeout(format!(
					"no reply to '{name}' from window {} within {}ms",
					self.target,
					limit.as_millis()
				))
			})?,
			None => fut.await,
		};

		if let Err(err) = &reply {
			tracing::debug!(target = "xframe.channel", window = %self.target, message = %name, error = %err, "send failed");
		}
		reply
	}

	/// Returns the window this channel talks to.
	pub fn target(&self) -> &WindowRef {
		&self.target
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}
}

impl std::fmt::Debug for Channel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Channel")
			.field("target", &self.target)
			.field("timeout", &self.timeout)
			.finish()
	}
}
