//! Inbound message dispatch.
//!
//! A [`HandlerTable`] is an explicit mapping from [`MessageName`] to handler,
//! built and validated before anything listens. [`HandlerTable::listen`]
//! registers every entry with the transport for one source window, wrapping
//! each handler so that a failure is reported to the owning instance's
//! [`ErrorSink`] as well as returned to the sender.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use xframe_protocol::MessageName;

use crate::env::Transport;
use crate::error::{Error, Result};
use crate::subscription::Subscription;
use crate::window::WindowRef;

/// Boxed reply future produced by a handler.
pub type HandlerFuture = BoxFuture<'static, Result<Value>>;

/// Inbound handler: `(source window, payload)` → async reply.
pub type MessageHandler = Arc<dyn Fn(WindowRef, Value) -> HandlerFuture + Send + Sync>;

/// Receives failures raised by guarded handlers.
pub type ErrorSink = Arc<dyn Fn(&Error) + Send + Sync>;

/// Boxes an async closure into a [`MessageHandler`].
pub fn message_handler<F, Fut>(handler: F) -> MessageHandler
where
	F: Fn(WindowRef, Value) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Value>> + Send + 'static,
{
	Arc::new(move |source: WindowRef, data: Value| -> HandlerFuture { Box::pin(handler(source, data)) })
}

/// Message-name keyed handler table.
#[derive(Default, Clone)]
pub struct HandlerTable {
	handlers: IndexMap<MessageName, MessageHandler>,
}

impl HandlerTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a handler for `name`. Each name may be registered once.
	pub fn on<F, Fut>(&mut self, name: MessageName, handler: F) -> Result<&mut Self>
	where
		F: Fn(WindowRef, Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		if self.handlers.contains_key(&name) {
			return Err(Error::DuplicateHandler(name));
		}
		self.handlers.insert(name, message_handler(handler));
		Ok(self)
	}

	/// Message names in registration order.
	pub fn names(&self) -> impl Iterator<Item = MessageName> + '_ {
		self.handlers.keys().copied()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}

	/// Registers every handler for messages arriving from `source`.
	///
	/// If any registration fails, the ones already made are released before
	/// the error is returned.
	pub fn listen(
		&self,
		transport: &dyn Transport,
		source: &WindowRef,
		sink: ErrorSink,
	) -> Result<Vec<Subscription>> {
		let mut subscriptions = Vec::with_capacity(self.handlers.len());
		for (name, handler) in &self.handlers {
			let guarded = guard(*name, Arc::clone(handler), Arc::clone(&sink));
			subscriptions.push(transport.on(*name, source, guarded)?);
		}
		tracing::debug!(
			target = "xframe.dispatch",
			source = %source,
			count = subscriptions.len(),
			"listening"
		);
		Ok(subscriptions)
	}
}

impl std::fmt::Debug for HandlerTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.handlers.keys()).finish()
	}
}

fn guard(name: MessageName, handler: MessageHandler, sink: ErrorSink) -> MessageHandler {
	Arc::new(move |source: WindowRef, data: Value| -> HandlerFuture {
		let fut = handler(source.clone(), data);
		let sink = Arc::clone(&sink);
		Box::pin(async move {
			match fut.await {
				Ok(reply) => Ok(reply),
				Err(err) => {
					tracing::debug!(
						target = "xframe.dispatch",
						message = %name,
						source = %source,
						error = %err,
						"handler failed"
					);
					sink(&err);
					Err(err)
				}
			}
		})
	})
}
