//! Child side: a component instance running inside a host-created surface.
//!
//! [`ChildComponent::attach`] drives the instance from construction to
//! [`LifecycleState::Running`] (or [`LifecycleState::Standalone`]):
//!
//! 1. validate options and claim the execution context's single slot
//! 2. decode the window name and resolve the parent and parent-component windows
//! 3. start the close cascade and listen for PROPS and CLOSE from both windows
//! 4. send INIT to the parent component and merge the reply over the defaults
//!
//! Every listener, watch and the slot itself are released through one
//! [`DisposerRegistry`], drained by whichever close path runs first.

mod cascade;
mod resolve;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use xframe_protocol::{
	ContextType, Dimensions, InitReply, MessageName, PropsBag, PropsUpdate, WindowIdentity,
};
use xframe_runtime::{
	Channel, DisposerRegistry, Environment, Error, ErrorSink, HandlerTable, Result, WindowRef,
};

pub use self::state::LifecycleState;
use crate::component::ComponentDefinition;
use crate::hooks::{CloseHook, CloseReason, EnterHook, ErrorHook, PropsHook};
use crate::props::PropsSync;
use crate::reporter::{self, ErrorReporter};

/// What asked for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeTrigger {
	/// Called from code, outside any user interaction.
	Programmatic,
	/// Called while handling a user gesture; popups may resize themselves.
	UserGesture,
}

#[derive(Clone, Default)]
struct ChildHooks {
	on_enter: Option<EnterHook>,
	on_props: Option<PropsHook>,
	on_close: Option<CloseHook>,
	on_error: Option<ErrorHook>,
}

/// Options for [`ChildComponent::attach`].
#[derive(Clone)]
pub struct ChildOptions {
	definition: Arc<ComponentDefinition>,
	standalone: bool,
	handshake_timeout: Option<Duration>,
	hooks: ChildHooks,
}

impl ChildOptions {
	pub fn new(definition: Arc<ComponentDefinition>) -> Self {
		Self {
			definition,
			standalone: false,
			handshake_timeout: None,
			hooks: ChildHooks::default(),
		}
	}

	/// Run without a host when none can be found, or when the handshake fails.
	pub fn standalone(mut self, standalone: bool) -> Self {
		self.standalone = standalone;
		self
	}

	/// Overrides [`ProtocolConfig::handshake_timeout`](xframe_runtime::ProtocolConfig).
	pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
		self.handshake_timeout = Some(timeout);
		self
	}

	pub fn on_enter(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_enter = Some(Arc::new(hook));
		self
	}

	pub fn on_props(mut self, hook: impl Fn(&PropsBag) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_props = Some(Arc::new(hook));
		self
	}

	pub fn on_close(mut self, hook: impl Fn(&CloseReason) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_close = Some(Arc::new(hook));
		self
	}

	pub fn on_error(mut self, hook: impl Fn(&Error) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_error = Some(Arc::new(hook));
		self
	}

	pub fn validate(&self) -> Result<()> {
		self.definition.validate()?;
		if self.handshake_timeout == Some(Duration::ZERO) {
			return Err(Error::InvalidOptions("handshake timeout must be non-zero".to_string()));
		}
		Ok(())
	}
}

impl std::fmt::Debug for ChildOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChildOptions")
			.field("tag", &self.definition.tag())
			.field("standalone", &self.standalone)
			.field("handshake_timeout", &self.handshake_timeout)
			.finish_non_exhaustive()
	}
}

/// The two windows a linked instance talks to.
struct Links {
	parent: Channel,
	parent_component: Channel,
	/// Cascade watches and listeners; drained on close or standalone fallback.
	disposers: DisposerRegistry,
}

struct ChildInner {
	env: Environment,
	definition: Arc<ComponentDefinition>,
	standalone: bool,
	/// Set once the instance has entered [`LifecycleState::Standalone`].
	ran_standalone: AtomicBool,
	hooks: ChildHooks,
	state: Mutex<LifecycleState>,
	context: Mutex<Option<ContextType>>,
	identity: Mutex<Option<WindowIdentity>>,
	props: PropsSync,
	/// PROPS that arrived before the handshake completed.
	pending: Mutex<Vec<PropsBag>>,
	links: Mutex<Option<Arc<Links>>>,
	disposers: DisposerRegistry,
	closed: watch::Sender<bool>,
}

/// A component instance attached inside its surface.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct ChildComponent {
	inner: Arc<ChildInner>,
}

impl ChildComponent {
	/// Attaches the component described by `options` to the current window.
	///
	/// Resolves once the instance is running or standalone. Fails with
	/// [`Error::AlreadyAttached`] if this window already holds an instance,
	/// with [`Error::NoParent`] if no host can be found and the instance is
	/// not standalone, and with the delivery error if the handshake fails.
	pub async fn attach(env: Environment, options: ChildOptions) -> Result<Self> {
		options.validate()?;
		let ChildOptions {
			definition,
			standalone,
			handshake_timeout,
			hooks,
		} = options;
		let handshake_timeout = handshake_timeout.unwrap_or(env.config().handshake_timeout);

		let (closed, _) = watch::channel(false);
		let inner = Arc::new(ChildInner {
			props: PropsSync::seed(definition.default_props()),
			env,
			definition,
			standalone,
			ran_standalone: AtomicBool::new(false),
			hooks,
			state: Mutex::new(LifecycleState::Created),
			context: Mutex::new(None),
			identity: Mutex::new(None),
			pending: Mutex::new(Vec::new()),
			links: Mutex::new(None),
			disposers: DisposerRegistry::new(),
			closed,
		});
		inner.advance(LifecycleState::Validated)?;

		let slot = inner.env.slot().claim(inner.definition.tag())?;
		inner.disposers.register("slot", move || drop(slot));

		let resolved = match resolve::resolve(&inner.env, inner.definition.tag()) {
			Ok(resolved) => resolved,
			Err(err) if err.is_no_parent() && inner.standalone => {
				tracing::debug!(target = "xframe.child", tag = inner.tag(), reason = %err, "no host; running standalone");
				inner.run_standalone().await?;
				return Ok(Self { inner });
			}
			Err(err) => {
				inner.abort(&err);
				return Err(err);
			}
		};

		*inner.context.lock() = Some(resolved.identity.context());
		*inner.identity.lock() = Some(resolved.identity);
		inner.advance(LifecycleState::WindowResolved)?;

		let Some(parent_component) = resolved.parent_component else {
			if inner.standalone {
				tracing::debug!(target = "xframe.child", tag = inner.tag(), "parent component not found; running standalone");
				inner.run_standalone().await?;
				return Ok(Self { inner });
			}
			let err = Error::NoParent("parent component window not found".to_string());
			inner.abort(&err);
			return Err(err);
		};

		let links = match inner.link(resolved.parent, parent_component) {
			Ok(links) => links,
			Err(err) => {
				inner.abort(&err);
				return Err(err);
			}
		};
		inner.advance(LifecycleState::AwaitingInit)?;

		tracing::debug!(
			target = "xframe.child",
			tag = inner.tag(),
			window = %links.parent_component.target(),
			"sending init"
		);
		let reply: Result<InitReply> = links
			.parent_component
			.send_with_timeout(MessageName::Init, Value::Null, handshake_timeout)
			.await;

		match reply {
			Ok(reply) => inner.complete_handshake(reply).await?,
			Err(err) if inner.state().is_closing() => {
				tracing::debug!(target = "xframe.child", tag = inner.tag(), error = %err, "closed during handshake");
				return Err(Error::WindowClosed("instance closed during handshake".to_string()));
			}
			Err(err) if inner.standalone => {
				tracing::warn!(target = "xframe.child", tag = inner.tag(), error = %err, "handshake failed; falling back to standalone");
				inner.unlink();
				if let Err(escaped) = inner.funnel(&err) {
					inner.fail(&escaped).await;
					return Err(escaped);
				}
				inner.run_standalone().await?;
			}
			Err(err) => {
				let escaped = inner.funnel(&err);
				if let Err(close_err) = inner.close_with(CloseReason::Failed(err.to_string())).await {
					tracing::error!(target = "xframe.child", tag = inner.tag(), error = %close_err, "close after failed handshake");
				}
				return Err(escaped.err().unwrap_or(err));
			}
		}

		Ok(Self { inner })
	}

	/// Closes the instance, telling the parent component first.
	///
	/// Repeated calls, and calls after any other close path won, are no-ops.
	pub async fn close(&self) -> Result<()> {
		self.inner.close_with(CloseReason::Requested).await
	}

	/// Asks for a new surface size.
	///
	/// Frames ask their parent with RESIZE. Popups resize their own window,
	/// which platforms only allow while handling a user gesture.
	pub async fn resize(&self, dimensions: Dimensions, trigger: ResizeTrigger) -> Result<()> {
		if self.inner.state().is_closing() {
			return Err(Error::WindowClosed(format!("component '{}' is closed", self.inner.tag())));
		}
		match (self.inner.context(), trigger) {
			(Some(ContextType::Popup), ResizeTrigger::UserGesture) => self.inner.env.discovery().resize_self(dimensions),
			(Some(ContextType::Popup), ResizeTrigger::Programmatic) => Err(Error::Unsupported {
				operation: "programmatic resize",
				context: ContextType::Popup,
			}),
			_ => {
				let links = self.inner.links()?;
				links.parent.send_no_result(MessageName::Resize, dimensions).await
			}
		}
	}

	/// Forwards an error raised by consuming code to the parent component.
	///
	/// Use [`Error::integration`] for errors the host may see verbatim;
	/// anything else arrives as a generic message.
	pub async fn report_error(&self, err: &Error) -> Result<()> {
		let links = self.inner.links()?;
		ErrorReporter::new(links.parent_component.clone()).report(err).await;
		Ok(())
	}

	/// Current merged props.
	pub fn props(&self) -> PropsBag {
		self.inner.props.snapshot()
	}

	/// Context type delivered by the host, or decoded from the window name.
	pub fn context(&self) -> Option<ContextType> {
		self.inner.context()
	}

	pub fn state(&self) -> LifecycleState {
		self.inner.state()
	}

	/// Whether the instance ran without a host, even if it has since closed.
	pub fn is_standalone(&self) -> bool {
		self.inner.ran_standalone.load(Ordering::SeqCst)
	}

	pub fn parent_window(&self) -> Option<WindowRef> {
		let links = self.inner.links.lock();
		links.as_ref().map(|links| links.parent.target().clone())
	}

	pub fn parent_component_window(&self) -> Option<WindowRef> {
		let links = self.inner.links.lock();
		links.as_ref().map(|links| links.parent_component.target().clone())
	}

	/// Id of the pre-render this instance replaces, if the host pre-rendered.
	pub fn prerender_id(&self) -> Option<String> {
		let identity = self.inner.identity.lock();
		identity.as_ref().and_then(|identity| identity.prerender_id().map(str::to_string))
	}

	pub fn tag(&self) -> &str {
		self.inner.tag()
	}

	/// Resolves once the instance has fully closed.
	pub async fn closed(&self) {
		let mut closed = self.inner.closed.subscribe();
		let _ = closed.wait_for(|closed| *closed).await;
	}
}

impl std::fmt::Debug for ChildComponent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChildComponent")
			.field("tag", &self.inner.tag())
			.field("state", &self.inner.state())
			.field("context", &self.inner.context())
			.finish()
	}
}

impl ChildInner {
	fn tag(&self) -> &str {
		self.definition.tag()
	}

	fn state(&self) -> LifecycleState {
		*self.state.lock()
	}

	fn context(&self) -> Option<ContextType> {
		*self.context.lock()
	}

	fn advance(&self, next: LifecycleState) -> Result<()> {
		let mut state = self.state.lock();
		*state = state.transition(next)?;
		tracing::trace!(target = "xframe.child", tag = self.tag(), state = %next, "state");
		Ok(())
	}

	fn links(&self) -> Result<Arc<Links>> {
		self.links
			.lock()
			.clone()
			.ok_or_else(|| Error::NoParent(format!("component '{}' is not linked to a host", self.tag())))
	}

	/// Starts the close cascade and the PROPS/CLOSE listeners.
	fn link(self: &Arc<Self>, parent: WindowRef, parent_component: WindowRef) -> Result<Arc<Links>> {
		let transport = Arc::clone(self.env.transport());
		let timeout = self.env.config().send_timeout;
		let links = Arc::new(Links {
			parent: Channel::new(parent.clone(), Arc::clone(&transport)).with_timeout(timeout),
			parent_component: Channel::new(parent_component.clone(), Arc::clone(&transport))
				.with_timeout(timeout),
			disposers: DisposerRegistry::new(),
		});

		let on_parent = {
			let inner = Arc::downgrade(self);
			move |err| spawn_close(inner, CloseReason::ParentClosed(err))
		};
		let on_owner = {
			let inner = Arc::downgrade(self);
			move |err| spawn_close(inner, CloseReason::ParentComponentClosed(err))
		};
		for subscription in cascade::watch_parents(&self.env, &parent, &parent_component, on_parent, on_owner) {
			links.disposers.hold("cascade", subscription);
		}

		let table = self.handler_table()?;
		let sink = self.error_sink();
		let mut sources = vec![parent];
		if !sources.contains(&parent_component) {
			sources.push(parent_component);
		}
		for source in &sources {
			for subscription in table.listen(transport.as_ref(), source, Arc::clone(&sink))? {
				links.disposers.hold("listener", subscription);
			}
		}

		*self.links.lock() = Some(Arc::clone(&links));
		let held = Arc::clone(&links);
		self.disposers.register("links", move || {
			held.disposers.drain();
		});
		Ok(links)
	}

	/// Drops the links after a failed handshake; the slot stays claimed.
	fn unlink(&self) {
		if let Some(links) = self.links.lock().take() {
			links.disposers.drain();
		}
	}

	fn handler_table(self: &Arc<Self>) -> Result<HandlerTable> {
		let mut table = HandlerTable::new();
		let props = Arc::downgrade(self);
		let close = Arc::downgrade(self);
		table
			.on(MessageName::Props, move |_source, data| {
				let inner = props.upgrade();
				async move {
					match inner {
						Some(inner) => inner.on_props_message(data),
						None => Ok(Value::Null),
					}
				}
			})?
			.on(MessageName::Close, move |_source, _data| {
				let inner = close.upgrade();
				async move {
					match inner {
						Some(inner) => inner.close_with(CloseReason::ClosedByPeer).await.map(|()| Value::Null),
						None => Ok(Value::Null),
					}
				}
			})?;
		Ok(table)
	}

	fn on_props_message(&self, data: Value) -> Result<Value> {
		let update: PropsUpdate = serde_json::from_value(data)?;
		self.receive_props(update.props);
		Ok(Value::Null)
	}

	/// Failures of guarded handlers land here.
	fn error_sink(self: &Arc<Self>) -> ErrorSink {
		let inner = Arc::downgrade(self);
		Arc::new(move |err: &Error| {
			if err.is_escaped() {
				tracing::error!(target = "xframe.child", error = %err, "error hook failed");
				return;
			}
			if let Some(inner) = inner.upgrade() {
				if let Err(escaped) = inner.funnel(err) {
					tracing::error!(target = "xframe.child", tag = inner.tag(), error = %escaped, "error hook failed");
				}
			}
		})
	}

	fn receive_props(&self, incoming: PropsBag) {
		{
			let state = self.state.lock();
			if state.is_closing() {
				tracing::debug!(target = "xframe.child", tag = self.tag(), "props after close ignored");
				return;
			}
			if !state.is_live() {
				self.pending.lock().push(incoming);
				return;
			}
		}
		let merged = self.props.apply(incoming);
		self.fire_props(&merged);
	}

	async fn complete_handshake(self: &Arc<Self>, reply: InitReply) -> Result<()> {
		tracing::debug!(target = "xframe.child", tag = self.tag(), context = %reply.context, "init reply");
		if self.state().is_closing() {
			return Err(Error::WindowClosed("instance closed during handshake".to_string()));
		}
		*self.context.lock() = Some(reply.context);
		let merged = self.props.apply(reply.props);

		if let Err(escaped) = self.enter() {
			self.fail(&escaped).await;
			return Err(escaped);
		}
		self.fire_props(&merged);

		// Updates queued during the handshake apply after it, in arrival order.
		loop {
			let queued = {
				let mut state = self.state.lock();
				if state.is_closing() {
					return Err(Error::WindowClosed("instance closed during handshake".to_string()));
				}
				let mut pending = self.pending.lock();
				if pending.is_empty() {
					*state = state.transition(LifecycleState::Running)?;
					break;
				}
				std::mem::take(&mut *pending)
			};
			for update in queued {
				let merged = self.props.apply(update);
				self.fire_props(&merged);
			}
		}

		tracing::info!(target = "xframe.child", tag = self.tag(), "running");
		Ok(())
	}

	/// Completes initialization locally with the seeded props.
	async fn run_standalone(self: &Arc<Self>) -> Result<()> {
		self.advance(LifecycleState::Standalone)?;
		self.ran_standalone.store(true, Ordering::SeqCst);
		tracing::info!(target = "xframe.child", tag = self.tag(), "running standalone");
		if let Err(escaped) = self.enter() {
			self.fail(&escaped).await;
			return Err(escaped);
		}
		self.fire_props(&self.props.snapshot());
		Ok(())
	}

	/// Calls `on_enter`; a failure goes to `on_error`.
	fn enter(&self) -> Result<()> {
		match &self.hooks.on_enter {
			Some(hook) => match hook() {
				Ok(()) => Ok(()),
				Err(err) => self.funnel(&err),
			},
			None => Ok(()),
		}
	}

	fn fire_props(&self, props: &PropsBag) {
		if let Some(hook) = &self.hooks.on_props {
			if let Err(err) = hook(props) {
				tracing::warn!(target = "xframe.child", tag = self.tag(), error = %err, "on_props hook failed");
			}
		}
	}

	/// Reports `err` to the parent component and hands it to `on_error`.
	///
	/// Returns [`Error::Hook`] if `on_error` itself fails.
	fn funnel(&self, err: &Error) -> Result<()> {
		if !self.state().is_closing() {
			if let Some(links) = self.links.lock().clone() {
				let report = reporter::sanitize(err);
				let reporter = ErrorReporter::new(links.parent_component.clone());
				tokio::spawn(async move { reporter.send(report).await });
			}
		}

		match &self.hooks.on_error {
			Some(hook) => hook(err).map_err(|source| Error::Hook {
				hook: "on_error",
				source: Box::new(source),
			}),
			None => {
				tracing::error!(target = "xframe.child", tag = self.tag(), error = %err, "unhandled component error");
				Ok(())
			}
		}
	}

	/// Tears down after a failure before anything was linked; no hooks run.
	fn abort(&self, err: &Error) {
		tracing::debug!(target = "xframe.child", tag = self.tag(), error = %err, "attach failed");
		{
			let mut state = self.state.lock();
			if !state.is_closing() {
				*state = LifecycleState::Closing;
			}
		}
		self.disposers.drain();
		*self.state.lock() = LifecycleState::Closed;
		self.closed.send_replace(true);
	}

	async fn fail(&self, err: &Error) {
		if let Err(close_err) = self.close_with(CloseReason::Failed(err.to_string())).await {
			tracing::error!(target = "xframe.child", tag = self.tag(), error = %close_err, "close after failure");
		}
	}

	/// Runs one close path to completion. Only the first caller gets past
	/// the state check; `on_close` fires exactly once.
	async fn close_with(&self, reason: CloseReason) -> Result<()> {
		{
			let mut state = self.state.lock();
			if state.is_closing() {
				return Ok(());
			}
			*state = state.transition(LifecycleState::Closing)?;
		}
		tracing::info!(target = "xframe.child", tag = self.tag(), reason = %reason, "closing");

		let links = self.links.lock().clone();
		if let (true, Some(links)) = (reason.notifies_peer(), links.as_ref()) {
			// The owner is gone; the parent still holds the surface.
			let channel = match reason {
				CloseReason::ParentComponentClosed(_) => &links.parent,
				_ => &links.parent_component,
			};
			if let Err(e) = channel.send_no_result(MessageName::Close, Value::Null).await {
				tracing::debug!(target = "xframe.child", window = %channel.target(), error = %e, "close notification failed");
			}
		}

		self.disposers.drain();
		if matches!(reason, CloseReason::ParentClosed(_)) && self.context() == Some(ContextType::Popup) {
			self.env.discovery().close_self();
		}

		self.advance(LifecycleState::Closed)?;

		let result = match &self.hooks.on_close {
			Some(hook) => match hook(&reason) {
				Ok(()) => Ok(()),
				Err(err) => self.funnel(&err),
			},
			None => Ok(()),
		};
		self.closed.send_replace(true);
		result
	}
}

fn spawn_close(inner: Weak<ChildInner>, reason: CloseReason) {
	tokio::spawn(async move {
		let Some(inner) = inner.upgrade() else {
			return;
		};
		if let Err(err) = inner.close_with(reason).await {
			tracing::error!(target = "xframe.child", tag = inner.tag(), error = %err, "close cascade failed");
		}
	});
}

#[cfg(test)]
mod tests;
