//! Host side: rendering a component and answering its messages.
//!
//! [`ParentComponent::render`] picks the driver for the requested context,
//! writes the component identity into the surface's window name, opens the
//! surface, and then acts as the child's protocol peer: it answers INIT with
//! the context and the child-visible props, applies RESIZE requests through
//! the driver, and surfaces ERROR and CLOSE through its hooks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use xframe_protocol::{
	ContextType, Dimensions, ErrorReport, InitReply, MessageName, ParentRef, PropsBag, PropsUpdate,
	WindowIdentity,
};
use xframe_runtime::{
	Channel, DisposerRegistry, Environment, Error, ErrorSink, HandlerTable, Result,
	SurfaceAttributes, SurfaceHandle, WindowRef,
};

use crate::component::ComponentDefinition;
use crate::driver::{DriverRegistry, OpenRequest, OpenedSurface, RenderDriver};
use crate::hooks::{CloseHook, CloseReason, ErrorHook, InitHook, ResizeHook};

static NEXT_PRERENDER_ID: AtomicU64 = AtomicU64::new(1);

fn next_prerender_id() -> String {
	format!("prerender-{}", NEXT_PRERENDER_ID.fetch_add(1, Ordering::SeqCst))
}

#[derive(Clone, Default)]
struct ParentHooks {
	on_init: Option<InitHook>,
	on_resize: Option<ResizeHook>,
	on_child_error: Option<ErrorHook>,
	on_close: Option<CloseHook>,
}

/// Options for [`ParentComponent::render`].
#[derive(Clone, Default)]
pub struct RenderOptions {
	context: Option<ContextType>,
	props: PropsBag,
	url: Option<String>,
	prerender: bool,
	owner: Option<ParentRef>,
	drivers: DriverRegistry,
	hooks: ParentHooks,
}

impl RenderOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Surface to render into; defaults to the definition's default context.
	pub fn context(mut self, context: ContextType) -> Self {
		self.context = Some(context);
		self
	}

	pub fn props(mut self, props: PropsBag) -> Self {
		self.props = props;
		self
	}

	pub fn prop(mut self, key: impl Into<String>, value: Value) -> Self {
		self.props.insert(key, value);
		self
	}

	/// Overrides the definition's url.
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	/// Draws a placeholder while the child loads.
	pub fn prerender(mut self, prerender: bool) -> Self {
		self.prerender = prerender;
		self
	}

	/// Names a different window as the child's parent component, for
	/// renders delegated through an intermediary.
	pub fn owner(mut self, owner: ParentRef) -> Self {
		self.owner = Some(owner);
		self
	}

	pub fn drivers(mut self, drivers: DriverRegistry) -> Self {
		self.drivers = drivers;
		self
	}

	pub fn on_init(mut self, hook: impl Fn(&PropsBag) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_init = Some(Arc::new(hook));
		self
	}

	pub fn on_resize(mut self, hook: impl Fn(Dimensions) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_resize = Some(Arc::new(hook));
		self
	}

	/// Receives errors the child reports with ERROR.
	pub fn on_child_error(mut self, hook: impl Fn(&Error) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_child_error = Some(Arc::new(hook));
		self
	}

	pub fn on_close(mut self, hook: impl Fn(&CloseReason) -> Result<()> + Send + Sync + 'static) -> Self {
		self.hooks.on_close = Some(Arc::new(hook));
		self
	}
}

impl std::fmt::Debug for RenderOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderOptions")
			.field("context", &self.context)
			.field("props", &self.props)
			.field("url", &self.url)
			.field("prerender", &self.prerender)
			.field("owner", &self.owner)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Pending,
	Initialized,
	Closed,
}

struct ParentInner {
	env: Environment,
	definition: Arc<ComponentDefinition>,
	driver: Arc<dyn RenderDriver>,
	context: ContextType,
	hooks: ParentHooks,
	props: Mutex<PropsBag>,
	window: WindowRef,
	surface: SurfaceHandle,
	prerender_window: Option<WindowRef>,
	prerender_id: Option<String>,
	/// Removed once the child has initialized.
	prerender_frame: Arc<Mutex<Option<SurfaceHandle>>>,
	channel: Channel,
	initialized: AtomicBool,
	closing: AtomicBool,
	phase: watch::Sender<Phase>,
	disposers: DisposerRegistry,
}

/// A rendered component, seen from the host.
#[derive(Clone)]
pub struct ParentComponent {
	inner: Arc<ParentInner>,
}

impl ParentComponent {
	/// Renders `definition` into a new surface.
	///
	/// Resolves once the surface is open and listening; the child's
	/// handshake completes later (see [`wait_for_init`](Self::wait_for_init)).
	pub async fn render(
		env: Environment,
		definition: Arc<ComponentDefinition>,
		options: RenderOptions,
	) -> Result<Self> {
		definition.validate()?;
		let context = options.context.unwrap_or_else(|| definition.default_context());
		definition.ensure_context(context)?;
		let props = definition.normalize_props(&options.props)?;
		let driver = options.drivers.get(context)?;

		let url = options
			.url
			.clone()
			.unwrap_or_else(|| definition.url().to_string());
		if url.is_empty() {
			return Err(Error::InvalidOptions(format!(
				"component '{}' has no url to render",
				definition.tag()
			)));
		}

		let prerender_id = options.prerender.then(next_prerender_id);
		let parent = options.owner.clone().unwrap_or(match context {
			ContextType::Iframe => ParentRef::Parent { distance: 1 },
			ContextType::Popup => ParentRef::Opener,
		});
		let name = WindowIdentity::new(definition.tag(), context, parent)?
			.with_prerender_id(prerender_id.clone())
			.encode();
		let attributes = definition.attributes(context);

		let disposers = DisposerRegistry::new();
		let prerender_frame = Arc::new(Mutex::new(None));
		let (closed_tx, closed_rx) = oneshot::channel::<()>();
		let surface = SurfaceSetup {
			env: &env,
			driver: driver.as_ref(),
			name: &name,
			url: &url,
			attributes: &attributes,
			prerender: options.prerender,
			prerender_frame: &prerender_frame,
			disposers: &disposers,
		};
		let (opened, prerender_window) = match surface
			.open(Box::new(move || {
				let _ = closed_tx.send(());
			}))
			.await
		{
			Ok(opened) => opened,
			Err(err) => {
				disposers.drain();
				return Err(err);
			}
		};

		let channel = Channel::new(opened.window.clone(), Arc::clone(env.transport()))
			.with_timeout(env.config().send_timeout);
		let (phase, _) = watch::channel(Phase::Pending);
		let inner = Arc::new(ParentInner {
			env,
			definition,
			driver,
			context,
			hooks: options.hooks,
			props: Mutex::new(props),
			window: opened.window,
			surface: opened.surface,
			prerender_window,
			prerender_id,
			prerender_frame,
			channel,
			initialized: AtomicBool::new(false),
			closing: AtomicBool::new(false),
			phase,
			disposers,
		});

		if let Err(err) = inner.listen() {
			inner.disposers.drain();
			return Err(err);
		}
		watch_child(Arc::downgrade(&inner), closed_rx);

		tracing::info!(
			target = "xframe.parent",
			tag = inner.definition.tag(),
			context = %inner.context,
			window = %inner.window,
			"rendered"
		);
		Ok(Self { inner })
	}

	/// Merges `update` into the props and pushes the child-visible part.
	///
	/// Before the handshake the update only changes what INIT will deliver.
	pub async fn update_props(&self, update: PropsBag) -> Result<()> {
		if self.is_closed() {
			return Err(Error::WindowClosed(format!("component '{}' is closed", self.inner.definition.tag())));
		}
		self.inner.definition.validate_update(&update)?;
		let initialized = {
			// INIT snapshots the props under this lock, so an update lands
			// either in the reply or in a PROPS message.
			let mut props = self.inner.props.lock();
			props.merge(update.clone());
			self.is_initialized()
		};

		let outgoing = self.inner.definition.child_props(&update);
		if !initialized || outgoing.is_empty() {
			return Ok(());
		}
		self.inner
			.channel
			.send_no_result(MessageName::Props, PropsUpdate { props: outgoing })
			.await
	}

	/// Closes the child and tears down the surface.
	pub async fn close(&self) -> Result<()> {
		self.inner.close_with(CloseReason::Requested).await
	}

	/// Resizes the surface directly; unsupported for popups.
	pub fn resize(&self, dimensions: Dimensions) -> Result<()> {
		self.inner
			.driver
			.resize(&self.inner.env, &self.inner.surface, dimensions)
	}

	/// Waits until the child has completed its handshake.
	pub async fn wait_for_init(&self, timeout: Duration) -> Result<()> {
		let mut rx = self.inner.phase.subscribe();
		let reached = match tokio::time::timeout(timeout, rx.wait_for(|phase| *phase != Phase::Pending)).await {
			Err(_) => {
				return Err(Error::Timeout(format!(
					"child of '{}' did not initialize within {}ms",
					self.inner.definition.tag(),
					timeout.as_millis()
				)));
			}
			Ok(Err(_)) => return Err(Error::ChannelClosed),
			Ok(Ok(phase)) => *phase,
		};
		if reached == Phase::Initialized || self.is_initialized() {
			Ok(())
		} else {
			Err(Error::WindowClosed(format!("child window {} closed before init", self.inner.window)))
		}
	}

	/// The child's window.
	pub fn window(&self) -> &WindowRef {
		&self.inner.window
	}

	pub fn context(&self) -> ContextType {
		self.inner.context
	}

	pub fn definition(&self) -> &Arc<ComponentDefinition> {
		&self.inner.definition
	}

	/// All props, including those kept on the host.
	pub fn props(&self) -> PropsBag {
		self.inner.props.lock().clone()
	}

	pub fn prerender_window(&self) -> Option<&WindowRef> {
		self.inner.prerender_window.as_ref()
	}

	pub fn prerender_id(&self) -> Option<&str> {
		self.inner.prerender_id.as_deref()
	}

	pub fn is_initialized(&self) -> bool {
		self.inner.initialized.load(Ordering::SeqCst)
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closing.load(Ordering::SeqCst)
	}

	/// Resolves once the component has fully closed.
	pub async fn closed(&self) {
		let mut rx = self.inner.phase.subscribe();
		let _ = rx.wait_for(|phase| *phase == Phase::Closed).await;
	}
}

impl std::fmt::Debug for ParentComponent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ParentComponent")
			.field("tag", &self.inner.definition.tag())
			.field("context", &self.inner.context)
			.field("window", &self.inner.window)
			.field("initialized", &self.is_initialized())
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Borrowed inputs for opening the surface.
struct SurfaceSetup<'a> {
	env: &'a Environment,
	driver: &'a dyn RenderDriver,
	name: &'a str,
	url: &'a str,
	attributes: &'a SurfaceAttributes,
	prerender: bool,
	prerender_frame: &'a Arc<Mutex<Option<SurfaceHandle>>>,
	disposers: &'a DisposerRegistry,
}

impl SurfaceSetup<'_> {
	async fn open(self, on_closed: Box<dyn FnOnce() + Send>) -> Result<(OpenedSurface, Option<WindowRef>)> {
		let frame = if self.prerender {
			self.driver.open_prerender_frame(self.env, self.attributes)?
		} else {
			None
		};
		if let Some(frame) = &frame {
			*self.prerender_frame.lock() = Some(frame.clone());
			let surfaces = Arc::clone(self.env.surfaces());
			let slot = Arc::clone(self.prerender_frame);
			self.disposers.register("prerender", move || {
				if let Some(frame) = slot.lock().take() {
					surfaces.destroy(&frame);
				}
			});
		}

		let surface = self.driver.open_frame(self.env, self.attributes)?;
		let opened = self
			.driver
			.open(
				self.env,
				OpenRequest {
					name: self.name,
					url: self.url,
					surface,
					attributes: self.attributes,
					on_closed,
				},
				self.disposers,
			)
			.await?;

		let prerender_window = if self.prerender {
			Some(
				self.driver
					.open_prerender(self.env, Some(&opened.window), frame.as_ref())
					.await?,
			)
		} else {
			None
		};
		Ok((opened, prerender_window))
	}
}

/// Closes the component when the child window goes away.
fn watch_child(inner: Weak<ParentInner>, closed: oneshot::Receiver<()>) {
	tokio::spawn(async move {
		// Dropped sender: the watch was disposed by another close path.
		if closed.await.is_err() {
			return;
		}
		let Some(inner) = inner.upgrade() else {
			return;
		};
		let err = Error::WindowClosed(format!("child window {} closed", inner.window));
		if let Err(e) = inner.close_with(CloseReason::ChildClosed(err)).await {
			tracing::error!(target = "xframe.parent", tag = inner.definition.tag(), error = %e, "close after child loss failed");
		}
	});
}

impl ParentInner {
	fn listen(self: &Arc<Self>) -> Result<()> {
		if let Err(e) = self.resize_initial() {
			tracing::debug!(target = "xframe.parent", error = %e, "initial size not applied");
		}

		let mut table = HandlerTable::new();
		let init = Arc::downgrade(self);
		let resize = Arc::downgrade(self);
		let close = Arc::downgrade(self);
		let error = Arc::downgrade(self);
		table
			.on(MessageName::Init, move |_source, _data| {
				let inner = init.upgrade();
				async move {
					match inner {
						Some(inner) => inner.on_init_message(),
						None => Err(Error::ChannelClosed),
					}
				}
			})?
			.on(MessageName::Resize, move |_source, data| {
				let inner = resize.upgrade();
				async move {
					match inner {
						Some(inner) => inner.on_resize_message(data),
						None => Err(Error::ChannelClosed),
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
			})?
			.on(MessageName::Error, move |_source, data| {
				let inner = error.upgrade();
				async move {
					match inner {
						Some(inner) => inner.on_error_message(data),
						None => Ok(Value::Null),
					}
				}
			})?;

		let tag = self.definition.tag().to_string();
		let sink: ErrorSink = Arc::new(move |err: &Error| {
			tracing::warn!(target = "xframe.parent", tag = %tag, error = %err, "handler failed");
		});
		for subscription in table.listen(self.env.transport().as_ref(), &self.window, sink)? {
			self.disposers.hold("listener", subscription);
		}
		Ok(())
	}

	fn resize_initial(&self) -> Result<()> {
		let initial = self.definition.dimensions().initial();
		if initial.is_empty() {
			return Ok(());
		}
		match self.driver.resize(&self.env, &self.surface, initial) {
			Err(Error::Unsupported { .. }) => Ok(()),
			other => other,
		}
	}

	fn on_init_message(&self) -> Result<Value> {
		if self.closing.load(Ordering::SeqCst) {
			return Err(Error::WindowClosed(format!("component '{}' is closed", self.definition.tag())));
		}
		let (props, first) = {
			let props = self.props.lock();
			(props.clone(), !self.initialized.swap(true, Ordering::SeqCst))
		};
		let reply = InitReply {
			context: self.context,
			props: self.definition.child_props(&props),
		};
		let reply = serde_json::to_value(reply)?;

		if first {
			tracing::debug!(target = "xframe.parent", tag = self.definition.tag(), window = %self.window, "child initialized");
			self.phase.send_replace(Phase::Initialized);
			if let Some(frame) = self.prerender_frame.lock().take() {
				self.env.surfaces().destroy(&frame);
			}
			if let Some(hook) = &self.hooks.on_init {
				if let Err(e) = hook(&props) {
					tracing::warn!(target = "xframe.parent", tag = self.definition.tag(), error = %e, "on_init hook failed");
				}
			}
		}
		Ok(reply)
	}

	fn on_resize_message(&self, data: Value) -> Result<Value> {
		let dimensions: Dimensions = serde_json::from_value(data)?;
		self.driver.resize(&self.env, &self.surface, dimensions)?;
		tracing::debug!(target = "xframe.parent", tag = self.definition.tag(), ?dimensions, "resized by child");
		if let Some(hook) = &self.hooks.on_resize {
			if let Err(e) = hook(dimensions) {
				tracing::warn!(target = "xframe.parent", tag = self.definition.tag(), error = %e, "on_resize hook failed");
			}
		}
		Ok(Value::Null)
	}

	fn on_error_message(&self, data: Value) -> Result<Value> {
		let report: ErrorReport = serde_json::from_value(data)?;
		let err = Error::ChildReported(report.error);
		let handled = match &self.hooks.on_child_error {
			Some(hook) => hook(&err),
			None => {
				tracing::warn!(target = "xframe.parent", tag = self.definition.tag(), error = %err, "child error");
				Ok(())
			}
		};
		if let Err(e) = handled {
			tracing::warn!(target = "xframe.parent", tag = self.definition.tag(), error = %e, "on_child_error hook failed");
		}
		Ok(Value::Null)
	}

	async fn close_with(&self, reason: CloseReason) -> Result<()> {
		if self.closing.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		tracing::info!(target = "xframe.parent", tag = self.definition.tag(), reason = %reason, "closing");

		// A child that never sent INIT has no listener to tell.
		if reason.notifies_peer() && self.initialized.load(Ordering::SeqCst) {
			if let Err(e) = self.channel.send_no_result(MessageName::Close, Value::Null).await {
				tracing::debug!(target = "xframe.parent", window = %self.window, error = %e, "close notification failed");
			}
		}
		self.disposers.drain();

		let result = match &self.hooks.on_close {
			Some(hook) => hook(&reason),
			None => Ok(()),
		};
		self.phase.send_replace(Phase::Closed);
		result
	}
}
