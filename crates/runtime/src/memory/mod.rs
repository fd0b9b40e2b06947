//! In-process multi-window browser.
//!
//! [`MemoryBrowser`] keeps a table of windows (top-level, frames, popups)
//! and implements every collaborator seam for each of them through
//! [`MemoryContext`]. Messages between a sender and a target flow through a
//! dedicated FIFO queue drained by one pump task, so delivery order per pair
//! matches send order. Closing a window closes its frames (not its popups),
//! drops its listeners, and fails every reply it still owes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use xframe_protocol::{ContextType, Dimensions, MessageName};

use crate::config::ProtocolConfig;
use crate::dispatch::MessageHandler;
use crate::env::{
	ContextSlot, Environment, LivenessWatch, SurfaceAttributes, SurfaceFactory, SurfaceHandle,
	Transport, WindowDiscovery,
};
use crate::error::{Error, Result};
use crate::subscription::{Subscription, SubscriptionId, next_subscription_id};
use crate::window::WindowRef;

#[cfg(test)]
mod tests;

/// A message accepted for delivery, as recorded by [`MemoryBrowser::messages`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredMessage {
	pub from: WindowRef,
	pub to: WindowRef,
	pub name: MessageName,
	pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WindowKind {
	Top,
	Frame { parent: Arc<str> },
	Popup { opener: Arc<str> },
}

impl WindowKind {
	fn context(&self) -> Option<ContextType> {
		match self {
			WindowKind::Top => None,
			WindowKind::Frame { .. } => Some(ContextType::Iframe),
			WindowKind::Popup { .. } => Some(ContextType::Popup),
		}
	}
}

struct WindowEntry {
	uid: String,
	origin: String,
	name: Option<String>,
	kind: WindowKind,
	dimensions: Dimensions,
	closed: watch::Sender<bool>,
	slot: Arc<ContextSlot>,
}

impl WindowEntry {
	fn is_closed(&self) -> bool {
		*self.closed.borrow()
	}
}

struct SurfaceEntry {
	window: Arc<str>,
	attributes: SurfaceAttributes,
}

struct Envelope {
	name: MessageName,
	data: Value,
	reply: oneshot::Sender<Result<Value>>,
}

type ListenerKey = (Arc<str>, MessageName, Arc<str>);
type QueueKey = (Arc<str>, Arc<str>);

struct BrowserInner {
	windows: DashMap<Arc<str>, WindowEntry>,
	surfaces: DashMap<u64, SurfaceEntry>,
	/// (target, name, source) → handler
	listeners: DashMap<ListenerKey, (SubscriptionId, MessageHandler)>,
	/// (sender, target) → queue feeding that pair's pump
	queues: DashMap<QueueKey, mpsc::UnboundedSender<Envelope>>,
	log: Mutex<Vec<DeliveredMessage>>,
	next_window: AtomicU64,
	next_surface: AtomicU64,
	config: ProtocolConfig,
}

/// An in-memory browser holding any number of windows.
///
/// Cloning is cheap and yields a handle to the same browser.
#[derive(Clone)]
pub struct MemoryBrowser {
	inner: Arc<BrowserInner>,
}

impl Default for MemoryBrowser {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryBrowser {
	pub fn new() -> Self {
		Self::with_config(ProtocolConfig::default())
	}

	/// Creates a browser whose environments carry `config`.
	pub fn with_config(config: ProtocolConfig) -> Self {
		Self {
			inner: Arc::new(BrowserInner {
				windows: DashMap::new(),
				surfaces: DashMap::new(),
				listeners: DashMap::new(),
				queues: DashMap::new(),
				log: Mutex::new(Vec::new()),
				next_window: AtomicU64::new(1),
				next_surface: AtomicU64::new(1),
				config,
			}),
		}
	}

	/// Opens a top-level window at `url`.
	pub fn open_window(&self, url: &str) -> WindowRef {
		let origin = origin_of(url, "null");
		let id = self.inner.open(WindowKind::Top, origin, None);
		self.inner.window_ref(&id)
	}

	/// Opens a frame inside `parent`, as if the page itself had created it.
	pub fn open_frame_window(&self, parent: &WindowRef, url: &str, name: Option<&str>) -> Result<WindowRef> {
		let parent_id = self.inner.live_id(parent)?;
		let origin = origin_of(url, &self.inner.origin(&parent_id));
		let id = self.inner.open(
			WindowKind::Frame { parent: parent_id },
			origin,
			name.map(str::to_string),
		);
		Ok(self.inner.window_ref(&id))
	}

	/// Opens a popup from `opener`, as if the page itself had opened it.
	pub fn open_popup_window(&self, opener: &WindowRef, url: &str, name: Option<&str>) -> Result<WindowRef> {
		let opener_id = self.inner.live_id(opener)?;
		let origin = origin_of(url, &self.inner.origin(&opener_id));
		let id = self.inner.open(
			WindowKind::Popup { opener: opener_id },
			origin,
			name.map(str::to_string),
		);
		Ok(self.inner.window_ref(&id))
	}

	/// Returns the collaborators as seen from inside `window`.
	pub fn context(&self, window: &WindowRef) -> MemoryContext {
		MemoryContext {
			browser: Arc::clone(&self.inner),
			window: Arc::from(window.id()),
		}
	}

	/// Builds the [`Environment`] for code running inside `window`.
	///
	/// Every environment built for the same window shares one
	/// [`ContextSlot`].
	pub fn environment(&self, window: &WindowRef) -> Environment {
		let ctx = Arc::new(self.context(window));
		let slot = self
			.inner
			.windows
			.get(window.id())
			.map(|entry| Arc::clone(&entry.slot))
			.unwrap_or_default();
		Environment::new(ctx.clone(), ctx.clone(), ctx.clone(), ctx)
			.with_slot(slot)
			.with_config(self.inner.config)
	}

	/// Closes `window` and every frame nested inside it.
	pub fn close(&self, window: &WindowRef) {
		self.inner.close(window.id());
	}

	/// Returns true if `window` is closed or was never opened.
	pub fn is_closed(&self, window: &WindowRef) -> bool {
		self.inner.is_closed(window.id())
	}

	/// Renames `window`.
	pub fn set_name(&self, window: &WindowRef, name: Option<&str>) {
		if let Some(mut entry) = self.inner.windows.get_mut(window.id()) {
			entry.name = name.map(str::to_string);
		}
	}

	pub fn name_of(&self, window: &WindowRef) -> Option<String> {
		self.inner.windows.get(window.id())?.name.clone()
	}

	pub fn uid_of(&self, window: &WindowRef) -> Option<String> {
		self.inner.windows.get(window.id()).map(|e| e.uid.clone())
	}

	pub fn origin_of(&self, window: &WindowRef) -> Option<String> {
		self.inner.windows.get(window.id()).map(|e| e.origin.clone())
	}

	pub fn dimensions_of(&self, window: &WindowRef) -> Option<Dimensions> {
		self.inner.windows.get(window.id()).map(|e| e.dimensions)
	}

	/// Attributes of the surface hosting `window`, if a factory created it.
	pub fn attributes_of(&self, window: &WindowRef) -> Option<SurfaceAttributes> {
		self.inner
			.surfaces
			.iter()
			.find(|s| s.window.as_ref() == window.id())
			.map(|s| s.attributes.clone())
	}

	/// Every message accepted for delivery so far, in send order.
	pub fn messages(&self) -> Vec<DeliveredMessage> {
		self.inner.log.lock().clone()
	}

	/// Messages sent by `window`.
	pub fn messages_from(&self, window: &WindowRef) -> Vec<DeliveredMessage> {
		self.inner
			.log
			.lock()
			.iter()
			.filter(|m| &m.from == window)
			.cloned()
			.collect()
	}
}

impl std::fmt::Debug for MemoryBrowser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryBrowser")
			.field("windows", &self.inner.windows.len())
			.field("listeners", &self.inner.listeners.len())
			.finish()
	}
}

impl BrowserInner {
	fn open(&self, kind: WindowKind, origin: String, name: Option<String>) -> Arc<str> {
		let n = self.next_window.fetch_add(1, Ordering::SeqCst);
		let id: Arc<str> = Arc::from(format!("win-{n}"));
		let (closed, _) = watch::channel(false);
		tracing::trace!(target = "xframe.memory", window = %id, ?kind, %origin, "window opened");
		self.windows.insert(
			Arc::clone(&id),
			WindowEntry {
				uid: format!("uid-{n:08x}"),
				origin,
				name,
				kind,
				dimensions: Dimensions::default(),
				closed,
				slot: Arc::new(ContextSlot::new()),
			},
		);
		id
	}

	fn window_ref(&self, id: &str) -> WindowRef {
		let context = self.windows.get(id).and_then(|e| e.kind.context());
		let window = WindowRef::new(id);
		match context {
			Some(context) => window.with_context(context),
			None => window,
		}
	}

	fn is_closed(&self, id: &str) -> bool {
		self.windows.get(id).is_none_or(|e| e.is_closed())
	}

	fn live_id(&self, window: &WindowRef) -> Result<Arc<str>> {
		match self.windows.get(window.id()) {
			Some(entry) if !entry.is_closed() => Ok(Arc::clone(entry.key())),
			_ => Err(Error::WindowClosed(window.to_string())),
		}
	}

	fn origin(&self, id: &str) -> String {
		self.windows
			.get(id)
			.map(|e| e.origin.clone())
			.unwrap_or_else(|| "null".to_string())
	}

	fn kind(&self, id: &str) -> Option<WindowKind> {
		self.windows.get(id).map(|e| e.kind.clone())
	}

	fn close(&self, id: &str) {
		let Some(already_closed) = self.windows.get(id).map(|e| e.closed.send_replace(true)) else {
			return;
		};
		if already_closed {
			return;
		}
		tracing::trace!(target = "xframe.memory", window = id, "window closed");

		let frames: Vec<Arc<str>> = self
			.windows
			.iter()
			.filter(|e| matches!(&e.kind, WindowKind::Frame { parent } if parent.as_ref() == id))
			.map(|e| Arc::clone(e.key()))
			.collect();
		for frame in frames {
			self.close(&frame);
		}

		// Handlers may own subscriptions into this table; drop them unlocked.
		let stale: Vec<ListenerKey> = self
			.listeners
			.iter()
			.filter(|l| l.key().0.as_ref() == id)
			.map(|l| l.key().clone())
			.collect();
		let removed: Vec<_> = stale.iter().filter_map(|key| self.listeners.remove(key)).collect();
		drop(removed);

		self.queues
			.retain(|(from, to), _| from.as_ref() != id && to.as_ref() != id);
		self.surfaces.retain(|_, s| s.window.as_ref() != id);
	}

	fn enqueue(
		self: &Arc<Self>,
		from: &Arc<str>,
		to: &WindowRef,
		name: MessageName,
		data: Value,
	) -> Result<oneshot::Receiver<Result<Value>>> {
		let undeliverable = |reason: &str| Error::Delivery {
			target: to.to_string(),
			name,
			reason: reason.to_string(),
		};
		if self.is_closed(from) {
			return Err(undeliverable("sender window is closed"));
		}
		if self.is_closed(to.id()) {
			return Err(undeliverable("target window is closed"));
		}

		self.log.lock().push(DeliveredMessage {
			from: self.window_ref(from),
			to: self.window_ref(to.id()),
			name,
			data: data.clone(),
		});

		let key: QueueKey = (Arc::clone(from), Arc::from(to.id()));
		let queue = self
			.queues
			.entry(key.clone())
			.or_insert_with(|| self.spawn_pump(key))
			.value()
			.clone();

		let (reply, rx) = oneshot::channel();
		queue
			.send(Envelope { name, data, reply })
			.map_err(|_| undeliverable("target window is closed"))?;
		Ok(rx)
	}

	fn spawn_pump(self: &Arc<Self>, (from, to): QueueKey) -> mpsc::UnboundedSender<Envelope> {
		let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
		let browser: Weak<Self> = Arc::downgrade(self);
		tokio::spawn(async move {
			while let Some(envelope) = rx.recv().await {
				let Some(browser) = browser.upgrade() else {
					break;
				};
				let reply = browser.dispatch(&from, &to, envelope.name, envelope.data).await;
				let _ = envelope.reply.send(reply);
			}
		});
		tx
	}

	async fn dispatch(&self, from: &Arc<str>, to: &Arc<str>, name: MessageName, data: Value) -> Result<Value> {
		let undeliverable = |reason: &str| Error::Delivery {
			target: to.to_string(),
			name,
			reason: reason.to_string(),
		};

		let Some(mut closed) = self.windows.get(to.as_ref()).map(|e| e.closed.subscribe()) else {
			return Err(undeliverable("target window does not exist"));
		};
		if *closed.borrow() {
			return Err(undeliverable("target window is closed"));
		}

		let key: ListenerKey = (Arc::clone(to), name, Arc::clone(from));
		let Some(handler) = self.listeners.get(&key).map(|l| Arc::clone(&l.1)) else {
			return Err(undeliverable("no handler registered"));
		};

		let source = self.window_ref(from);
		tokio::select! {
			reply = handler(source, data) => reply,
			_ = closed.wait_for(|closed| *closed) => Err(undeliverable("target window closed before replying")),
		}
	}
}

/// The collaborators of one window in a [`MemoryBrowser`].
#[derive(Clone)]
pub struct MemoryContext {
	browser: Arc<BrowserInner>,
	window: Arc<str>,
}

impl MemoryContext {
	pub fn window(&self) -> WindowRef {
		self.browser.window_ref(&self.window)
	}
}

impl std::fmt::Debug for MemoryContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryContext").field("window", &self.window).finish()
	}
}

impl Transport for MemoryContext {
	fn send(&self, target: &WindowRef, name: MessageName, data: Value) -> BoxFuture<'_, Result<Value>> {
		let queued = self.browser.enqueue(&self.window, target, name, data);
		let target = target.to_string();
		Box::pin(async move {
			queued?.await.unwrap_or_else(|_| {
				Err(Error::Delivery {
					target,
					name,
					reason: "reply dropped".to_string(),
				})
			})
		})
	}

	fn on(&self, name: MessageName, source: &WindowRef, handler: MessageHandler) -> Result<Subscription> {
		let key: ListenerKey = (Arc::clone(&self.window), name, Arc::from(source.id()));
		let id = next_subscription_id();

		match self.browser.listeners.entry(key.clone()) {
			Entry::Occupied(_) => {
				return Err(Error::DuplicateListener {
					name,
					source_window: source.to_string(),
				});
			}
			Entry::Vacant(slot) => {
				slot.insert((id, handler));
			}
		}

		let browser = Arc::downgrade(&self.browser);
		Ok(Subscription::new(move || {
			if let Some(browser) = browser.upgrade() {
				browser.listeners.remove_if(&key, |_, (current, _)| *current == id);
			}
		}))
	}
}

impl SurfaceFactory for MemoryContext {
	fn create(
		&self,
		context: ContextType,
		url: Option<&str>,
		name: Option<&str>,
		attributes: &SurfaceAttributes,
	) -> Result<SurfaceHandle> {
		let owner = self.browser.live_id(&self.window())?;
		let owner_origin = self.browser.origin(&owner);
		let origin = url.map_or_else(|| owner_origin.clone(), |url| origin_of(url, &owner_origin));
		let kind = match context {
			ContextType::Iframe => WindowKind::Frame { parent: owner },
			ContextType::Popup => WindowKind::Popup { opener: owner },
		};
		let window = self.browser.open(kind, origin, name.map(str::to_string));

		let id = self.browser.next_surface.fetch_add(1, Ordering::SeqCst);
		self.browser.surfaces.insert(
			id,
			SurfaceEntry {
				window,
				attributes: attributes.clone(),
			},
		);
		Ok(SurfaceHandle::new(id, context))
	}

	fn window_of(&self, surface: &SurfaceHandle) -> BoxFuture<'_, Result<WindowRef>> {
		let window = self
			.browser
			.surfaces
			.get(&surface.id())
			.map(|s| Arc::clone(&s.window));
		let id = surface.id();
		Box::pin(async move {
			let window = window.ok_or_else(|| Error::WindowClosed(format!("surface {id}")))?;
			Ok(self.browser.window_ref(&window))
		})
	}

	fn load(&self, surface: &SurfaceHandle, url: &str, name: &str) -> Result<()> {
		let window = self
			.browser
			.surfaces
			.get(&surface.id())
			.map(|s| Arc::clone(&s.window))
			.ok_or_else(|| Error::WindowClosed(format!("surface {}", surface.id())))?;
		let mut entry = self
			.browser
			.windows
			.get_mut(&window)
			.ok_or_else(|| Error::WindowClosed(window.to_string()))?;
		let origin = origin_of(url, &entry.origin);
		entry.origin = origin;
		entry.name = Some(name.to_string());
		Ok(())
	}

	fn is_same_origin(&self, window: &WindowRef) -> bool {
		if self.browser.is_closed(window.id()) {
			return false;
		}
		self.browser.origin(&self.window) == self.browser.origin(window.id())
	}

	fn resize(&self, surface: &SurfaceHandle, dimensions: Dimensions) -> Result<()> {
		let window = self
			.browser
			.surfaces
			.get(&surface.id())
			.map(|s| Arc::clone(&s.window))
			.ok_or_else(|| Error::WindowClosed(format!("surface {}", surface.id())))?;
		if let Some(mut entry) = self.browser.windows.get_mut(&window) {
			let resized = entry.dimensions.overlay(dimensions);
			entry.dimensions = resized;
		}
		Ok(())
	}

	fn destroy(&self, surface: &SurfaceHandle) {
		if let Some((_, entry)) = self.browser.surfaces.remove(&surface.id()) {
			self.browser.close(&entry.window);
		}
	}
}

impl LivenessWatch for MemoryContext {
	fn watch(&self, window: &WindowRef, on_closed: Box<dyn FnOnce() + Send>) -> Subscription {
		let closed = self.browser.windows.get(window.id()).map(|e| e.closed.subscribe());
		let task = tokio::spawn(async move {
			if let Some(mut closed) = closed {
				let _ = closed.wait_for(|closed| *closed).await;
			}
			on_closed();
		});
		let abort = task.abort_handle();
		Subscription::new(move || abort.abort())
	}
}

impl WindowDiscovery for MemoryContext {
	fn current(&self) -> WindowRef {
		self.window()
	}

	fn uid(&self) -> String {
		self.browser
			.windows
			.get(&self.window)
			.map(|e| e.uid.clone())
			.unwrap_or_default()
	}

	fn window_name(&self) -> Option<String> {
		self.browser.windows.get(&self.window)?.name.clone()
	}

	fn parent(&self) -> Option<WindowRef> {
		self.ancestor(1)
	}

	fn opener(&self) -> Option<WindowRef> {
		match self.browser.kind(&self.window)? {
			WindowKind::Popup { opener } => Some(self.browser.window_ref(&opener)),
			_ => None,
		}
	}

	fn ancestor(&self, distance: u32) -> Option<WindowRef> {
		let mut current = Arc::clone(&self.window);
		for _ in 0..distance {
			match self.browser.kind(&current)? {
				WindowKind::Frame { parent } => current = parent,
				_ => return None,
			}
		}
		(distance > 0).then(|| self.browser.window_ref(&current))
	}

	fn find_by_uid(&self, uid: &str) -> Option<WindowRef> {
		let id = self
			.browser
			.windows
			.iter()
			.find(|e| e.uid == uid && !e.is_closed())
			.map(|e| Arc::clone(e.key()))?;
		Some(self.browser.window_ref(&id))
	}

	fn close_self(&self) {
		match self.browser.kind(&self.window) {
			Some(WindowKind::Frame { .. }) => {
				tracing::debug!(target = "xframe.memory", window = %self.window, "frames cannot close themselves");
			}
			Some(_) => self.browser.close(&self.window),
			None => {}
		}
	}

	fn resize_self(&self, dimensions: Dimensions) -> Result<()> {
		let mut entry = self
			.browser
			.windows
			.get_mut(&self.window)
			.ok_or_else(|| Error::WindowClosed(self.window.to_string()))?;
		if matches!(entry.kind, WindowKind::Frame { .. }) {
			return Err(Error::Unsupported {
				operation: "resize_self",
				context: ContextType::Iframe,
			});
		}
		let resized = entry.dimensions.overlay(dimensions);
		entry.dimensions = resized;
		Ok(())
	}
}

/// Serialized origin of `url`; relative, `about:` and opaque URLs inherit
/// `fallback`.
fn origin_of(url: &str, fallback: &str) -> String {
	match url::Url::parse(url) {
		Ok(parsed) if parsed.scheme() != "about" => {
			let origin = parsed.origin();
			if origin.is_tuple() {
				origin.ascii_serialization()
			} else {
				fallback.to_string()
			}
		}
		_ => fallback.to_string(),
	}
}
