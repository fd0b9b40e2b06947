//! Collaborator seams and the per-execution-context [`Environment`].
//!
//! The protocol never touches a DOM or a real message port. Everything it
//! needs from the surrounding platform goes through four traits:
//!
//! - [`Transport`] - deliver a named message to a window and await its reply
//! - [`SurfaceFactory`] - create, load, resize and destroy iframes and popups
//! - [`LivenessWatch`] - learn when a window becomes unreachable
//! - [`WindowDiscovery`] - find this window's name, parent, opener, ancestors
//!
//! [`memory::MemoryBrowser`](crate::memory::MemoryBrowser) implements all of
//! them in-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use xframe_protocol::{ContextType, Dimensions, MessageName};

use crate::config::ProtocolConfig;
use crate::dispatch::MessageHandler;
use crate::error::{Error, Result};
use crate::subscription::Subscription;
use crate::window::WindowRef;

/// HTML attributes applied to a created surface.
pub type SurfaceAttributes = BTreeMap<String, String>;

/// Delivers messages between windows.
///
/// Messages sent from one window to one target are handled in send order.
/// Nothing is guaranteed across different sender/target pairs.
pub trait Transport: Send + Sync {
	/// Sends `data` under `name` to `target` and resolves with the reply.
	///
	/// Resolves to a delivery failure, rather than hanging, when the target
	/// is or becomes unreachable before replying.
	fn send(&self, target: &WindowRef, name: MessageName, data: Value) -> BoxFuture<'_, Result<Value>>;

	/// Registers `handler` for `name` messages arriving from `source`.
	///
	/// The handler stays registered until the returned subscription drops.
	fn on(&self, name: MessageName, source: &WindowRef, handler: MessageHandler) -> Result<Subscription>;
}

/// Opaque handle to a created surface (iframe element or popup).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
	id: u64,
	context: ContextType,
}

impl SurfaceHandle {
	pub fn new(id: u64, context: ContextType) -> Self {
		Self { id, context }
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn context(&self) -> ContextType {
		self.context
	}
}

/// Creates and manipulates the host-side surfaces a component renders into.
pub trait SurfaceFactory: Send + Sync {
	/// Creates a surface. Popups open immediately with `url` and `name`;
	/// iframes may be created blank and loaded later.
	fn create(
		&self,
		context: ContextType,
		url: Option<&str>,
		name: Option<&str>,
		attributes: &SurfaceAttributes,
	) -> Result<SurfaceHandle>;

	/// Waits until the surface has a navigable window and returns it.
	fn window_of(&self, surface: &SurfaceHandle) -> BoxFuture<'_, Result<WindowRef>>;

	/// Navigates the surface to `url` and names its window `name`.
	fn load(&self, surface: &SurfaceHandle, url: &str, name: &str) -> Result<()>;

	/// Returns true if `window` can be accessed directly from this context.
	fn is_same_origin(&self, window: &WindowRef) -> bool;

	/// Sets the surface's dimensions.
	fn resize(&self, surface: &SurfaceHandle, dimensions: Dimensions) -> Result<()>;

	/// Removes the surface; for popups this closes the window.
	fn destroy(&self, surface: &SurfaceHandle);
}

/// Observes window liveness.
pub trait LivenessWatch: Send + Sync {
	/// Calls `on_closed` exactly once when `window` becomes unreachable,
	/// unless the returned subscription is dropped first.
	fn watch(&self, window: &WindowRef, on_closed: Box<dyn FnOnce() + Send>) -> Subscription;
}

/// Discovers the windows related to the current execution context.
pub trait WindowDiscovery: Send + Sync {
	/// The current window.
	fn current(&self) -> WindowRef;

	/// Globally unique id of the current window, resolvable with
	/// [`find_by_uid`](Self::find_by_uid) from any other window.
	fn uid(&self) -> String;

	/// The name the creator gave this window.
	fn window_name(&self) -> Option<String>;

	/// The frame parent, if this window is a frame.
	fn parent(&self) -> Option<WindowRef>;

	/// The window that opened this one, if this is a popup.
	fn opener(&self) -> Option<WindowRef>;

	/// The frame ancestor `distance` levels up; `ancestor(1) == parent()`.
	fn ancestor(&self, distance: u32) -> Option<WindowRef>;

	/// Looks up a live window by its global unique id.
	fn find_by_uid(&self, uid: &str) -> Option<WindowRef>;

	/// Closes the current window.
	fn close_self(&self);

	/// Resizes the current top-level window.
	fn resize_self(&self, dimensions: Dimensions) -> Result<()>;
}

/// Per-execution-context record of the active component instance.
///
/// An execution context holds at most one attached instance. The slot is
/// checked and set in one step at resolution time and released by the
/// instance's teardown.
#[derive(Debug, Default)]
pub struct ContextSlot {
	active: Mutex<Option<String>>,
}

impl ContextSlot {
	pub fn new() -> Self {
		Self::default()
	}

	/// Claims the slot for `tag`, failing if any instance already holds it.
	pub fn claim(self: &Arc<Self>, tag: &str) -> Result<SlotGuard> {
		let mut active = self.active.lock();
		if let Some(current) = active.as_ref() {
			return Err(Error::AlreadyAttached {
				active: current.clone(),
				requested: tag.to_string(),
			});
		}
		*active = Some(tag.to_string());
		Ok(SlotGuard {
			slot: Arc::clone(self),
		})
	}

	/// Tag of the instance currently holding the slot.
	pub fn active(&self) -> Option<String> {
		self.active.lock().clone()
	}
}

/// Releases the [`ContextSlot`] when dropped.
#[derive(Debug)]
pub struct SlotGuard {
	slot: Arc<ContextSlot>,
}

impl Drop for SlotGuard {
	fn drop(&mut self) {
		self.slot.active.lock().take();
	}
}

/// Collaborators and shared state for one execution context.
#[derive(Clone)]
pub struct Environment {
	transport: Arc<dyn Transport>,
	surfaces: Arc<dyn SurfaceFactory>,
	liveness: Arc<dyn LivenessWatch>,
	discovery: Arc<dyn WindowDiscovery>,
	slot: Arc<ContextSlot>,
	config: ProtocolConfig,
}

impl Environment {
	pub fn new(
		transport: Arc<dyn Transport>,
		surfaces: Arc<dyn SurfaceFactory>,
		liveness: Arc<dyn LivenessWatch>,
		discovery: Arc<dyn WindowDiscovery>,
	) -> Self {
		Self {
			transport,
			surfaces,
			liveness,
			discovery,
			slot: Arc::new(ContextSlot::new()),
			config: ProtocolConfig::default(),
		}
	}

	/// Shares an existing slot; environments built for the same execution
	/// context must use the same one.
	pub fn with_slot(mut self, slot: Arc<ContextSlot>) -> Self {
		self.slot = slot;
		self
	}

	pub fn with_config(mut self, config: ProtocolConfig) -> Self {
		self.config = config;
		self
	}

	pub fn transport(&self) -> &Arc<dyn Transport> {
		&self.transport
	}

	pub fn surfaces(&self) -> &Arc<dyn SurfaceFactory> {
		&self.surfaces
	}

	pub fn liveness(&self) -> &Arc<dyn LivenessWatch> {
		&self.liveness
	}

	pub fn discovery(&self) -> &Arc<dyn WindowDiscovery> {
		&self.discovery
	}

	pub fn slot(&self) -> &Arc<ContextSlot> {
		&self.slot
	}

	pub fn config(&self) -> &ProtocolConfig {
		&self.config
	}
}

impl std::fmt::Debug for Environment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Environment")
			.field("window", &self.discovery.current())
			.field("active", &self.slot.active())
			.field("config", &self.config)
			.finish()
	}
}
