//! Render drivers: one strategy per context type.
//!
//! Every driver has the same shape (open a surface, resize it, pre-render
//! into it) but the semantics differ per context:
//!
//! | Operation | iframe | popup |
//! |---|---|---|
//! | open | wait for the blank frame's window, then load url + name | the factory opens the window immediately |
//! | resize | set the frame's dimensions | unsupported; the child resizes itself after a user gesture |
//! | pre-render | blank same-origin frame, asserted before use | the opened window itself |
//!
//! Each driver also lists the operations a proxy may perform on its behalf
//! when the component is rendered from inside another delegating window.

mod iframe;
mod popup;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use xframe_protocol::{ContextType, Dimensions};
use xframe_runtime::{
	DisposerRegistry, Environment, Error, Result, SurfaceAttributes, SurfaceHandle, WindowRef,
};

pub use self::iframe::IframeDriver;
pub use self::popup::PopupDriver;

/// Operation a driver allows to be forwarded to a proxy window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateOp {
	GetProxyContainer,
	RenderContainer,
	OpenFrame,
	OpenPrerenderFrame,
	Prerender,
	Open,
	OpenPrerender,
	SetProxyWindow,
}

impl DelegateOp {
	pub fn as_str(self) -> &'static str {
		match self {
			DelegateOp::GetProxyContainer => "getProxyContainer",
			DelegateOp::RenderContainer => "renderContainer",
			DelegateOp::OpenFrame => "openFrame",
			DelegateOp::OpenPrerenderFrame => "openPrerenderFrame",
			DelegateOp::Prerender => "prerender",
			DelegateOp::Open => "open",
			DelegateOp::OpenPrerender => "openPrerender",
			DelegateOp::SetProxyWindow => "setProxyWindow",
		}
	}
}

impl fmt::Display for DelegateOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Everything [`RenderDriver::open`] needs to materialize a surface.
pub struct OpenRequest<'a> {
	/// Encoded window name carrying the component identity.
	pub name: &'a str,
	pub url: &'a str,
	/// Surface from [`RenderDriver::open_frame`], if the driver made one.
	pub surface: Option<SurfaceHandle>,
	pub attributes: &'a SurfaceAttributes,
	/// Called once when the opened window goes away.
	pub on_closed: Box<dyn FnOnce() + Send>,
}

/// A surface that has a live window.
#[derive(Debug, Clone)]
pub struct OpenedSurface {
	pub window: WindowRef,
	pub surface: SurfaceHandle,
}

/// Context-specific open/resize/pre-render strategy.
#[async_trait]
pub trait RenderDriver: Send + Sync {
	fn context(&self) -> ContextType;

	/// Creates a not-yet-populated surface. `None` if this context has no
	/// separate frame step.
	fn open_frame(&self, env: &Environment, attributes: &SurfaceAttributes) -> Result<Option<SurfaceHandle>>;

	/// Materializes the live window. The liveness watch and the surface
	/// teardown are registered into `disposers`.
	async fn open(
		&self,
		env: &Environment,
		request: OpenRequest<'_>,
		disposers: &DisposerRegistry,
	) -> Result<OpenedSurface>;

	/// Creates the surface a pre-render is drawn into, if separate.
	fn open_prerender_frame(
		&self,
		env: &Environment,
		attributes: &SurfaceAttributes,
	) -> Result<Option<SurfaceHandle>>;

	/// Resolves the pre-render window, asserting it is same-origin before
	/// it is treated as reusable.
	async fn open_prerender(
		&self,
		env: &Environment,
		opened: Option<&WindowRef>,
		frame: Option<&SurfaceHandle>,
	) -> Result<WindowRef>;

	/// Sets the surface's dimensions directly.
	fn resize(&self, env: &Environment, surface: &SurfaceHandle, dimensions: Dimensions) -> Result<()>;

	/// Operations a proxy may perform for this driver.
	fn delegate(&self) -> &'static [DelegateOp];
}

/// Maps each context type to its driver.
#[derive(Clone)]
pub struct DriverRegistry {
	drivers: BTreeMap<ContextType, Arc<dyn RenderDriver>>,
}

impl Default for DriverRegistry {
	/// The iframe and popup drivers.
	fn default() -> Self {
		let mut registry = Self::empty();
		registry.register(Arc::new(IframeDriver));
		registry.register(Arc::new(PopupDriver));
		registry
	}
}

impl DriverRegistry {
	pub fn empty() -> Self {
		Self {
			drivers: BTreeMap::new(),
		}
	}

	/// Installs `driver` for its context, replacing any previous one.
	pub fn register(&mut self, driver: Arc<dyn RenderDriver>) -> &mut Self {
		self.drivers.insert(driver.context(), driver);
		self
	}

	pub fn get(&self, context: ContextType) -> Result<Arc<dyn RenderDriver>> {
		self.drivers
			.get(&context)
			.cloned()
			.ok_or_else(|| Error::InvalidOptions(format!("no render driver for {context}")))
	}

	/// Returns true if `op` may be forwarded to a proxy for `context`.
	pub fn can_delegate(&self, context: ContextType, op: DelegateOp) -> bool {
		self.drivers
			.get(&context)
			.is_some_and(|driver| driver.delegate().contains(&op))
	}
}

impl fmt::Debug for DriverRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.drivers.keys()).finish()
	}
}

#[cfg(test)]
mod tests;
