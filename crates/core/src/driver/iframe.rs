use std::sync::Arc;

use async_trait::async_trait;
use xframe_protocol::{ContextType, Dimensions};
use xframe_runtime::{
	DisposerRegistry, Environment, Error, Result, SurfaceAttributes, SurfaceHandle, WindowRef,
};

use super::{DelegateOp, OpenRequest, OpenedSurface, RenderDriver};

const DELEGATE: &[DelegateOp] = &[
	DelegateOp::GetProxyContainer,
	DelegateOp::RenderContainer,
	DelegateOp::OpenFrame,
	DelegateOp::OpenPrerenderFrame,
	DelegateOp::Prerender,
	DelegateOp::Open,
	DelegateOp::OpenPrerender,
	DelegateOp::SetProxyWindow,
];

/// Renders into an iframe owned by the host document.
///
/// The frame is created blank, so its window exists before the child URL
/// loads; the encoded name is applied together with the navigation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IframeDriver;

#[async_trait]
impl RenderDriver for IframeDriver {
	fn context(&self) -> ContextType {
		ContextType::Iframe
	}

	fn open_frame(&self, env: &Environment, attributes: &SurfaceAttributes) -> Result<Option<SurfaceHandle>> {
		env.surfaces()
			.create(ContextType::Iframe, None, None, attributes)
			.map(Some)
	}

	async fn open(
		&self,
		env: &Environment,
		request: OpenRequest<'_>,
		disposers: &DisposerRegistry,
	) -> Result<OpenedSurface> {
		let surfaces = Arc::clone(env.surfaces());
		let surface = match request.surface {
			Some(surface) => surface,
			None => surfaces.create(ContextType::Iframe, None, None, request.attributes)?,
		};
		{
			let surfaces = Arc::clone(&surfaces);
			let surface = surface.clone();
			disposers.register("iframe", move || surfaces.destroy(&surface));
		}

		let window = surfaces
			.window_of(&surface)
			.await?
			.with_context(ContextType::Iframe);
		surfaces.load(&surface, request.url, request.name)?;
		disposers.hold("iframe-watch", env.liveness().watch(&window, request.on_closed));

		tracing::debug!(target = "xframe.driver", context = "iframe", window = %window, url = request.url, "opened");
		Ok(OpenedSurface { window, surface })
	}

	fn open_prerender_frame(
		&self,
		env: &Environment,
		attributes: &SurfaceAttributes,
	) -> Result<Option<SurfaceHandle>> {
		self.open_frame(env, attributes)
	}

	async fn open_prerender(
		&self,
		env: &Environment,
		_opened: Option<&WindowRef>,
		frame: Option<&SurfaceHandle>,
	) -> Result<WindowRef> {
		let frame = frame.ok_or_else(|| Error::InvalidOptions("iframe pre-render needs a frame".to_string()))?;
		let window = env.surfaces().window_of(frame).await?;
		if !env.surfaces().is_same_origin(&window) {
			return Err(Error::CrossOrigin(window.to_string()));
		}
		Ok(window.with_context(ContextType::Iframe))
	}

	fn resize(&self, env: &Environment, surface: &SurfaceHandle, dimensions: Dimensions) -> Result<()> {
		env.surfaces().resize(surface, dimensions)
	}

	fn delegate(&self) -> &'static [DelegateOp] {
		DELEGATE
	}
}
