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
	DelegateOp::SetProxyWindow,
];

/// Renders into a new top-level window.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopupDriver;

#[async_trait]
impl RenderDriver for PopupDriver {
	fn context(&self) -> ContextType {
		ContextType::Popup
	}

	fn open_frame(&self, _env: &Environment, _attributes: &SurfaceAttributes) -> Result<Option<SurfaceHandle>> {
		Ok(None)
	}

	async fn open(
		&self,
		env: &Environment,
		request: OpenRequest<'_>,
		disposers: &DisposerRegistry,
	) -> Result<OpenedSurface> {
		let surfaces = Arc::clone(env.surfaces());
		let surface = surfaces.create(
			ContextType::Popup,
			Some(request.url),
			Some(request.name),
			request.attributes,
		)?;
		{
			let surfaces = Arc::clone(&surfaces);
			let surface = surface.clone();
			disposers.register("popup", move || surfaces.destroy(&surface));
		}

		let window = surfaces
			.window_of(&surface)
			.await?
			.with_context(ContextType::Popup);
		disposers.hold("popup-watch", env.liveness().watch(&window, request.on_closed));

		tracing::debug!(target = "xframe.driver", context = "popup", window = %window, url = request.url, "opened");
		Ok(OpenedSurface { window, surface })
	}

	fn open_prerender_frame(
		&self,
		_env: &Environment,
		_attributes: &SurfaceAttributes,
	) -> Result<Option<SurfaceHandle>> {
		Ok(None)
	}

	async fn open_prerender(
		&self,
		_env: &Environment,
		opened: Option<&WindowRef>,
		_frame: Option<&SurfaceHandle>,
	) -> Result<WindowRef> {
		opened
			.cloned()
			.ok_or_else(|| Error::InvalidOptions("popup pre-render needs the opened window".to_string()))
	}

	fn resize(&self, _env: &Environment, _surface: &SurfaceHandle, _dimensions: Dimensions) -> Result<()> {
		Err(Error::Unsupported {
			operation: "resize",
			context: ContextType::Popup,
		})
	}

	fn delegate(&self) -> &'static [DelegateOp] {
		DELEGATE
	}
}
