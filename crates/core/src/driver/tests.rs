use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::oneshot;
use xframe_runtime::{MemoryBrowser, WindowDiscovery};

use super::*;

fn host() -> (MemoryBrowser, WindowRef, Environment) {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let env = browser.environment(&host);
	(browser, host, env)
}

fn request<'a>(
	name: &'a str,
	surface: Option<SurfaceHandle>,
	attributes: &'a SurfaceAttributes,
	on_closed: Box<dyn FnOnce() + Send>,
) -> OpenRequest<'a> {
	OpenRequest {
		name,
		url: "https://child.example/widget",
		surface,
		attributes,
		on_closed,
	}
}

#[test]
fn delegation_lists_differ_per_context() {
	let registry = DriverRegistry::default();
	assert!(registry.can_delegate(ContextType::Iframe, DelegateOp::Open));
	assert!(registry.can_delegate(ContextType::Iframe, DelegateOp::Prerender));
	assert!(registry.can_delegate(ContextType::Popup, DelegateOp::SetProxyWindow));
	assert!(!registry.can_delegate(ContextType::Popup, DelegateOp::Open));
	assert!(!registry.can_delegate(ContextType::Popup, DelegateOp::OpenFrame));

	assert!(DriverRegistry::empty().get(ContextType::Iframe).is_err());
	assert!(!DriverRegistry::empty().can_delegate(ContextType::Iframe, DelegateOp::Open));
}

#[tokio::test]
async fn iframe_open_loads_the_blank_frame_and_tears_down() {
	let (browser, host, env) = host();
	let driver = IframeDriver;
	let attributes = SurfaceAttributes::from([("title".to_string(), "w".to_string())]);

	let frame = driver.open_frame(&env, &attributes).unwrap();
	assert!(frame.is_some());

	let disposers = DisposerRegistry::new();
	let (tx, rx) = oneshot::channel();
	let opened = driver
		.open(
			&env,
			request(
				"xframe-name",
				frame,
				&attributes,
				Box::new(move || {
					let _ = tx.send(());
				}),
			),
			&disposers,
		)
		.await
		.unwrap();

	assert_eq!(opened.window.context(), Some(ContextType::Iframe));
	let discovered = browser.context(&opened.window);
	assert_eq!(discovered.parent(), Some(host));
	assert_eq!(browser.name_of(&opened.window).as_deref(), Some("xframe-name"));
	assert_eq!(browser.origin_of(&opened.window).as_deref(), Some("https://child.example"));
	assert_eq!(browser.attributes_of(&opened.window), Some(attributes));

	driver
		.resize(&env, &opened.surface, Dimensions::new(Some(320.0), Some(200.0)))
		.unwrap();
	assert_eq!(
		browser.dimensions_of(&opened.window),
		Some(Dimensions::new(Some(320.0), Some(200.0)))
	);

	// Closing the child window reports through the watch.
	browser.close(&opened.window);
	rx.await.unwrap();

	assert_eq!(disposers.drain(), 2);
}

#[tokio::test]
async fn popup_opens_immediately_and_cannot_be_resized_by_the_host() {
	let (browser, host, env) = host();
	let driver = PopupDriver;
	let attributes = SurfaceAttributes::new();

	assert!(driver.open_frame(&env, &attributes).unwrap().is_none());

	let disposers = DisposerRegistry::new();
	let opened = driver
		.open(&env, request("popup-name", None, &attributes, Box::new(|| {})), &disposers)
		.await
		.unwrap();

	assert_eq!(browser.context(&opened.window).opener(), Some(host));
	assert_eq!(browser.name_of(&opened.window).as_deref(), Some("popup-name"));

	let err = driver
		.resize(&env, &opened.surface, Dimensions::new(Some(1.0), None))
		.unwrap_err();
	assert!(matches!(err, Error::Unsupported { context: ContextType::Popup, .. }));

	let prerender = driver
		.open_prerender(&env, Some(&opened.window), None)
		.await
		.unwrap();
	assert_eq!(prerender, opened.window);

	disposers.drain();
	assert!(browser.is_closed(&opened.window));
}

#[tokio::test]
async fn iframe_prerender_requires_same_origin() {
	let (_browser, _host, env) = host();
	let driver = IframeDriver;
	let attributes = SurfaceAttributes::new();

	let frame = driver.open_prerender_frame(&env, &attributes).unwrap().unwrap();
	let window = driver.open_prerender(&env, None, Some(&frame)).await.unwrap();
	assert_eq!(window.context(), Some(ContextType::Iframe));

	// Navigating the frame elsewhere makes it unusable for pre-render.
	env.surfaces()
		.load(&frame, "https://elsewhere.example/", "x")
		.unwrap();
	let err = driver.open_prerender(&env, None, Some(&frame)).await.unwrap_err();
	assert!(matches!(err, Error::CrossOrigin(_)));
}

#[tokio::test]
async fn dropped_watch_does_not_fire() {
	let (browser, _host, env) = host();
	let fired = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&fired);

	let disposers = DisposerRegistry::new();
	let attributes = SurfaceAttributes::new();
	let opened = IframeDriver
		.open(
			&env,
			request(
				"n",
				None,
				&attributes,
				Box::new(move || {
					counter.fetch_add(1, Ordering::SeqCst);
				}),
			),
			&disposers,
		)
		.await
		.unwrap();

	disposers.drain();
	assert!(browser.is_closed(&opened.window));
	tokio::task::yield_now().await;
	assert_eq!(fired.load(Ordering::SeqCst), 0);
}
