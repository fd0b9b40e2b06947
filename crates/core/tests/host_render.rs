//! Host-side rendering: prerender, props before init, resize, and error
//! reports arriving from the child.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use xframe::{
	ChildComponent, ChildOptions, ComponentDefinition, ContextType, Dimensions, DimensionPolicy,
	Error, GENERIC_ERROR_MESSAGE, MemoryBrowser, MessageName, ParentComponent, PropDefinition,
	PropKind, PropsBag, RenderOptions, ResizeTrigger,
};

fn definition() -> Arc<ComponentDefinition> {
	Arc::new(
		ComponentDefinition::builder("checkout")
			.url("https://pay.example/checkout")
			.dimensions(DimensionPolicy {
				width: Some(400.0),
				height: Some(300.0),
				..DimensionPolicy::default()
			})
			.prop("amount", PropDefinition::new(PropKind::Number).default_value(json!(0)))
			.prop("token", PropDefinition::new(PropKind::String).host_only())
			.build()
			.unwrap(),
	)
}

#[tokio::test]
async fn prerender_is_replaced_once_the_child_initializes() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://shop.example/");
	let parent = ParentComponent::render(
		browser.environment(&host),
		definition(),
		RenderOptions::new().prerender(true),
	)
	.await
	.unwrap();

	let placeholder = parent.prerender_window().cloned().unwrap();
	assert!(!browser.is_closed(&placeholder));
	let prerender_id = parent.prerender_id().map(str::to_string);
	assert!(prerender_id.is_some());

	let child = ChildComponent::attach(browser.environment(parent.window()), ChildOptions::new(definition()))
		.await
		.unwrap();
	parent.wait_for_init(Duration::from_secs(1)).await.unwrap();

	assert_eq!(child.prerender_id(), prerender_id);
	assert!(browser.is_closed(&placeholder));
	assert!(!browser.is_closed(parent.window()));
}

#[tokio::test]
async fn updates_before_init_shape_the_handshake() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://shop.example/");
	let parent = ParentComponent::render(
		browser.environment(&host),
		definition(),
		RenderOptions::new().prop("token", json!("s3cr3t")),
	)
	.await
	.unwrap();

	parent
		.update_props(PropsBag::new().with("amount", json!(25)))
		.await
		.unwrap();
	assert!(browser.messages_from(&host).is_empty());

	let child = ChildComponent::attach(browser.environment(parent.window()), ChildOptions::new(definition()))
		.await
		.unwrap();
	assert_eq!(child.props(), PropsBag::new().with("amount", json!(25)));
	assert_eq!(parent.props().get("token"), Some(&json!("s3cr3t")));

	parent
		.update_props(PropsBag::new().with("amount", json!(30)).with("token", json!("rotated")))
		.await
		.unwrap();
	assert_eq!(child.props(), PropsBag::new().with("amount", json!(30)));
	let leaked = browser
		.messages_from(&host)
		.iter()
		.any(|m| m.data.to_string().contains("rotated"));
	assert!(!leaked, "host-only props must not be sent to the child");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn updates_racing_the_handshake_reach_the_child() {
	for round in 0..50 {
		let browser = MemoryBrowser::new();
		let host = browser.open_window("https://shop.example/");
		let parent = ParentComponent::render(browser.environment(&host), definition(), RenderOptions::new())
			.await
			.unwrap();

		let updater = parent.clone();
		let update = tokio::spawn(async move { updater.update_props(PropsBag::new().with("amount", json!(round))).await });
		let child = ChildComponent::attach(browser.environment(parent.window()), ChildOptions::new(definition()))
			.await
			.unwrap();
		update.await.unwrap().unwrap();

		tokio::time::timeout(Duration::from_secs(2), async {
			while child.props().get("amount") != Some(&json!(round)) {
				tokio::time::sleep(Duration::from_millis(1)).await;
			}
		})
		.await
		.unwrap_or_else(|_| panic!("round {round}: child kept {:?}", child.props()));
	}
}

#[tokio::test]
async fn child_errors_arrive_sanitized() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://shop.example/");
	let reported = Arc::new(Mutex::new(Vec::new()));
	let recorded = Arc::clone(&reported);
	let parent = ParentComponent::render(
		browser.environment(&host),
		definition(),
		RenderOptions::new().on_child_error(move |err| {
			if let Error::ChildReported(message) = err {
				recorded.lock().push(message.clone());
			}
			Ok(())
		}),
	)
	.await
	.unwrap();

	let child = ChildComponent::attach(browser.environment(parent.window()), ChildOptions::new(definition()))
		.await
		.unwrap();

	child
		.report_error(&Error::integration_with_stack("card declined", "at pay (checkout.js:10)"))
		.await
		.unwrap();
	child
		.report_error(&Error::Unknown("db password rejected".into()))
		.await
		.unwrap();

	assert_eq!(
		*reported.lock(),
		["card declined\nat pay (checkout.js:10)", GENERIC_ERROR_MESSAGE]
	);
	let errors = browser
		.messages_from(parent.window())
		.iter()
		.filter(|m| m.name == MessageName::Error)
		.count();
	assert_eq!(errors, 2);
}

#[tokio::test]
async fn iframe_resize_goes_through_the_host() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://shop.example/");
	let resizes = Arc::new(Mutex::new(Vec::new()));
	let recorded = Arc::clone(&resizes);
	let parent = ParentComponent::render(
		browser.environment(&host),
		definition(),
		RenderOptions::new().on_resize(move |dims| {
			recorded.lock().push(dims);
			Ok(())
		}),
	)
	.await
	.unwrap();
	assert_eq!(
		browser.dimensions_of(parent.window()),
		Some(Dimensions::new(Some(400.0), Some(300.0)))
	);

	let child = ChildComponent::attach(browser.environment(parent.window()), ChildOptions::new(definition()))
		.await
		.unwrap();
	child
		.resize(Dimensions::new(None, Some(520.0)), ResizeTrigger::Programmatic)
		.await
		.unwrap();

	assert_eq!(*resizes.lock(), [Dimensions::new(None, Some(520.0))]);
	assert_eq!(
		browser.dimensions_of(parent.window()),
		Some(Dimensions::new(Some(400.0), Some(520.0)))
	);
}

#[tokio::test]
async fn popups_resize_themselves_only_on_user_gesture() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://shop.example/");
	let parent = ParentComponent::render(
		browser.environment(&host),
		definition(),
		RenderOptions::new().context(ContextType::Popup),
	)
	.await
	.unwrap();
	let popup = parent.window().clone();

	let child = ChildComponent::attach(browser.environment(&popup), ChildOptions::new(definition()))
		.await
		.unwrap();

	let err = child
		.resize(Dimensions::new(Some(640.0), None), ResizeTrigger::Programmatic)
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Unsupported { .. }), "{err:?}");

	child
		.resize(Dimensions::new(Some(640.0), Some(480.0)), ResizeTrigger::UserGesture)
		.await
		.unwrap();
	assert_eq!(
		browser.dimensions_of(&popup),
		Some(Dimensions::new(Some(640.0), Some(480.0)))
	);
	let resizes = browser
		.messages_from(&popup)
		.iter()
		.filter(|m| m.name == MessageName::Resize)
		.count();
	assert_eq!(resizes, 0);
}
