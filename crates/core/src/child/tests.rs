use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use xframe_protocol::{ErrorReport, ParentRef, PropsUpdate};
use xframe_runtime::{MemoryBrowser, Subscription, Transport, message_handler};

use super::*;
use crate::component::{PropDefinition, PropKind};

fn definition() -> Arc<ComponentDefinition> {
	Arc::new(
		ComponentDefinition::builder("foo")
			.url("https://child.example/foo")
			.prop("x", PropDefinition::new(PropKind::Number).default_value(json!(1)))
			.prop("y", PropDefinition::new(PropKind::Number).default_value(json!(1)))
			.build()
			.unwrap(),
	)
}

fn frame_for(browser: &MemoryBrowser, host: &WindowRef) -> WindowRef {
	let name = WindowIdentity::new("foo", ContextType::Iframe, ParentRef::Parent { distance: 1 })
		.unwrap()
		.encode();
	browser
		.open_frame_window(host, "https://child.example/foo", Some(name.as_str()))
		.unwrap()
}

fn answer_init(browser: &MemoryBrowser, host: &WindowRef, child: &WindowRef, props: PropsBag) -> Subscription {
	browser
		.context(host)
		.on(
			MessageName::Init,
			child,
			message_handler(move |_, _| {
				let reply = InitReply {
					context: ContextType::Iframe,
					props: props.clone(),
				};
				async move { serde_json::to_value(reply).map_err(Error::from) }
			}),
		)
		.unwrap()
}

#[test]
fn zero_handshake_timeout_is_a_configuration_error() {
	let err = ChildOptions::new(definition())
		.handshake_timeout(Duration::ZERO)
		.validate()
		.unwrap_err();
	assert!(err.is_configuration(), "{err:?}");
}

#[tokio::test]
async fn standalone_without_host_runs_locally() {
	let browser = MemoryBrowser::new();
	let top = browser.open_window("https://child.example/foo");
	let entered = Arc::new(Mutex::new(0));
	let seen = Arc::new(Mutex::new(Vec::new()));

	let counter = Arc::clone(&entered);
	let props_seen = Arc::clone(&seen);
	let child = ChildComponent::attach(
		browser.environment(&top),
		ChildOptions::new(definition())
			.standalone(true)
			.on_enter(move || {
				*counter.lock() += 1;
				Ok(())
			})
			.on_props(move |props| {
				props_seen.lock().push(props.clone());
				Ok(())
			}),
	)
	.await
	.unwrap();

	assert!(child.is_standalone());
	assert_eq!(*entered.lock(), 1);
	assert_eq!(*seen.lock(), [PropsBag::new().with("x", json!(1)).with("y", json!(1))]);
	assert_eq!(child.parent_window(), None);
	assert!(browser.messages().is_empty());

	let err = child
		.resize(Dimensions::new(Some(10.0), None), ResizeTrigger::Programmatic)
		.await
		.unwrap_err();
	assert!(err.is_no_parent(), "{err:?}");

	child.close().await.unwrap();
	assert_eq!(child.state(), LifecycleState::Closed);
	assert!(child.is_standalone());
}

#[tokio::test]
async fn props_sent_during_handshake_apply_after_it() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let child_window = frame_for(&browser, &host);

	let host_ctx = Arc::new(browser.context(&host));
	let to_child = Channel::new(child_window.clone(), host_ctx.clone());
	let _init = host_ctx
		.on(
			MessageName::Init,
			&child_window,
			message_handler(move |_, _| {
				let to_child = to_child.clone();
				async move {
					to_child
						.send_no_result(
							MessageName::Props,
							PropsUpdate {
								props: PropsBag::new().with("x", json!(2)),
							},
						)
						.await?;
					serde_json::to_value(InitReply {
						context: ContextType::Iframe,
						props: PropsBag::new().with("y", json!(5)),
					})
					.map_err(Error::from)
				}
			}),
		)
		.unwrap();

	let seen = Arc::new(Mutex::new(Vec::new()));
	let props_seen = Arc::clone(&seen);
	let child = ChildComponent::attach(
		browser.environment(&child_window),
		ChildOptions::new(definition()).on_props(move |props| {
			props_seen.lock().push(props.clone());
			Ok(())
		}),
	)
	.await
	.unwrap();

	assert_eq!(child.state(), LifecycleState::Running);
	assert_eq!(
		*seen.lock(),
		[
			PropsBag::new().with("x", json!(1)).with("y", json!(5)),
			PropsBag::new().with("x", json!(2)).with("y", json!(5)),
		]
	);
	assert_eq!(child.props(), PropsBag::new().with("x", json!(2)).with("y", json!(5)));
	assert_eq!(child.parent_window(), Some(host.clone()));
	assert_eq!(child.parent_component_window(), Some(host));
}

#[tokio::test]
async fn peer_close_tears_down_without_replying_close() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let child_window = frame_for(&browser, &host);
	let _init = answer_init(&browser, &host, &child_window, PropsBag::new());

	let reasons = Arc::new(Mutex::new(Vec::new()));
	let recorded = Arc::clone(&reasons);
	let child = ChildComponent::attach(
		browser.environment(&child_window),
		ChildOptions::new(definition()).on_close(move |reason| {
			recorded.lock().push(reason.as_str());
			Ok(())
		}),
	)
	.await
	.unwrap();

	browser
		.context(&host)
		.send(&child_window, MessageName::Close, Value::Null)
		.await
		.unwrap();
	child.closed().await;

	assert_eq!(child.state(), LifecycleState::Closed);
	assert_eq!(*reasons.lock(), ["closed-by-peer"]);
	let sent: Vec<_> = browser
		.messages_from(&child_window)
		.into_iter()
		.map(|m| m.name)
		.collect();
	assert_eq!(sent, [MessageName::Init]);

	// Closing again is a no-op, and the slot is free for a new instance.
	child.close().await.unwrap();
	assert_eq!(reasons.lock().len(), 1);
	assert_eq!(browser.environment(&child_window).slot().active(), None);
}

#[tokio::test]
async fn explicit_close_notifies_the_parent_component_once() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let child_window = frame_for(&browser, &host);
	let _init = answer_init(&browser, &host, &child_window, PropsBag::new());

	let child = ChildComponent::attach(browser.environment(&child_window), ChildOptions::new(definition()))
		.await
		.unwrap();
	child.close().await.unwrap();
	child.close().await.unwrap();

	let closes = browser
		.messages_from(&child_window)
		.iter()
		.filter(|m| m.name == MessageName::Close && m.to == host)
		.count();
	assert_eq!(closes, 1);
}

#[tokio::test]
async fn enter_failure_reaches_on_error_and_the_host() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let child_window = frame_for(&browser, &host);
	let _init = answer_init(&browser, &host, &child_window, PropsBag::new());

	let (tx, mut rx) = mpsc::unbounded_channel();
	let _errors = browser
		.context(&host)
		.on(
			MessageName::Error,
			&child_window,
			message_handler(move |_, data| {
				let tx = tx.clone();
				async move {
					serde_json::from_value::<ErrorReport>(data)
						.map(|report| {
							let _ = tx.send(report.error);
							Value::Null
						})
						.map_err(Error::from)
				}
			}),
		)
		.unwrap();

	let handled = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&handled);
	let child = ChildComponent::attach(
		browser.environment(&child_window),
		ChildOptions::new(definition())
			.on_enter(|| Err(Error::integration("widget failed to mount")))
			.on_error(move |err| {
				seen.lock().push(err.to_string());
				Ok(())
			}),
	)
	.await
	.unwrap();

	assert_eq!(child.state(), LifecycleState::Running);
	assert_eq!(*handled.lock(), ["widget failed to mount"]);
	assert_eq!(rx.recv().await.unwrap(), "widget failed to mount");
}

#[tokio::test]
async fn failing_error_hook_escapes_from_attach() {
	let browser = MemoryBrowser::new();
	let top = browser.open_window("https://child.example/foo");

	let err = ChildComponent::attach(
		browser.environment(&top),
		ChildOptions::new(definition())
			.standalone(true)
			.on_enter(|| Err(Error::integration("mount")))
			.on_error(|_| Err(Error::Unknown("handler broke".into()))),
	)
	.await
	.unwrap_err();

	assert!(err.is_escaped(), "{err:?}");
	assert_eq!(browser.environment(&top).slot().active(), None);
}
