use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::dispatch::message_handler;

fn echo() -> MessageHandler {
	message_handler(|_, data| async move { Ok(data) })
}

fn page(browser: &MemoryBrowser) -> (WindowRef, WindowRef) {
	let host = browser.open_window("https://host.example/app");
	let frame = browser
		.open_frame_window(&host, "https://child.example/widget", Some("child"))
		.unwrap();
	(host, frame)
}

#[tokio::test]
async fn request_reply_between_windows() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);

	let _sub = browser
		.context(&host)
		.on(MessageName::Init, &frame, echo())
		.unwrap();

	let reply = browser
		.context(&frame)
		.send(&host, MessageName::Init, json!({"hello": 1}))
		.await
		.unwrap();
	assert_eq!(reply, json!({"hello": 1}));

	let log = browser.messages();
	assert_eq!(log.len(), 1);
	assert_eq!(log[0].from, frame);
	assert_eq!(log[0].to, host);
	assert_eq!(log[0].name, MessageName::Init);
}

#[tokio::test]
async fn messages_between_one_pair_are_handled_in_send_order() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);

	let seen = Arc::new(Mutex::new(Vec::new()));
	let record = Arc::clone(&seen);
	let _sub = browser
		.context(&frame)
		.on(
			MessageName::Props,
			&host,
			message_handler(move |_, data| {
				let record = Arc::clone(&record);
				async move {
					// Earlier messages sleep longer; order must still hold.
					let n = data.as_u64().unwrap_or_default();
					tokio::time::sleep(Duration::from_millis(10 - n)).await;
					record.lock().push(n);
					Ok(Value::Null)
				}
			}),
		)
		.unwrap();

	let ctx = browser.context(&host);
	let sends: Vec<_> = (0..5)
		.map(|n| ctx.send(&frame, MessageName::Props, json!(n)))
		.collect();
	for send in sends {
		send.await.unwrap();
	}
	assert_eq!(*seen.lock(), [0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn sending_to_a_closed_window_fails() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	browser.close(&frame);

	let err = browser
		.context(&host)
		.send(&frame, MessageName::Close, Value::Null)
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Delivery { .. }), "{err:?}");
}

#[tokio::test]
async fn sending_without_a_listener_fails() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);

	let err = browser
		.context(&frame)
		.send(&host, MessageName::Error, json!({"error": "x"}))
		.await
		.unwrap_err();
	assert!(err.is_delivery());
	// Still logged: the message reached the target window.
	assert_eq!(browser.messages_from(&frame).len(), 1);
}

#[tokio::test]
async fn closing_the_target_fails_the_outstanding_reply() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);

	let _sub = browser
		.context(&host)
		.on(
			MessageName::Init,
			&frame,
			message_handler(|_, _| std::future::pending()),
		)
		.unwrap();

	let ctx = browser.context(&frame);
	let pending = ctx.send(&host, MessageName::Init, Value::Null);
	let closer = browser.clone();
	let target = host.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(5)).await;
		closer.close(&target);
	});

	let err = pending.await.unwrap_err();
	assert!(matches!(err, Error::Delivery { .. }), "{err:?}");
}

#[tokio::test]
async fn duplicate_listener_is_rejected_until_released() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	let ctx = browser.context(&host);

	let sub = ctx.on(MessageName::Init, &frame, echo()).unwrap();
	assert!(matches!(
		ctx.on(MessageName::Init, &frame, echo()),
		Err(Error::DuplicateListener { .. })
	));

	drop(sub);
	assert!(ctx.on(MessageName::Init, &frame, echo()).is_ok());
}

#[tokio::test]
async fn closing_a_window_closes_its_frames_but_not_its_popups() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	let nested = browser
		.open_frame_window(&frame, "https://child.example/inner", None)
		.unwrap();
	let popup = browser
		.open_popup_window(&host, "https://child.example/popup", None)
		.unwrap();

	browser.close(&host);

	assert!(browser.is_closed(&frame));
	assert!(browser.is_closed(&nested));
	assert!(!browser.is_closed(&popup));
}

#[tokio::test]
async fn liveness_watch_fires_once_unless_dropped() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	let ctx = browser.context(&frame);

	let fired = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&fired);
	let (tx, rx) = oneshot::channel();
	let _watch = ctx.watch(
		&host,
		Box::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
			let _ = tx.send(());
		}),
	);

	let dropped = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&dropped);
	let cancelled = ctx.watch(
		&host,
		Box::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		}),
	);
	drop(cancelled);

	browser.close(&host);
	browser.close(&host);
	rx.await.unwrap();
	tokio::task::yield_now().await;

	assert_eq!(fired.load(Ordering::SeqCst), 1);
	assert_eq!(dropped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn watching_an_already_closed_window_fires() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	browser.close(&frame);

	let (tx, rx) = oneshot::channel();
	let _watch = browser.context(&host).watch(
		&frame,
		Box::new(move || {
			let _ = tx.send(());
		}),
	);
	tokio::time::timeout(Duration::from_secs(1), rx)
		.await
		.unwrap()
		.unwrap();
}

#[tokio::test]
async fn discovery_walks_frames_and_openers() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	let nested = browser
		.open_frame_window(&frame, "https://child.example/inner", Some("inner"))
		.unwrap();
	let popup = browser
		.open_popup_window(&nested, "https://child.example/popup", None)
		.unwrap();

	let inner = browser.context(&nested);
	assert_eq!(inner.current(), nested);
	assert_eq!(inner.window_name().as_deref(), Some("inner"));
	assert_eq!(inner.parent(), Some(frame.clone()));
	assert_eq!(inner.ancestor(2), Some(host.clone()));
	assert_eq!(inner.ancestor(3), None);
	assert_eq!(inner.ancestor(0), None);
	assert_eq!(inner.opener(), None);

	let popped = browser.context(&popup);
	assert_eq!(popped.opener(), Some(nested.clone()));
	assert_eq!(popped.parent(), None);
	assert_eq!(popped.current().context(), Some(ContextType::Popup));

	let uid = browser.context(&host).uid();
	assert_eq!(popped.find_by_uid(&uid), Some(host.clone()));
	browser.close(&host);
	assert_eq!(popped.find_by_uid(&uid), None);
}

#[tokio::test]
async fn surfaces_track_origin_name_and_size() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let ctx = browser.context(&host);

	let mut attributes = SurfaceAttributes::new();
	attributes.insert("title".to_string(), "widget".to_string());
	let surface = ctx
		.create(ContextType::Iframe, None, None, &attributes)
		.unwrap();
	let window = ctx.window_of(&surface).await.unwrap();

	assert!(ctx.is_same_origin(&window));
	assert_eq!(browser.attributes_of(&window), Some(attributes));

	ctx.load(&surface, "https://child.example/widget", "xframe__w__iframe__e30__")
		.unwrap();
	assert!(!ctx.is_same_origin(&window));
	assert_eq!(browser.name_of(&window).as_deref(), Some("xframe__w__iframe__e30__"));

	ctx.resize(&surface, Dimensions::new(Some(300.0), None)).unwrap();
	ctx.resize(&surface, Dimensions::new(None, Some(150.0))).unwrap();
	assert_eq!(
		browser.dimensions_of(&window),
		Some(Dimensions::new(Some(300.0), Some(150.0)))
	);

	ctx.destroy(&surface);
	assert!(browser.is_closed(&window));
}

#[tokio::test]
async fn frames_cannot_close_or_resize_themselves() {
	let browser = MemoryBrowser::new();
	let (host, frame) = page(&browser);
	let popup = browser
		.open_popup_window(&host, "https://child.example/p", None)
		.unwrap();

	let framed = browser.context(&frame);
	framed.close_self();
	assert!(!browser.is_closed(&frame));
	assert!(matches!(
		framed.resize_self(Dimensions::new(Some(1.0), None)),
		Err(Error::Unsupported { .. })
	));

	let popped = browser.context(&popup);
	popped
		.resize_self(Dimensions::new(Some(640.0), Some(480.0)))
		.unwrap();
	assert_eq!(
		browser.dimensions_of(&popup),
		Some(Dimensions::new(Some(640.0), Some(480.0)))
	);
	popped.close_self();
	assert!(browser.is_closed(&popup));
}

#[test]
fn environments_for_one_window_share_a_slot() {
	let browser = MemoryBrowser::new();
	let host = browser.open_window("https://host.example/");
	let first = browser.environment(&host);
	let second = browser.environment(&host);

	let _guard = first.slot().claim("widget").unwrap();
	assert!(matches!(
		second.slot().claim("other"),
		Err(Error::AlreadyAttached { .. })
	));
}

#[test]
fn origins_inherit_for_blank_and_relative_urls() {
	assert_eq!(origin_of("https://a.example:8443/x?y", "null"), "https://a.example:8443");
	assert_eq!(origin_of("about:blank", "https://host.example"), "https://host.example");
	assert_eq!(origin_of("/relative", "https://host.example"), "https://host.example");
	assert_eq!(origin_of("data:text/html,hi", "https://host.example"), "https://host.example");
}
