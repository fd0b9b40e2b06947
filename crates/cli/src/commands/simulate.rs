//! Runs one host/child session in the in-memory browser.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use serde_json::{Value, json};
use xframe::{
	ChildComponent, ChildOptions, ComponentDefinition, Error, MemoryBrowser, ParentComponent,
	PropDefinition, PropKind, PropsBag, ProtocolConfig, RenderOptions, WindowRef,
};

use crate::args::props_from;
use crate::cli::{CloseBy, SimulateArgs};
use crate::error::{CliError, Result};
use crate::output::{HookEvent, Side, SimulateData, WireMessage};

const HOST_URL: &str = "https://host.example/";

/// Used when no definition file is given.
pub fn demo_definition() -> Result<ComponentDefinition> {
	Ok(ComponentDefinition::builder("demo")
		.name("Demo component")
		.url("https://child.example/demo")
		.prop("x", PropDefinition::new(PropKind::Number).default_value(json!(1)))
		.prop("y", PropDefinition::new(PropKind::Number).default_value(json!(1)))
		.prop("label", PropDefinition::new(PropKind::String))
		.build()?)
}

fn load_definition(path: Option<&Path>) -> Result<ComponentDefinition> {
	let Some(path) = path else {
		return demo_definition();
	};
	let json = std::fs::read_to_string(path).map_err(|source| CliError::Definition {
		path: path.to_path_buf(),
		source,
	})?;
	let definition = ComponentDefinition::from_json(&json)
		.with_context(|| format!("invalid component definition {}", path.display()))?;
	Ok(definition)
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<HookEvent>>>);

impl Recorder {
	fn push(&self, side: Side, hook: &str, detail: Option<Value>) {
		tracing::debug!(target = "xframe.cli", ?side, hook, "hook fired");
		self.0.lock().push(HookEvent {
			side,
			hook: hook.to_string(),
			detail,
		});
	}

	fn take(&self) -> Vec<HookEvent> {
		std::mem::take(&mut *self.0.lock())
	}
}

fn props_detail(props: &PropsBag) -> Option<Value> {
	serde_json::to_value(props).ok()
}

fn host_options(args: &SimulateArgs, events: &Recorder) -> RenderOptions {
	let mut options = RenderOptions::new()
		.props(props_from(&args.props))
		.prerender(args.prerender);
	if let Some(context) = args.context {
		options = options.context(context);
	}

	let (init, resize, child_error, close) = (events.clone(), events.clone(), events.clone(), events.clone());
	options
		.on_init(move |props| {
			init.push(Side::Host, "init", props_detail(props));
			Ok(())
		})
		.on_resize(move |dims| {
			resize.push(Side::Host, "resize", serde_json::to_value(dims).ok());
			Ok(())
		})
		.on_child_error(move |err| {
			child_error.push(Side::Host, "child-error", Some(Value::String(err.to_string())));
			Ok(())
		})
		.on_close(move |reason| {
			close.push(Side::Host, "close", Some(Value::String(reason.to_string())));
			Ok(())
		})
}

fn child_options(definition: Arc<ComponentDefinition>, events: &Recorder) -> ChildOptions {
	let (enter, props, error, close) = (events.clone(), events.clone(), events.clone(), events.clone());
	ChildOptions::new(definition)
		.on_enter(move || {
			enter.push(Side::Child, "enter", None);
			Ok(())
		})
		.on_props(move |bag| {
			props.push(Side::Child, "props", props_detail(bag));
			Ok(())
		})
		.on_error(move |err| {
			error.push(Side::Child, "error", Some(Value::String(err.to_string())));
			Ok(())
		})
		.on_close(move |reason| {
			close.push(Side::Child, "close", Some(Value::String(reason.to_string())));
			Ok(())
		})
}

async fn within(limit: Duration, condition: &str, fut: impl Future<Output = ()>) -> Result<()> {
	tokio::time::timeout(limit, fut).await.map_err(|_| CliError::Timeout {
		ms: limit.as_millis() as u64,
		condition: condition.to_string(),
	})
}

pub async fn run(args: SimulateArgs) -> Result<SimulateData> {
	let definition = Arc::new(load_definition(args.definition.as_deref())?);
	let limit = Duration::from_millis(args.timeout_ms);
	let config = ProtocolConfig::from_env().with_handshake_timeout(limit);
	let browser = MemoryBrowser::with_config(config);
	let host = browser.open_window(HOST_URL);
	let events = Recorder::default();

	let parent = ParentComponent::render(
		browser.environment(&host),
		Arc::clone(&definition),
		host_options(&args, &events),
	)
	.await?;
	let window_name = browser.name_of(parent.window()).unwrap_or_default();
	tracing::info!(target = "xframe.cli", window = %parent.window(), context = %parent.context(), "surface rendered");

	let child = if args.no_child {
		None
	} else {
		let env = browser.environment(parent.window());
		Some(ChildComponent::attach(env, child_options(Arc::clone(&definition), &events)).await?)
	};

	if let Some(child) = &child {
		parent.wait_for_init(limit).await?;
		if !args.updates.is_empty() {
			parent.update_props(props_from(&args.updates)).await?;
		}
		if let Some(message) = &args.report_error {
			child.report_error(&Error::integration(message.clone())).await?;
		}
	}
	let child_props = child.as_ref().map(ChildComponent::props);

	close(args.close_by, &browser, &host, &parent, child.as_ref()).await?;
	within(limit, "host teardown", parent.closed()).await?;
	if let Some(child) = &child {
		within(limit, "child teardown", child.closed()).await?;
	}

	Ok(SimulateData {
		tag: definition.tag().to_string(),
		context: parent.context(),
		window_name,
		prerender_id: parent.prerender_id().map(str::to_string),
		host_props: parent.props(),
		child_props,
		child_state: child.as_ref().map(|child| child.state().to_string()),
		events: events.take(),
		messages: browser.messages().into_iter().map(|m| wire(&m.from, &m.to, m.name.as_str(), m.data)).collect(),
	})
}

async fn close(
	by: CloseBy,
	browser: &MemoryBrowser,
	host: &WindowRef,
	parent: &ParentComponent,
	child: Option<&ChildComponent>,
) -> Result<()> {
	match (by, child) {
		(CloseBy::Child, Some(child)) => child.close().await?,
		(CloseBy::HostWindow, _) => browser.close(host),
		_ => parent.close().await?,
	}
	Ok(())
}

fn wire(from: &WindowRef, to: &WindowRef, name: &str, data: Value) -> WireMessage {
	WireMessage {
		from: from.to_string(),
		to: to.to_string(),
		name: name.to_string(),
		data,
	}
}
