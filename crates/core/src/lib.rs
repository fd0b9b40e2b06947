//! xframe - embed components across windows.
//!
//! A host renders a component into an iframe or popup it creates; the
//! component, running inside that surface, attaches to it and talks back
//! over a small fixed protocol (INIT, PROPS, CLOSE, RESIZE, ERROR).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use xframe::{
//!     ChildComponent, ChildOptions, ComponentDefinition, MemoryBrowser, ParentComponent, PropDefinition,
//!     PropKind, RenderOptions,
//! };
//!
//! let definition = Arc::new(
//!     ComponentDefinition::builder("greeter")
//!         .url("https://child.example/")
//!         .prop("name", PropDefinition::new(PropKind::String))
//!         .build()?,
//! );
//! let browser = MemoryBrowser::new();
//! let host = browser.open_window("https://host.example/");
//!
//! let parent = ParentComponent::render(
//!     browser.environment(&host),
//!     Arc::clone(&definition),
//!     RenderOptions::new().prop("name", json!("ada")),
//! )
//! .await?;
//!
//! let child = ChildComponent::attach(browser.environment(parent.window()), ChildOptions::new(definition)).await?;
//! parent.wait_for_init(Duration::from_secs(1)).await?;
//! assert_eq!(child.props().get("name"), Some(&json!("ada")));
//! ```
//!
//! # Layout
//!
//! - [`component`] - definitions, props schema, registry
//! - [`driver`] - per-context render strategies
//! - [`child`] - the child lifecycle
//! - [`parent`] - the host renderer
//! - [`reporter`] - sanitizing errors before they cross the boundary

pub mod child;
pub mod component;
pub mod driver;
pub mod hooks;
pub mod parent;
pub mod props;
pub mod reporter;

pub use child::{ChildComponent, ChildOptions, LifecycleState, ResizeTrigger};
pub use component::{
	ComponentDefinition, ComponentDefinitionBuilder, ComponentRegistry, DimensionPolicy,
	PropDefinition, PropKind,
};
pub use driver::{DelegateOp, DriverRegistry, IframeDriver, PopupDriver, RenderDriver};
pub use hooks::CloseReason;
pub use parent::{ParentComponent, RenderOptions};
pub use props::PropsSync;
pub use reporter::{ErrorReporter, GENERIC_ERROR_MESSAGE};
pub use xframe_protocol::{
	ContextType, Dimensions, ErrorReport, FormatError, InitReply, MessageName, ParentRef,
	PropsBag, PropsUpdate, WindowIdentity, window_name,
};
pub use xframe_runtime::{
	DeliveredMessage, Environment, Error, ErrorCategory, MemoryBrowser, ProtocolConfig, Result,
	WindowRef,
};
