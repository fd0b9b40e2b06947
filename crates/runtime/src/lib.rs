//! xframe runtime - messaging, collaborator seams, and teardown.
//!
//! This crate sits between the wire types in `xframe-protocol` and the
//! lifecycle logic in `xframe`:
//!
//! - **Environment**: the per-execution-context bundle of collaborators
//!   (transport, surface factory, liveness watch, window discovery)
//! - **Channel**: typed request/reply to one target window
//! - **Dispatch**: message-name keyed handler tables with guarded calls
//! - **Disposers**: teardown actions that run exactly once
//! - **Memory**: an in-process multi-window browser implementing every seam
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │    xframe    │  Child lifecycle, host renderer, drivers
//! └──────┬───────┘
//!        │ uses Environment
//! ┌──────▼───────┐
//! │xframe-runtime│  This crate
//! │  ┌────────┐  │
//! │  │Channel │  │  request/reply per target window
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │Dispatch│  │  inbound handlers by message name
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │  Env   │  │  Transport / SurfaceFactory / LivenessWatch / WindowDiscovery
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod channel;
pub mod config;
pub mod dispatch;
pub mod disposer;
pub mod env;
pub mod error;
pub mod memory;
pub mod subscription;
pub mod window;

pub use channel::Channel;
pub use config::ProtocolConfig;
pub use dispatch::{ErrorSink, HandlerFuture, HandlerTable, MessageHandler, message_handler};
pub use disposer::DisposerRegistry;
pub use env::{
	ContextSlot, Environment, LivenessWatch, SlotGuard, SurfaceAttributes, SurfaceFactory,
	SurfaceHandle, Transport, WindowDiscovery,
};
pub use error::{Error, ErrorCategory, Result};
pub use memory::{DeliveredMessage, MemoryBrowser, MemoryContext};
pub use subscription::{Subscription, SubscriptionId, next_subscription_id};
pub use window::WindowRef;
