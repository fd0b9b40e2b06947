//! Wire types for the xframe embedding protocol.
//!
//! Everything that crosses the boundary between a host window and the child
//! running inside an embedded surface lives here:
//!
//! - [`ContextType`] - the kind of surface (iframe or popup)
//! - [`MessageName`] and its payloads - the closed protocol vocabulary
//! - [`PropsBag`] - ordered props with last-write-wins merging
//! - [`window_name`] - the identity a host writes into a surface's name

pub mod context;
pub mod dimensions;
pub mod message;
pub mod props;
pub mod window_name;

pub use context::ContextType;
pub use dimensions::Dimensions;
pub use message::{ErrorReport, InitReply, MessageName, PropsUpdate};
pub use props::PropsBag;
pub use window_name::{FormatError, ParentRef, WindowIdentity, is_valid_tag};
