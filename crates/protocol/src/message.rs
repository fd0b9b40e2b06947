//! The closed message vocabulary exchanged between host and child.
//!
//! | Message | Direction | Payload |
//! |---|---|---|
//! | [`MessageName::Init`] | child → parent component | none; reply is [`InitReply`] |
//! | [`MessageName::Props`] | parent component → child | [`PropsUpdate`] |
//! | [`MessageName::Close`] | either | none |
//! | [`MessageName::Resize`] | child → parent | [`Dimensions`](crate::Dimensions) |
//! | [`MessageName::Error`] | child → parent component | [`ErrorReport`] |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ContextType;
use crate::props::PropsBag;

/// Name of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageName {
	#[serde(rename = "xframe_init")]
	Init,
	#[serde(rename = "xframe_props")]
	Props,
	#[serde(rename = "xframe_close")]
	Close,
	#[serde(rename = "xframe_resize")]
	Resize,
	#[serde(rename = "xframe_error")]
	Error,
}

impl MessageName {
	pub const ALL: [MessageName; 5] = [
		MessageName::Init,
		MessageName::Props,
		MessageName::Close,
		MessageName::Resize,
		MessageName::Error,
	];

	/// Returns the name used on the wire.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Init => "xframe_init",
			Self::Props => "xframe_props",
			Self::Close => "xframe_close",
			Self::Resize => "xframe_resize",
			Self::Error => "xframe_error",
		}
	}
}

impl fmt::Display for MessageName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Reply to [`MessageName::Init`]: the context the host rendered and the
/// props the child should start with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitReply {
	pub context: ContextType,
	pub props: PropsBag,
}

/// Payload of [`MessageName::Props`]; only the changed props travel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropsUpdate {
	pub props: PropsBag,
}

/// Payload of [`MessageName::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
	pub error: String,
}
