//! Surface context types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::window_name::FormatError;

/// The kind of surface a component is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
	/// An iframe embedded in the host document.
	Iframe,
	/// A separate top-level window opened by the host.
	Popup,
}

impl ContextType {
	/// Every supported context, in preference order.
	pub const ALL: [ContextType; 2] = [ContextType::Iframe, ContextType::Popup];

	/// Returns the wire name of this context.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Iframe => "iframe",
			Self::Popup => "popup",
		}
	}
}

impl fmt::Display for ContextType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ContextType {
	type Err = FormatError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"iframe" => Ok(Self::Iframe),
			"popup" => Ok(Self::Popup),
			other => Err(FormatError::UnknownContext(other.to_string())),
		}
	}
}
