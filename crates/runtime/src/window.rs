//! Opaque references to other execution contexts.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use xframe_protocol::ContextType;

/// Opaque handle to a window (execution context).
///
/// Two references are equal when they point at the same window; the context
/// tag is informational and does not take part in equality.
#[derive(Debug, Clone)]
pub struct WindowRef {
	id: Arc<str>,
	context: Option<ContextType>,
}

impl WindowRef {
	pub fn new(id: impl Into<Arc<str>>) -> Self {
		Self {
			id: id.into(),
			context: None,
		}
	}

	/// Returns this reference tagged with the context it was opened in.
	pub fn with_context(mut self, context: ContextType) -> Self {
		self.context = Some(context);
		self
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn context(&self) -> Option<ContextType> {
		self.context
	}
}

impl PartialEq for WindowRef {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for WindowRef {}

impl Hash for WindowRef {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Display for WindowRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.id)
	}
}
