//! Window resolution: who created this window, and who owns it.
//!
//! Order: read the window name, decode it, compare tags, then look up the
//! parent window (frame parent or opener, by context) and the
//! parent-component window (from the encoded [`ParentRef`]). The parent
//! hint in the name is trusted once the tag matches.

use xframe_protocol::window_name::is_xframe_name;
use xframe_protocol::{ContextType, ParentRef, WindowIdentity};
use xframe_runtime::{Environment, Error, Result, WindowDiscovery, WindowRef};

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
	pub identity: WindowIdentity,
	pub parent: WindowRef,
	/// `None` when the owner named in the identity cannot be found.
	pub parent_component: Option<WindowRef>,
}

/// Resolves the current window's identity for the component `tag`.
///
/// Returns [`Error::NoParent`] when this window was not created by a host
/// at all; malformed names and foreign tags are distinct, fatal errors.
pub(crate) fn resolve(env: &Environment, tag: &str) -> Result<Resolved> {
	let discovery = env.discovery();
	let name = discovery
		.window_name()
		.filter(|name| is_xframe_name(name))
		.ok_or_else(|| Error::NoParent("window was not named by an xframe host".to_string()))?;

	let identity = WindowIdentity::decode(&name)?;
	if identity.tag() != tag {
		return Err(Error::TagMismatch {
			expected: tag.to_string(),
			found: identity.tag().to_string(),
		});
	}

	let parent = match identity.context() {
		ContextType::Iframe => discovery.parent(),
		ContextType::Popup => discovery.opener(),
	}
	.ok_or_else(|| Error::NoParent(format!("no {} parent window", identity.context())))?;

	let parent_component = find_owner(discovery.as_ref(), identity.parent());
	tracing::debug!(
		target = "xframe.child",
		tag,
		context = %identity.context(),
		parent = %parent,
		owner = ?parent_component.as_ref().map(WindowRef::id),
		"resolved window identity"
	);

	Ok(Resolved {
		identity,
		parent,
		parent_component,
	})
}

fn find_owner(discovery: &dyn WindowDiscovery, parent: &ParentRef) -> Option<WindowRef> {
	match parent {
		ParentRef::Opener => discovery.opener(),
		ParentRef::Parent { distance } => discovery.ancestor(*distance),
		ParentRef::Uid { uid } => discovery.find_by_uid(uid),
	}
}
