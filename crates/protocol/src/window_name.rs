//! Window naming codec.
//!
//! A host cannot hand a cross-origin child any object reference, but it can
//! choose the name of the surface it creates. The identity of the owning
//! component is therefore written into that name and decoded by the child on
//! boot:
//!
//! ```text
//! xframe__<tag>__<context>__<payload>__
//! ```
//!
//! `<payload>` is unpadded standard base64 of a JSON object carrying the
//! [`ParentRef`] and an optional pre-render id. The standard alphabet has no
//! `_`, and tags may not contain it, so the `__` separators are unambiguous.
//!
//! Decoding fails closed: anything that is not exactly this shape is a
//! [`FormatError`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ContextType;

const PREFIX: &str = "xframe__";
const SUFFIX: &str = "__";
const SEPARATOR: &str = "__";

/// Errors produced while decoding a window name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
	#[error("window name does not carry an xframe identity")]
	NotXframe,

	#[error("window name has {0} segments, expected 3")]
	SegmentCount(usize),

	#[error("invalid component tag '{0}'")]
	InvalidTag(String),

	#[error("unknown context type '{0}'")]
	UnknownContext(String),

	#[error("identity payload is not valid base64: {0}")]
	Base64(String),

	#[error("identity payload is not valid: {0}")]
	Payload(String),
}

/// How a child finds the window that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParentRef {
	/// The window that opened this popup.
	Opener,
	/// The frame ancestor `distance` levels up (1 is the direct parent).
	Parent { distance: u32 },
	/// The window registered under a global unique id. Used when rendering
	/// was delegated through an intermediary window.
	Uid { uid: String },
}

impl ParentRef {
	fn validate(&self) -> Result<(), FormatError> {
		match self {
			ParentRef::Parent { distance: 0 } => Err(FormatError::Payload(
				"parent distance must be at least 1".to_string(),
			)),
			ParentRef::Uid { uid } if uid.is_empty() => {
				Err(FormatError::Payload("parent uid is empty".to_string()))
			}
			_ => Ok(()),
		}
	}
}

/// Structured identity carried in a surface's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowIdentity {
	tag: String,
	context: ContextType,
	parent: ParentRef,
	prerender_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct NamePayload {
	parent: ParentRef,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	prerender_id: Option<String>,
}

/// Returns true if `tag` is a valid component tag: lowercase ASCII
/// alphanumerics and `-`, starting with an alphanumeric.
pub fn is_valid_tag(tag: &str) -> bool {
	let mut chars = tag.chars();
	match chars.next() {
		Some(first) if first.is_ascii_lowercase() || first.is_ascii_digit() => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Returns true if `name` looks like it was written by an xframe host.
///
/// A window whose name fails this check was not created by a host at all;
/// one that passes but does not [`decode`] is malformed.
pub fn is_xframe_name(name: &str) -> bool {
	name.starts_with(PREFIX)
}

impl WindowIdentity {
	pub fn new(
		tag: impl Into<String>,
		context: ContextType,
		parent: ParentRef,
	) -> Result<Self, FormatError> {
		let tag = tag.into();
		if !is_valid_tag(&tag) {
			return Err(FormatError::InvalidTag(tag));
		}
		parent.validate()?;
		Ok(Self {
			tag,
			context,
			parent,
			prerender_id: None,
		})
	}

	pub fn with_prerender_id(mut self, prerender_id: Option<String>) -> Self {
		self.prerender_id = prerender_id.filter(|id| !id.is_empty());
		self
	}

	pub fn tag(&self) -> &str {
		&self.tag
	}

	pub fn context(&self) -> ContextType {
		self.context
	}

	pub fn parent(&self) -> &ParentRef {
		&self.parent
	}

	pub fn prerender_id(&self) -> Option<&str> {
		self.prerender_id.as_deref()
	}

	/// Encodes this identity into a window name.
	pub fn encode(&self) -> String {
		let payload = NamePayload {
			parent: self.parent.clone(),
			prerender_id: self.prerender_id.clone(),
		};
		let json = serde_json::to_vec(&payload).unwrap_or_default();
		format!(
			"{PREFIX}{tag}{SEPARATOR}{context}{SEPARATOR}{payload}{SUFFIX}",
			tag = self.tag,
			context = self.context,
			payload = STANDARD_NO_PAD.encode(json),
		)
	}

	/// Decodes a window name produced by [`encode`](Self::encode).
	pub fn decode(name: &str) -> Result<Self, FormatError> {
		let body = name
			.strip_prefix(PREFIX)
			.and_then(|rest| rest.strip_suffix(SUFFIX))
			.ok_or(FormatError::NotXframe)?;

		let segments: Vec<&str> = body.split(SEPARATOR).collect();
		let [tag, context, payload] = segments.as_slice() else {
			return Err(FormatError::SegmentCount(segments.len()));
		};

		if !is_valid_tag(tag) {
			return Err(FormatError::InvalidTag((*tag).to_string()));
		}
		let context: ContextType = context.parse()?;

		let bytes = STANDARD_NO_PAD
			.decode(payload)
			.map_err(|e| FormatError::Base64(e.to_string()))?;
		let payload: NamePayload =
			serde_json::from_slice(&bytes).map_err(|e| FormatError::Payload(e.to_string()))?;
		payload.parent.validate()?;
		if payload.prerender_id.as_deref() == Some("") {
			return Err(FormatError::Payload("prerender id is empty".to_string()));
		}

		Ok(Self {
			tag: (*tag).to_string(),
			context,
			parent: payload.parent,
			prerender_id: payload.prerender_id,
		})
	}
}

/// Encodes an identity into a window name. See [`WindowIdentity::encode`].
pub fn encode(identity: &WindowIdentity) -> String {
	identity.encode()
}

/// Decodes a window name. See [`WindowIdentity::decode`].
pub fn decode(name: &str) -> Result<WindowIdentity, FormatError> {
	WindowIdentity::decode(name)
}
