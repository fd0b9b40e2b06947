//! Value parsers for flags clap cannot derive on its own.

use serde_json::Value;
use xframe::{ParentRef, PropsBag};

/// Parses `opener`, `parent[:N]` or `uid:<id>`.
pub fn parse_parent(s: &str) -> Result<ParentRef, String> {
	let (kind, rest) = match s.split_once(':') {
		Some((kind, rest)) => (kind, Some(rest)),
		None => (s, None),
	};
	match (kind, rest) {
		("opener", None) => Ok(ParentRef::Opener),
		("parent", None) => Ok(ParentRef::Parent { distance: 1 }),
		("parent", Some(n)) => match n.parse::<u32>() {
			Ok(distance) if distance > 0 => Ok(ParentRef::Parent { distance }),
			_ => Err(format!("parent distance must be a positive integer, got '{n}'")),
		},
		("uid", Some(uid)) if !uid.is_empty() => Ok(ParentRef::Uid { uid: uid.to_string() }),
		_ => Err(format!("expected opener, parent[:N] or uid:<id>, got '{s}'")),
	}
}

/// Parses `key=value`. The value is read as JSON when it parses, else as a
/// plain string, so `amount=25` is a number and `name=ada` a string.
pub fn parse_prop(s: &str) -> Result<(String, Value), String> {
	let Some((key, raw)) = s.split_once('=') else {
		return Err(format!("expected key=value, got '{s}'"));
	};
	if key.is_empty() {
		return Err(format!("empty prop name in '{s}'"));
	}
	let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
	Ok((key.to_string(), value))
}

/// Collects parsed props, later keys overriding earlier ones.
pub fn props_from(pairs: &[(String, Value)]) -> PropsBag {
	pairs
		.iter()
		.fold(PropsBag::new(), |bag, (key, value)| bag.with(key.clone(), value.clone()))
}
