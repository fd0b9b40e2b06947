//! Ordered props with last-write-wins merging.

use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered mapping from prop name to JSON value.
///
/// [`merge`](Self::merge) overwrites matching keys in place, so keys that are
/// not touched keep their position and new keys are appended. Merging the
/// same sequence of bags is therefore associative:
/// `merge(merge(a, b), c) == merge(a, merge(b, c))`, including key order.
///
/// Note that `==` compares contents only; use [`keys`](Self::keys) when the
/// order matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropsBag(IndexMap<String, Value>);

impl PropsBag {
	pub fn new() -> Self {
		Self(IndexMap::new())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Inserts or overwrites a prop, keeping the position of an existing key.
	pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
		self.0.insert(key.into(), value)
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
		self.insert(key, value);
		self
	}

	/// Removes a prop, preserving the order of the remaining keys.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.0.shift_remove(key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn iter(&self) -> Iter<'_, String, Value> {
		self.0.iter()
	}

	/// Merges `incoming` into `self`: matching keys are overwritten where they
	/// stand, new keys are appended in `incoming`'s order.
	pub fn merge(&mut self, incoming: PropsBag) {
		for (key, value) in incoming.0 {
			self.0.insert(key, value);
		}
	}

	/// Consuming variant of [`merge`](Self::merge).
	pub fn merged(mut self, incoming: PropsBag) -> Self {
		self.merge(incoming);
		self
	}

	/// Returns a bag holding only the keys accepted by `keep`, in order.
	pub fn filtered(&self, mut keep: impl FnMut(&str, &Value) -> bool) -> Self {
		self.0
			.iter()
			.filter(|(k, v)| keep(k, v))
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect()
	}

	pub fn into_inner(self) -> IndexMap<String, Value> {
		self.0
	}
}

impl From<IndexMap<String, Value>> for PropsBag {
	fn from(map: IndexMap<String, Value>) -> Self {
		Self(map)
	}
}

impl FromIterator<(String, Value)> for PropsBag {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl IntoIterator for PropsBag {
	type Item = (String, Value);
	type IntoIter = IntoIter<String, Value>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl<'a> IntoIterator for &'a PropsBag {
	type Item = (&'a String, &'a Value);
	type IntoIter = Iter<'a, String, Value>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}
