//! Component definitions and the tag-keyed registry.
//!
//! A [`ComponentDefinition`] is everything both sides agree on before any
//! window exists: the tag written into window names, which surfaces the
//! component may render into, how big they start, and the props schema.
//! Definitions are immutable once built and shared as `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xframe_protocol::{ContextType, Dimensions, PropsBag, is_valid_tag};
use xframe_runtime::{Error, Result, SurfaceAttributes};

/// JSON kind a prop value must have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
	String,
	Number,
	Boolean,
	Object,
	Array,
	#[default]
	Any,
}

impl PropKind {
	/// Returns true if `value` has this kind. `null` only matches [`PropKind::Any`].
	pub fn matches(self, value: &Value) -> bool {
		match self {
			PropKind::String => value.is_string(),
			PropKind::Number => value.is_number(),
			PropKind::Boolean => value.is_boolean(),
			PropKind::Object => value.is_object(),
			PropKind::Array => value.is_array(),
			PropKind::Any => true,
		}
	}
}

fn yes() -> bool {
	true
}

/// Schema entry for one prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropDefinition {
	#[serde(rename = "type", default)]
	pub kind: PropKind,
	#[serde(default)]
	pub required: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default: Option<Value>,
	/// Props kept on the host (callbacks, secrets) set this to false.
	#[serde(default = "yes")]
	pub send_to_child: bool,
}

impl PropDefinition {
	pub fn new(kind: PropKind) -> Self {
		Self {
			kind,
			required: false,
			default: None,
			send_to_child: true,
		}
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	pub fn default_value(mut self, value: Value) -> Self {
		self.default = Some(value);
		self
	}

	pub fn host_only(mut self) -> Self {
		self.send_to_child = false;
		self
	}
}

/// Initial size and auto-resize flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionPolicy {
	#[serde(default)]
	pub width: Option<f64>,
	#[serde(default)]
	pub height: Option<f64>,
	#[serde(default)]
	pub auto_resize_width: bool,
	#[serde(default)]
	pub auto_resize_height: bool,
}

impl DimensionPolicy {
	pub fn initial(&self) -> Dimensions {
		Dimensions::new(self.width, self.height)
	}
}

/// Immutable description of an embeddable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
	tag: String,
	#[serde(default)]
	name: String,
	#[serde(default)]
	url: String,
	#[serde(default = "all_contexts")]
	contexts: Vec<ContextType>,
	#[serde(default)]
	default_context: Option<ContextType>,
	#[serde(default)]
	dimensions: DimensionPolicy,
	#[serde(default)]
	attributes: BTreeMap<ContextType, SurfaceAttributes>,
	#[serde(default)]
	props: IndexMap<String, PropDefinition>,
}

fn all_contexts() -> Vec<ContextType> {
	ContextType::ALL.to_vec()
}

impl ComponentDefinition {
	/// Starts a definition for `tag`.
	pub fn builder(tag: impl Into<String>) -> ComponentDefinitionBuilder {
		ComponentDefinitionBuilder {
			definition: ComponentDefinition {
				tag: tag.into(),
				name: String::new(),
				url: String::new(),
				contexts: all_contexts(),
				default_context: None,
				dimensions: DimensionPolicy::default(),
				attributes: BTreeMap::new(),
				props: IndexMap::new(),
			},
		}
	}

	/// Parses and validates a JSON definition.
	pub fn from_json(json: &str) -> Result<Self> {
		let definition: Self = serde_json::from_str(json)?;
		definition.validate()?;
		Ok(definition)
	}

	/// Checks the definition is internally consistent.
	pub fn validate(&self) -> Result<()> {
		if !is_valid_tag(&self.tag) {
			return Err(Error::InvalidDefinition(format!(
				"tag '{}' must be lowercase alphanumerics and '-', starting with an alphanumeric",
				self.tag
			)));
		}
		if self.contexts.is_empty() {
			return Err(Error::InvalidDefinition(format!(
				"component '{}' allows no contexts",
				self.tag
			)));
		}
		if let Some(default) = self.default_context.filter(|c| !self.contexts.contains(c)) {
			return Err(Error::InvalidDefinition(format!(
				"default context {default} of '{}' is not an allowed context",
				self.tag
			)));
		}
		for (key, prop) in &self.props {
			let mismatched = prop.default.as_ref().is_some_and(|d| !prop.kind.matches(d));
			if mismatched {
				return Err(Error::InvalidDefinition(format!(
					"default for prop '{key}' of '{}' is not of type {:?}",
					self.tag, prop.kind
				)));
			}
		}
		Ok(())
	}

	pub fn tag(&self) -> &str {
		&self.tag
	}

	/// Display name; falls back to the tag.
	pub fn name(&self) -> &str {
		if self.name.is_empty() { &self.tag } else { &self.name }
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn contexts(&self) -> &[ContextType] {
		&self.contexts
	}

	/// The context used when a render does not ask for one.
	pub fn default_context(&self) -> ContextType {
		self.default_context
			.or_else(|| self.contexts.first().copied())
			.unwrap_or(ContextType::Iframe)
	}

	pub fn dimensions(&self) -> &DimensionPolicy {
		&self.dimensions
	}

	/// Surface attributes for `context`; empty when none were configured.
	pub fn attributes(&self, context: ContextType) -> SurfaceAttributes {
		self.attributes.get(&context).cloned().unwrap_or_default()
	}

	pub fn props_schema(&self) -> &IndexMap<String, PropDefinition> {
		&self.props
	}

	/// Fails unless the component may render into `context`.
	pub fn ensure_context(&self, context: ContextType) -> Result<()> {
		if self.contexts.contains(&context) {
			Ok(())
		} else {
			Err(Error::ContextNotAllowed {
				tag: self.tag.clone(),
				context,
			})
		}
	}

	/// Props every instance starts with, in schema order.
	pub fn default_props(&self) -> PropsBag {
		self.props
			.iter()
			.filter_map(|(key, prop)| prop.default.clone().map(|value| (key.clone(), value)))
			.collect()
	}

	/// Validates render-time props against the schema and fills defaults.
	///
	/// Props the schema does not name are dropped with a warning.
	pub fn normalize_props(&self, supplied: &PropsBag) -> Result<PropsBag> {
		for key in supplied.keys() {
			if !self.props.contains_key(key) {
				tracing::warn!(target = "xframe.component", tag = %self.tag, prop = key, "dropping unknown prop");
			}
		}
		let known = supplied.filtered(|key, _| self.props.contains_key(key));
		self.check_kinds(&known)?;

		let props = self.default_props().merged(known);
		for (key, prop) in &self.props {
			if prop.required && props.get(key).is_none_or(Value::is_null) {
				return Err(Error::InvalidProps(format!(
					"'{}' requires prop '{key}'",
					self.tag
				)));
			}
		}
		Ok(props)
	}

	/// Validates a partial update: known keys only, kinds must match.
	pub fn validate_update(&self, update: &PropsBag) -> Result<()> {
		if let Some(key) = update.keys().find(|key| !self.props.contains_key(*key)) {
			return Err(Error::InvalidProps(format!(
				"'{}' has no prop '{key}'",
				self.tag
			)));
		}
		self.check_kinds(update)
	}

	/// The subset of `props` that is sent across the boundary.
	pub fn child_props(&self, props: &PropsBag) -> PropsBag {
		props.filtered(|key, _| self.props.get(key).is_none_or(|prop| prop.send_to_child))
	}

	fn check_kinds(&self, props: &PropsBag) -> Result<()> {
		for (key, value) in props {
			let Some(prop) = self.props.get(key) else {
				continue;
			};
			if !value.is_null() && !prop.kind.matches(value) {
				return Err(Error::InvalidProps(format!(
					"prop '{key}' of '{}' expects {:?}, got {value}",
					self.tag, prop.kind
				)));
			}
		}
		Ok(())
	}
}

/// Builder for [`ComponentDefinition`].
#[derive(Debug, Clone)]
pub struct ComponentDefinitionBuilder {
	definition: ComponentDefinition,
}

impl ComponentDefinitionBuilder {
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.definition.name = name.into();
		self
	}

	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.definition.url = url.into();
		self
	}

	/// Restricts the allowed contexts.
	pub fn contexts(mut self, contexts: impl IntoIterator<Item = ContextType>) -> Self {
		self.definition.contexts = contexts.into_iter().collect();
		self
	}

	pub fn default_context(mut self, context: ContextType) -> Self {
		self.definition.default_context = Some(context);
		self
	}

	pub fn dimensions(mut self, dimensions: DimensionPolicy) -> Self {
		self.definition.dimensions = dimensions;
		self
	}

	pub fn attribute(mut self, context: ContextType, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.definition
			.attributes
			.entry(context)
			.or_default()
			.insert(key.into(), value.into());
		self
	}

	pub fn prop(mut self, key: impl Into<String>, prop: PropDefinition) -> Self {
		self.definition.props.insert(key.into(), prop);
		self
	}

	pub fn build(self) -> Result<ComponentDefinition> {
		self.definition.validate()?;
		Ok(self.definition)
	}
}

/// Process-wide set of definitions keyed by unique tag.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
	components: RwLock<IndexMap<String, Arc<ComponentDefinition>>>,
}

impl ComponentRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Validates and registers `definition`. Tags are unique.
	pub fn register(&self, definition: ComponentDefinition) -> Result<Arc<ComponentDefinition>> {
		definition.validate()?;
		let mut components = self.components.write();
		if components.contains_key(definition.tag()) {
			return Err(Error::DuplicateTag(definition.tag().to_string()));
		}
		let definition = Arc::new(definition);
		components.insert(definition.tag().to_string(), Arc::clone(&definition));
		tracing::debug!(target = "xframe.component", tag = definition.tag(), "registered");
		Ok(definition)
	}

	pub fn get(&self, tag: &str) -> Option<Arc<ComponentDefinition>> {
		self.components.read().get(tag).cloned()
	}

	/// Registered tags in registration order.
	pub fn tags(&self) -> Vec<String> {
		self.components.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.components.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.components.read().is_empty()
	}
}
