use serde::{Deserialize, Serialize};

/// Requested or applied surface size in CSS pixels.
///
/// A `None` axis means "leave unchanged" and travels as `null` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
	pub width: Option<f64>,
	pub height: Option<f64>,
}

impl Dimensions {
	pub fn new(width: Option<f64>, height: Option<f64>) -> Self {
		Self { width, height }
	}

	/// Returns true if neither axis is set.
	pub fn is_empty(&self) -> bool {
		self.width.is_none() && self.height.is_none()
	}

	/// Overlays the axes set in `other` on top of `self`.
	pub fn overlay(self, other: Dimensions) -> Dimensions {
		Dimensions {
			width: other.width.or(self.width),
			height: other.height.or(self.height),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unset_axes_serialize_as_null() {
		let json = serde_json::to_value(Dimensions::new(Some(300.0), None)).unwrap();
		assert_eq!(json, serde_json::json!({"width": 300.0, "height": null}));
	}

	#[test]
	fn overlay_keeps_unset_axes() {
		let base = Dimensions::new(Some(100.0), Some(50.0));
		let next = base.overlay(Dimensions::new(None, Some(80.0)));
		assert_eq!(next, Dimensions::new(Some(100.0), Some(80.0)));
	}
}
