//! Child-side props state.

use parking_lot::Mutex;
use xframe_protocol::PropsBag;

/// Current props of one instance: seeded with defaults at construction,
/// then merged with the handshake props and every PROPS update.
#[derive(Debug, Default)]
pub struct PropsSync {
	bag: Mutex<PropsBag>,
}

impl PropsSync {
	/// Seeds the bag with `defaults`.
	pub fn seed(defaults: PropsBag) -> Self {
		Self {
			bag: Mutex::new(defaults),
		}
	}

	/// Merges `incoming` and returns a snapshot of the result.
	pub fn apply(&self, incoming: PropsBag) -> PropsBag {
		let mut bag = self.bag.lock();
		bag.merge(incoming);
		bag.clone()
	}

	pub fn snapshot(&self) -> PropsBag {
		self.bag.lock().clone()
	}
}
