use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A handle which cancels every context sharing its flag
#[derive(Clone, Debug, Default)]
pub struct Canceller {
	/// A reference to the canceled value of a context.
	cancelled: Arc<AtomicBool>,
}

impl Canceller {
	/// Create a new Canceller
	pub fn new(cancelled: Arc<AtomicBool>) -> Canceller {
		Canceller {
			cancelled,
		}
	}

	/// Cancel the context.
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Relaxed);
	}

	/// Clear a previous cancellation
	pub fn reset(&self) {
		self.cancelled.store(false, Ordering::Relaxed);
	}
}
