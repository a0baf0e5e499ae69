use crate::kvs::LockMode;

/// The settings of a single cursor-producing operation.
///
/// An `OpSettings` is handed to [`crate::dbs::Session::context`] and travels
/// with the [`crate::ctx::Context`] into every cursor the operation opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpSettings {
	/// The row locks which cursors should take, for read-modify-write operations
	pub lock: LockMode,
	/// How many rows the caller expects to read, 0 if unknown
	pub num_wanted: usize,
	/// The preferred size in bytes of each cursor's row buffer, 0 for the configured size
	pub buffer_size: usize,
	/// The number of keys a count cursor counts per batch, 0 for the configured size
	pub count_batch_size: usize,
}

impl OpSettings {
	/// Specify the row lock mode, with support for chaining.
	pub fn with_lock(mut self, lock: LockMode) -> Self {
		self.lock = lock;
		self
	}

	/// Specify the number of wanted rows, with support for chaining.
	pub fn with_num_wanted(mut self, num_wanted: usize) -> Self {
		self.num_wanted = num_wanted;
		self
	}

	/// Specify the row buffer size, with support for chaining.
	pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
		self.buffer_size = buffer_size;
		self
	}

	/// Specify the count batch size, with support for chaining.
	pub fn with_count_batch_size(mut self, count_batch_size: usize) -> Self {
		self.count_batch_size = count_batch_size;
		self
	}

	/// Whether the caller only wants a single row
	pub fn wants_one(&self) -> bool {
		self.num_wanted == 1
	}
}
