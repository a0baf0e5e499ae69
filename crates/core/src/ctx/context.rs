use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::ctx::canceller::Canceller;
use crate::ctx::reason::Reason;
use crate::dbs::OpSettings;
use crate::err::Error;
use crate::kvs::{Isolation, LockMode, Transaction};

/// The context of a single operation.
///
/// A context captures the transaction which encloses the operation at the
/// time it starts, the settings the caller requested, and a flag which is
/// raised when the operation is killed.
#[derive(Clone)]
pub struct Context {
	// The enclosing transaction.
	transaction: Arc<Transaction>,
	// Whether or not this context is cancelled.
	cancelled: Arc<AtomicBool>,
	// The settings of this operation.
	settings: OpSettings,
}

impl Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Context")
			.field("transaction", &self.transaction)
			.field("cancelled", &self.cancelled)
			.field("settings", &self.settings)
			.finish()
	}
}

impl Context {
	/// Create a new context for an operation within a transaction
	pub fn new(transaction: Arc<Transaction>) -> Self {
		Self {
			transaction,
			cancelled: Arc::new(AtomicBool::new(false)),
			settings: OpSettings::default(),
		}
	}

	/// Share a cancellation flag with this context
	pub(crate) fn with_cancelled(mut self, cancelled: Arc<AtomicBool>) -> Self {
		self.cancelled = cancelled;
		self
	}

	pub fn with_settings(mut self, settings: OpSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Add cancellation to the context. The value that is returned will cancel
	/// the context once called.
	pub fn add_cancel(&mut self) -> Canceller {
		Canceller::new(self.cancelled.clone())
	}

	/// Get the enclosing transaction
	pub fn tx(&self) -> &Arc<Transaction> {
		&self.transaction
	}

	pub fn settings(&self) -> &OpSettings {
		&self.settings
	}

	/// The isolation of the enclosing transaction
	pub fn isolation(&self) -> Isolation {
		self.transaction.isolation()
	}

	/// The row lock type which cursors in this operation should take
	pub fn lock_mode(&self) -> LockMode {
		match (self.settings.lock, self.isolation()) {
			(LockMode::None, Isolation::Serializable) => LockMode::Read,
			(lock, _) => lock,
		}
	}

	/// Check if the context is done. If it returns `None` the operation may
	/// proceed, otherwise the operation should be stopped.
	pub fn done(&self) -> Option<Reason> {
		match self.cancelled.load(Ordering::Relaxed) {
			true => Some(Reason::Canceled),
			false => None,
		}
	}

	/// Check if the context is ok to continue.
	pub fn is_ok(&self) -> bool {
		self.done().is_none()
	}

	/// Fail with the reason the context is done, if it is
	pub fn check_interrupt(&self) -> Result<()> {
		match self.done() {
			Some(reason) => Err(Error::from(reason).into()),
			None => Ok(()),
		}
	}
}
