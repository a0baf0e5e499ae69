use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};

use super::OpSettings;
use crate::ctx::{Canceller, Context};
use crate::err::Error;
use crate::kvs::{Datastore, Isolation, Transaction};

const TARGET: &str = "fractaldb::core::dbs::session";

/// A logical client connection.
///
/// A session owns a stack of nested transactions. The first `begin` starts
/// a root transaction, and every further `begin` starts a child of the
/// transaction on top of the stack. Only the top of the stack may be
/// committed or aborted.
pub struct Session {
	ds: Datastore,
	stack: Vec<Arc<Transaction>>,
	/// Raised when the session's current operation is killed
	killed: Arc<AtomicBool>,
}

impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.debug_struct("Session").field("stack", &self.stack).finish()
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		// Abort from the innermost transaction outwards
		while let Some(txn) = self.stack.pop() {
			if !txn.closed() {
				if let Err(e) = txn.cancel() {
					warn!(target: TARGET, "Failed to abort transaction {} on session close: {e}", txn.id());
				}
			}
		}
	}
}

impl Session {
	pub fn new(ds: &Datastore) -> Self {
		Self {
			ds: ds.clone(),
			stack: Vec::new(),
			killed: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Begin a transaction, nested inside the current one if there is one.
	///
	/// A child transaction inherits the access mode of its parent.
	pub fn begin(&mut self, isolation: Isolation, read_only: bool) -> Result<&Arc<Transaction>> {
		let txn = match self.stack.last() {
			Some(parent) => parent.begin_child(isolation)?,
			None => self.ds.begin(isolation, read_only)?,
		};
		trace!(target: TARGET, "Session transaction depth is now {}", self.stack.len() + 1);
		self.stack.push(txn);
		self.current()
	}

	/// Commit the innermost transaction
	pub fn commit(&mut self) -> Result<()> {
		let Some(txn) = self.stack.last() else {
			bail!(Error::TxNotFound);
		};
		txn.commit()?;
		self.stack.pop();
		Ok(())
	}

	/// Abort the innermost transaction
	pub fn abort(&mut self) -> Result<()> {
		let Some(txn) = self.stack.last() else {
			bail!(Error::TxNotFound);
		};
		txn.cancel()?;
		self.stack.pop();
		Ok(())
	}

	/// The innermost transaction
	pub fn current(&self) -> Result<&Arc<Transaction>> {
		match self.stack.last() {
			Some(txn) => Ok(txn),
			None => bail!(Error::TxNotFound),
		}
	}

	/// The number of nested transactions
	pub fn depth(&self) -> usize {
		self.stack.len()
	}

	pub fn datastore(&self) -> &Datastore {
		&self.ds
	}

	/// Interrupt every operation running in this session
	pub fn kill(&self) {
		self.killer().cancel();
	}

	/// A handle which can interrupt this session from another thread
	pub fn killer(&self) -> Canceller {
		Canceller::new(self.killed.clone())
	}

	/// Build the context of a new operation within the current transaction.
	///
	/// The context captures the transaction which is current now, so a
	/// cursor's isolation and locking never change while it is open.
	pub fn context(&self, settings: OpSettings) -> Result<Context> {
		let txn = self.current()?.clone();
		Ok(Context::new(txn).with_cancelled(self.killed.clone()).with_settings(settings))
	}
}
