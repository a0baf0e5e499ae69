use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use anyhow::{Result, ensure};
use parking_lot::Mutex;

use super::api::{Check, Isolation, LockMode, Timestamp, TxnId};
use super::dict::{Cell, Dictionary, EntryKey, View};
use super::ds::Datastore;
use super::rollback::{CappedListener, CappedRollback};
use super::Val;
use crate::cnf::TRANSACTION_CHECK;
use crate::err::Error;
use crate::key::Key;

const TARGET: &str = "fractaldb::core::kvs::tx";

#[derive(Default)]
struct TxState {
	/// Is the transaction complete?
	done: bool,
	/// Every entry which this transaction has written
	writes: Vec<(Arc<Dictionary>, EntryKey)>,
	/// The capped collection inserts of this transaction
	capped: CappedRollback,
}

/// A transaction against a [`Datastore`].
///
/// Transactions nest: a child transaction sees the uncommitted writes of
/// its ancestors, and when it commits its writes are handed to its parent
/// rather than made visible to other transactions. Only the commit of a
/// root transaction publishes writes. Row locks are held on behalf of the
/// root transaction.
pub struct Transaction {
	id: TxnId,
	root: TxnId,
	parent: Option<Arc<Transaction>>,
	isolation: Isolation,
	read_only: bool,
	snapshot: Timestamp,
	ds: Datastore,
	/// Should we check unhandled transactions?
	check: Check,
	/// The number of live child transactions
	children: AtomicUsize,
	state: Mutex<TxState>,
}

impl Debug for Transaction {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.debug_struct("Transaction")
			.field("id", &self.id)
			.field("root", &self.root)
			.field("isolation", &self.isolation)
			.field("read_only", &self.read_only)
			.field("snapshot", &self.snapshot)
			.finish()
	}
}

impl Drop for Transaction {
	fn drop(&mut self) {
		if !self.closed() {
			match self.check {
				Check::None => {
					trace!(target: TARGET, "A transaction was dropped without being committed or cancelled");
				}
				Check::Warn => {
					warn!(target: TARGET, "A transaction was dropped without being committed or cancelled");
				}
				Check::Error => {
					error!(target: TARGET, "A transaction was dropped without being committed or cancelled");
				}
			}
			self.abort();
		}
	}
}

impl Transaction {
	pub(crate) fn root(
		ds: Datastore,
		id: TxnId,
		isolation: Isolation,
		read_only: bool,
		snapshot: Timestamp,
	) -> Arc<Transaction> {
		Arc::new(Transaction {
			id,
			root: id,
			parent: None,
			isolation,
			read_only,
			snapshot,
			ds,
			check: *TRANSACTION_CHECK,
			children: AtomicUsize::new(0),
			state: Mutex::new(TxState::default()),
		})
	}

	/// Start a child transaction nested inside this one
	#[instrument(level = "trace", target = "fractaldb::core::kvs::tx", skip_all)]
	pub fn begin_child(self: &Arc<Self>, isolation: Isolation) -> Result<Arc<Transaction>> {
		// Check to see if transaction is closed
		ensure!(!self.closed(), Error::TxFinished);
		// Register the new child
		self.children.fetch_add(1, AtomicOrdering::AcqRel);
		let id = self.ds.next_id();
		debug!(target: TARGET, "Began {isolation} child transaction {id} of {}", self.id);
		Ok(Arc::new(Transaction {
			id,
			root: self.root,
			parent: Some(self.clone()),
			isolation,
			read_only: self.read_only,
			snapshot: self.snapshot,
			ds: self.ds.clone(),
			check: self.check,
			children: AtomicUsize::new(0),
			state: Mutex::new(TxState::default()),
		}))
	}

	pub fn id(&self) -> TxnId {
		self.id
	}

	/// The root transaction which owns this transaction's locks
	pub fn root_id(&self) -> TxnId {
		self.root
	}

	pub fn parent(&self) -> Option<&Arc<Transaction>> {
		self.parent.as_ref()
	}

	pub fn isolation(&self) -> Isolation {
		self.isolation
	}

	pub fn is_read_only(&self) -> bool {
		self.read_only
	}

	/// The commit timestamp which snapshot reads are taken at
	pub fn snapshot(&self) -> Timestamp {
		self.snapshot
	}

	pub fn datastore(&self) -> &Datastore {
		&self.ds
	}

	/// Check if the transaction is finished.
	///
	/// If the transaction has been canceled or committed,
	/// then this function will return [`true`], and any further
	/// calls to functions on this transaction will result
	/// in a [`Error::TxFinished`] error.
	pub fn closed(&self) -> bool {
		self.state.lock().done
	}

	/// The set of transactions whose uncommitted writes this one sees
	pub(crate) fn view(&self) -> View {
		let mut chain = vec![self.id];
		let mut parent = self.parent.as_ref();
		while let Some(p) = parent {
			chain.push(p.id);
			parent = p.parent.as_ref();
		}
		View {
			chain,
			isolation: self.isolation,
			snapshot: self.snapshot,
		}
	}

	/// Fetch the visible value of an entry
	#[instrument(level = "trace", target = "fractaldb::core::kvs::tx", skip_all)]
	pub fn get(&self, dict: &Dictionary, key: &EntryKey) -> Result<Option<Val>> {
		// Check to see if transaction is closed
		ensure!(!self.closed(), Error::TxFinished);
		// Serializable reads lock the row they read
		if self.isolation == Isolation::Serializable {
			self.lock_range(dict, LockMode::Read, key, key)?;
		}
		Ok(dict.get(&self.view(), key))
	}

	/// Insert or update an entry
	#[instrument(level = "trace", target = "fractaldb::core::kvs::tx", skip_all)]
	pub fn put(&self, dict: &Arc<Dictionary>, key: EntryKey, val: Val) -> Result<()> {
		self.write(dict, key, Cell::Put(val))
	}

	/// Delete an entry
	#[instrument(level = "trace", target = "fractaldb::core::kvs::tx", skip_all)]
	pub fn del(&self, dict: &Arc<Dictionary>, key: EntryKey) -> Result<()> {
		self.write(dict, key, Cell::Del)
	}

	fn write(&self, dict: &Arc<Dictionary>, key: EntryKey, cell: Cell) -> Result<()> {
		// Check to see if transaction is closed
		ensure!(!self.closed(), Error::TxFinished);
		// Check to see if transaction is writable
		ensure!(!self.read_only, Error::TxReadonly);
		// A parent can not write underneath a live child
		ensure!(self.children.load(AtomicOrdering::Acquire) == 0, Error::TxChildActive);
		ensure!(dict.is_open(), Error::DictionaryClosed(dict.name().to_owned()));
		// Lock the row being written
		self.lock_range(dict, LockMode::Write, &key, &key)?;
		dict.write(&self.view(), self.id, key.clone(), cell)?;
		self.state.lock().writes.push((dict.clone(), key));
		Ok(())
	}

	/// Acquire a range lock on behalf of the root transaction
	pub(crate) fn lock_range(
		&self,
		dict: &Dictionary,
		mode: LockMode,
		left: &EntryKey,
		right: &EntryKey,
	) -> Result<()> {
		self.ds.locks().acquire(dict.name(), self.root, mode, left, right, self.ds.lock_timeout())
	}

	/// Record an insert into a capped collection, returning true
	/// if this is the first such insert for the collection.
	pub(crate) fn note_capped_insert(
		&self,
		listener: &Arc<dyn CappedListener>,
		pk: &Key,
	) -> Result<bool> {
		let mut state = self.state.lock();
		ensure!(!state.done, Error::TxFinished);
		Ok(state.capped.note_insert(listener, pk))
	}

	/// Cancel a transaction.
	///
	/// This reverses all changes made within the transaction.
	#[instrument(level = "trace", target = "fractaldb::core::kvs::tx", skip_all)]
	pub fn cancel(&self) -> Result<()> {
		// Check to see if transaction is closed
		ensure!(!self.closed(), Error::TxFinished);
		// Check that no child transaction is still live
		ensure!(self.children.load(AtomicOrdering::Acquire) == 0, Error::TxChildActive);
		// Roll back the transaction
		self.abort();
		debug!(target: TARGET, "Cancelled transaction {}", self.id);
		Ok(())
	}

	/// Commit a transaction.
	///
	/// Committing a child transaction hands its writes, and its capped
	/// collection records, to the parent. Committing a root transaction
	/// makes its writes visible and releases its locks.
	#[instrument(level = "trace", target = "fractaldb::core::kvs::tx", skip_all)]
	pub fn commit(&self) -> Result<()> {
		// Check to see if transaction is closed
		ensure!(!self.closed(), Error::TxFinished);
		// Check that no child transaction is still live
		ensure!(self.children.load(AtomicOrdering::Acquire) == 0, Error::TxChildActive);
		// Mark this transaction as done
		let (writes, capped) = self.finish();
		match &self.parent {
			Some(parent) => {
				// Hand every write to the parent
				for (dict, key) in writes.iter() {
					dict.retag(key, self.id, parent.id);
				}
				let shadowed = {
					let mut state = parent.state.lock();
					state.writes.extend(writes);
					state.capped.merge(capped)
				};
				shadowed.complete(true);
				parent.children.fetch_sub(1, AtomicOrdering::AcqRel);
			}
			None => {
				// Publish every write at one commit timestamp
				let ts = {
					let _commit = self.ds.committing();
					let ts = self.ds.tick();
					for (dict, key) in writes.iter() {
						dict.stamp(key, self.id, ts);
					}
					ts
				};
				self.ds.locks().release(self.root);
				capped.complete(true);
				trace!(target: TARGET, "Transaction {} committed at {ts}", self.id);
			}
		}
		debug!(target: TARGET, "Committed transaction {}", self.id);
		Ok(())
	}

	/// Mark the transaction done, taking its pending state
	fn finish(&self) -> (Vec<(Arc<Dictionary>, EntryKey)>, CappedRollback) {
		let mut state = self.state.lock();
		state.done = true;
		(mem::take(&mut state.writes), mem::take(&mut state.capped))
	}

	fn abort(&self) {
		let (writes, capped) = self.finish();
		for (dict, key) in writes.iter().rev() {
			dict.rollback(key, self.id);
		}
		capped.complete(false);
		match &self.parent {
			Some(parent) => {
				parent.children.fetch_sub(1, AtomicOrdering::AcqRel);
			}
			None => self.ds.locks().release(self.root),
		}
	}
}
