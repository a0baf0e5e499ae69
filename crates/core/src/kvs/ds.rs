use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use ahash::HashMap;
use anyhow::{Result, bail};
use parking_lot::{Mutex, MutexGuard, RwLock};

use super::api::{Isolation, Timestamp, TxnId};
use super::dict::Dictionary;
use super::lock::LockTable;
use super::tx::Transaction;
use crate::cnf::LOCK_TIMEOUT_MS;
use crate::err::Error;
use crate::key::Ordering;

const TARGET: &str = "fractaldb::core::kvs::ds";

struct Inner {
	/// The named dictionaries in this datastore
	dictionaries: RwLock<HashMap<String, Arc<Dictionary>>>,
	/// The row range locks held by live transactions
	locks: LockTable,
	/// Serialises commit stamping against snapshot creation
	commit: Mutex<()>,
	/// The logical commit clock
	clock: AtomicU64,
	/// The transaction id allocator
	ids: AtomicU64,
	/// How long a lock request waits, in milliseconds
	lock_timeout: AtomicU64,
}

/// The underlying transactional key-value store.
///
/// A datastore owns a set of named ordered dictionaries, and hands out
/// transactions which read and write them. Handles are cheap to clone,
/// and every clone refers to the same store.
#[derive(Clone)]
pub struct Datastore {
	inner: Arc<Inner>,
}

impl Default for Datastore {
	fn default() -> Self {
		Self::new()
	}
}

impl Datastore {
	/// Create a new, empty, in-memory datastore
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				dictionaries: RwLock::new(HashMap::default()),
				locks: LockTable::default(),
				commit: Mutex::new(()),
				clock: AtomicU64::new(0),
				ids: AtomicU64::new(0),
				lock_timeout: AtomicU64::new(*LOCK_TIMEOUT_MS),
			}),
		}
	}

	/// Set how long lock requests wait before failing
	pub fn with_lock_timeout(self, timeout: Duration) -> Self {
		self.inner.lock_timeout.store(timeout.as_millis() as u64, AtomicOrdering::Relaxed);
		self
	}

	pub fn lock_timeout(&self) -> Duration {
		Duration::from_millis(self.inner.lock_timeout.load(AtomicOrdering::Relaxed))
	}

	pub fn locks(&self) -> &LockTable {
		&self.inner.locks
	}

	/// Create a new dictionary with the given key ordering
	#[instrument(level = "trace", target = "fractaldb::core::kvs::ds", skip_all)]
	pub fn create_dictionary(&self, name: &str, ordering: Ordering) -> Result<Arc<Dictionary>> {
		let mut dicts = self.inner.dictionaries.write();
		if dicts.contains_key(name) {
			bail!(Error::Ds(format!("The dictionary '{name}' already exists")));
		}
		let dict = Arc::new(Dictionary::new(name.to_owned(), ordering, self.tick()));
		dicts.insert(name.to_owned(), dict.clone());
		debug!(target: TARGET, "Created dictionary {name}");
		Ok(dict)
	}

	/// Open an existing dictionary
	pub fn open_dictionary(&self, name: &str) -> Result<Arc<Dictionary>> {
		match self.inner.dictionaries.read().get(name) {
			Some(dict) => Ok(dict.clone()),
			None => bail!(Error::DictionaryClosed(name.to_owned())),
		}
	}

	/// Close and remove a dictionary, failing any later cursor on it
	#[instrument(level = "trace", target = "fractaldb::core::kvs::ds", skip_all)]
	pub fn drop_dictionary(&self, name: &str) -> Result<()> {
		match self.inner.dictionaries.write().remove(name) {
			Some(dict) => {
				dict.close();
				debug!(target: TARGET, "Dropped dictionary {name}");
				Ok(())
			}
			None => bail!(Error::DictionaryClosed(name.to_owned())),
		}
	}

	/// Start a new root transaction
	#[instrument(level = "trace", target = "fractaldb::core::kvs::ds", skip_all)]
	pub fn begin(&self, isolation: Isolation, read_only: bool) -> Result<Arc<Transaction>> {
		// Take the snapshot between commits
		let snapshot = {
			let _commit = self.inner.commit.lock();
			self.now()
		};
		let txn = Transaction::root(self.clone(), self.next_id(), isolation, read_only, snapshot);
		debug!(target: TARGET, "Began {isolation} transaction {}", txn.id());
		Ok(txn)
	}

	/// The latest commit timestamp
	pub(crate) fn now(&self) -> Timestamp {
		self.inner.clock.load(AtomicOrdering::Acquire)
	}

	/// Advance the commit clock
	pub(crate) fn tick(&self) -> Timestamp {
		self.inner.clock.fetch_add(1, AtomicOrdering::AcqRel) + 1
	}

	pub(crate) fn next_id(&self) -> TxnId {
		self.inner.ids.fetch_add(1, AtomicOrdering::Relaxed) + 1
	}

	/// Hold off new snapshots while a commit is being stamped
	pub(crate) fn committing(&self) -> MutexGuard<'_, ()> {
		self.inner.commit.lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dictionaries_are_unique_by_name() {
		let ds = Datastore::new();
		ds.create_dictionary("a", Ordering::ascending(1)).unwrap();
		assert!(ds.create_dictionary("a", Ordering::ascending(1)).is_err());
		assert!(ds.open_dictionary("a").is_ok());
	}

	#[test]
	fn dropped_dictionaries_are_closed() {
		let ds = Datastore::new();
		let dict = ds.create_dictionary("a", Ordering::ascending(1)).unwrap();
		ds.drop_dictionary("a").unwrap();
		assert!(!dict.is_open());
		let err = ds.open_dictionary("a").unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DictionaryClosed(_))));
	}

	#[test]
	fn transactions_get_increasing_ids() {
		let ds = Datastore::new();
		let a = ds.begin(Isolation::Snapshot, false).unwrap();
		let b = ds.begin(Isolation::Snapshot, true).unwrap();
		assert!(b.id() > a.id());
		a.cancel().unwrap();
		b.cancel().unwrap();
	}
}
