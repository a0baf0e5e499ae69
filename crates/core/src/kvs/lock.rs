use std::time::{Duration, Instant};

use ahash::HashMap;
use anyhow::{Result, bail};
use parking_lot::{Condvar, Mutex};

use super::api::{LockMode, TxnId};
use super::dict::EntryKey;
use crate::err::Error;

const TARGET: &str = "fractaldb::core::kvs::lock";

#[derive(Debug)]
struct RangeLock {
	owner: TxnId,
	mode: LockMode,
	left: EntryKey,
	right: EntryKey,
}

impl RangeLock {
	/// Check if a requested range can not be granted alongside this lock
	fn conflicts(&self, owner: TxnId, mode: LockMode, left: &EntryKey, right: &EntryKey) -> bool {
		if self.owner == owner {
			return false;
		}
		if self.mode == LockMode::Read && mode == LockMode::Read {
			return false;
		}
		self.left <= *right && *left <= self.right
	}
}

/// Row range locks for every dictionary in a datastore.
///
/// Locks belong to root transactions and are held until the owning
/// transaction commits or aborts. A conflicting request blocks until the
/// lock is released, or until the timeout elapses.
#[derive(Default)]
pub struct LockTable {
	locks: Mutex<HashMap<String, Vec<RangeLock>>>,
	released: Condvar,
}

impl LockTable {
	/// Acquire a range lock over `[left, right]`, waiting up to `timeout`
	pub(crate) fn acquire(
		&self,
		dict: &str,
		owner: TxnId,
		mode: LockMode,
		left: &EntryKey,
		right: &EntryKey,
		timeout: Duration,
	) -> Result<()> {
		// Requests without a lock type are prefetch only
		if mode == LockMode::None {
			return Ok(());
		}
		let deadline = Instant::now() + timeout;
		let mut locks = self.locks.lock();
		loop {
			let conflict = locks
				.get(dict)
				.is_some_and(|v| v.iter().any(|l| l.conflicts(owner, mode, left, right)));
			if !conflict {
				trace!(target: TARGET, "Granted {mode:?} lock on {dict} [{left}, {right}] to {owner}");
				locks.entry(dict.to_owned()).or_default().push(RangeLock {
					owner,
					mode,
					left: left.clone(),
					right: right.clone(),
				});
				return Ok(());
			}
			if self.released.wait_until(&mut locks, deadline).timed_out() {
				warn!(target: TARGET, "Lock wait on {dict} [{left}, {right}] timed out for {owner}");
				bail!(Error::LockNotGranted(dict.to_owned()));
			}
		}
	}

	/// Release every lock held by a transaction
	pub(crate) fn release(&self, owner: TxnId) {
		let mut locks = self.locks.lock();
		for v in locks.values_mut() {
			v.retain(|l| l.owner != owner);
		}
		locks.retain(|_, v| !v.is_empty());
		self.released.notify_all();
	}

	/// The number of locks currently held by a transaction
	pub fn held(&self, owner: TxnId) -> usize {
		self.locks.lock().values().flat_map(|v| v.iter()).filter(|l| l.owner == owner).count()
	}
}
