use std::ops::Bound;
use std::sync::Arc;

use anyhow::{Result, ensure};

use super::api::{Fetch, Getf, Isolation, LockMode};
use super::dict::{Dictionary, EntryKey, View};
use super::tx::Transaction;
use crate::err::Error;
use crate::key::Direction;
use crate::val::Document;

const TARGET: &str = "fractaldb::core::kvs::cursor";

/// An engine cursor over one dictionary, bound to a transaction.
///
/// Every positioning operation delivers rows through a callback, which is
/// invoked once per row for as long as it returns [`Getf::Continue`]. The
/// cursor remembers the last row passed to the callback, and the `next`
/// and `prev` operations continue from there.
///
/// The handle is released when dropped. Failing to release a handle is an
/// unrecoverable invariant violation, and panics.
pub struct Cursor {
	txn: Arc<Transaction>,
	dict: Arc<Dictionary>,
	view: View,
	position: Option<EntryKey>,
	closed: bool,
}

impl Drop for Cursor {
	fn drop(&mut self) {
		if let Err(e) = self.close() {
			panic!("Failed to release a cursor on dictionary '{}': {e}", self.dict.name());
		}
	}
}

impl Cursor {
	/// Open a cursor on a dictionary within a transaction
	#[instrument(level = "trace", target = "fractaldb::core::kvs::cursor", skip_all)]
	pub fn new(txn: &Arc<Transaction>, dict: &Arc<Dictionary>) -> Result<Cursor> {
		// Check to see if transaction is closed
		ensure!(!txn.closed(), Error::TxFinished);
		// Check to see if the dictionary is still open
		ensure!(dict.is_open(), Error::DictionaryClosed(dict.name().to_owned()));
		// Snapshots can not read dictionaries created after them
		if txn.isolation() == Isolation::Snapshot {
			ensure!(
				dict.created() <= txn.snapshot(),
				Error::DictionaryTooNew(dict.name().to_owned())
			);
		}
		dict.cursor_opened();
		Ok(Cursor {
			txn: txn.clone(),
			dict: dict.clone(),
			view: txn.view(),
			position: None,
			closed: false,
		})
	}

	pub fn dictionary(&self) -> &Arc<Dictionary> {
		&self.dict
	}

	pub fn transaction(&self) -> &Arc<Transaction> {
		&self.txn
	}

	/// The last row passed to a callback by this cursor
	pub fn position(&self) -> Option<&EntryKey> {
		self.position.as_ref()
	}

	fn check(&self) -> Result<()> {
		ensure!(!self.closed, Error::unreachable("Used a cursor after it was closed"));
		ensure!(!self.txn.closed(), Error::TxFinished);
		ensure!(self.dict.is_open(), Error::DictionaryClosed(self.dict.name().to_owned()));
		Ok(())
	}

	fn scan<F>(&mut self, from: Bound<&EntryKey>, dir: Direction, f: F) -> Result<Fetch>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		self.check()?;
		let (res, last) = self.dict.scan(&self.view, from, dir, f)?;
		if let Some(last) = last {
			self.position = Some(last);
		}
		Ok(res)
	}

	/// Position the cursor exactly on a key
	pub fn getf_set<F>(&mut self, key: &EntryKey, mut f: F) -> Result<Fetch>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		self.check()?;
		trace!(target: TARGET, "getf_set {key}");
		self.position = None;
		match self.dict.get(&self.view, key) {
			Some(val) => {
				self.position = Some(key.clone());
				f(key, val.as_ref())?;
				Ok(Fetch::Found)
			}
			None => Ok(Fetch::NotFound),
		}
	}

	/// Position the cursor on the first key greater than or equal to a key
	pub fn getf_set_range<F>(&mut self, key: &EntryKey, f: F) -> Result<Fetch>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		trace!(target: TARGET, "getf_set_range {key}");
		self.position = None;
		self.scan(Bound::Included(key), Direction::Forward, f)
	}

	/// Position the cursor on the last key less than or equal to a key
	pub fn getf_set_range_reverse<F>(&mut self, key: &EntryKey, f: F) -> Result<Fetch>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		trace!(target: TARGET, "getf_set_range_reverse {key}");
		self.position = None;
		self.scan(Bound::Included(key), Direction::Reverse, f)
	}

	/// Move the cursor to the rows after its position
	pub fn getf_next<F>(&mut self, f: F) -> Result<Fetch>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		let from = self.position.clone();
		match &from {
			Some(k) => self.scan(Bound::Excluded(k), Direction::Forward, f),
			None => self.scan(Bound::Unbounded, Direction::Forward, f),
		}
	}

	/// Move the cursor to the rows before its position
	pub fn getf_prev<F>(&mut self, f: F) -> Result<Fetch>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		let from = self.position.clone();
		match &from {
			Some(k) => self.scan(Bound::Excluded(k), Direction::Reverse, f),
			None => self.scan(Bound::Unbounded, Direction::Reverse, f),
		}
	}

	/// Declare the range this cursor is about to read, locking it if required
	#[instrument(level = "trace", target = "fractaldb::core::kvs::cursor", skip_all)]
	pub fn set_bounds(&mut self, left: &EntryKey, right: &EntryKey, lock: LockMode) -> Result<()> {
		self.check()?;
		ensure!(left <= right, Error::unreachable("Range lock bounds are out of order"));
		trace!(target: TARGET, "set_bounds [{left}, {right}] {lock:?}");
		self.txn.lock_range(&self.dict, lock, left, right)
	}

	/// Release the cursor handle
	pub fn close(&mut self) -> Result<()> {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		ensure!(
			self.dict.cursor_closed(),
			Error::unreachable(format!("No cursor was open on '{}'", self.dict.name()))
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::Ordering;
	use crate::kvs::{Datastore, Suffix};
	use crate::val::Value;

	fn populate(ds: &Datastore, dict: &Arc<Dictionary>, keys: &[i64]) {
		let tx = ds.begin(Isolation::Snapshot, false).unwrap();
		for k in keys {
			tx.put(dict, dict.entry(key![*k], Suffix::None), None).unwrap();
		}
		tx.commit().unwrap();
	}

	fn collect(out: &mut Vec<i64>, k: &EntryKey) {
		if let Value::Int(v) = k.key()[0] {
			out.push(v);
		}
	}

	#[test]
	fn bulk_callbacks_continue_until_stopped() {
		let ds = Datastore::new();
		let dict = ds.create_dictionary("t", Ordering::ascending(1)).unwrap();
		populate(&ds, &dict, &[1, 3, 5, 7, 9]);
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let mut cur = Cursor::new(&tx, &dict).unwrap();
		let mut seen = Vec::new();
		let res = cur
			.getf_set_range(&dict.entry(key![2], Suffix::Min), |k, _| {
				collect(&mut seen, k);
				Ok(match seen.len() < 2 {
					true => Getf::Continue,
					false => Getf::Stop,
				})
			})
			.unwrap();
		assert_eq!(res, Fetch::Found);
		assert_eq!(seen, vec![3, 5]);
		// Continue after the last delivered row
		cur.getf_next(|k, _| {
			collect(&mut seen, k);
			Ok(Getf::Stop)
		})
		.unwrap();
		assert_eq!(seen, vec![3, 5, 7]);
		cur.getf_prev(|k, _| {
			collect(&mut seen, k);
			Ok(Getf::Continue)
		})
		.unwrap();
		assert_eq!(seen, vec![3, 5, 7, 5, 3, 1]);
		// Running off the end keeps the last position
		let res = cur.getf_prev(|_, _| Ok(Getf::Continue)).unwrap();
		assert_eq!(res, Fetch::NotFound);
		assert_eq!(cur.position().map(|k| k.key().clone()), Some(key![1]));
		drop(cur);
		assert_eq!(dict.cursors(), 0);
		tx.cancel().unwrap();
	}

	#[test]
	fn exact_positioning() {
		let ds = Datastore::new();
		let dict = ds.create_dictionary("t", Ordering::ascending(1)).unwrap();
		populate(&ds, &dict, &[1, 2]);
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let mut cur = Cursor::new(&tx, &dict).unwrap();
		let hit = cur.getf_set(&dict.entry(key![2], Suffix::None), |_, _| Ok(Getf::Stop)).unwrap();
		assert!(hit.is_found());
		let miss = cur.getf_set(&dict.entry(key![4], Suffix::None), |_, _| Ok(Getf::Stop)).unwrap();
		assert_eq!(miss, Fetch::NotFound);
		assert!(cur.position().is_none());
	}

	#[test]
	fn cursors_fail_on_closed_dictionaries() {
		let ds = Datastore::new();
		let dict = ds.create_dictionary("t", Ordering::ascending(1)).unwrap();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		ds.drop_dictionary("t").unwrap();
		let err = Cursor::new(&tx, &dict).err().unwrap();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DictionaryClosed(_))));
	}

	#[test]
	fn snapshots_reject_newer_dictionaries() {
		let ds = Datastore::new();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let dict = ds.create_dictionary("t", Ordering::ascending(1)).unwrap();
		let err = Cursor::new(&tx, &dict).err().unwrap();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DictionaryTooNew(_))));
		let dirty = ds.begin(Isolation::ReadUncommitted, true).unwrap();
		assert!(Cursor::new(&dirty, &dict).is_ok());
	}
}
