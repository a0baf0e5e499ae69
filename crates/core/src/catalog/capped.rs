use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::key::Key;
use crate::kvs::{CappedListener, Transaction};
use crate::val::Value;

const TARGET: &str = "fractaldb::core::catalog::capped";

#[derive(Debug)]
struct State {
	/// The primary key which the next insert will be assigned
	next_pk: i64,
	/// The lowest primary key inserted by each live transaction
	uncommitted: BTreeSet<i64>,
}

/// Tracks which primary keys of a capped collection may still be
/// written by live transactions.
///
/// Capped collections assign primary keys in increasing order. Each live
/// transaction which has inserted into the collection contributes the
/// first key it was assigned, so the smallest of these is the lowest key
/// which could still appear, or disappear, once readers have passed it.
#[derive(Debug)]
pub struct CappedTracker {
	ns: String,
	state: Mutex<State>,
}

impl CappedTracker {
	pub fn new(ns: &str, first_pk: i64) -> Arc<Self> {
		Arc::new(Self {
			ns: ns.to_owned(),
			state: Mutex::new(State {
				next_pk: first_pk,
				uncommitted: BTreeSet::new(),
			}),
		})
	}

	/// Assign the next primary key to an insert made by a transaction
	pub(crate) fn assign(self: &Arc<Self>, txn: &Transaction) -> Result<Key> {
		let mut state = self.state.lock();
		let pk = state.next_pk;
		let listener: Arc<dyn CappedListener> = self.clone();
		// Only a transaction's first insert lowers the watermark
		if txn.note_capped_insert(&listener, &Key::from(Value::Int(pk)))? {
			state.uncommitted.insert(pk);
		}
		state.next_pk += 1;
		Ok(Key::from(Value::Int(pk)))
	}

	/// The smallest primary key that a live transaction could still insert
	pub fn min_unsafe_key(&self) -> Key {
		let state = self.state.lock();
		let pk = state.uncommitted.first().copied().unwrap_or(state.next_pk);
		Key::from(Value::Int(pk))
	}

	/// The number of live transactions which have inserted
	pub fn live(&self) -> usize {
		self.state.lock().uncommitted.len()
	}
}

impl CappedListener for CappedTracker {
	fn ns(&self) -> &str {
		&self.ns
	}

	fn note_complete(&self, min_pk: &Key, committed: bool) {
		let Some(pk) = min_pk.first().and_then(Value::as_int) else {
			return;
		};
		let mut state = self.state.lock();
		state.uncommitted.remove(&pk);
		trace!(target: TARGET, "Insert of {pk} into {} completed, committed: {committed}", self.ns);
	}
}
