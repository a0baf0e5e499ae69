use std::sync::Arc;

use ahash::HashMap;

use crate::key::Key;

/// Receives notice when a transaction which inserted into a capped
/// collection is resolved.
pub trait CappedListener: Send + Sync {
	/// The namespace of the capped collection
	fn ns(&self) -> &str;
	/// The transaction which first inserted `min_pk` has finished
	fn note_complete(&self, min_pk: &Key, committed: bool);
}

struct Record {
	listener: Arc<dyn CappedListener>,
	min_pk: Key,
}

/// The capped collection inserts of one transaction, keyed by namespace.
///
/// Only the first primary key that a transaction inserts into each capped
/// collection is recorded, since capped primary keys are assigned in
/// increasing order.
#[derive(Default)]
pub struct CappedRollback {
	records: HashMap<String, Record>,
}

impl CappedRollback {
	/// Record an insert, returning true if this is the first for the namespace
	pub(crate) fn note_insert(&mut self, listener: &Arc<dyn CappedListener>, pk: &Key) -> bool {
		if self.records.contains_key(listener.ns()) {
			return false;
		}
		self.records.insert(
			listener.ns().to_owned(),
			Record {
				listener: listener.clone(),
				min_pk: pk.clone(),
			},
		);
		true
	}

	/// Merge the records of a committed child transaction into this one,
	/// returning the child records which are shadowed by our own.
	pub(crate) fn merge(&mut self, child: CappedRollback) -> CappedRollback {
		let mut shadowed = CappedRollback::default();
		for (ns, record) in child.records {
			// Our own minimum is lower, so the child's is no longer live
			match self.records.contains_key(&ns) {
				true => {
					shadowed.records.insert(ns, record);
				}
				false => {
					self.records.insert(ns, record);
				}
			}
		}
		shadowed
	}

	/// Notify every capped collection that the transaction has finished
	pub(crate) fn complete(self, committed: bool) {
		for record in self.records.into_values() {
			record.listener.note_complete(&record.min_pk, committed);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// The lowest primary key this transaction inserted into a namespace
	pub fn min_pk(&self, ns: &str) -> Option<&Key> {
		self.records.get(ns).map(|r| &r.min_pk)
	}
}

#[cfg(test)]
mod tests {
	use parking_lot::Mutex;

	use super::*;

	#[derive(Default)]
	struct Recorder(Mutex<Vec<(Key, bool)>>);

	impl CappedListener for Recorder {
		fn ns(&self) -> &str {
			"capped"
		}
		fn note_complete(&self, min_pk: &Key, committed: bool) {
			self.0.lock().push((min_pk.clone(), committed));
		}
	}

	#[test]
	fn only_first_insert_is_recorded() {
		let rec = Arc::new(Recorder::default());
		let listener: Arc<dyn CappedListener> = rec.clone();
		let mut rb = CappedRollback::default();
		assert!(rb.note_insert(&listener, &key![3]));
		assert!(!rb.note_insert(&listener, &key![4]));
		assert_eq!(rb.min_pk("capped"), Some(&key![3]));
		rb.complete(false);
		assert_eq!(rec.0.lock().as_slice(), &[(key![3], false)]);
	}

	#[test]
	fn merge_completes_shadowed_child_records() {
		let rec = Arc::new(Recorder::default());
		let listener: Arc<dyn CappedListener> = rec.clone();
		let mut parent = CappedRollback::default();
		let mut child = CappedRollback::default();
		parent.note_insert(&listener, &key![1]);
		child.note_insert(&listener, &key![2]);
		parent.merge(child).complete(true);
		assert_eq!(rec.0.lock().as_slice(), &[(key![2], true)]);
		assert_eq!(parent.min_pk("capped"), Some(&key![1]));
	}
}
