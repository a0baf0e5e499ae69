#![allow(dead_code)]

use fractaldb_core::catalog::{Collection, IndexDefinition};
use fractaldb_core::ctx::Context;
use fractaldb_core::doc;
use fractaldb_core::idx::IndexCursor;
use fractaldb_core::key::Key;
use fractaldb_core::kvs::{Datastore, Isolation};

/// A collection whose secondary index `a_1` holds the values 1, 3, 5, 7 and 9
pub fn odd_values() -> (Datastore, Collection) {
	let ds = Datastore::new();
	let idx = IndexDefinition::new("a_1", &[("a", 1)]);
	let coll = Collection::create(&ds, "odd", vec![idx]).unwrap();
	let tx = ds.begin(Isolation::Snapshot, false).unwrap();
	for (id, a) in [(10, 7), (11, 1), (12, 9), (13, 3), (14, 5)] {
		coll.insert(&tx, doc! { "_id" => id, "a" => a }).unwrap();
	}
	tx.commit().unwrap();
	(ds, coll)
}

/// A collection with a compound index `a_1_b_-1` over a grid of values
pub fn grid(rows: i32, cols: i32) -> (Datastore, Collection) {
	let ds = Datastore::new();
	let idx = IndexDefinition::new("a_1_b_-1", &[("a", 1), ("b", -1)]);
	let coll = Collection::create(&ds, "grid", vec![idx]).unwrap();
	let tx = ds.begin(Isolation::Snapshot, false).unwrap();
	let mut id = 0;
	for a in 0..rows {
		for b in 0..cols {
			id += 1;
			coll.insert(&tx, doc! { "_id" => id, "a" => a, "b" => b }).unwrap();
		}
	}
	tx.commit().unwrap();
	(ds, coll)
}

/// Drain a cursor, returning the index key of every row
pub fn keys(cursor: &mut IndexCursor) -> Vec<Key> {
	let mut out = Vec::new();
	while cursor.ok() {
		out.push(cursor.curr_key().cloned().unwrap());
		cursor.advance().unwrap();
	}
	out
}

pub fn reader(ds: &Datastore, isolation: Isolation) -> Context {
	Context::new(ds.begin(isolation, true).unwrap())
}
