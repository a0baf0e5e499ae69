use std::sync::Arc;

use anyhow::{Result, bail, ensure};

use super::capped::CappedTracker;
use super::index::{IndexDefinition, PK_FIELD};
use crate::err::Error;
use crate::key::Key;
use crate::kvs::{Cursor, Datastore, Dictionary, Getf, Suffix, Transaction};
use crate::val::{Document, Value};

const TARGET: &str = "fractaldb::core::catalog::collection";

struct Inner {
	name: String,
	/// Every index, with the primary key index first
	indexes: Vec<(IndexDefinition, Arc<Dictionary>)>,
	/// Present only for capped collections
	capped: Option<Arc<CappedTracker>>,
}

/// A collection of documents and the indexes over them.
///
/// Index 0 is always the unique, clustering primary key index on `_id`,
/// which serves as the main store. Secondary index entries carry the
/// primary key of their document as a suffix.
#[derive(Clone)]
pub struct Collection {
	inner: Arc<Inner>,
}

impl Collection {
	/// Create a collection with a primary key index and the given secondary indexes
	pub fn create(ds: &Datastore, name: &str, indexes: Vec<IndexDefinition>) -> Result<Collection> {
		Self::build(ds, name, indexes, None)
	}

	/// Create a capped collection, whose primary keys are assigned in
	/// increasing order starting from 1
	pub fn create_capped(
		ds: &Datastore,
		name: &str,
		indexes: Vec<IndexDefinition>,
	) -> Result<Collection> {
		Self::build(ds, name, indexes, Some(CappedTracker::new(name, 1)))
	}

	fn build(
		ds: &Datastore,
		name: &str,
		indexes: Vec<IndexDefinition>,
		capped: Option<Arc<CappedTracker>>,
	) -> Result<Collection> {
		let mut defs = vec![IndexDefinition::primary()];
		for idx in indexes {
			ensure!(
				!defs.iter().any(|d| d.name == idx.name),
				Error::Ds(format!("The index '{}' is defined twice on '{name}'", idx.name))
			);
			defs.push(idx);
		}
		let mut out = Vec::with_capacity(defs.len());
		for idx in defs {
			let dict = ds.create_dictionary(&format!("{name}.${}", idx.name), idx.ordering()?)?;
			out.push((idx, dict));
		}
		debug!(target: TARGET, "Created collection {name} with {} indexes", out.len());
		Ok(Collection {
			inner: Arc::new(Inner {
				name: name.to_owned(),
				indexes: out,
				capped,
			}),
		})
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn is_capped(&self) -> bool {
		self.inner.capped.is_some()
	}

	/// The number of indexes, including the primary key index
	pub fn indexes(&self) -> usize {
		self.inner.indexes.len()
	}

	/// The definition of an index by position
	pub fn index(&self, no: usize) -> Result<&IndexDefinition> {
		match self.inner.indexes.get(no) {
			Some((idx, _)) => Ok(idx),
			None => bail!(Error::Ds(format!("No index {no} on '{}'", self.inner.name))),
		}
	}

	/// The position of an index by name
	pub fn index_no(&self, name: &str) -> Option<usize> {
		self.inner.indexes.iter().position(|(idx, _)| idx.name == name)
	}

	/// The dictionary which stores an index
	pub fn dictionary(&self, no: usize) -> Result<&Arc<Dictionary>> {
		match self.inner.indexes.get(no) {
			Some((_, dict)) => Ok(dict),
			None => bail!(Error::Ds(format!("No index {no} on '{}'", self.inner.name))),
		}
	}

	fn primary(&self) -> &Arc<Dictionary> {
		&self.inner.indexes[0].1
	}

	/// Insert a document, returning its primary key
	#[instrument(level = "trace", target = "fractaldb::core::catalog::collection", skip_all)]
	pub fn insert(&self, txn: &Arc<Transaction>, mut doc: Document) -> Result<Key> {
		// Capped collections assign their own primary keys
		let pk = match &self.inner.capped {
			Some(tracker) => {
				let pk = tracker.assign(txn)?;
				doc.insert(PK_FIELD, pk[0].clone());
				pk
			}
			None => match doc.get(PK_FIELD) {
				Some(v) => Key::from(v.clone()),
				None => bail!(Error::MissingPrimaryKey),
			},
		};
		// Check the primary key is not taken
		let dict = self.primary();
		let entry = dict.entry(pk.clone(), Suffix::None);
		if txn.get(dict, &entry)?.is_some() {
			bail!(Error::KeyAlreadyExists(dict.name().to_owned()));
		}
		txn.put(dict, entry, Some(doc.clone()))?;
		// Write every secondary index entry
		for (idx, dict) in self.inner.indexes.iter().skip(1) {
			let key = idx.key_for(&doc);
			if idx.is_unique() && Self::contains_key(txn, dict, &key)? {
				bail!(Error::KeyAlreadyExists(dict.name().to_owned()));
			}
			let val = match idx.clustering {
				true => Some(doc.clone()),
				false => None,
			};
			txn.put(dict, dict.entry(key, Suffix::Pk(pk.clone())), val)?;
		}
		trace!(target: TARGET, "Inserted {pk} into {}", self.inner.name);
		Ok(pk)
	}

	/// Check if any entry exists for an index key
	fn contains_key(txn: &Arc<Transaction>, dict: &Arc<Dictionary>, key: &Key) -> Result<bool> {
		let mut cursor = Cursor::new(txn, dict)?;
		let mut found = false;
		cursor.getf_set_range(&dict.entry(key.clone(), Suffix::Min), |k, _| {
			found = k.key().compare(key, dict.ordering()).is_eq();
			Ok(Getf::Stop)
		})?;
		Ok(found)
	}

	/// Delete a document by primary key, returning whether it existed
	#[instrument(level = "trace", target = "fractaldb::core::catalog::collection", skip_all)]
	pub fn delete(&self, txn: &Arc<Transaction>, pk: &Key) -> Result<bool> {
		ensure!(!self.is_capped(), Error::CappedDelete(self.inner.name.clone()));
		let Some(doc) = self.find_by_pk(txn, pk)? else {
			return Ok(false);
		};
		for (no, (idx, dict)) in self.inner.indexes.iter().enumerate() {
			let entry = match no {
				0 => dict.entry(pk.clone(), Suffix::None),
				_ => dict.entry(idx.key_for(&doc), Suffix::Pk(pk.clone())),
			};
			txn.del(dict, entry)?;
		}
		trace!(target: TARGET, "Deleted {pk} from {}", self.inner.name);
		Ok(true)
	}

	/// Fetch a document from the main store by primary key
	pub fn find_by_pk(&self, txn: &Arc<Transaction>, pk: &Key) -> Result<Option<Document>> {
		let dict = self.primary();
		Ok(txn.get(dict, &dict.entry(pk.clone(), Suffix::None))?.flatten())
	}

	/// The smallest primary key which a live transaction could still insert.
	///
	/// Collections which are not capped have no such watermark.
	pub fn min_unsafe_key(&self) -> Key {
		match &self.inner.capped {
			Some(tracker) => tracker.min_unsafe_key(),
			None => Key::from(Value::MaxKey),
		}
	}

	/// Drop every dictionary backing this collection
	pub fn remove(&self, ds: &Datastore) -> Result<()> {
		for (_, dict) in self.inner.indexes.iter() {
			ds.drop_dictionary(dict.name())?;
		}
		debug!(target: TARGET, "Removed collection {}", self.inner.name);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kvs::Isolation;

	fn setup() -> (Datastore, Collection) {
		let ds = Datastore::new();
		let idx = IndexDefinition::new("a_1", &[("a", 1)]);
		let uniq = IndexDefinition::new("u_1", &[("u", 1)]).unique();
		let coll = Collection::create(&ds, "test", vec![idx, uniq]).unwrap();
		(ds, coll)
	}

	#[test]
	fn insert_find_and_delete() {
		let (ds, coll) = setup();
		let tx = ds.begin(Isolation::Snapshot, false).unwrap();
		let pk = coll.insert(&tx, doc! { "_id" => 1, "a" => 5, "u" => 1 }).unwrap();
		assert_eq!(pk, key![1]);
		let doc = coll.find_by_pk(&tx, &pk).unwrap().unwrap();
		assert_eq!(doc.get("a"), Some(&Value::Int(5)));
		assert!(coll.delete(&tx, &pk).unwrap());
		assert!(!coll.delete(&tx, &pk).unwrap());
		assert_eq!(coll.find_by_pk(&tx, &pk).unwrap(), None);
		tx.commit().unwrap();
	}

	#[test]
	fn duplicate_keys_are_rejected() {
		let (ds, coll) = setup();
		let tx = ds.begin(Isolation::Snapshot, false).unwrap();
		coll.insert(&tx, doc! { "_id" => 1, "u" => 7 }).unwrap();
		let err = coll.insert(&tx, doc! { "_id" => 1, "u" => 8 }).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::KeyAlreadyExists(_))));
		let err = coll.insert(&tx, doc! { "_id" => 2, "u" => 7 }).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::KeyAlreadyExists(_))));
		let err = coll.insert(&tx, doc! { "u" => 9 }).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingPrimaryKey)));
		tx.cancel().unwrap();
	}

	#[test]
	fn capped_collections_assign_keys() {
		let ds = Datastore::new();
		let coll = Collection::create_capped(&ds, "log", vec![]).unwrap();
		let tx = ds.begin(Isolation::Snapshot, false).unwrap();
		assert_eq!(coll.insert(&tx, doc! { "msg" => "a" }).unwrap(), key![1]);
		assert_eq!(coll.insert(&tx, doc! { "msg" => "b" }).unwrap(), key![2]);
		assert_eq!(coll.min_unsafe_key(), key![1]);
		let err = coll.delete(&tx, &key![1]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CappedDelete(_))));
		tx.commit().unwrap();
		assert_eq!(coll.min_unsafe_key(), key![3]);
	}
}
