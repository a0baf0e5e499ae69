use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::key::{Key, Ordering};
use crate::val::{Document, Value};

/// The name of the primary key field
pub const PK_FIELD: &str = "_id";

/// The name of the primary key index
pub const PK_INDEX: &str = "_id_";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Index {
	/// (Basic) non unique
	#[default]
	Idx,
	/// Unique index
	Uniq,
}

/// The definition of an index over a collection
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
	pub name: String,
	/// The indexed fields, each with `1` for ascending or `-1` for descending
	pub cols: Vec<(String, i32)>,
	pub index: Index,
	/// Whether the full document is stored alongside each key
	pub clustering: bool,
}

impl IndexDefinition {
	/// A non-unique, non-clustering index over the given fields
	pub fn new(name: &str, cols: &[(&str, i32)]) -> Self {
		Self {
			name: name.to_owned(),
			cols: cols.iter().map(|(f, d)| ((*f).to_owned(), *d)).collect(),
			index: Index::Idx,
			clustering: false,
		}
	}

	/// The unique, clustering, primary key index on `_id`
	pub fn primary() -> Self {
		Self {
			name: PK_INDEX.to_owned(),
			cols: vec![(PK_FIELD.to_owned(), 1)],
			index: Index::Uniq,
			clustering: true,
		}
	}

	pub fn unique(mut self) -> Self {
		self.index = Index::Uniq;
		self
	}

	pub fn clustering(mut self) -> Self {
		self.clustering = true;
		self
	}

	pub fn is_unique(&self) -> bool {
		self.index == Index::Uniq
	}

	pub fn is_primary(&self) -> bool {
		self.name == PK_INDEX
	}

	/// The number of fields in this index
	pub fn fields(&self) -> usize {
		self.cols.len()
	}

	/// The per-field ordering of this index
	pub fn ordering(&self) -> Result<Ordering> {
		let dirs: Vec<i32> = self.cols.iter().map(|(_, d)| *d).collect();
		Ordering::from_directions(&dirs)
	}

	/// Extract the index key of a document. Missing fields index as null.
	pub fn key_for(&self, doc: &Document) -> Key {
		Key::new(
			self.cols.iter().map(|(f, _)| doc.get(f).cloned().unwrap_or(Value::Null)).collect(),
		)
	}

	/// The key pattern as a document, such as `{ a: 1, b: -1 }`
	pub fn pattern(&self) -> Document {
		let mut doc = Document::default();
		for (f, d) in self.cols.iter() {
			doc.insert(f.as_str(), Value::from(*d));
		}
		doc
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_are_extracted_in_pattern_order() {
		let idx = IndexDefinition::new("b_1_a_-1", &[("b", 1), ("a.x", -1)]);
		let doc = doc! { "a" => doc! { "x" => 3 }, "b" => "two" };
		assert_eq!(idx.key_for(&doc), key!["two", 3]);
		let doc = doc! { "b" => 1 };
		assert_eq!(idx.key_for(&doc), key![1, Value::Null]);
		assert!(idx.ordering().unwrap().is_descending(1));
	}

	#[test]
	fn primary_index_is_unique_and_clustering() {
		let pk = IndexDefinition::primary();
		assert!(pk.is_primary() && pk.is_unique() && pk.clustering);
		assert_eq!(pk.pattern().to_string(), "{ _id: 1 }");
	}
}
