use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::Value;

/// An ordered collection of named fields.
///
/// Field order is preserved as inserted, and two documents compare
/// field by field, first by name and then by value.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Document(Vec<(String, Value)>);

impl Document {
	/// Fetch a field, descending into embedded documents on dotted paths
	pub fn get(&self, path: &str) -> Option<&Value> {
		match path.split_once('.') {
			None => self.field(path),
			Some((head, rest)) => self.field(head)?.as_document()?.get(rest),
		}
	}

	fn field(&self, name: &str) -> Option<&Value> {
		self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
	}

	/// Set a field, replacing any existing value with the same name
	pub fn insert(&mut self, name: impl Into<String>, value: Value) {
		let name = name.into();
		match self.0.iter_mut().find(|(k, _)| *k == name) {
			Some((_, v)) => *v = value,
			None => self.0.push((name, value)),
		}
	}

	/// Builder-style version of [`Document::insert`]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(name, value.into());
		self
	}

	pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl Display for Document {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("{ ")?;
		for (i, (k, v)) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{k}: {v}")?;
		}
		f.write_str(" }")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dotted_paths() {
		let inner = Document::default().with("b", 2);
		let doc = Document::default().with("a", inner).with("c", "x");
		assert_eq!(doc.get("a.b"), Some(&Value::Int(2)));
		assert_eq!(doc.get("c"), Some(&Value::from("x")));
		assert_eq!(doc.get("c.d"), None);
		assert_eq!(doc.get("z"), None);
	}

	#[test]
	fn insert_replaces() {
		let mut doc = Document::default().with("a", 1);
		doc.insert("a", Value::Int(5));
		assert_eq!(doc.len(), 1);
		assert_eq!(doc.get("a"), Some(&Value::Int(5)));
	}
}
