//! Document-model values and their canonical ordering.

mod document;

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

pub use self::document::Document;

/// A single document-model value.
///
/// Values of different types sort in a fixed canonical order:
/// `MinKey < Null < numbers < String < Document < Array < Bool < Date < MaxKey`.
/// Integers and floats are compared numerically with each other.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum Value {
	/// Sorts before every other value
	MinKey,
	#[default]
	Null,
	Int(i64),
	Float(f64),
	String(String),
	Document(Document),
	Array(Vec<Value>),
	Bool(bool),
	/// Milliseconds since the unix epoch
	Date(i64),
	/// Sorts after every other value
	MaxKey,
}

impl Value {
	/// The position of this value's type in the canonical type order
	fn rank(&self) -> u8 {
		match self {
			Value::MinKey => 0,
			Value::Null => 1,
			Value::Int(_) | Value::Float(_) => 2,
			Value::String(_) => 3,
			Value::Document(_) => 4,
			Value::Array(_) => 5,
			Value::Bool(_) => 6,
			Value::Date(_) => 7,
			Value::MaxKey => 8,
		}
	}

	pub fn is_min_key(&self) -> bool {
		matches!(self, Value::MinKey)
	}

	pub fn is_max_key(&self) -> bool {
		matches!(self, Value::MaxKey)
	}

	/// Returns the integer value, if this is an integral number
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			Value::Float(v) if v.fract() == 0.0 && cmp_int_float(*v as i64, *v).is_eq() => {
				Some(*v as i64)
			}
			_ => None,
		}
	}

	/// Returns the embedded document, if this is one
	pub fn as_document(&self) -> Option<&Document> {
		match self {
			Value::Document(v) => Some(v),
			_ => None,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Value {}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Value {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Value::Int(a), Value::Int(b)) => a.cmp(b),
			(Value::Float(a), Value::Float(b)) => cmp_floats(*a, *b),
			(Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
			(Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
			(Value::String(a), Value::String(b)) => a.cmp(b),
			(Value::Document(a), Value::Document(b)) => a.cmp(b),
			(Value::Array(a), Value::Array(b)) => a.cmp(b),
			(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
			(Value::Date(a), Value::Date(b)) => a.cmp(b),
			_ => self.rank().cmp(&other.rank()),
		}
	}
}

/// Compare two floats, with both zeros equal and NaN outside every number
fn cmp_floats(a: f64, b: f64) -> Ordering {
	match a.partial_cmp(&b) {
		Some(o) => o,
		None => a.total_cmp(&b),
	}
}

/// Compare an integer with a float exactly, without rounding either
fn cmp_int_float(i: i64, f: f64) -> Ordering {
	// 2^63, the first float above every i64
	const LIMIT: f64 = 9_223_372_036_854_775_808.0;
	if f.is_nan() {
		return match f.is_sign_negative() {
			true => Ordering::Greater,
			false => Ordering::Less,
		};
	}
	if f >= LIMIT {
		return Ordering::Less;
	}
	if f < -LIMIT {
		return Ordering::Greater;
	}
	// Within range the truncated float converts without loss
	let whole = f.trunc();
	match i.cmp(&(whole as i64)) {
		Ordering::Equal => 0f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
		o => o,
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Value::MinKey => f.write_str("MinKey"),
			Value::Null => f.write_str("null"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v:?}"),
			Value::String(v) => write!(f, "{v:?}"),
			Value::Document(v) => write!(f, "{v}"),
			Value::Array(v) => {
				f.write_str("[")?;
				for (i, v) in v.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{v}")?;
				}
				f.write_str("]")
			}
			Value::Bool(v) => write!(f, "{v}"),
			Value::Date(v) => write!(f, "Date({v})"),
			Value::MaxKey => f.write_str("MaxKey"),
		}
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<u32> for Value {
	fn from(v: u32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<Document> for Value {
	fn from(v: Document) -> Self {
		Value::Document(v)
	}
}

impl From<Vec<Value>> for Value {
	fn from(v: Vec<Value>) -> Self {
		Value::Array(v)
	}
}
