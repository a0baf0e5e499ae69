//! Ordered index keys, per-field orderings and scan directions.
//!
//! An index key is a tuple of [`Value`]s, one per indexed field. Keys are
//! compared field by field, where each field may be ascending or descending
//! according to the index [`Ordering`]. When one key is a prefix of another,
//! the shorter key sorts first.

use std::cmp;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::err::Error;
use crate::val::Value;

/// The maximum number of fields in a compound index
pub const MAX_FIELDS: usize = 32;

/// An ordered tuple of values
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
pub struct Key(Vec<Value>);

impl Key {
	pub fn new(values: Vec<Value>) -> Self {
		Self(values)
	}

	/// A key with no fields, meaning unbounded
	pub fn empty() -> Self {
		Self(Vec::new())
	}

	/// Compare two keys under the given per-field ordering
	pub fn compare(&self, other: &Key, ordering: Ordering) -> cmp::Ordering {
		for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
			let c = a.cmp(b);
			let c = match ordering.is_descending(i) {
				true => c.reverse(),
				false => c,
			};
			if c != cmp::Ordering::Equal {
				return c;
			}
		}
		self.0.len().cmp(&other.0.len())
	}

	/// The first `n` fields of this key
	pub fn prefix(&self, n: usize) -> Key {
		Key(self.0[..n.min(self.0.len())].to_vec())
	}

	pub fn push(&mut self, v: Value) {
		self.0.push(v);
	}

	pub fn values(&self) -> &[Value] {
		&self.0
	}

	pub fn into_values(self) -> Vec<Value> {
		self.0
	}

	/// Check if this key is the single-field maximal key
	pub fn is_max_key(&self) -> bool {
		self.0.len() == 1 && self.0[0].is_max_key()
	}

	/// The smallest `n`-field key in iteration order for the given
	/// ordering, when scanning in the given direction.
	pub fn lowest(ordering: Ordering, direction: Direction, n: usize) -> Key {
		Key((0..n).map(|i| extreme(ordering, direction, i, false)).collect())
	}

	/// The largest `n`-field key in iteration order for the given
	/// ordering, when scanning in the given direction.
	pub fn highest(ordering: Ordering, direction: Direction, n: usize) -> Key {
		Key((0..n).map(|i| extreme(ordering, direction, i, true)).collect())
	}
}

/// The value at field `i` which sorts first (or last) in iteration order
pub(crate) fn extreme(ordering: Ordering, direction: Direction, i: usize, last: bool) -> Value {
	// Iterating forward over an ascending field visits MinKey first
	let ascending = (ordering.get(i) * direction.as_i32()) > 0;
	match ascending == last {
		true => Value::MaxKey,
		false => Value::MinKey,
	}
}

impl Deref for Key {
	type Target = [Value];
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<Vec<Value>> for Key {
	fn from(v: Vec<Value>) -> Self {
		Key(v)
	}
}

impl From<Value> for Key {
	fn from(v: Value) -> Self {
		Key(vec![v])
	}
}

impl Display for Key {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("(")?;
		for (i, v) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{v}")?;
		}
		f.write_str(")")
	}
}

/// The sort direction of every field in a compound index.
///
/// Bit `i` is set when field `i` sorts descending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
	descending: u32,
	fields: u8,
}

impl Ordering {
	/// An ordering where every one of `n` fields ascends
	pub fn ascending(n: usize) -> Self {
		Self {
			descending: 0,
			fields: n.min(MAX_FIELDS) as u8,
		}
	}

	/// Build an ordering from a list of per-field directions, `1` or `-1`
	pub fn from_directions(dirs: &[i32]) -> Result<Self> {
		ensure!(
			dirs.len() <= MAX_FIELDS,
			Error::InvalidBounds(format!("an index can have at most {MAX_FIELDS} fields"))
		);
		let mut descending = 0u32;
		for (i, d) in dirs.iter().enumerate() {
			match d {
				1 => {}
				-1 => descending |= 1 << i,
				d => bail!(Error::InvalidDirection(*d)),
			}
		}
		Ok(Self {
			descending,
			fields: dirs.len() as u8,
		})
	}

	/// Returns `1` for an ascending field and `-1` for a descending one
	pub fn get(&self, i: usize) -> i32 {
		match self.is_descending(i) {
			true => -1,
			false => 1,
		}
	}

	pub fn is_descending(&self, i: usize) -> bool {
		i < MAX_FIELDS && self.descending & (1 << i) != 0
	}

	pub fn fields(&self) -> usize {
		self.fields as usize
	}
}

/// The direction in which a cursor walks an index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
	#[default]
	Forward,
	Reverse,
}

impl Direction {
	pub fn as_i32(&self) -> i32 {
		match self {
			Direction::Forward => 1,
			Direction::Reverse => -1,
		}
	}

	pub fn is_forward(&self) -> bool {
		matches!(self, Direction::Forward)
	}

	/// Turn a key-order comparison into an iteration-order comparison
	pub fn apply(&self, c: cmp::Ordering) -> cmp::Ordering {
		match self {
			Direction::Forward => c,
			Direction::Reverse => c.reverse(),
		}
	}
}

impl TryFrom<i32> for Direction {
	type Error = anyhow::Error;
	fn try_from(v: i32) -> Result<Self> {
		match v {
			1 => Ok(Direction::Forward),
			-1 => Ok(Direction::Reverse),
			v => bail!(Error::InvalidDirection(v)),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cmp::Ordering::{Equal, Greater, Less};

	use super::*;

	#[test]
	fn compare_respects_descending_fields() {
		let ord = Ordering::from_directions(&[1, -1]).unwrap();
		let a = key![1, 5];
		let b = key![1, 3];
		assert_eq!(a.compare(&b, ord), Less);
		assert_eq!(a.compare(&b, Ordering::ascending(2)), Greater);
		assert_eq!(a.compare(&a.clone(), ord), Equal);
	}

	#[test]
	fn shorter_prefix_sorts_first() {
		let ord = Ordering::ascending(2);
		assert_eq!(key![1].compare(&key![1, Value::MinKey], ord), Less);
		assert_eq!(key![2].compare(&key![1, 9], ord), Greater);
	}

	#[test]
	fn invalid_directions() {
		let err = Ordering::from_directions(&[1, 2]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidDirection(2))));
		assert!(Direction::try_from(0).is_err());
		assert_eq!(Direction::try_from(-1).unwrap(), Direction::Reverse);
	}

	#[test]
	fn extremes_follow_direction() {
		let ord = Ordering::from_directions(&[1, -1]).unwrap();
		let lo = Key::lowest(ord, Direction::Forward, 2);
		assert_eq!(lo.values(), &[Value::MinKey, Value::MaxKey]);
		let hi = Key::highest(ord, Direction::Reverse, 2);
		assert_eq!(hi.values(), &[Value::MinKey, Value::MaxKey]);
		assert!(lo.compare(&key![0, 0], ord) == Less);
	}
}
