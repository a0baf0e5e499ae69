use std::cmp;

use anyhow::{Result, ensure};

use crate::catalog::IndexDefinition;
use crate::err::Error;
use crate::key::{Direction, Key, Ordering};
use crate::val::{Document, Value};

/// One edge of an interval
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalBound {
	pub value: Value,
	pub inclusive: bool,
}

/// A range of values of a single field, with `start <= end`
#[derive(Clone, Debug, PartialEq)]
pub struct Interval {
	pub start: IntervalBound,
	pub end: IntervalBound,
}

impl Interval {
	pub fn new(
		start: impl Into<Value>,
		start_inclusive: bool,
		end: impl Into<Value>,
		end_inclusive: bool,
	) -> Self {
		Self {
			start: IntervalBound {
				value: start.into(),
				inclusive: start_inclusive,
			},
			end: IntervalBound {
				value: end.into(),
				inclusive: end_inclusive,
			},
		}
	}

	/// The interval containing every value from `start` to `end`, inclusive
	pub fn closed(start: impl Into<Value>, end: impl Into<Value>) -> Self {
		Self::new(start, true, end, true)
	}

	/// The interval containing a single value
	pub fn point(v: impl Into<Value>) -> Self {
		let v = v.into();
		Self::new(v.clone(), true, v, true)
	}

	/// The interval containing every value
	pub fn universal() -> Self {
		Self::closed(Value::MinKey, Value::MaxKey)
	}

	pub fn is_point(&self) -> bool {
		self.start.inclusive && self.end.inclusive && self.start.value == self.end.value
	}

	/// Check if a value lies inside this interval
	pub fn contains(&self, v: &Value) -> bool {
		let lo = match v.cmp(&self.start.value) {
			cmp::Ordering::Less => false,
			cmp::Ordering::Equal => self.start.inclusive,
			cmp::Ordering::Greater => true,
		};
		let hi = match v.cmp(&self.end.value) {
			cmp::Ordering::Less => true,
			cmp::Ordering::Equal => self.end.inclusive,
			cmp::Ordering::Greater => false,
		};
		lo && hi
	}

	fn is_empty(&self) -> bool {
		match self.start.value.cmp(&self.end.value) {
			cmp::Ordering::Less => false,
			cmp::Ordering::Equal => !self.is_point(),
			cmp::Ordering::Greater => true,
		}
	}

	/// The edge which iteration reaches first
	fn near(&self, ascending: bool) -> &IntervalBound {
		match ascending {
			true => &self.start,
			false => &self.end,
		}
	}

	/// The edge which iteration reaches last
	fn far(&self, ascending: bool) -> &IntervalBound {
		match ascending {
			true => &self.end,
			false => &self.start,
		}
	}
}

/// The sorted, disjoint intervals which constrain one index field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRange {
	intervals: Vec<Interval>,
}

impl FieldRange {
	/// Build a field range from intervals in ascending value order
	pub fn new(intervals: Vec<Interval>) -> Result<Self> {
		ensure!(!intervals.is_empty(), Error::InvalidBounds("a field range needs an interval".into()));
		for i in intervals.iter() {
			ensure!(
				!i.is_empty(),
				Error::InvalidBounds(format!("the interval {} to {} is empty", i.start.value, i.end.value))
			);
		}
		for w in intervals.windows(2) {
			let (a, b) = (&w[0], &w[1]);
			let disjoint = match a.end.value.cmp(&b.start.value) {
				cmp::Ordering::Less => true,
				cmp::Ordering::Equal => !(a.end.inclusive && b.start.inclusive),
				cmp::Ordering::Greater => false,
			};
			ensure!(
				disjoint,
				Error::InvalidBounds(format!(
					"the intervals ending at {} and starting at {} overlap or are out of order",
					a.end.value, b.start.value
				))
			);
		}
		Ok(Self {
			intervals,
		})
	}

	pub fn universal() -> Self {
		Self {
			intervals: vec![Interval::universal()],
		}
	}

	pub fn point(v: impl Into<Value>) -> Self {
		Self {
			intervals: vec![Interval::point(v)],
		}
	}

	pub fn intervals(&self) -> &[Interval] {
		&self.intervals
	}

	pub fn contains(&self, v: &Value) -> bool {
		self.intervals.iter().any(|i| i.contains(v))
	}

	/// The intervals in the order iteration visits them
	fn ordered(&self, ascending: bool) -> Box<dyn Iterator<Item = &Interval> + '_> {
		match ascending {
			true => Box::new(self.intervals.iter()),
			false => Box::new(self.intervals.iter().rev()),
		}
	}

	fn first(&self, ascending: bool) -> &Interval {
		match ascending {
			true => &self.intervals[0],
			false => &self.intervals[self.intervals.len() - 1],
		}
	}

	fn last(&self, ascending: bool) -> &Interval {
		self.first(!ascending)
	}
}

/// Per-field interval lists over a compound index.
///
/// A key lies inside the bounds when every one of its fields lies inside
/// one of that field's intervals. Fields without a range are unconstrained.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexBounds {
	names: Vec<String>,
	fields: Vec<FieldRange>,
	ordering: Ordering,
}

impl IndexBounds {
	pub fn new(index: &IndexDefinition, mut fields: Vec<FieldRange>) -> Result<Self> {
		ensure!(
			fields.len() <= index.fields(),
			Error::InvalidBounds(format!(
				"{} field ranges were given for the {} fields of index '{}'",
				fields.len(),
				index.fields(),
				index.name
			))
		);
		fields.resize_with(index.fields(), FieldRange::universal);
		Ok(Self {
			names: index.cols.iter().map(|(f, _)| f.clone()).collect(),
			fields,
			ordering: index.ordering()?,
		})
	}

	pub fn fields(&self) -> &[FieldRange] {
		&self.fields
	}

	pub fn ordering(&self) -> Ordering {
		self.ordering
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Whether a field is visited in ascending value order
	pub(crate) fn ascending(&self, i: usize, direction: Direction) -> bool {
		self.ordering.get(i) * direction.as_i32() > 0
	}

	/// The number of interval combinations these bounds describe
	pub fn combinations(&self) -> usize {
		self.fields.iter().fold(1usize, |n, f| n.saturating_mul(f.intervals.len()))
	}

	/// Check if there is exactly one interval for every field
	pub fn is_single_interval(&self) -> bool {
		self.fields.iter().all(|f| f.intervals.len() == 1)
	}

	/// Check if these bounds match a single key
	pub fn is_point(&self) -> bool {
		self.fields.iter().all(|f| f.intervals.len() == 1 && f.intervals[0].is_point())
	}

	/// The first key in iteration order which could lie inside the bounds
	pub fn start_key(&self, direction: Direction) -> Key {
		let mut key = Key::empty();
		for (i, f) in self.fields.iter().enumerate() {
			let ascending = self.ascending(i, direction);
			key.push(f.first(ascending).near(ascending).value.clone());
		}
		key
	}

	/// The last key in iteration order which could lie inside the bounds
	pub fn end_key(&self, direction: Direction) -> Key {
		let mut key = Key::empty();
		for (i, f) in self.fields.iter().enumerate() {
			let ascending = self.ascending(i, direction);
			key.push(f.last(ascending).far(ascending).value.clone());
		}
		key
	}

	/// Check if a key lies inside the bounds
	pub fn matches(&self, key: &Key) -> bool {
		key.len() == self.fields.len() && self.fields.iter().zip(key.iter()).all(|(f, v)| f.contains(v))
	}

	/// Describe the bounds as a document, such as `{ a: [[2, 6], [8, 10]] }`
	pub fn to_document(&self) -> Document {
		let mut doc = Document::default();
		for (name, f) in self.names.iter().zip(self.fields.iter()) {
			let intervals = f
				.intervals
				.iter()
				.map(|i| Value::Array(vec![i.start.value.clone(), i.end.value.clone()]))
				.collect::<Vec<_>>();
			doc.insert(name.as_str(), Value::Array(intervals));
		}
		doc
	}
}

/// What a cursor should do after reading a key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsAdvance {
	/// No key at or after this one lies inside the bounds
	Exhausted,
	/// The key lies inside the bounds
	Continue,
	/// Keep the first `n` fields of the key and skip ahead
	Skip(usize),
}

/// Where a field value lies relative to the intervals of its range
enum Place {
	Within(usize),
	/// Before an interval, noting whether it sits on its exclusive edge
	Before(usize, bool),
	After,
}

/// Tells a cursor how to move through the keys of an [`IndexBounds`].
///
/// After a [`BoundsAdvance::Skip`] the iterator describes the target:
/// when [`BoundsIterator::after`] is true the cursor should move past every
/// key sharing the kept prefix, otherwise it should move to the key made of
/// the kept prefix followed by the values of [`BoundsIterator::cmp`].
#[derive(Clone, Debug)]
pub struct BoundsIterator {
	bounds: IndexBounds,
	direction: Direction,
	after: bool,
	cmp: Vec<Value>,
	inc: Vec<bool>,
}

impl BoundsIterator {
	pub fn new(bounds: IndexBounds, direction: Direction) -> Self {
		let n = bounds.len();
		Self {
			bounds,
			direction,
			after: false,
			cmp: vec![Value::MinKey; n],
			inc: vec![true; n],
		}
	}

	pub fn bounds(&self) -> &IndexBounds {
		&self.bounds
	}

	/// Whether the last skip moves past the kept prefix
	pub fn after(&self) -> bool {
		self.after
	}

	/// The field values to move to after the kept prefix
	pub fn cmp(&self) -> &[Value] {
		&self.cmp
	}

	/// Whether each of the `cmp` values is itself inside the bounds
	pub fn inc(&self) -> &[bool] {
		&self.inc
	}

	fn locate(&self, i: usize, v: &Value) -> Place {
		let ascending = self.bounds.ascending(i, self.direction);
		// Order values the way iteration visits them
		let order = |a: &Value, b: &Value| match ascending {
			true => a.cmp(b),
			false => b.cmp(a),
		};
		for (n, interval) in self.bounds.fields[i].ordered(ascending).enumerate() {
			let near = interval.near(ascending);
			match order(v, &near.value) {
				cmp::Ordering::Less => return Place::Before(n, false),
				cmp::Ordering::Equal if !near.inclusive => return Place::Before(n, true),
				_ => {}
			}
			let far = interval.far(ascending);
			match order(v, &far.value) {
				cmp::Ordering::Less => return Place::Within(n),
				cmp::Ordering::Equal if far.inclusive => return Place::Within(n),
				_ => {}
			}
		}
		Place::After
	}

	/// Decide what to do with a key read from the index
	pub fn advance(&mut self, key: &Key) -> BoundsAdvance {
		// The latest field which can still move within its range
		let mut movable: Option<usize> = None;
		for i in 0..self.bounds.len() {
			let Some(v) = key.get(i) else {
				return BoundsAdvance::Exhausted;
			};
			let ascending = self.bounds.ascending(i, self.direction);
			match self.locate(i, v) {
				Place::Within(n) => {
					let range = &self.bounds.fields[i];
					let last = n + 1 == range.intervals.len();
					if !last || range.last(ascending).far(ascending).value != *v {
						movable = Some(i);
					}
				}
				Place::After => {
					return match movable {
						None => BoundsAdvance::Exhausted,
						Some(m) => {
							self.after = true;
							BoundsAdvance::Skip(m + 1)
						}
					};
				}
				Place::Before(_, true) => {
					self.after = true;
					return BoundsAdvance::Skip(i + 1);
				}
				Place::Before(n, false) => {
					let near = self.bounds.fields[i].ordered(ascending).nth(n).map(|x| x.near(ascending));
					if let Some(near) = near {
						self.cmp[i] = near.value.clone();
						self.inc[i] = near.inclusive;
					}
					for j in (i + 1)..self.bounds.len() {
						let asc = self.bounds.ascending(j, self.direction);
						let near = self.bounds.fields[j].first(asc).near(asc);
						self.cmp[j] = near.value.clone();
						self.inc[j] = near.inclusive;
					}
					self.after = false;
					return BoundsAdvance::Skip(i);
				}
			}
		}
		BoundsAdvance::Continue
	}
}
