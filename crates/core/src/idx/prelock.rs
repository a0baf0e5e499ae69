use anyhow::Result;

use super::bounds::{IndexBounds, Interval};
use crate::ctx::Context;
use crate::key::{Direction, Key, Ordering};
use crate::kvs::{Cursor, EntryKey, Isolation, LockMode, Suffix};
use crate::val::Value;

const TARGET: &str = "fractaldb::core::idx::prelock";

/// Check if a cursor should declare, and possibly lock, its range up front.
///
/// Serializable transactions and explicitly locking operations always
/// prelock. Otherwise the range is only prefetched when the scan is not a
/// single point, and the caller did not ask for exactly one row.
pub fn should_prelock(ctx: &Context, point: bool) -> bool {
	ctx.isolation() == Isolation::Serializable
		|| ctx.settings().lock != LockMode::None
		|| (!point && !ctx.settings().wants_one())
}

/// Prelock the range between two keys, which may be given in either order
pub(crate) fn prelock_range(
	cursor: &mut Cursor,
	ordering: Ordering,
	direction: Direction,
	start: &Key,
	end: &Key,
	lock: LockMode,
) -> Result<()> {
	let n = ordering.fields();
	// Empty keys leave that side of the range open
	let start = match start.is_empty() {
		true => Key::lowest(ordering, direction, n),
		false => start.clone(),
	};
	let end = match end.is_empty() {
		true => Key::highest(ordering, direction, n),
		false => end.clone(),
	};
	lock_between(cursor, start, end, lock)
}

/// Prelock every interval combination of a set of bounds.
///
/// Combinations are visited depth first, in index field order.
pub(crate) fn prelock_bounds(
	cursor: &mut Cursor,
	bounds: &IndexBounds,
	direction: Direction,
	lock: LockMode,
) -> Result<()> {
	trace!(target: TARGET, "Prelocking {} interval combinations", bounds.combinations());
	let mut lo = Vec::with_capacity(bounds.len());
	let mut hi = Vec::with_capacity(bounds.len());
	prelock_compound(cursor, bounds, direction, lock, 0, &mut lo, &mut hi)
}

fn prelock_compound(
	cursor: &mut Cursor,
	bounds: &IndexBounds,
	direction: Direction,
	lock: LockMode,
	field: usize,
	lo: &mut Vec<Value>,
	hi: &mut Vec<Value>,
) -> Result<()> {
	if field == bounds.len() {
		return lock_between(cursor, Key::new(lo.clone()), Key::new(hi.clone()), lock);
	}
	let ascending = bounds.ascending(field, direction);
	let intervals = bounds.fields()[field].intervals();
	// Both endpoints follow key order, so descending fields swap their edges
	let descending = bounds.ordering().is_descending(field);
	let mut visit = |interval: &Interval| -> Result<()> {
		let (first, last) = match descending {
			false => (&interval.start, &interval.end),
			true => (&interval.end, &interval.start),
		};
		lo.push(first.value.clone());
		hi.push(last.value.clone());
		let res = prelock_compound(cursor, bounds, direction, lock, field + 1, lo, hi);
		lo.pop();
		hi.pop();
		res
	};
	match ascending {
		true => intervals.iter().try_for_each(&mut visit),
		false => intervals.iter().rev().try_for_each(&mut visit),
	}
}

/// Issue one range lock, swapping the endpoints into key order
fn lock_between(cursor: &mut Cursor, a: Key, b: Key, lock: LockMode) -> Result<()> {
	let dict = cursor.dictionary().clone();
	let a_lo = dict.entry(a.clone(), Suffix::Min);
	let b_lo = dict.entry(b.clone(), Suffix::Min);
	let (left, right): (EntryKey, EntryKey) = match a_lo <= b_lo {
		true => (a_lo, dict.entry(b, Suffix::Max)),
		false => (b_lo, dict.entry(a, Suffix::Max)),
	};
	trace!(target: TARGET, "Prelocking [{left}, {right}] on {}", dict.name());
	cursor.set_bounds(&left, &right, lock)
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::catalog::IndexDefinition;
	use crate::dbs::OpSettings;
	use crate::err::Error;
	use crate::idx::FieldRange;
	use crate::kvs::Datastore;

	#[test]
	fn prelock_decisions() {
		let ds = Datastore::new();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		assert!(should_prelock(&ctx, false));
		assert!(!should_prelock(&ctx, true));
		let one = ctx.clone().with_settings(OpSettings::default().with_num_wanted(1));
		assert!(!should_prelock(&one, false));
		let locking = ctx.with_settings(OpSettings::default().with_lock(LockMode::Write));
		assert!(should_prelock(&locking, true));
		tx.cancel().unwrap();
		let tx = ds.begin(Isolation::Serializable, true).unwrap();
		assert!(should_prelock(&Context::new(tx.clone()), true));
		tx.cancel().unwrap();
	}

	#[test]
	fn compound_prelocks_block_writers() {
		let ds = Datastore::new().with_lock_timeout(Duration::from_millis(20));
		let idx = IndexDefinition::new("ab", &[("a", 1), ("b", -1)]);
		let dict = ds.create_dictionary("c.ab", idx.ordering().unwrap()).unwrap();
		let a = FieldRange::new(vec![Interval::point(1), Interval::point(3)]).unwrap();
		let b = FieldRange::new(vec![Interval::closed(10, 20)]).unwrap();
		let bounds = IndexBounds::new(&idx, vec![a, b]).unwrap();
		let reader = ds.begin(Isolation::Serializable, true).unwrap();
		let mut cursor = Cursor::new(&reader, &dict).unwrap();
		prelock_bounds(&mut cursor, &bounds, Direction::Reverse, LockMode::Read).unwrap();
		let writer = ds.begin(Isolation::Serializable, false).unwrap();
		// Inside a locked combination
		let inside = dict.entry(key![3, 15], Suffix::Pk(key![1]));
		let err = writer.put(&dict, inside, None).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LockNotGranted(_))));
		// Between the locked combinations
		let between = dict.entry(key![2, 15], Suffix::Pk(key![2]));
		writer.put(&dict, between, None).unwrap();
		cursor.close().unwrap();
		reader.cancel().unwrap();
		writer.cancel().unwrap();
	}

	#[test]
	fn mixed_direction_prelocks_cover_every_inner_value() {
		let ds = Datastore::new().with_lock_timeout(Duration::from_millis(20));
		let idx = IndexDefinition::new("a_1_b_-1", &[("a", 1), ("b", -1)]);
		let dict = ds.create_dictionary("c.a_1_b_-1", idx.ordering().unwrap()).unwrap();
		let a = FieldRange::new(vec![Interval::closed(1, 3)]).unwrap();
		let b = FieldRange::new(vec![Interval::closed(10, 20)]).unwrap();
		let bounds = IndexBounds::new(&idx, vec![a, b]).unwrap();
		for direction in [Direction::Forward, Direction::Reverse] {
			let reader = ds.begin(Isolation::Serializable, true).unwrap();
			let mut cursor = Cursor::new(&reader, &dict).unwrap();
			prelock_bounds(&mut cursor, &bounds, direction, LockMode::Read).unwrap();
			let writer = ds.begin(Isolation::Serializable, false).unwrap();
			let inside = [key![1, 15], key![3, 12], key![2, 15], key![1, 20], key![3, 10]];
			for (n, k) in inside.into_iter().enumerate() {
				let entry = dict.entry(k, Suffix::Pk(key![n as i64]));
				let err = writer.put(&dict, entry, None).unwrap_err();
				assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LockNotGranted(_))));
			}
			// Outside the leading field range
			writer.put(&dict, dict.entry(key![4, 15], Suffix::Pk(key![9])), None).unwrap();
			cursor.close().unwrap();
			reader.cancel().unwrap();
			writer.cancel().unwrap();
		}
	}

	#[test]
	fn open_ranges_cover_everything() {
		let ds = Datastore::new().with_lock_timeout(Duration::from_millis(20));
		let dict = ds.create_dictionary("c.a", Ordering::ascending(1)).unwrap();
		let reader = ds.begin(Isolation::Serializable, true).unwrap();
		let mut cursor = Cursor::new(&reader, &dict).unwrap();
		let ordering = Ordering::ascending(1);
		let (start, end) = (Key::empty(), Key::empty());
		prelock_range(&mut cursor, ordering, Direction::Reverse, &start, &end, LockMode::Read).unwrap();
		let writer = ds.begin(Isolation::Serializable, false).unwrap();
		let err = writer.put(&dict, dict.entry(key![i64::MIN], Suffix::None), None).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LockNotGranted(_))));
		drop(cursor);
		reader.cancel().unwrap();
		writer.cancel().unwrap();
	}
}
