#![allow(clippy::unwrap_used)]

mod common;

use fractaldb_core::dbs::OpSettings;
use fractaldb_core::idx::{FieldRange, IndexBounds, IndexCountCursor, IndexCursor, Interval};
use fractaldb_core::key;
use fractaldb_core::key::{Direction, Key};
use fractaldb_core::kvs::Isolation;
use rstest::rstest;

use common::{grid, keys, reader};

#[rstest]
#[case(key![1], key![3], true)]
#[case(key![1], key![3], false)]
#[case(key![0], key![9], true)]
#[case(key![2, 4], key![3, 1], true)]
#[case(Key::empty(), Key::empty(), true)]
#[case(key![7], key![8], true)]
fn counts_match_the_rows_of_a_scan(#[case] start: Key, #[case] end: Key, #[case] inclusive: bool) {
	let (ds, coll) = grid(6, 5);
	let ctx = reader(&ds, Isolation::Snapshot);
	let mut rows = IndexCursor::with_range(
		&ctx,
		Some(&coll),
		1,
		start.clone(),
		end.clone(),
		inclusive,
		Direction::Forward,
	)
	.unwrap();
	let expected = keys(&mut rows).len();
	drop(rows);
	let mut count =
		IndexCountCursor::with_range(&ctx, Some(&coll), 1, start, end, inclusive, Direction::Forward)
			.unwrap();
	assert_eq!(count.count().unwrap(), expected);
	assert!(count.nscanned() >= expected);
	drop(count);
	ctx.tx().cancel().unwrap();
}

#[test_log::test]
fn counts_match_the_rows_within_bounds() {
	let (ds, coll) = grid(6, 5);
	let ctx = reader(&ds, Isolation::Snapshot);
	let idx = coll.index(1).unwrap().clone();
	let bounds = || {
		let a = FieldRange::new(vec![Interval::closed(1, 2), Interval::point(4)]).unwrap();
		let b = FieldRange::new(vec![Interval::new(0, false, 3, true)]).unwrap();
		IndexBounds::new(&idx, vec![a, b]).unwrap()
	};
	let mut rows =
		IndexCursor::with_bounds(&ctx, Some(&coll), 1, bounds(), 0, Direction::Forward).unwrap();
	assert_eq!(keys(&mut rows).len(), 9);
	drop(rows);
	let mut count =
		IndexCountCursor::with_bounds(&ctx, Some(&coll), 1, bounds(), Direction::Forward).unwrap();
	assert!(count.ok());
	assert_eq!(count.count().unwrap(), 9);
	drop(count);
	ctx.tx().cancel().unwrap();
}

#[test_log::test]
fn counting_steps_one_key_at_a_time() {
	let (ds, coll) = grid(3, 3);
	let ctx = reader(&ds, Isolation::Snapshot);
	let mut count = IndexCountCursor::with_range(
		&ctx,
		Some(&coll),
		1,
		key![1],
		Key::empty(),
		true,
		Direction::Forward,
	)
	.unwrap();
	let mut steps = 1;
	while count.advance().unwrap() {
		steps += 1;
	}
	assert_eq!(steps, 6);
	assert!(!count.ok());
	drop(count);
	ctx.tx().cancel().unwrap();
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(7)]
fn counting_refills_across_batches(#[case] batch: usize) {
	let (ds, coll) = grid(4, 5);
	let ctx = reader(&ds, Isolation::Snapshot)
		.with_settings(OpSettings::default().with_count_batch_size(batch));
	let count = |start: Key, end: Key| {
		let mut c = IndexCountCursor::with_range(
			&ctx,
			Some(&coll),
			1,
			start,
			end,
			true,
			Direction::Forward,
		)
		.unwrap();
		let mut steps = 0;
		while c.ok() {
			steps += 1;
			c.advance().unwrap();
		}
		assert!(!c.advance().unwrap());
		(steps, c.nscanned())
	};
	// Every key of the index, in many batches
	let (steps, scanned) = count(Key::empty(), Key::empty());
	assert_eq!(steps, 20);
	assert_eq!(scanned, 20);
	// A range which ends inside a batch
	let (steps, _) = count(key![1], key![2]);
	assert_eq!(steps, 10);
	ctx.tx().cancel().unwrap();
}
