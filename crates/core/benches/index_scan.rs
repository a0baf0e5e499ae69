#![allow(clippy::unwrap_used)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fractaldb_core::catalog::{Collection, IndexDefinition};
use fractaldb_core::ctx::Context;
use fractaldb_core::doc;
use fractaldb_core::idx::{FieldRange, IndexBounds, IndexCountCursor, IndexCursor, Interval};
use fractaldb_core::key::{Direction, Key};
use fractaldb_core::kvs::{Datastore, Isolation};

const ROWS: i64 = 20_000;

fn setup() -> (Datastore, Collection) {
	let ds = Datastore::new();
	let idx = IndexDefinition::new("a_1_b_1", &[("a", 1), ("b", 1)]);
	let coll = Collection::create(&ds, "bench", vec![idx]).unwrap();
	let tx = ds.begin(Isolation::Snapshot, false).unwrap();
	for id in 0..ROWS {
		coll.insert(&tx, doc! { "_id" => id, "a" => id % 100, "b" => id / 100 }).unwrap();
	}
	tx.commit().unwrap();
	(ds, coll)
}

fn scan(ctx: &Context, coll: &Collection, idx_no: usize, direction: Direction) -> usize {
	let mut c = IndexCursor::with_range(
		ctx,
		Some(coll),
		idx_no,
		Key::empty(),
		Key::empty(),
		true,
		direction,
	)
	.unwrap();
	let mut n = 0;
	while c.ok() {
		n += 1;
		c.advance().unwrap();
	}
	n
}

fn criterion_benchmark(c: &mut Criterion) {
	let (ds, coll) = setup();
	let ctx = Context::new(ds.begin(Isolation::Snapshot, true).unwrap());
	let mut group = c.benchmark_group("index_scan");
	group.throughput(Throughput::Elements(ROWS as u64));
	for (name, idx_no) in [("primary", 0), ("secondary", 1)] {
		for direction in [Direction::Forward, Direction::Reverse] {
			let id = BenchmarkId::new(name, format!("{direction:?}"));
			group.bench_function(id, |b| b.iter(|| scan(black_box(&ctx), &coll, idx_no, direction)));
		}
	}
	group.finish();
	let idx = coll.index(1).unwrap().clone();
	c.bench_function("index_bounds_skip", |b| {
		b.iter(|| {
			let a = FieldRange::new((0..100).step_by(10).map(Interval::point).collect()).unwrap();
			let bounds = IndexBounds::new(&idx, vec![a, FieldRange::point(5)]).unwrap();
			let mut cur =
				IndexCursor::with_bounds(&ctx, Some(&coll), 1, bounds, 0, Direction::Forward).unwrap();
			let mut n = 0;
			while cur.ok() {
				n += 1;
				cur.advance().unwrap();
			}
			black_box(n)
		})
	});
	c.bench_function("index_count", |b| {
		b.iter(|| {
			let mut cur = IndexCountCursor::with_range(
				&ctx,
				Some(&coll),
				1,
				Key::empty(),
				Key::empty(),
				true,
				Direction::Forward,
			)
			.unwrap();
			black_box(cur.count().unwrap())
		})
	});
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
