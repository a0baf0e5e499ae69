use anyhow::{Result, ensure};

use super::bounds::IndexBounds;
use super::cursor::{End, IndexCursor, Scan, pad};
use super::prelock::prelock_range;
use crate::catalog::Collection;
use crate::cnf::COUNT_BATCH_SIZE;
use crate::ctx::Context;
use crate::err::Error;
use crate::key::{Direction, Key, Ordering};
use crate::kvs::{Cursor, Fetch, Getf, Suffix};

const TARGET: &str = "fractaldb::core::idx::count";

/// Counts the keys in a range without decoding any rows
struct RangeCounter {
	ctx: Context,
	cursor: Option<Cursor>,
	ordering: Ordering,
	end: End,
	/// Matching keys which have been counted but not yet consumed
	count: usize,
	end_reached: bool,
	nscanned: usize,
}

impl RangeCounter {
	/// Count the next batch of keys, starting at a key or after the position
	fn fill(&mut self, from: Option<&Key>) -> Result<()> {
		let Some(cursor) = self.cursor.as_mut() else {
			return Ok(());
		};
		let batch = match self.ctx.settings().count_batch_size {
			0 => (*COUNT_BATCH_SIZE).max(1),
			n => n,
		};
		let (end, ordering) = (&self.end, self.ordering);
		let mut counted = 0;
		let mut passed = false;
		// Only the index key is compared, never the primary key suffix
		let mut count = |k: &crate::kvs::EntryKey| {
			if end.passed(k.key(), ordering, Direction::Forward) {
				passed = true;
				return Getf::Stop;
			}
			counted += 1;
			match counted < batch {
				true => Getf::Continue,
				false => Getf::Stop,
			}
		};
		let res = match from {
			Some(key) => {
				let key = cursor.dictionary().entry(key.clone(), Suffix::Min);
				cursor.getf_set_range(&key, |k, _| Ok(count(k)))?
			}
			None => cursor.getf_next(|k, _| Ok(count(k)))?,
		};
		trace!(target: TARGET, "Counted {counted} keys, passed the end: {passed}");
		self.count = counted;
		self.nscanned += counted;
		self.end_reached = passed || res == Fetch::NotFound;
		Ok(())
	}

	fn advance(&mut self) -> Result<bool> {
		self.ctx.check_interrupt()?;
		if self.count > 1 {
			self.count -= 1;
			return Ok(true);
		}
		self.count = 0;
		if self.end_reached {
			return Ok(false);
		}
		self.fill(None)?;
		Ok(self.count > 0)
	}
}

enum Counter {
	Range(RangeCounter),
	/// Bounds membership needs every key, so these are walked row by row
	Bounds(IndexCursor),
}

/// A forward-only cursor which counts the keys of an index range.
///
/// Every successful [`IndexCountCursor::advance`] stands for one more
/// matching key, exactly as it would on an [`IndexCursor`] over the same
/// range, but no rows or documents are materialised. The range is always
/// prelocked, so counts under serializable isolation are stable.
pub struct IndexCountCursor {
	counter: Counter,
}

impl IndexCountCursor {
	#[instrument(level = "trace", target = "fractaldb::core::idx::count", skip_all)]
	pub fn with_range(
		ctx: &Context,
		coll: Option<&Collection>,
		idx_no: usize,
		start: Key,
		end: Key,
		end_inclusive: bool,
		direction: Direction,
	) -> Result<IndexCountCursor> {
		ensure!(direction.is_forward(), Error::CountCursorReverse);
		let (ordering, mut cursor) = match coll {
			Some(c) => {
				let ordering = c.index(idx_no)?.ordering()?;
				(ordering, Some(Cursor::new(ctx.tx(), c.dictionary(idx_no)?)?))
			}
			None => (Ordering::default(), None),
		};
		let start = pad(start, ordering, direction, false);
		if let Some(cursor) = cursor.as_mut() {
			let lock_end = match end.is_empty() {
				true => Key::empty(),
				false => pad(end.clone(), ordering, direction, true),
			};
			prelock_range(cursor, ordering, direction, &start, &lock_end, ctx.lock_mode())?;
		}
		let mut counter = RangeCounter {
			ctx: ctx.clone(),
			cursor,
			ordering,
			end: End {
				key: end,
				inclusive: end_inclusive,
			},
			count: 0,
			end_reached: false,
			nscanned: 0,
		};
		counter.fill(Some(&start))?;
		debug!(target: TARGET, "Created a count cursor which counted {} keys up front", counter.count);
		Ok(IndexCountCursor {
			counter: Counter::Range(counter),
		})
	}

	#[instrument(level = "trace", target = "fractaldb::core::idx::count", skip_all)]
	pub fn with_bounds(
		ctx: &Context,
		coll: Option<&Collection>,
		idx_no: usize,
		bounds: IndexBounds,
		direction: Direction,
	) -> Result<IndexCountCursor> {
		ensure!(direction.is_forward(), Error::CountCursorReverse);
		let scan = Scan::Bounds {
			bounds,
			single_interval_limit: 0,
		};
		let cursor = IndexCursor::open(ctx, coll, idx_no, scan, direction, true)?;
		Ok(IndexCountCursor {
			counter: Counter::Bounds(cursor),
		})
	}

	/// Check if the cursor is positioned on a matching key
	pub fn ok(&self) -> bool {
		match &self.counter {
			Counter::Range(c) => c.count > 0,
			Counter::Bounds(c) => c.ok(),
		}
	}

	/// Move to the next matching key, returning whether there is one
	pub fn advance(&mut self) -> Result<bool> {
		match &mut self.counter {
			Counter::Range(c) => c.advance(),
			Counter::Bounds(c) => c.advance(),
		}
	}

	/// Consume the remaining keys, returning how many there were
	pub fn count(&mut self) -> Result<usize> {
		let mut n = 0;
		while self.ok() {
			n += 1;
			if !self.advance()? {
				break;
			}
		}
		Ok(n)
	}

	/// The number of keys examined so far
	pub fn nscanned(&self) -> usize {
		match &self.counter {
			Counter::Range(c) => c.nscanned,
			Counter::Bounds(c) => c.nscanned(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::IndexDefinition;
	use crate::kvs::{Datastore, Isolation};

	fn setup() -> (Datastore, Collection) {
		let ds = Datastore::new();
		let idx = IndexDefinition::new("a_1_b_1", &[("a", 1), ("b", 1)]);
		let coll = Collection::create(&ds, "t", vec![idx]).unwrap();
		let tx = ds.begin(Isolation::Snapshot, false).unwrap();
		let mut id = 0;
		for a in 0..4 {
			for b in 0..5 {
				id += 1;
				coll.insert(&tx, doc! { "_id" => id, "a" => a, "b" => b }).unwrap();
			}
		}
		tx.commit().unwrap();
		(ds, coll)
	}

	#[test]
	fn counts_an_equality_prefix() {
		let (ds, coll) = setup();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		let mut c =
			IndexCountCursor::with_range(&ctx, Some(&coll), 1, key![2], key![2], true, Direction::Forward)
				.unwrap();
		assert!(c.ok());
		assert_eq!(c.count().unwrap(), 5);
		assert!(!c.ok());
		assert!(!c.advance().unwrap());
		drop(c);
		tx.cancel().unwrap();
	}

	#[test]
	fn reverse_counting_is_rejected() {
		let (ds, coll) = setup();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		let res =
			IndexCountCursor::with_range(&ctx, Some(&coll), 1, key![1], key![2], true, Direction::Reverse);
		let err = res.err().unwrap();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CountCursorReverse)));
		tx.cancel().unwrap();
	}

	#[test]
	fn missing_collections_count_nothing() {
		let ds = Datastore::new();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		let mut c =
			IndexCountCursor::with_range(&ctx, None, 1, Key::empty(), Key::empty(), true, Direction::Forward)
				.unwrap();
		assert_eq!(c.count().unwrap(), 0);
		drop(c);
		tx.cancel().unwrap();
	}
}
