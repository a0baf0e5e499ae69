use std::cmp;
use std::mem;

use anyhow::{Result, bail, ensure};

use super::bounds::{BoundsAdvance, BoundsIterator, IndexBounds};
use super::prelock::{prelock_bounds, prelock_range, should_prelock};
use super::rowbuf::{Row, RowBuffer};
use crate::catalog::{Collection, IndexDefinition};
use crate::cnf::{BULK_FETCH_MAX_ROWS, ROW_BUFFER_GORGED_THRESHOLD};
use crate::ctx::Context;
use crate::err::Error;
use crate::key::{Direction, Key, Ordering, extreme};
use crate::kvs::{Cursor, EntryKey, Fetch, Getf, Suffix};
use crate::val::{Document, Value};

const TARGET: &str = "fractaldb::core::idx::cursor";

/// The number of rows which the bulk fetch with this iteration number
/// requests. Point queries fetch a single row, and longer scans double the
/// request on every fetch up to a configured maximum.
pub(crate) fn rows_to_fetch(iteration: usize) -> usize {
	let rows = match iteration {
		0 | 1 => 1,
		n => u32::try_from(n - 1).ok().and_then(|s| 1usize.checked_shl(s)).unwrap_or(usize::MAX),
	};
	rows.min(*BULK_FETCH_MAX_ROWS).max(1)
}

/// Extend a key to every field of an index, using the values which
/// iteration reaches first, or last.
pub(crate) fn pad(mut key: Key, ordering: Ordering, direction: Direction, last: bool) -> Key {
	for i in key.len()..ordering.fields() {
		key.push(extreme(ordering, direction, i, last));
	}
	key
}

/// The suffix which sorts before every entry of a key in iteration order
fn near_suffix(direction: Direction) -> Suffix {
	match direction {
		Direction::Forward => Suffix::Min,
		Direction::Reverse => Suffix::Max,
	}
}

/// The suffix which sorts after every entry of a key in iteration order
fn far_suffix(direction: Direction) -> Suffix {
	match direction {
		Direction::Forward => Suffix::Max,
		Direction::Reverse => Suffix::Min,
	}
}

/// The end of a key range scan.
///
/// Only the fields present in the end key are compared, so a shorter end
/// key leaves the remaining fields unconstrained. An empty end key never
/// ends the scan.
#[derive(Clone, Debug)]
pub(crate) struct End {
	pub(crate) key: Key,
	pub(crate) inclusive: bool,
}

impl End {
	fn unbounded() -> Self {
		Self {
			key: Key::empty(),
			inclusive: true,
		}
	}

	/// Check if a key lies beyond the end in iteration order
	pub(crate) fn passed(&self, key: &Key, ordering: Ordering, direction: Direction) -> bool {
		if self.key.is_empty() {
			return false;
		}
		let c = self.key.compare(&key.prefix(self.key.len()), ordering);
		match direction.apply(c) {
			cmp::Ordering::Less => true,
			cmp::Ordering::Equal => !self.inclusive,
			cmp::Ordering::Greater => false,
		}
	}
}

/// How the next bulk fetch positions the engine cursor
enum Seek {
	/// Exactly on an entry
	Exact(EntryKey),
	/// On the first entry at or beyond a key in iteration order
	Range(EntryKey),
	/// On the entries after the current position
	Next,
}

/// The state of one bulk fetch, updated once per delivered row
struct Fill<'a> {
	buffer: &'a mut RowBuffer,
	end: &'a End,
	bounds: Option<&'a IndexBounds>,
	ordering: Ordering,
	direction: Direction,
	clustering: bool,
	wanted: usize,
	/// Matches remaining before the single interval limit
	limit: Option<usize>,
	admitted: usize,
	scanned: usize,
	end_reached: bool,
}

impl Fill<'_> {
	fn row(&mut self, ek: &EntryKey, doc: Option<&Document>) -> Result<Getf> {
		if self.end.passed(ek.key(), self.ordering, self.direction) {
			self.end_reached = true;
			return Ok(Getf::Stop);
		}
		self.scanned += 1;
		// Leave keys outside the bounds to the bounds iterator
		if let Some(bounds) = self.bounds {
			if !bounds.matches(ek.key()) {
				return Ok(Getf::Stop);
			}
		}
		let pk = match ek.has_pk() {
			true => Some(ek.pk()),
			false => None,
		};
		let doc = match self.clustering {
			true => doc,
			false => None,
		};
		self.buffer.append(ek.key(), pk, doc)?;
		self.admitted += 1;
		if self.limit.is_some_and(|limit| self.admitted >= limit) {
			self.end_reached = true;
			return Ok(Getf::Stop);
		}
		match self.admitted < self.wanted && !self.buffer.is_gorged() {
			true => Ok(Getf::Continue),
			false => Ok(Getf::Stop),
		}
	}
}

/// What an [`IndexCursor`] iterates
pub(crate) enum Scan {
	Range {
		start: Key,
		end: Key,
		end_inclusive: bool,
	},
	Bounds {
		bounds: IndexBounds,
		single_interval_limit: usize,
	},
}

/// A cursor over one index of a collection.
///
/// The cursor walks either a key range or a set of [`IndexBounds`], in
/// either direction. Rows are bulk fetched from the engine into a
/// [`RowBuffer`] and handed out one at a time by [`IndexCursor::advance`].
/// When the buffer runs dry the cursor fetches more rows, or repositions
/// the engine cursor past keys which lie outside the bounds.
///
/// A cursor which has been created is positioned on its first row, if
/// there is one, and [`IndexCursor::ok`] reports whether it is.
pub struct IndexCursor {
	ctx: Context,
	coll: Option<Collection>,
	index: Option<IndexDefinition>,
	ordering: Ordering,
	cursor: Option<Cursor>,
	start: Key,
	end: End,
	direction: Direction,
	iter: Option<BoundsIterator>,
	single_interval_limit: usize,
	/// Rows admitted so far
	matched: usize,
	buffer: RowBuffer,
	fetch_iteration: usize,
	/// The scan moved past the end of its range
	end_reached: bool,
	/// The engine cursor has no rows left in this direction
	exhausted: bool,
	curr: Option<Row>,
	/// The key of the last row handed out, where a tailable scan resumes
	last: Option<Key>,
	nscanned: usize,
	tailable: bool,
	prelocked: bool,
}

impl IndexCursor {
	/// Create a cursor over the keys between `start` and `end`.
	///
	/// A `None` collection stands for a collection which does not exist,
	/// and gives a cursor with no rows.
	#[instrument(level = "trace", target = "fractaldb::core::idx::cursor", skip_all)]
	pub fn with_range(
		ctx: &Context,
		coll: Option<&Collection>,
		idx_no: usize,
		start: Key,
		end: Key,
		end_inclusive: bool,
		direction: Direction,
	) -> Result<IndexCursor> {
		let scan = Scan::Range {
			start,
			end,
			end_inclusive,
		};
		Self::open(ctx, coll, idx_no, scan, direction, false)
	}

	/// Create a cursor over the keys inside a set of bounds.
	///
	/// When the bounds hold a single interval for every field, and
	/// `single_interval_limit` is not zero, the cursor stops after that
	/// many rows.
	#[instrument(level = "trace", target = "fractaldb::core::idx::cursor", skip_all)]
	pub fn with_bounds(
		ctx: &Context,
		coll: Option<&Collection>,
		idx_no: usize,
		bounds: IndexBounds,
		single_interval_limit: usize,
		direction: Direction,
	) -> Result<IndexCursor> {
		let scan = Scan::Bounds {
			bounds,
			single_interval_limit,
		};
		Self::open(ctx, coll, idx_no, scan, direction, false)
	}

	pub(crate) fn open(
		ctx: &Context,
		coll: Option<&Collection>,
		idx_no: usize,
		scan: Scan,
		direction: Direction,
		force_prelock: bool,
	) -> Result<IndexCursor> {
		// Collections which do not exist have no rows
		let (index, ordering, cursor) = match coll {
			Some(c) => {
				let index = c.index(idx_no)?.clone();
				let ordering = index.ordering()?;
				let cursor = Cursor::new(ctx.tx(), c.dictionary(idx_no)?)?;
				(Some(index), ordering, Some(cursor))
			}
			None => (None, Ordering::default(), None),
		};
		let (start, end, iter, limit, point) = match scan {
			Scan::Range {
				start,
				end,
				end_inclusive,
			} => {
				let point = end_inclusive && !start.is_empty() && start == end;
				let end = End {
					key: end,
					inclusive: end_inclusive,
				};
				(pad(start, ordering, direction, false), end, None, 0, point)
			}
			Scan::Bounds {
				bounds,
				single_interval_limit,
			} => {
				let point = bounds.is_point();
				let start = bounds.start_key(direction);
				let iter = BoundsIterator::new(bounds, direction);
				(start, End::unbounded(), Some(iter), single_interval_limit, point)
			}
		};
		let mut this = IndexCursor {
			ctx: ctx.clone(),
			coll: coll.cloned(),
			index,
			ordering,
			cursor,
			start,
			end,
			direction,
			iter,
			single_interval_limit: limit,
			matched: 0,
			buffer: match ctx.settings().buffer_size {
				0 => RowBuffer::new(),
				n => RowBuffer::with_sizes(n, *ROW_BUFFER_GORGED_THRESHOLD),
			},
			fetch_iteration: 0,
			end_reached: false,
			exhausted: false,
			curr: None,
			last: None,
			nscanned: 0,
			tailable: false,
			prelocked: false,
		};
		if this.cursor.is_some() && (force_prelock || should_prelock(ctx, point)) {
			this.prelock()?;
		}
		debug!(
			target: TARGET,
			"{}: created with bounds {}, prelocked: {}",
			this.describe(),
			this.pretty_bounds(),
			this.prelocked
		);
		this.initialize(point)?;
		Ok(this)
	}

	fn prelock(&mut self) -> Result<()> {
		let lock = self.ctx.lock_mode();
		let Some(cursor) = self.cursor.as_mut() else {
			return Ok(());
		};
		match &self.iter {
			Some(iter) => prelock_bounds(cursor, iter.bounds(), self.direction, lock)?,
			None => {
				// Lock every key which shares a prefix with the end key
				let end = match self.end.key.is_empty() {
					true => Key::empty(),
					false => pad(self.end.key.clone(), self.ordering, self.direction, true),
				};
				prelock_range(cursor, self.ordering, self.direction, &self.start, &end, lock)?
			}
		}
		self.prelocked = true;
		Ok(())
	}

	fn is_primary(&self) -> bool {
		self.index.as_ref().is_some_and(|i| i.is_primary())
	}

	fn entry(&self, key: Key, suffix: Suffix) -> Result<EntryKey> {
		match &self.cursor {
			Some(cursor) => Ok(cursor.dictionary().entry(key, suffix)),
			None => fail!("Built a search key for a cursor without a dictionary"),
		}
	}

	/// Position the engine cursor on the first row
	fn initialize(&mut self, point: bool) -> Result<()> {
		if self.cursor.is_none() {
			return Ok(());
		}
		// Primary key lookups go straight to the key
		let exact = point && self.iter.is_none() && self.is_primary();
		let seek = match exact {
			true => Seek::Exact(self.entry(self.start.clone(), Suffix::None)?),
			false => Seek::Range(self.entry(self.start.clone(), near_suffix(self.direction))?),
		};
		self.fetch(seek)?;
		self.settle()?;
		Ok(())
	}

	/// Run one bulk fetch into the emptied buffer
	fn fetch(&mut self, seek: Seek) -> Result<Fetch> {
		let Some(cursor) = self.cursor.as_mut() else {
			return Ok(Fetch::NotFound);
		};
		self.buffer.empty();
		let wanted = rows_to_fetch(self.fetch_iteration);
		self.fetch_iteration += 1;
		let limit = match &self.iter {
			Some(iter) if self.single_interval_limit > 0 && iter.bounds().is_single_interval() => {
				Some(self.single_interval_limit.saturating_sub(self.matched))
			}
			_ => None,
		};
		let mut fill = Fill {
			buffer: &mut self.buffer,
			end: &self.end,
			bounds: self.iter.as_ref().map(|i| i.bounds()),
			ordering: self.ordering,
			direction: self.direction,
			clustering: self.index.as_ref().is_some_and(|i| i.clustering),
			wanted,
			limit,
			admitted: 0,
			scanned: 0,
			end_reached: false,
		};
		let res = match (seek, self.direction) {
			(Seek::Exact(key), _) => cursor.getf_set(&key, |k, v| fill.row(k, v))?,
			(Seek::Range(key), Direction::Forward) => {
				cursor.getf_set_range(&key, |k, v| fill.row(k, v))?
			}
			(Seek::Range(key), Direction::Reverse) => {
				cursor.getf_set_range_reverse(&key, |k, v| fill.row(k, v))?
			}
			(Seek::Next, Direction::Forward) => cursor.getf_next(|k, v| fill.row(k, v))?,
			(Seek::Next, Direction::Reverse) => cursor.getf_prev(|k, v| fill.row(k, v))?,
		};
		let (admitted, scanned, end_reached) = (fill.admitted, fill.scanned, fill.end_reached);
		trace!(
			target: TARGET,
			"Bulk fetch {} wanted {wanted} rows, admitted {admitted} of {scanned} scanned",
			self.fetch_iteration - 1
		);
		self.matched += admitted;
		self.nscanned += scanned;
		self.end_reached |= end_reached;
		if res == Fetch::NotFound {
			self.exhausted = true;
		}
		Ok(res)
	}

	/// Hand out the first buffered row, or fetch until there is one
	fn settle(&mut self) -> Result<bool> {
		match self.buffer.ok() {
			true => {
				self.load()?;
				Ok(true)
			}
			false => self.refill(),
		}
	}

	fn load(&mut self) -> Result<()> {
		let row = self.buffer.current()?;
		self.last = Some(row.key.clone());
		self.curr = Some(row);
		Ok(())
	}

	/// Fetch rows until one is admitted, or the scan is over
	fn refill(&mut self) -> Result<bool> {
		loop {
			if self.end_reached || self.exhausted {
				self.curr = None;
				return Ok(false);
			}
			let position = match &self.cursor {
				Some(cursor) => cursor.position().map(|p| p.key().clone()),
				None => None,
			};
			let decision = match (self.iter.as_mut(), &position) {
				(Some(iter), Some(pos)) => Some(iter.advance(pos)),
				_ => None,
			};
			match (decision, position) {
				(Some(BoundsAdvance::Exhausted), _) => {
					trace!(target: TARGET, "{}: bounds are exhausted", self.describe());
					self.end_reached = true;
				}
				(Some(BoundsAdvance::Skip(n)), Some(pos)) => self.skip(&pos, n)?,
				_ => {
					self.fetch(Seek::Next)?;
				}
			}
			if self.buffer.ok() {
				self.load()?;
				return Ok(true);
			}
		}
	}

	/// Move the engine cursor past the keys which lie outside the bounds,
	/// keeping the first `n` fields of the current key
	fn skip(&mut self, pos: &Key, n: usize) -> Result<()> {
		let Some(iter) = &self.iter else {
			fail!("Skipped keys without any bounds");
		};
		if iter.after() {
			return self.skip_prefix(pos, n);
		}
		let cmp = iter.cmp().to_vec();
		let inc = iter.inc().to_vec();
		let mut target = pos.prefix(n);
		for v in cmp.iter().skip(n) {
			target.push(v.clone());
		}
		trace!(target: TARGET, "Skipping to {target} after keeping {n} fields");
		self.fetch(Seek::Range(self.entry(target, near_suffix(self.direction))?))?;
		// Landing on an exclusive edge needs more prefix skips. Every skip
		// moves strictly forward, so this is bounded by the field count.
		let cap = self.ordering.fields() * self.ordering.fields() + 1;
		let mut skips = 0;
		while !self.buffer.ok() && !self.end_reached && !self.exhausted {
			let Some(landed) = self.cursor.as_ref().and_then(|c| c.position()).map(|p| p.key().clone())
			else {
				break;
			};
			let edge = (n..landed.len().min(cmp.len())).find(|&j| !inc[j] && landed[j] == cmp[j]);
			let Some(j) = edge else {
				break;
			};
			skips += 1;
			ensure!(skips <= cap, Error::BoundsSkipDiverged(skips));
			self.skip_prefix(&landed, j + 1)?;
		}
		Ok(())
	}

	/// Move the engine cursor past every key sharing the first `n` fields
	fn skip_prefix(&mut self, pos: &Key, n: usize) -> Result<()> {
		let mut target = pos.prefix(n);
		for i in n..self.ordering.fields() {
			target.push(extreme(self.ordering, self.direction, i, true));
		}
		trace!(target: TARGET, "Skipping past the prefix of {n} fields of {pos}");
		self.fetch(Seek::Range(self.entry(target, far_suffix(self.direction))?))?;
		Ok(())
	}

	/// Resume a tailable scan which has run out of safe rows
	fn advance_tailable(&mut self) -> Result<bool> {
		let Some(coll) = &self.coll else {
			return Ok(false);
		};
		let old = mem::replace(&mut self.end.key, coll.min_unsafe_key());
		debug!(target: TARGET, "{}: refreshed tailable end from {old} to {}", self.describe(), self.end.key);
		self.end_reached = false;
		self.exhausted = false;
		// Continue from the engine cursor if it stopped on the last row
		// handed out, otherwise seek past that row again
		let position = self.cursor.as_ref().and_then(|c| c.position()).map(|p| p.key().clone());
		let seek = match (&self.last, position) {
			(Some(last), Some(pos))
				if pos == *last && last.compare(&old, self.ordering) == cmp::Ordering::Less =>
			{
				Seek::Next
			}
			(Some(last), _) => Seek::Range(self.entry(last.clone(), far_suffix(self.direction))?),
			(None, _) => Seek::Range(self.entry(self.start.clone(), near_suffix(self.direction))?),
		};
		self.fetch(seek)?;
		self.settle()
	}

	/// Check if the cursor is positioned on a row
	pub fn ok(&self) -> bool {
		self.curr.is_some()
	}

	/// Move to the next row, returning whether there is one
	pub fn advance(&mut self) -> Result<bool> {
		// Check if the operation was killed
		self.ctx.check_interrupt()?;
		if self.cursor.is_none() {
			if self.tailable {
				warn!(
					target: TARGET,
					"A tailable cursor created over a missing collection can never read new rows"
				);
			}
			return Ok(false);
		}
		if self.curr.is_none() {
			return match self.tailable {
				true => self.advance_tailable(),
				false => Ok(false),
			};
		}
		// Consume a buffered row without any I/O
		if self.buffer.next()? {
			self.load()?;
			return Ok(true);
		}
		self.refill()
	}

	/// The document of the current row.
	///
	/// A non-clustering index looks the document up by primary key. If a
	/// concurrent commit removed it, the cursor moves on once and tries
	/// again, and a second miss is an error.
	pub fn current(&mut self) -> Result<Document> {
		if let Some(doc) = self.lookup()? {
			return Ok(doc);
		}
		let pk = self.curr_pk().map(|k| k.to_string()).unwrap_or_default();
		debug!(target: TARGET, "{}: no document for primary key {pk}, moving on", self.describe());
		if self.advance()? {
			if let Some(doc) = self.lookup()? {
				return Ok(doc);
			}
		}
		let name = self.coll.as_ref().map(|c| c.name().to_owned()).unwrap_or_default();
		bail!(Error::MissingDocument(pk, name))
	}

	fn lookup(&mut self) -> Result<Option<Document>> {
		let Some(row) = self.curr.as_mut() else {
			fail!("Read the current document of an exhausted cursor");
		};
		if let Some(doc) = &row.doc {
			return Ok(Some(doc.clone()));
		}
		let Some(coll) = &self.coll else {
			fail!("Read a document through a cursor without a collection");
		};
		let pk = row.pk.as_ref().unwrap_or(&row.key);
		let doc = coll.find_by_pk(self.ctx.tx(), pk)?;
		row.doc.clone_from(&doc);
		Ok(doc)
	}

	/// The index key of the current row
	pub fn curr_key(&self) -> Option<&Key> {
		self.curr.as_ref().map(|r| &r.key)
	}

	/// The primary key of the current row
	pub fn curr_pk(&self) -> Option<&Key> {
		self.curr.as_ref().map(|r| r.pk.as_ref().unwrap_or(&r.key))
	}

	/// Turn this cursor into a tailable cursor.
	///
	/// From now on the cursor never returns a row at or above the minimum
	/// unsafe key of its capped collection, and once it runs out of rows a
	/// later [`IndexCursor::advance`] picks up rows committed since.
	#[instrument(level = "trace", target = "fractaldb::core::idx::cursor", skip_all)]
	pub fn set_tailable(&mut self) -> Result<()> {
		let Some(coll) = self.coll.clone() else {
			self.tailable = true;
			return Ok(());
		};
		let name = self.index.as_ref().map(|i| i.name.clone()).unwrap_or_default();
		ensure!(self.is_primary(), Error::TailableSecondaryIndex(name));
		ensure!(coll.is_capped(), Error::TailableNotCapped(coll.name().to_owned()));
		ensure!(self.direction.is_forward(), Error::InvalidDirection(self.direction.as_i32()));
		let end = match &self.iter {
			Some(iter) => iter.bounds().end_key(self.direction),
			None => self.end.key.clone(),
		};
		ensure!(end.is_empty() || end.is_max_key(), Error::TailableBoundedEnd);
		self.tailable = true;
		self.iter = None;
		self.end = End {
			key: coll.min_unsafe_key(),
			inclusive: false,
		};
		debug!(target: TARGET, "{}: tailable up to {}", self.describe(), self.end.key);
		// Re-read from the current row under the new end
		let from = self.curr.as_ref().map(|r| r.key.clone()).unwrap_or_else(|| self.start.clone());
		self.end_reached = false;
		self.exhausted = false;
		self.curr = None;
		self.fetch(Seek::Range(self.entry(from, near_suffix(self.direction))?))?;
		self.settle()?;
		Ok(())
	}

	pub fn is_tailable(&self) -> bool {
		self.tailable
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	pub fn index(&self) -> Option<&IndexDefinition> {
		self.index.as_ref()
	}

	/// The number of keys examined so far
	pub fn nscanned(&self) -> usize {
		self.nscanned
	}

	/// The number of bulk fetches issued so far
	pub fn nfetches(&self) -> usize {
		self.fetch_iteration
	}

	/// Whether the range was declared to the engine before iterating
	pub fn prelocked(&self) -> bool {
		self.prelocked
	}

	/// Describe the range this cursor iterates
	pub fn pretty_bounds(&self) -> Document {
		match &self.iter {
			Some(iter) => iter.bounds().to_document(),
			None => doc! {
				"start" => Value::from(self.start.values().to_vec()),
				"end" => Value::from(self.end.key.values().to_vec()),
			},
		}
	}

	/// A short description, such as `IndexCursor a_1 reverse multi`
	pub fn describe(&self) -> String {
		let mut s = match &self.index {
			Some(i) => format!("IndexCursor {}", i.name),
			None => "IndexCursor (null)".to_owned(),
		};
		if !self.direction.is_forward() {
			s.push_str(" reverse");
		}
		if self.iter.as_ref().is_some_and(|i| i.bounds().combinations() > 1) {
			s.push_str(" multi");
		}
		s
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::catalog::IndexDefinition;
	use crate::kvs::{Datastore, Isolation};

	#[rstest]
	#[case(0, 1)]
	#[case(1, 1)]
	#[case(2, 2)]
	#[case(3, 4)]
	#[case(8, 128)]
	#[case(14, 4096)]
	#[case(100, 4096)]
	fn fetch_sizes_grow_geometrically(#[case] iteration: usize, #[case] rows: usize) {
		assert_eq!(rows_to_fetch(iteration), rows.min(*BULK_FETCH_MAX_ROWS));
	}

	#[test]
	fn end_keys_compare_their_prefix() {
		let ord = Ordering::ascending(2);
		let end = End {
			key: key![5],
			inclusive: true,
		};
		assert!(!end.passed(&key![5, 100], ord, Direction::Forward));
		assert!(end.passed(&key![6, 0], ord, Direction::Forward));
		assert!(!end.passed(&key![4, 0], ord, Direction::Forward));
		assert!(end.passed(&key![4, 0], ord, Direction::Reverse));
		let end = End {
			key: key![5],
			inclusive: false,
		};
		assert!(end.passed(&key![5, 100], ord, Direction::Forward));
		assert!(!End::unbounded().passed(&key![1], ord, Direction::Forward));
	}

	#[test]
	fn keys_are_padded_in_iteration_order() {
		let ord = Ordering::from_directions(&[1, -1]).unwrap();
		assert_eq!(pad(key![1], ord, Direction::Forward, false), key![1, Value::MaxKey]);
		assert_eq!(pad(key![1], ord, Direction::Forward, true), key![1, Value::MinKey]);
		assert_eq!(pad(Key::empty(), ord, Direction::Reverse, false), key![Value::MaxKey, Value::MinKey]);
	}

	fn setup() -> (Datastore, Collection) {
		let ds = Datastore::new();
		let idx = IndexDefinition::new("a_1", &[("a", 1)]);
		let coll = Collection::create(&ds, "t", vec![idx]).unwrap();
		let tx = ds.begin(Isolation::Snapshot, false).unwrap();
		for (id, a) in [(1, 5), (2, 3), (3, 9), (4, 1), (5, 7)] {
			coll.insert(&tx, doc! { "_id" => id, "a" => a }).unwrap();
		}
		tx.commit().unwrap();
		(ds, coll)
	}

	#[test]
	fn point_lookups_on_the_primary_key() {
		let (ds, coll) = setup();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		let mut c = IndexCursor::with_range(&ctx, Some(&coll), 0, key![3], key![3], true, Direction::Forward)
			.unwrap();
		assert!(c.ok());
		assert!(!c.prelocked());
		assert_eq!(c.current().unwrap().get("a"), Some(&Value::from(9)));
		assert!(!c.advance().unwrap());
		let c = IndexCursor::with_range(&ctx, Some(&coll), 0, key![6], key![6], true, Direction::Forward)
			.unwrap();
		assert!(!c.ok());
		drop(c);
		tx.cancel().unwrap();
	}

	#[test]
	fn secondary_rows_carry_their_primary_key() {
		let (ds, coll) = setup();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		let mut c =
			IndexCursor::with_range(&ctx, Some(&coll), 1, key![3], key![7], false, Direction::Forward)
				.unwrap();
		let mut seen = Vec::new();
		while c.ok() {
			seen.push((c.curr_key().cloned().unwrap(), c.curr_pk().cloned().unwrap()));
			assert_eq!(c.current().unwrap().get("a"), Some(&c.curr_key().unwrap()[0]));
			c.advance().unwrap();
		}
		assert_eq!(seen, vec![(key![3], key![2]), (key![5], key![1])]);
		assert_eq!(c.describe(), "IndexCursor a_1");
		assert_eq!(c.pretty_bounds().get("start"), Some(&Value::from(vec![Value::from(3)])));
		drop(c);
		tx.cancel().unwrap();
	}

	#[test]
	fn missing_collections_have_no_rows() {
		let ds = Datastore::new();
		let tx = ds.begin(Isolation::Snapshot, true).unwrap();
		let ctx = Context::new(tx.clone());
		let mut c =
			IndexCursor::with_range(&ctx, None, 0, Key::empty(), Key::empty(), true, Direction::Reverse)
				.unwrap();
		assert!(!c.ok());
		c.set_tailable().unwrap();
		assert!(!c.advance().unwrap());
		assert_eq!(c.describe(), "IndexCursor (null) reverse");
		drop(c);
		tx.cancel().unwrap();
	}
}
