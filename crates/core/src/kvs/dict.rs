use std::cmp;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use anyhow::{Result, bail};
use parking_lot::RwLock;

use super::api::{Fetch, Getf, Isolation, Timestamp, TxnId};
use super::Val;
use crate::err::Error;
use crate::key::{Direction, Key, Ordering};
use crate::val::Document;

/// The trailing component of a stored entry.
///
/// Primary key index entries carry no suffix, while secondary index
/// entries append the primary key of the document they point at. The
/// `Min` and `Max` suffixes never appear in stored entries, and are used
/// to build search keys which sort before or after every entry sharing
/// the same index key.
#[derive(Clone, Debug)]
pub enum Suffix {
	Min,
	None,
	Pk(Key),
	Max,
}

impl Suffix {
	fn rank(&self) -> u8 {
		match self {
			Suffix::Min => 0,
			Suffix::None => 1,
			Suffix::Pk(_) => 2,
			Suffix::Max => 3,
		}
	}
}

impl PartialEq for Suffix {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == cmp::Ordering::Equal
	}
}

impl Eq for Suffix {}

impl PartialOrd for Suffix {
	fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Suffix {
	fn cmp(&self, other: &Self) -> cmp::Ordering {
		match (self, other) {
			(Suffix::Pk(a), Suffix::Pk(b)) => a.compare(b, Ordering::default()),
			_ => self.rank().cmp(&other.rank()),
		}
	}
}

/// A key as stored in a dictionary, ordered under the dictionary's ordering
#[derive(Clone, Debug)]
pub struct EntryKey {
	key: Key,
	suffix: Suffix,
	ordering: Ordering,
}

impl EntryKey {
	/// The index key, without any primary key suffix
	pub fn key(&self) -> &Key {
		&self.key
	}

	pub fn suffix(&self) -> &Suffix {
		&self.suffix
	}

	/// The primary key which this entry refers to
	pub fn pk(&self) -> &Key {
		match &self.suffix {
			Suffix::Pk(pk) => pk,
			_ => &self.key,
		}
	}

	/// Check if this entry carries a primary key suffix
	pub fn has_pk(&self) -> bool {
		matches!(self.suffix, Suffix::Pk(_))
	}
}

impl PartialEq for EntryKey {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == cmp::Ordering::Equal
	}
}

impl Eq for EntryKey {}

impl PartialOrd for EntryKey {
	fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for EntryKey {
	fn cmp(&self, other: &Self) -> cmp::Ordering {
		self.key.compare(&other.key, self.ordering).then_with(|| self.suffix.cmp(&other.suffix))
	}
}

impl Display for EntryKey {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match &self.suffix {
			Suffix::Min => write!(f, "{} <min>", self.key),
			Suffix::None => write!(f, "{}", self.key),
			Suffix::Pk(pk) => write!(f, "{} -> {}", self.key, pk),
			Suffix::Max => write!(f, "{} <max>", self.key),
		}
	}
}

#[derive(Clone, Debug)]
pub(crate) enum Cell {
	Put(Val),
	Del,
}

#[derive(Clone, Debug)]
struct Version {
	/// The transaction which owns this version
	txn: TxnId,
	/// Set once the owning root transaction commits
	commit: Option<Timestamp>,
	cell: Cell,
}

/// What a transaction is allowed to see
#[derive(Clone, Debug)]
pub(crate) struct View {
	/// The transaction and all of its ancestors
	pub(crate) chain: Vec<TxnId>,
	pub(crate) isolation: Isolation,
	pub(crate) snapshot: Timestamp,
}

impl View {
	fn sees(&self, v: &Version) -> bool {
		match v.commit {
			None => self.chain.contains(&v.txn) || self.isolation == Isolation::ReadUncommitted,
			Some(ts) => match self.isolation {
				Isolation::Snapshot => ts <= self.snapshot,
				_ => true,
			},
		}
	}

	/// The newest version of a key which is visible to this view
	fn resolve<'a>(&self, chain: &'a [Version]) -> Option<&'a Val> {
		match chain.iter().rev().find(|v| self.sees(v)) {
			Some(Version {
				cell: Cell::Put(val),
				..
			}) => Some(val),
			_ => None,
		}
	}
}

/// A single ordered, multi-versioned key-value tree
#[derive(Debug)]
pub struct Dictionary {
	name: String,
	ordering: Ordering,
	created: Timestamp,
	open: AtomicBool,
	cursors: AtomicUsize,
	rows: RwLock<BTreeMap<EntryKey, Vec<Version>>>,
}

impl Dictionary {
	pub(crate) fn new(name: String, ordering: Ordering, created: Timestamp) -> Self {
		Self {
			name,
			ordering,
			created,
			open: AtomicBool::new(true),
			cursors: AtomicUsize::new(0),
			rows: RwLock::new(BTreeMap::new()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn ordering(&self) -> Ordering {
		self.ordering
	}

	/// The commit timestamp at which this dictionary was created
	pub fn created(&self) -> Timestamp {
		self.created
	}

	pub fn is_open(&self) -> bool {
		self.open.load(AtomicOrdering::Acquire)
	}

	/// The number of engine cursors currently open on this dictionary
	pub fn cursors(&self) -> usize {
		self.cursors.load(AtomicOrdering::Acquire)
	}

	/// Build a key for this dictionary
	pub fn entry(&self, key: Key, suffix: Suffix) -> EntryKey {
		EntryKey {
			key,
			suffix,
			ordering: self.ordering,
		}
	}

	pub(crate) fn close(&self) {
		self.open.store(false, AtomicOrdering::Release);
	}

	pub(crate) fn cursor_opened(&self) {
		self.cursors.fetch_add(1, AtomicOrdering::AcqRel);
	}

	pub(crate) fn cursor_closed(&self) -> bool {
		self.cursors
			.fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |n| n.checked_sub(1))
			.is_ok()
	}

	/// Fetch the visible value of a single entry
	pub(crate) fn get(&self, view: &View, key: &EntryKey) -> Option<Val> {
		let rows = self.rows.read();
		rows.get(key).and_then(|chain| view.resolve(chain)).cloned()
	}

	/// Walk visible entries from a bound in the given direction, passing
	/// each one to the callback until it asks to stop. Returns whether any
	/// entry was found, along with the last entry passed to the callback.
	pub(crate) fn scan<F>(
		&self,
		view: &View,
		from: Bound<&EntryKey>,
		direction: Direction,
		mut f: F,
	) -> Result<(Fetch, Option<EntryKey>)>
	where
		F: FnMut(&EntryKey, Option<&Document>) -> Result<Getf>,
	{
		let rows = self.rows.read();
		let iter: Box<dyn Iterator<Item = (&EntryKey, &Vec<Version>)>> = match direction {
			Direction::Forward => Box::new(rows.range::<EntryKey, _>((from, Bound::Unbounded))),
			Direction::Reverse => {
				Box::new(rows.range::<EntryKey, _>((Bound::Unbounded, from)).rev())
			}
		};
		let mut last = None;
		for (k, chain) in iter {
			// Skip entries which are invisible or deleted
			let Some(val) = view.resolve(chain) else {
				continue;
			};
			last = Some(k.clone());
			if f(k, val.as_ref())? == Getf::Stop {
				break;
			}
		}
		match last {
			Some(_) => Ok((Fetch::Found, last)),
			None => Ok((Fetch::NotFound, None)),
		}
	}

	/// Write a new uncommitted version of an entry
	pub(crate) fn write(&self, view: &View, txn: TxnId, key: EntryKey, cell: Cell) -> Result<()> {
		let mut rows = self.rows.write();
		if let Some(chain) = rows.get_mut(&key) {
			match chain.last() {
				// Overwrite our own earlier write
				Some(v) if v.commit.is_none() && v.txn == txn => {
					chain.pop();
				}
				// Layer on top of an ancestor's write
				Some(v) if v.commit.is_none() && view.chain.contains(&v.txn) => (),
				Some(v) if v.commit.is_none() => bail!(Error::TxWriteConflict),
				Some(Version {
					commit: Some(ts),
					..
				}) if view.isolation == Isolation::Snapshot && *ts > view.snapshot => {
					bail!(Error::TxWriteConflict)
				}
				_ => (),
			}
			chain.push(Version {
				txn,
				commit: None,
				cell,
			});
			return Ok(());
		}
		rows.insert(
			key,
			vec![Version {
				txn,
				commit: None,
				cell,
			}],
		);
		Ok(())
	}

	/// Mark the uncommitted version written by a transaction as committed
	pub(crate) fn stamp(&self, key: &EntryKey, txn: TxnId, ts: Timestamp) {
		let mut rows = self.rows.write();
		if let Some(chain) = rows.get_mut(key) {
			for v in chain.iter_mut().filter(|v| v.txn == txn && v.commit.is_none()) {
				v.commit = Some(ts);
			}
		}
	}

	/// Hand the uncommitted version of a child transaction to its parent
	pub(crate) fn retag(&self, key: &EntryKey, from: TxnId, to: TxnId) {
		let mut rows = self.rows.write();
		if let Some(chain) = rows.get_mut(key) {
			if !chain.iter().any(|v| v.txn == from && v.commit.is_none()) {
				return;
			}
			chain.retain(|v| !(v.txn == to && v.commit.is_none()));
			for v in chain.iter_mut().filter(|v| v.txn == from && v.commit.is_none()) {
				v.txn = to;
			}
		}
	}

	/// Remove the uncommitted version written by a transaction
	pub(crate) fn rollback(&self, key: &EntryKey, txn: TxnId) {
		let mut rows = self.rows.write();
		if let Some(chain) = rows.get_mut(key) {
			chain.retain(|v| !(v.txn == txn && v.commit.is_none()));
			if chain.is_empty() {
				rows.remove(key);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::val::Value;

	fn view(chain: Vec<TxnId>, isolation: Isolation, snapshot: Timestamp) -> View {
		View {
			chain,
			isolation,
			snapshot,
		}
	}

	#[test]
	fn suffixes_bracket_primary_keys() {
		let d = Dictionary::new("test".into(), Ordering::ascending(1), 0);
		let lo = d.entry(key![5], Suffix::Min);
		let mid = d.entry(key![5], Suffix::Pk(key![1]));
		let hi = d.entry(key![5], Suffix::Max);
		assert!(lo < mid && mid < hi);
		assert!(hi < d.entry(key![6], Suffix::Min));
	}

	#[test]
	fn descending_dictionary_order() {
		let ord = Ordering::from_directions(&[-1]).unwrap();
		let d = Dictionary::new("test".into(), ord, 0);
		assert!(d.entry(key![9], Suffix::None) < d.entry(key![1], Suffix::None));
	}

	#[test]
	fn visibility_rules() {
		let d = Dictionary::new("test".into(), Ordering::ascending(1), 0);
		let k = d.entry(key![1], Suffix::None);
		let writer = view(vec![1], Isolation::Snapshot, 0);
		d.write(&writer, 1, k.clone(), Cell::Put(Some(Document::default().with("a", 1)))).unwrap();
		// Only the writer and dirty readers see it
		assert!(d.get(&writer, &k).is_some());
		assert!(d.get(&view(vec![2], Isolation::Snapshot, 0), &k).is_none());
		assert!(d.get(&view(vec![2], Isolation::ReadUncommitted, 0), &k).is_some());
		d.stamp(&k, 1, 5);
		// Older snapshots still do not see it
		assert!(d.get(&view(vec![3], Isolation::Snapshot, 4), &k).is_none());
		assert!(d.get(&view(vec![3], Isolation::Snapshot, 5), &k).is_some());
		assert!(d.get(&view(vec![3], Isolation::Serializable, 0), &k).is_some());
	}

	#[test]
	fn concurrent_uncommitted_writes_conflict() {
		let d = Dictionary::new("test".into(), Ordering::ascending(1), 0);
		let k = d.entry(key![1], Suffix::None);
		d.write(&view(vec![1], Isolation::Snapshot, 0), 1, k.clone(), Cell::Put(None)).unwrap();
		let res = d.write(&view(vec![2], Isolation::Snapshot, 0), 2, k, Cell::Del);
		assert!(matches!(res.unwrap_err().downcast_ref::<Error>(), Some(Error::TxWriteConflict)));
	}

	#[test]
	fn scan_reverse_stops_on_request() {
		let d = Dictionary::new("test".into(), Ordering::ascending(1), 0);
		let v = view(vec![1], Isolation::Snapshot, 0);
		for i in 1..=5 {
			d.write(&v, 1, d.entry(key![i], Suffix::None), Cell::Put(None)).unwrap();
		}
		let from = d.entry(key![4], Suffix::Max);
		let mut seen = Vec::new();
		let (res, last) = d
			.scan(&v, Bound::Included(&from), Direction::Reverse, |k, _| {
				seen.push(k.key()[0].clone());
				Ok(match seen.len() < 2 {
					true => Getf::Continue,
					false => Getf::Stop,
				})
			})
			.unwrap();
		assert_eq!(res, Fetch::Found);
		assert_eq!(seen, vec![Value::Int(4), Value::Int(3)]);
		assert_eq!(last.unwrap().key(), &key![3]);
	}
}
