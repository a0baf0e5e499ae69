use anyhow::Result;

use crate::cnf::{ROW_BUFFER_GORGED_THRESHOLD, ROW_BUFFER_PREFERRED_SIZE};
use crate::err::Error;
use crate::key::Key;
use crate::val::Document;

/// The entry carries a primary key
const HAS_PK: u8 = 1;
/// The entry carries a document
const HAS_DOC: u8 = 2;

/// A row decoded from a [`RowBuffer`]
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
	pub key: Key,
	pub pk: Option<Key>,
	pub doc: Option<Document>,
}

/// A flat staging buffer for the rows of one bulk fetch.
///
/// Each entry is a header byte of flags, followed by the encoded key, then
/// the encoded primary key and document when the header says they are
/// present. Every encoded part is prefixed with its length as a
/// little-endian `u32`.
///
/// A buffer is filled with [`RowBuffer::append`], drained with
/// [`RowBuffer::current`] and [`RowBuffer::next`], and must be reset with
/// [`RowBuffer::empty`] before it is filled again.
#[derive(Debug)]
pub struct RowBuffer {
	buf: Vec<u8>,
	/// The offset of the entry being read
	current: usize,
	/// The capacity the buffer is allocated with
	preferred: usize,
	/// Slack below which the buffer counts as full
	threshold: usize,
}

impl Default for RowBuffer {
	fn default() -> Self {
		Self::new()
	}
}

impl RowBuffer {
	/// Create a buffer sized from the environment configuration
	pub fn new() -> Self {
		Self::with_sizes(*ROW_BUFFER_PREFERRED_SIZE, *ROW_BUFFER_GORGED_THRESHOLD)
	}

	pub fn with_sizes(preferred: usize, threshold: usize) -> Self {
		Self {
			buf: Vec::with_capacity(preferred),
			current: 0,
			preferred,
			threshold,
		}
	}

	/// Append a row to the end of the buffer, growing it if needed
	pub fn append(&mut self, key: &Key, pk: Option<&Key>, doc: Option<&Document>) -> Result<()> {
		let mut flags = 0;
		if pk.is_some() {
			flags |= HAS_PK;
		}
		if doc.is_some() {
			flags |= HAS_DOC;
		}
		self.buf.push(flags);
		self.put(key)?;
		if let Some(pk) = pk {
			self.put(pk)?;
		}
		if let Some(doc) = doc {
			self.put(doc)?;
		}
		Ok(())
	}

	fn put<T: serde::Serialize>(&mut self, v: &T) -> Result<()> {
		let bytes = bincode::serialize(v).map_err(Error::Bincode)?;
		let len = u32::try_from(bytes.len())
			.map_err(|_| Error::Ds(format!("A row part of {} bytes is too large", bytes.len())))?;
		self.buf.extend_from_slice(&len.to_le_bytes());
		self.buf.extend_from_slice(&bytes);
		Ok(())
	}

	/// Check if the buffer is nearly full, or has outgrown its preferred size
	pub fn is_gorged(&self) -> bool {
		self.buf.len() + self.threshold > self.buf.capacity() || self.buf.capacity() > self.preferred
	}

	/// Check if there is an entry at the read position
	pub fn ok(&self) -> bool {
		self.current < self.buf.len()
	}

	/// Move past the current entry, returning whether another one follows
	pub fn next(&mut self) -> Result<bool> {
		if !self.ok() {
			return Ok(false);
		}
		self.current += self.entry_len(self.current)?;
		Ok(self.ok())
	}

	/// Decode the entry at the read position
	pub fn current(&self) -> Result<Row> {
		if !self.ok() {
			fail!("Read a row buffer past its end at offset {}", self.current);
		}
		let flags = self.buf[self.current];
		let mut at = self.current + 1;
		let key = bincode::deserialize(self.part(&mut at)?).map_err(Error::Bincode)?;
		let pk = match flags & HAS_PK {
			0 => None,
			_ => Some(bincode::deserialize(self.part(&mut at)?).map_err(Error::Bincode)?),
		};
		let doc = match flags & HAS_DOC {
			0 => None,
			_ => Some(bincode::deserialize(self.part(&mut at)?).map_err(Error::Bincode)?),
		};
		Ok(Row {
			key,
			pk,
			doc,
		})
	}

	/// Reset the buffer for the next fill, shrinking it after a large one
	pub fn empty(&mut self) {
		self.current = 0;
		if self.buf.capacity() > self.preferred * 2 {
			trace!(
				target: "fractaldb::core::idx::rowbuf",
				"Shrinking row buffer from {} to {} bytes",
				self.buf.capacity(),
				self.preferred
			);
			self.buf = Vec::with_capacity(self.preferred);
		} else {
			self.buf.clear();
		}
	}

	/// The number of bytes in use
	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.buf.capacity()
	}

	/// Read one length-prefixed part, moving the offset past it
	fn part(&self, at: &mut usize) -> Result<&[u8]> {
		let start = *at + 4;
		let Some(len) = self.buf.get(*at..start) else {
			fail!("Truncated row buffer length at offset {}", *at);
		};
		let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
		let Some(bytes) = self.buf.get(start..start + len) else {
			fail!("Truncated row buffer part at offset {start}");
		};
		*at = start + len;
		Ok(bytes)
	}

	/// The size of the entry which starts at an offset
	fn entry_len(&self, offset: usize) -> Result<usize> {
		let flags = self.buf[offset];
		let mut at = offset + 1;
		self.part(&mut at)?;
		if flags & HAS_PK != 0 {
			self.part(&mut at)?;
		}
		if flags & HAS_DOC != 0 {
			self.part(&mut at)?;
		}
		Ok(at - offset)
	}
}
