use core::fmt;

use bincode::Error as BincodeError;
use thiserror::Error;

/// An error originating from the FractalDB storage core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The database encountered unreachable logic
	#[error("The database encountered unreachable logic: {0}")]
	Unreachable(String),

	/// The query was cancelled before it could complete
	#[error("The query was not executed because it was cancelled")]
	QueryCancelled,

	/// There was a problem with the underlying datastore
	#[error("There was a problem with the underlying datastore: {0}")]
	Ds(String),

	/// The dictionary was dropped or closed
	#[error("The dictionary '{0}' is not open")]
	DictionaryClosed(String),

	/// The dictionary was created after the transaction snapshot was taken
	#[error("The dictionary '{0}' was created after the transaction began")]
	DictionaryTooNew(String),

	/// The transaction was already cancelled or committed
	#[error("Couldn't update a finished transaction")]
	TxFinished,

	/// The current transaction was created as read-only
	#[error("Couldn't write to a read only transaction")]
	TxReadonly,

	/// There is no transaction open on this session
	#[error("There is no transaction open on this session")]
	TxNotFound,

	/// A parent transaction was resolved while a child was still live
	#[error("Couldn't finish a transaction with a live child transaction")]
	TxChildActive,

	/// Another transaction wrote a newer version of the same key
	#[error("The key was modified by a concurrent transaction")]
	TxWriteConflict,

	/// A range lock could not be acquired in time
	#[error("Lock not granted on dictionary '{0}' within the lock timeout")]
	LockNotGranted(String),

	/// The key being inserted in the transaction already exists
	#[error("The key being inserted already exists in index '{0}'")]
	KeyAlreadyExists(String),

	/// An index entry pointed at a primary key which could not be found
	#[error("Could not find the document for primary key {0} in '{1}'")]
	MissingDocument(String, String),

	/// Repeated prefix skipping did not converge on a key inside the bounds
	#[error("Bounds skipping did not converge after {0} repositionings")]
	BoundsSkipDiverged(usize),

	/// Tailable cursors can only iterate the primary key index
	#[error("Tailable cursors are only supported on the primary key index, not '{0}'")]
	TailableSecondaryIndex(String),

	/// Tailable cursors require an unbounded end key
	#[error("Tailable cursors require an empty or maximal end key")]
	TailableBoundedEnd,

	/// Tailable cursors can only iterate capped collections
	#[error("Tailable cursors are only supported on capped collections, not '{0}'")]
	TailableNotCapped(String),

	/// A direction value other than 1 or -1 was supplied
	#[error("Invalid cursor direction {0}, expected 1 or -1")]
	InvalidDirection(i32),

	/// Count cursors can only iterate forwards
	#[error("Count cursors only support forward iteration")]
	CountCursorReverse,

	/// The supplied index bounds are malformed
	#[error("Invalid index bounds: {0}")]
	InvalidBounds(String),

	/// A document was written without a primary key
	#[error("The document is missing the '_id' primary key field")]
	MissingPrimaryKey,

	/// Documents can not be deleted from capped collections
	#[error("Documents can not be deleted from the capped collection '{0}'")]
	CappedDelete(String),

	/// Represents an underlying error with Bincode serializing / deserializing
	#[error("Bincode error: {0}")]
	Bincode(#[from] BincodeError),
}

impl Error {
	#[track_caller]
	pub fn unreachable<T: fmt::Display>(message: T) -> Error {
		let location = std::panic::Location::caller();
		let message = format!("{}:{}: {}", location.file(), location.line(), message);
		Error::Unreachable(message)
	}

	/// Check if this error means the operation was interrupted
	pub fn is_interrupt(&self) -> bool {
		matches!(self, Error::QueryCancelled)
	}

	/// Check if this error is a caller misuse detected before any work was done
	pub fn is_misuse(&self) -> bool {
		matches!(
			self,
			Error::TailableSecondaryIndex(_)
				| Error::TailableBoundedEnd
				| Error::TailableNotCapped(_)
				| Error::InvalidDirection(_)
				| Error::CountCursorReverse
				| Error::InvalidBounds(_)
		)
	}

	/// Check if the operation could be retried in a fresh transaction
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::LockNotGranted(_) | Error::TxWriteConflict)
	}
}
