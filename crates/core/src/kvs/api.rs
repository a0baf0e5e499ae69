use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// The identifier of a transaction within a datastore
pub type TxnId = u64;

/// A logical commit timestamp
pub type Timestamp = u64;

/// The isolation level of a transaction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Isolation {
	/// Sees the latest committed data, and takes range locks on every read
	Serializable,
	/// Sees the data that was committed when the transaction began
	#[default]
	Snapshot,
	/// Sees the newest version of every key, committed or not
	ReadUncommitted,
}

impl Display for Isolation {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Isolation::Serializable => f.write_str("serializable"),
			Isolation::Snapshot => f.write_str("snapshot"),
			Isolation::ReadUncommitted => f.write_str("read uncommitted"),
		}
	}
}

/// The type of row lock which a cursor should acquire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LockMode {
	/// Take no row locks, only prefetch
	#[default]
	None,
	/// Take shared range locks
	Read,
	/// Take exclusive range locks
	Write,
}

/// Returned from a bulk fetch callback to control the engine cursor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Getf {
	/// Deliver the next row within the same bulk call
	Continue,
	/// Return control to the caller
	Stop,
}

/// The outcome of an engine cursor operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fetch {
	/// At least one row was passed to the callback
	Found,
	/// There was no row at the requested position
	NotFound,
}

impl Fetch {
	pub fn is_found(&self) -> bool {
		matches!(self, Fetch::Found)
	}
}

/// Used to determine the behaviour when a transaction is not handled correctly
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Check {
	#[default]
	None,
	Warn,
	Error,
}

impl FromStr for Check {
	type Err = String;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"none" => Ok(Check::None),
			"warn" => Ok(Check::Warn),
			"error" => Ok(Check::Error),
			_ => Err(format!("unknown transaction check level: {s}")),
		}
	}
}
