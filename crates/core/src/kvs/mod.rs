//! The module defining the transactional key value store.
//!
//! The store is made up of named, ordered, multi-versioned dictionaries.
//! Each dictionary is read and written through nested transactions, which
//! provide the following isolation levels:
//! - `serializable`: reads see the latest committed data, and lock the rows
//!   and ranges they read until the transaction finishes
//! - `snapshot`: reads see the data as it was when the transaction began
//! - `read uncommitted`: reads see the newest version of every row
//!
//! Ranges are read with a [`Cursor`], whose positioning operations deliver
//! rows in bulk through a callback.

mod api;
mod cursor;
mod dict;
mod ds;
mod lock;
mod rollback;
mod tx;

pub use api::{Check, Fetch, Getf, Isolation, LockMode, Timestamp, TxnId};
pub use cursor::Cursor;
pub use dict::{Dictionary, EntryKey, Suffix};
pub use ds::Datastore;
pub use lock::LockTable;
pub use rollback::{CappedListener, CappedRollback};
pub use tx::Transaction;

use crate::val::Document;

/// The value part of an entry. Index entries which do not cluster
/// the document carry no value.
pub type Val = Option<Document>;
