//! # FractalDB Core
//!
//! This crate is the storage core of FractalDB. It layers a document
//! database's collections and secondary indexes over a transactional,
//! MVCC-capable ordered key-value store, and provides the index cursors
//! which the query layer uses to iterate ordered key ranges.
//!
//! The central type is [`idx::IndexCursor`], which positions a transactional
//! engine cursor, bulk-fetches rows into a [`idx::RowBuffer`], and walks
//! compound multi-interval [`idx::IndexBounds`] by repositioning the engine
//! cursor rather than scanning every key. [`idx::IndexCountCursor`] counts
//! matching keys without materialising rows.
//!
//! <section class="warning">
//! <h3>Unstable!</h3>
//! This crate is an internal API. It does not adhere to semver and its API is
//! free to change between patch versions.
//! </section>

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod catalog;
pub mod cnf;
pub mod ctx;
pub mod dbs;
pub mod err;
pub mod idx;
pub mod key;
pub mod kvs;
pub mod val;
