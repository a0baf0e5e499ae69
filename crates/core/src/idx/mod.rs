//! Cursors over the indexes of a collection.
//!
//! An [`IndexCursor`] walks one index in either direction, over a key range
//! or a set of [`IndexBounds`], handing out rows which it fetches from the
//! store in bulk. An [`IndexCountCursor`] walks the same ranges without
//! materialising any rows. Both declare their range to the store up front
//! when the transaction or operation asks for it, see [`should_prelock`].

mod bounds;
mod count;
mod cursor;
mod prelock;
mod rowbuf;

pub use bounds::{BoundsAdvance, BoundsIterator, FieldRange, IndexBounds, Interval, IntervalBound};
pub use count::IndexCountCursor;
pub use cursor::IndexCursor;
pub use prelock::should_prelock;
pub use rowbuf::{Row, RowBuffer};
