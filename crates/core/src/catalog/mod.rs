//! Collections, their index definitions, and capped collection tracking.

mod capped;
mod collection;
mod index;

pub use capped::CappedTracker;
pub use collection::Collection;
pub use index::{Index, IndexDefinition, PK_FIELD, PK_INDEX};
