//! Client sessions and the settings of the operations they run.

mod options;
mod session;

pub use options::OpSettings;
pub use session::Session;
