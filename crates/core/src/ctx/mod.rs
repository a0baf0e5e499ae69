mod canceller;
mod context;
mod reason;

pub use canceller::Canceller;
pub use context::Context;
pub use reason::Reason;
