//! # Built-in subscribers
//!
//! - [`LogWriter`]: maps events onto `tracing` records.
//! - [`OutcomeTally`]: counts outcomes and limit moves; handy for tests and the fleet summary.

mod log;
mod tally;

pub use log::LogWriter;
pub use tally::{OutcomeTally, TallySnapshot};
