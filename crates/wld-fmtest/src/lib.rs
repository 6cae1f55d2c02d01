//! Sample application for the WLD router.
//!
//! Each iteration asks the router for a slot, opens a token session on it,
//! finds the `MyAESKey` object and has the key-check function module confirm
//! the handle. Adapters that drop out mid-run are skipped.

pub mod error;
pub mod iteration;
pub mod runner;

pub use error::IterationError;
pub use iteration::{perform_fm_function, IterationOutcome};
pub use runner::{run_iterations, RunSummary};
