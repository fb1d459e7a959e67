//! Shared utilities: extract IO, Arrow access helpers and logging

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{DEFAULT_BATCH_SIZE, read_table};
