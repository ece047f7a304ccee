//! Shared utility functions.

mod file_ops;
mod string;

pub use file_ops::{remove_interrupted_writes, write_atomic};
pub use string::truncate_with_marker;
