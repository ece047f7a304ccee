//! Task control files and the file-backed task collaborator.

mod control;
mod store;

pub use control::{
    ControlFile, Subtask, SubtaskStatus, TaskMetadata, TaskStatus, JSON_ERROR_MARKER,
};
pub use store::{MirroredWriter, TaskStore};
