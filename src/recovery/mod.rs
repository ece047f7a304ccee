//! Tiered batch recovery over stalled tasks.
//!
//! Four escalating tiers: automatic board move (restart only), detailed
//! fix request, technical auto-fix attempt for unparseable plans, and
//! the per-task manual nudge exposed as `recover_stuck_task`.

mod artifact;
mod batch;
mod engine;

pub use batch::{
    partition, BatchKind, BatchListing, BatchReport, BatchTask, RecoveryOutcome, ReviewBatch,
    StuckRecovery, TaskFix,
};
pub use engine::BatchEngine;
