//! taskwarden: lifecycle tracking and stall recovery for autonomous
//! coding-agent tasks.
//!
//! The core is (a) a per-entity state-machine actor registry that
//! serializes lifecycle events and deduplicates outbound notifications,
//! and (b) a tiered recovery engine that classifies stalled tasks and
//! writes control files an external watcher turns into restarts.
//! Everything runs in a single process; state lives in memory plus
//! plain files.

pub mod actors;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod crash;
pub mod error;
pub mod machines;
pub mod notification;
pub mod profile;
pub mod recovery;
pub mod tasks;
pub mod utils;

pub use actors::{FeatureManager, ReviewManager, TaskRunManager};
pub use classifier::{AuthFailureVerdict, OutputClassifier, RateLimitVerdict};
pub use config::{ProjectPaths, WardenConfig};
pub use crash::{CrashNotification, CrashPoller};
pub use error::{Result, WardenError};
pub use machines::{Progress, ReviewResult, ReviewState};
pub use notification::{ChannelSink, CollectSink, LogSink, ReviewUpdate, UpdateSink};
pub use profile::{MemoryProfiles, Profile, ProfileDirectory, ProfileFile};
pub use recovery::{BatchEngine, BatchKind, BatchReport, TaskFix};
pub use tasks::{ControlFile, TaskStatus, TaskStore};
