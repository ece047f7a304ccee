//! Actor registry and the per-lifecycle state managers.
//!
//! One actor per key, created lazily on the first lifecycle-starting
//! event and destroyed explicitly (clear, auth change, shutdown).
//! External callers only ever see immutable snapshots.

mod feature;
mod registry;
mod review;
mod task_run;

pub use feature::FeatureManager;
pub use registry::{ActorRegistry, Snapshot};
pub use review::ReviewManager;
pub use task_run::TaskRunManager;
