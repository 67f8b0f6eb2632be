//! Application services for gate lifecycles.
//!
//! The engine accepts or blocks gate transitions and appends them to the
//! log; the snapshot manager derives handoff views and compacts logs. Both
//! share one [`WriteLocks`] registry so their mutations exclude each other.

mod blocked;
mod engine;
mod error;
mod locks;
mod snapshot;

pub use blocked::{BlockedHandler, BlockedRequest};
pub use engine::{CreateTaskRequest, ExecuteOutcome, ExecuteRequest, LifecycleEngine};
pub use error::{CompactionError, ConflictError, LifecycleError, LifecycleResult};
pub use locks::{WriteGuard, WriteLocks};
pub use snapshot::{ArchivedSpan, CompactionCutoff, ContextSnapshotManager};
