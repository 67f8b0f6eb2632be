//! Domain model for gate-driven task lifecycles.
//!
//! A [`Task`] exclusively owns its [`LifecycleLog`]; the log is the only
//! writer of the task's current state. Entries are immutable once appended
//! and are either accepted transitions, BLOCKED records, or compaction
//! summaries standing in for an archived span.

mod blocked;
mod entry;
mod error;
mod ids;
mod log;
mod record;
mod snapshot;
mod summary;
mod task;

pub use blocked::BlockedRecord;
pub use entry::{BranchFilter, LogEntry, LogFilter, RecordScope, ScopeKey};
pub use error::{LifecycleDomainError, ParseModeError, WalkError};
pub use ids::{ArchiveSegmentId, BranchId, DomainTag, OwnerId, SequenceNumber, TaskId};
pub use log::{BranchStatus, LifecycleLog};
pub use record::{
    Evidence, FollowUp, Gap, OutputBlock, RiskEntry, TransitionMode, TransitionRecord,
};
pub use snapshot::{BranchView, ContextSnapshot, PendingBlock};
pub use summary::{ArchivePointer, CompactionSummary};
pub use task::{NewTaskParams, PersistedTaskData, ProductBrief, Task};
