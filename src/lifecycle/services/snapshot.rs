//! Context snapshot manager: read-only handoff views and log compaction.

use super::error::{CompactionError, LifecycleError, LifecycleResult};
use super::locks::WriteLocks;
use crate::lifecycle::domain::{
    ArchivePointer, BranchId, CompactionSummary, ContextSnapshot, FollowUp, Gap, LogEntry,
    RecordScope, RiskEntry, ScopeKey, SequenceNumber, Task, TaskId,
};
use crate::lifecycle::ports::{
    ArchiveError, ArchiveSegment, ArchiveStore, LifecycleStore, ScopeHead,
};
use crate::registry::RegistryHandle;
use crate::registry::domain::StateName;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Which entries a compaction retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionCutoff {
    /// Entries recorded strictly before this instant.
    Before(DateTime<Utc>),
    /// Everything older than the last `n` transition records.
    KeepLast(usize),
}

/// A span that compaction moved into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSpan {
    /// Summary entry now standing in the main log.
    pub summary: CompactionSummary,
    /// Entries that were archived, in log order.
    pub entries: Vec<LogEntry>,
}

/// Derives snapshots and compacts logs into an archive.
pub struct ContextSnapshotManager<S, A, C>
where
    S: LifecycleStore,
    A: ArchiveStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    archive: Arc<A>,
    registry: Arc<RegistryHandle>,
    clock: Arc<C>,
    locks: WriteLocks,
}

impl<S, A, C> Clone for ContextSnapshotManager<S, A, C>
where
    S: LifecycleStore,
    A: ArchiveStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            archive: Arc::clone(&self.archive),
            registry: Arc::clone(&self.registry),
            clock: Arc::clone(&self.clock),
            locks: self.locks.clone(),
        }
    }
}

impl<S, A, C> ContextSnapshotManager<S, A, C>
where
    S: LifecycleStore,
    A: ArchiveStore,
    C: Clock + Send + Sync,
{
    /// Creates a manager. Pass the engine's [`WriteLocks`] so compaction and
    /// appends exclude each other.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        archive: Arc<A>,
        registry: Arc<RegistryHandle>,
        clock: Arc<C>,
        locks: WriteLocks,
    ) -> Self {
        Self {
            store,
            archive,
            registry,
            clock,
            locks,
        }
    }

    async fn load(&self, id: TaskId) -> LifecycleResult<Task> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(LifecycleError::TaskNotFound(id))
    }

    /// Derives the current snapshot of a task. Never takes a write section.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] for an unknown task or workflow.
    pub async fn snapshot(&self, id: TaskId) -> LifecycleResult<ContextSnapshot> {
        let task = self.load(id).await?;
        let registry = self.registry.current();
        let template = registry.workflow(task.workflow())?;
        Ok(ContextSnapshot::derive(&task, template))
    }

    /// Derives the snapshot and serialises it as canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] for an unknown task or a serialisation
    /// failure.
    pub async fn snapshot_json(&self, id: TaskId) -> LifecycleResult<String> {
        Ok(self.snapshot(id).await?.to_canonical_json()?)
    }

    /// Moves entries selected by `cutoff` into the archive and replaces them
    /// with one summary entry.
    ///
    /// Returns `None` when nothing new can be archived. Records of open
    /// branches and still-actionable blocks stay in the log.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Conflict`] when the main write section is
    /// busy, or [`LifecycleError::Compaction`] when the archive write or the
    /// log swap fails; the log is unchanged in both cases.
    #[instrument(skip(self), fields(task = %id))]
    pub async fn compact(
        &self,
        id: TaskId,
        cutoff: CompactionCutoff,
    ) -> LifecycleResult<Option<ArchivedSpan>> {
        let _guard = self
            .locks
            .try_enter(id, ScopeKey::Main)
            .inspect_err(|err| warn!(error = %err, "compaction found the log busy"))?;
        let task = self.load(id).await?;

        let span = select_span(&task, cutoff);
        if !span.iter().any(|entry| entry.as_compacted().is_none()) {
            info!("nothing to compact");
            return Ok(None);
        }

        let segment = ArchiveSegment::seal(task.id(), span.clone())
            .map_err(CompactionError::ArchiveWrite)?;
        let summary = summarize(&task, &span, &segment, self.clock.utc());
        if let Err(err) = self.archive.write_segment(&segment).await {
            error!(error = %err, "archive write failed, log left intact");
            return Err(CompactionError::ArchiveWrite(err).into());
        }

        let archived: BTreeSet<SequenceNumber> = span.iter().map(LogEntry::sequence).collect();
        let expected = ScopeHead::observe(&task, ScopeKey::Main);
        if let Err(err) = self
            .store
            .replace_span(task.id(), expected, &archived, summary.clone())
            .await
        {
            error!(error = %err, segment = %segment.id, "log swap failed, discarding segment");
            if let Err(cleanup) = self.archive.discard_segment(segment.id).await {
                error!(error = %cleanup, segment = %segment.id, "orphaned archive segment");
            }
            return Err(CompactionError::Swap(err).into());
        }

        info!(
            segment = %segment.id,
            first = %summary.archive.first,
            last = %summary.archive.last,
            records = summary.archive.record_count,
            "log compacted"
        );
        Ok(Some(ArchivedSpan {
            summary,
            entries: span,
        }))
    }

    /// Reads the entries behind an archive pointer and verifies them against
    /// the pointer's digest.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Archive`] when the segment is missing or its
    /// digest does not match.
    pub async fn archived_entries(
        &self,
        pointer: &ArchivePointer,
    ) -> LifecycleResult<Vec<LogEntry>> {
        let segment = self
            .archive
            .read_segment(pointer.segment)
            .await?
            .ok_or(ArchiveError::NotFound(pointer.segment))?;
        segment.verify()?;
        if segment.digest != pointer.digest {
            return Err(ArchiveError::DigestMismatch {
                segment: pointer.segment,
                expected: pointer.digest.clone(),
                actual: segment.digest,
            }
            .into());
        }
        Ok(segment.entries)
    }
}

/// Picks the archivable entries before the cutoff boundary.
fn select_span(task: &Task, cutoff: CompactionCutoff) -> Vec<LogEntry> {
    let log = task.log();
    let entries = log.entries();
    let prefix_len = match cutoff {
        CompactionCutoff::Before(instant) => entries
            .iter()
            .take_while(|entry| entry.activity_at() < instant)
            .count(),
        CompactionCutoff::KeepLast(keep) => {
            let transitions: Vec<usize> = entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.as_transition().is_some())
                .map(|(position, _)| position)
                .collect();
            match transitions.len().checked_sub(keep) {
                Some(cut) if cut > 0 || keep == 0 => {
                    transitions.get(cut).copied().unwrap_or(entries.len())
                }
                _ => 0,
            }
        }
    };

    let merges: BTreeMap<BranchId, SequenceNumber> = log
        .branches()
        .into_iter()
        .filter_map(|status| log.merge_of(status.branch).map(|seq| (status.branch, seq)))
        .collect();
    let actionable: BTreeSet<SequenceNumber> = log
        .actionable_blocks(task.state())
        .into_iter()
        .map(|block| block.sequence)
        .collect();
    let boundary = entries
        .get(prefix_len)
        .map_or(SequenceNumber::new(u64::MAX), LogEntry::sequence);

    entries
        .iter()
        .take(prefix_len)
        .filter(|entry| !actionable.contains(&entry.sequence()))
        .filter(|entry| match entry.scope() {
            RecordScope::Branch(branch) => merges
                .get(&branch)
                .is_some_and(|merge| *merge < boundary),
            RecordScope::Main | RecordScope::Merge(_) => true,
        })
        .cloned()
        .collect()
}

/// Main-sequence state bounds of a span: where it starts and where it ends.
fn state_bounds(span: &[LogEntry]) -> Option<(StateName, StateName)> {
    let mut bounds: Option<(StateName, StateName)> = None;
    for entry in span {
        let step = match entry {
            LogEntry::Transition(record) if record.scope.key() == ScopeKey::Main => {
                Some((&record.from_state, &record.to_state))
            }
            LogEntry::Compacted(summary) => Some((&summary.from_state, &summary.final_state)),
            LogEntry::Blocked(block) if block.scope.key() == ScopeKey::Main => {
                Some((&block.anchor_state, &block.anchor_state))
            }
            _ => None,
        };
        if let Some((from, to)) = step {
            bounds = Some(match bounds {
                Some((first, _)) => (first, to.clone()),
                None => (from.clone(), to.clone()),
            });
        }
    }
    bounds
}

fn summarize(
    task: &Task,
    span: &[LogEntry],
    segment: &ArchiveSegment,
    compacted_at: DateTime<Utc>,
) -> CompactionSummary {
    let (from_state, final_state) =
        state_bounds(span).unwrap_or_else(|| (task.state().clone(), task.state().clone()));
    let mut open_risks: Vec<RiskEntry> = Vec::new();
    let mut open_follow_ups: Vec<FollowUp> = Vec::new();
    let mut gaps: Vec<Gap> = Vec::new();
    for entry in span {
        match entry {
            LogEntry::Transition(record) => {
                push_unique(&mut open_risks, record.open_risks());
                push_unique(&mut open_follow_ups, &record.follow_ups);
                push_unique(&mut gaps, &record.gaps);
            }
            LogEntry::Compacted(summary) => {
                push_unique(&mut open_risks, &summary.open_risks);
                push_unique(&mut open_follow_ups, &summary.open_follow_ups);
                push_unique(&mut gaps, &summary.gaps);
            }
            LogEntry::Blocked(_) => {}
        }
    }

    CompactionSummary {
        sequence: segment.last(),
        archive: ArchivePointer {
            segment: segment.id,
            first: segment.first(),
            last: segment.last(),
            record_count: span.len(),
            digest: segment.digest.clone(),
            through: span
                .iter()
                .map(LogEntry::activity_at)
                .max()
                .unwrap_or(compacted_at),
        },
        from_state,
        final_state,
        open_risks,
        open_follow_ups,
        gaps,
        compacted_at,
    }
}

fn push_unique<'a, T>(target: &mut Vec<T>, items: impl IntoIterator<Item = &'a T>)
where
    T: Clone + PartialEq + 'a,
{
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}
