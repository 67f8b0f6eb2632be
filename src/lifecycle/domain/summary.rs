//! Compaction summaries and archive pointers.

use super::{ArchiveSegmentId, FollowUp, Gap, RiskEntry, SequenceNumber};
use crate::registry::domain::StateName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Back-reference from the main log into an archive segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePointer {
    /// Segment holding the retired entries.
    pub segment: ArchiveSegmentId,
    /// First archived sequence number.
    pub first: SequenceNumber,
    /// Last archived sequence number.
    pub last: SequenceNumber,
    /// Number of archived entries.
    pub record_count: usize,
    /// Hex SHA-256 digest of the segment's entries.
    pub digest: String,
    /// Recorded time of the newest archived activity.
    pub through: DateTime<Utc>,
}

/// Summary entry replacing an archived span in the main log.
///
/// The summary occupies the sequence number of the last archived entry, so
/// sequence numbers stay unique and ordered after compaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionSummary {
    /// Log position (the last archived sequence number).
    pub sequence: SequenceNumber,
    /// Where the archived entries live.
    pub archive: ArchivePointer,
    /// Main-sequence state at the start of the span.
    pub from_state: StateName,
    /// Main-sequence state reached at the end of the span.
    pub final_state: StateName,
    /// Union of still-open risks from the span.
    pub open_risks: Vec<RiskEntry>,
    /// Union of still-open follow-ups from the span.
    pub open_follow_ups: Vec<FollowUp>,
    /// Union of gaps recorded in the span.
    pub gaps: Vec<Gap>,
    /// When compaction ran.
    pub compacted_at: DateTime<Utc>,
}
