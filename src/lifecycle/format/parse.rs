//! Parsing of the persisted text form.

use super::escape::{split_once_unescaped, split_unescaped, unescape, unescape_prose_line};
use super::{
    ARCHIVE, BRIEF_HEADER, DOMAIN, FOLLOW_UP, FROM_STATE, FormatError, GAPS, LAST_UPDATED,
    LOG_HEADER, MODE, OPEN_FOLLOW_UP, OPEN_RISKS, OUTPUT, OWNER, PERSONA, RESOLVES, SCOPE,
    STATUS, TO_STATE, WHY, WORKFLOW,
};
use crate::lifecycle::domain::{
    ArchivePointer, ArchiveSegmentId, BlockedRecord, CompactionSummary, DomainTag, Evidence,
    FollowUp, Gap, LifecycleLog, LogEntry, OutputBlock, OwnerId, PersistedTaskData, ProductBrief,
    RecordScope, RiskEntry, SequenceNumber, TaskId, TransitionMode, TransitionRecord,
};
use crate::registry::domain::{GateId, PersonaId, StateName, WorkflowName};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Parses a rendered task back into persisted task data.
///
/// # Errors
///
/// Returns [`FormatError`] naming the first line that does not follow the
/// form.
pub fn parse_task(text: &str) -> Result<PersistedTaskData, FormatError> {
    let mut cursor = Cursor::new(text);

    let title = cursor.next_line()?;
    let raw_id = title
        .strip_prefix("# Task ")
        .ok_or_else(|| cursor.error("expected '# Task <id>'"))?;
    let id: TaskId = cursor.check(raw_id.parse())?;
    let raw_workflow = cursor.value(WORKFLOW)?;
    let workflow = cursor.check(WorkflowName::new(raw_workflow))?;
    let raw_domain = cursor.value(DOMAIN)?;
    let domain = cursor.check(DomainTag::new(raw_domain))?;
    let raw_state = cursor.value(STATUS)?;
    let state = cursor.check(StateName::new(raw_state))?;
    let raw_owner = cursor.value(OWNER)?;
    let owner = cursor.check(OwnerId::new(raw_owner))?;
    let raw_updated_at = cursor.field(LAST_UPDATED)?;
    let updated_at = timestamp(&cursor, raw_updated_at)?;
    cursor.blank()?;

    cursor.exact(BRIEF_HEADER)?;
    let brief = brief(&mut cursor)?;

    let mut entries = Vec::new();
    while cursor.skip_blank_lines() {
        entries.push(entry(&mut cursor)?);
    }

    Ok(PersistedTaskData {
        id,
        workflow,
        domain,
        state,
        owner,
        updated_at,
        brief,
        log: LifecycleLog::from_entries(entries),
    })
}

/// Line cursor that remembers where an error occurred.
struct Cursor<'a> {
    lines: Vec<&'a str>,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.split('\n').collect(),
            position: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> FormatError {
        FormatError::new(self.position.max(1), reason)
    }

    fn check<T, E: Display>(&self, result: Result<T, E>) -> Result<T, FormatError> {
        result.map_err(|err| self.error(err.to_string()))
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.position).copied()
    }

    fn next_line(&mut self) -> Result<&'a str, FormatError> {
        let line = self
            .peek()
            .ok_or_else(|| FormatError::new(self.position + 1, "unexpected end of input"))?;
        self.position += 1;
        Ok(line)
    }

    fn exact(&mut self, expected: &str) -> Result<(), FormatError> {
        if self.next_line()? == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn blank(&mut self) -> Result<(), FormatError> {
        if self.next_line()?.is_empty() {
            Ok(())
        } else {
            Err(self.error("expected a blank line"))
        }
    }

    /// Skips blank lines and reports whether any content follows.
    fn skip_blank_lines(&mut self) -> bool {
        while let Some(line) = self.peek() {
            if !line.is_empty() {
                return true;
            }
            self.position += 1;
        }
        false
    }

    /// Consumes `KEY: value` and returns the raw, still escaped value.
    fn field(&mut self, key: &str) -> Result<&'a str, FormatError> {
        let line = self.next_line()?;
        field_value(line, key).ok_or_else(|| self.error(format!("expected field {key}")))
    }

    fn value(&mut self, key: &str) -> Result<String, FormatError> {
        let raw = self.field(key)?;
        self.unescaped(raw)
    }

    fn optional_field(&mut self, key: &str) -> Option<&'a str> {
        let raw = self.peek().and_then(|line| field_value(line, key))?;
        self.position += 1;
        Some(raw)
    }

    fn unescaped(&self, raw: &str) -> Result<String, FormatError> {
        unescape(raw).ok_or_else(|| self.error(format!("invalid escape in '{raw}'")))
    }

    /// Consumes every following line that starts with `prefix` and returns
    /// the remainders.
    fn items(&mut self, prefix: &str) -> Vec<&'a str> {
        let mut items = Vec::new();
        while let Some(item) = self.peek().and_then(|line| line.strip_prefix(prefix)) {
            items.push(item);
            self.position += 1;
        }
        items
    }

    /// Consumes the section label `KEY:` followed by `- item` lines.
    fn section(&mut self, key: &str) -> Result<Vec<&'a str>, FormatError> {
        self.exact(&format!("{key}:"))?;
        Ok(self.items("- "))
    }
}

fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let raw = line.strip_prefix(key)?.strip_prefix(':')?;
    Some(raw.strip_prefix(' ').unwrap_or(raw))
}

fn brief(cursor: &mut Cursor<'_>) -> Result<ProductBrief, FormatError> {
    let mut lines = Vec::new();
    loop {
        let line = cursor.next_line()?;
        if line == LOG_HEADER {
            break;
        }
        lines.push(unescape_prose_line(line));
    }
    if lines.pop() != Some("") {
        return Err(cursor.error("expected a blank line before the lifecycle log"));
    }
    Ok(ProductBrief::new(lines.join("\n")))
}

fn entry(cursor: &mut Cursor<'_>) -> Result<LogEntry, FormatError> {
    let line = cursor.next_line()?;
    let (raw_sequence, rest) = line
        .strip_prefix("### [")
        .and_then(|header| header.split_once("] "))
        .ok_or_else(|| cursor.error("expected an entry header '### [n] ...'"))?;
    let sequence = SequenceNumber::new(cursor.check(raw_sequence.parse::<u64>())?);
    let (kind, at) = rest
        .rsplit_once(" @ ")
        .ok_or_else(|| cursor.error("entry header has no timestamp"))?;
    let recorded_at = timestamp(cursor, at)?;

    if kind == "COMPACTED" {
        return summary(cursor, sequence, recorded_at).map(LogEntry::Compacted);
    }
    let (label, raw_gate) = kind
        .split_once(' ')
        .ok_or_else(|| cursor.error(format!("unknown entry kind '{kind}'")))?;
    let gate = cursor.check(GateId::new(cursor.unescaped(raw_gate)?))?;
    let head = EntryHead {
        sequence,
        gate,
        recorded_at,
    };
    match label {
        "TRANSITION" => transition(cursor, head).map(LogEntry::Transition),
        "BLOCKED" => blocked(cursor, head).map(LogEntry::Blocked),
        _ => Err(cursor.error(format!("unknown entry kind '{label}'"))),
    }
}

struct EntryHead {
    sequence: SequenceNumber,
    gate: GateId,
    recorded_at: DateTime<Utc>,
}

struct Attribution {
    persona: PersonaId,
    scope: RecordScope,
    mode: TransitionMode,
    from_state: StateName,
}

fn attribution(cursor: &mut Cursor<'_>) -> Result<Attribution, FormatError> {
    let raw_persona = cursor.value(PERSONA)?;
    let persona = cursor.check(PersonaId::new(raw_persona))?;
    let raw_scope = cursor.field(SCOPE)?;
    let scope = scope(cursor, raw_scope)?;
    let raw_mode = cursor.field(MODE)?;
    let mode = cursor.check(TransitionMode::try_from(raw_mode))?;
    let raw_from = cursor.value(FROM_STATE)?;
    let from_state = cursor.check(StateName::new(raw_from))?;
    Ok(Attribution {
        persona,
        scope,
        mode,
        from_state,
    })
}

fn transition(cursor: &mut Cursor<'_>, head: EntryHead) -> Result<TransitionRecord, FormatError> {
    let attribution = attribution(cursor)?;
    let raw_to = cursor.value(TO_STATE)?;
    let to_state = cursor.check(StateName::new(raw_to))?;
    let resolves = cursor
        .optional_field(RESOLVES)
        .map(|raw| cursor.check(raw.parse::<u64>()).map(SequenceNumber::new))
        .transpose()?;
    let gaps = cursor
        .optional_field(GAPS)
        .map(|raw| gaps(cursor, raw))
        .transpose()?
        .unwrap_or_default();

    let why = cursor
        .section(WHY)?
        .into_iter()
        .map(|bullet| cursor.unescaped(bullet))
        .collect::<Result<Vec<_>, _>>()?;

    cursor.exact(&format!("{OUTPUT}:"))?;
    let summary_line = cursor.next_line()?;
    let raw_summary = field_value(summary_line, "- summary")
        .ok_or_else(|| cursor.error("expected '- summary:'"))?;
    let summary = cursor.unescaped(raw_summary)?;
    cursor.exact("- inputs:")?;
    let mut inputs = BTreeMap::new();
    for item in cursor.items("  - ") {
        let (key, value) = split_once_unescaped(item, '=')
            .ok_or_else(|| cursor.error(format!("input '{item}' is not key=value")))?;
        if inputs
            .insert(cursor.unescaped(key)?, cursor.unescaped(value)?)
            .is_some()
        {
            return Err(cursor.error(format!("duplicate input '{key}'")));
        }
    }
    let evidence_line = cursor.next_line()?;
    let evidence = evidence(
        cursor,
        evidence_line
            .strip_prefix("- evidence: ")
            .ok_or_else(|| cursor.error("expected '- evidence: '"))?,
    )?;
    cursor.exact("- risks:")?;
    let risks = cursor
        .items("  - ")
        .into_iter()
        .map(|item| risk(cursor, item))
        .collect::<Result<Vec<_>, _>>()?;

    let follow_ups = cursor
        .section(FOLLOW_UP)?
        .into_iter()
        .map(|item| follow_up(cursor, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TransitionRecord {
        sequence: head.sequence,
        gate: head.gate,
        persona: attribution.persona,
        mode: attribution.mode,
        scope: attribution.scope,
        from_state: attribution.from_state,
        to_state,
        why,
        output: OutputBlock {
            summary,
            inputs,
            evidence,
            risks,
        },
        follow_ups,
        gaps,
        resolves,
        recorded_at: head.recorded_at,
    })
}

fn blocked(cursor: &mut Cursor<'_>, head: EntryHead) -> Result<BlockedRecord, FormatError> {
    let attribution = attribution(cursor)?;
    let marker = cursor.next_line()?;
    let (missing, steps) = marker
        .strip_prefix("BLOCKED(missing_inputs=[")
        .and_then(|body| body.strip_suffix("])"))
        .and_then(|body| body.split_once("], unblock_steps=["))
        .ok_or_else(|| cursor.error("expected a BLOCKED(...) marker"))?;
    Ok(BlockedRecord {
        sequence: head.sequence,
        gate: head.gate,
        persona: attribution.persona,
        mode: attribution.mode,
        scope: attribution.scope,
        anchor_state: attribution.from_state,
        missing_inputs: list(cursor, missing)?,
        unblock_steps: list(cursor, steps)?,
        recorded_at: head.recorded_at,
    })
}

fn summary(
    cursor: &mut Cursor<'_>,
    sequence: SequenceNumber,
    compacted_at: DateTime<Utc>,
) -> Result<CompactionSummary, FormatError> {
    let raw_from = cursor.value(FROM_STATE)?;
    let from_state = cursor.check(StateName::new(raw_from))?;
    let raw_final = cursor.value(TO_STATE)?;
    let final_state = cursor.check(StateName::new(raw_final))?;
    let raw_archive = cursor.field(ARCHIVE)?;
    let archive = archive(cursor, raw_archive)?;
    let gaps = cursor
        .optional_field(GAPS)
        .map(|raw| gaps(cursor, raw))
        .transpose()?
        .unwrap_or_default();
    let open_risks = cursor
        .section(OPEN_RISKS)?
        .into_iter()
        .map(|item| risk(cursor, item))
        .collect::<Result<Vec<_>, _>>()?;
    let open_follow_ups = cursor
        .section(OPEN_FOLLOW_UP)?
        .into_iter()
        .map(|item| follow_up(cursor, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompactionSummary {
        sequence,
        archive,
        from_state,
        final_state,
        open_risks,
        open_follow_ups,
        gaps,
        compacted_at,
    })
}

fn timestamp(cursor: &Cursor<'_>, raw: &str) -> Result<DateTime<Utc>, FormatError> {
    cursor
        .check(DateTime::parse_from_rfc3339(raw))
        .map(|instant| instant.with_timezone(&Utc))
}

fn scope(cursor: &Cursor<'_>, raw: &str) -> Result<RecordScope, FormatError> {
    if raw == "main" {
        return Ok(RecordScope::Main);
    }
    match raw.split_once(' ') {
        Some(("branch", branch)) => Ok(RecordScope::Branch(cursor.check(branch.parse())?)),
        Some(("merge", branch)) => Ok(RecordScope::Merge(cursor.check(branch.parse())?)),
        _ => Err(cursor.error(format!("unknown scope '{raw}'"))),
    }
}

fn gaps(cursor: &Cursor<'_>, raw: &str) -> Result<Vec<Gap>, FormatError> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|body| body.strip_suffix(']'))
        .ok_or_else(|| cursor.error("GAPS must be a bracketed list"))?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    split_unescaped(inner, ',')
        .into_iter()
        .map(|item| match split_once_unescaped(item, '=') {
            Some(("skipped", gate)) => Ok(Gap::SkippedGate(
                cursor.check(GateId::new(cursor.unescaped(gate)?))?,
            )),
            Some(("missing", key)) => Ok(Gap::MissingInput(cursor.unescaped(key)?)),
            _ => Err(cursor.error(format!("unknown gap '{item}'"))),
        })
        .collect()
}

fn list(cursor: &Cursor<'_>, raw: &str) -> Result<Vec<String>, FormatError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    split_unescaped(raw, ',')
        .into_iter()
        .map(|item| cursor.unescaped(item))
        .collect()
}

fn evidence(cursor: &Cursor<'_>, raw: &str) -> Result<Evidence, FormatError> {
    let parts = split_unescaped(raw, '|');
    let [kind, result_part, reference_part] = parts.as_slice() else {
        return Err(cursor.error("evidence must be kind|result=<value>|ref=<path>"));
    };
    let result = result_part
        .strip_prefix("result=")
        .ok_or_else(|| cursor.error("evidence is missing result="))?;
    let reference = reference_part
        .strip_prefix("ref=")
        .ok_or_else(|| cursor.error("evidence is missing ref="))?;
    Ok(Evidence::new(
        cursor.unescaped(kind)?,
        cursor.unescaped(result)?,
        cursor.unescaped(reference)?,
    ))
}

fn risk(cursor: &Cursor<'_>, raw: &str) -> Result<RiskEntry, FormatError> {
    let mut parts = split_unescaped(raw, '|').into_iter();
    let description = parts.next().unwrap_or_default();
    let mut risk = RiskEntry::new(cursor.unescaped(description)?);
    for part in parts {
        if let Some(owner) = part.strip_prefix("owner=") {
            risk.owner = Some(cursor.check(OwnerId::new(cursor.unescaped(owner)?))?);
        } else if let Some(mitigation) = part.strip_prefix("mitigation=") {
            risk.mitigation = Some(cursor.unescaped(mitigation)?);
        } else {
            return Err(cursor.error(format!("unknown risk attribute '{part}'")));
        }
    }
    Ok(risk)
}

fn follow_up(cursor: &Cursor<'_>, raw: &str) -> Result<FollowUp, FormatError> {
    let (rest, raw_due) = raw
        .rsplit_once(" - due=")
        .ok_or_else(|| cursor.error("follow-up is missing '- due='"))?;
    let (action, raw_owner) = rest
        .rsplit_once(" - owner=")
        .ok_or_else(|| cursor.error("follow-up is missing '- owner='"))?;
    let due = cursor.check(NaiveDate::parse_from_str(raw_due, "%Y-%m-%d"))?;
    let owner = cursor.check(OwnerId::new(cursor.unescaped(raw_owner)?))?;
    Ok(FollowUp::new(cursor.unescaped(action)?, owner, due))
}

fn archive(cursor: &Cursor<'_>, raw: &str) -> Result<ArchivePointer, FormatError> {
    let mut tokens = raw.split(' ');
    let segment: ArchiveSegmentId = cursor.check(tokens.next().unwrap_or_default().parse())?;
    let mut attribute = |name: &str| {
        tokens
            .next()
            .and_then(|token| token.strip_prefix(name))
            .and_then(|token| token.strip_prefix('='))
            .ok_or_else(|| cursor.error(format!("ARCHIVE is missing {name}=")))
    };
    let first = attribute("first")?;
    let last = attribute("last")?;
    let records = attribute("records")?;
    let digest = attribute("digest")?;
    let through = attribute("through")?;
    Ok(ArchivePointer {
        segment,
        first: SequenceNumber::new(cursor.check(first.parse::<u64>())?),
        last: SequenceNumber::new(cursor.check(last.parse::<u64>())?),
        record_count: cursor.check(records.parse::<usize>())?,
        digest: cursor.unescaped(digest)?,
        through: timestamp(cursor, through)?,
    })
}
