//! Rendering of tasks and log entries to the text form.

use super::escape::{escape, escape_prose_line};
use super::{
    ARCHIVE, BRIEF_HEADER, DOMAIN, FOLLOW_UP, FROM_STATE, GAPS, LAST_UPDATED, LOG_HEADER, MODE,
    OPEN_FOLLOW_UP, OPEN_RISKS, OUTPUT, OWNER, PERSONA, RESOLVES, SCOPE, STATUS, TO_STATE, WHY,
    WORKFLOW,
};
use crate::lifecycle::domain::{
    BlockedRecord, CompactionSummary, FollowUp, Gap, LogEntry, RecordScope, RiskEntry, Task,
    TransitionRecord,
};
use chrono::{DateTime, SecondsFormat, Utc};

/// Renders a task with its product brief and full lifecycle log.
#[must_use]
pub fn render_task(task: &Task) -> String {
    let mut out = String::new();
    push_line(&mut out, &format!("# Task {}", task.id()));
    push_field(&mut out, WORKFLOW, &escape(task.workflow().as_str()));
    push_field(&mut out, DOMAIN, &escape(task.domain().as_str()));
    push_field(&mut out, STATUS, &escape(task.state().as_str()));
    push_field(&mut out, OWNER, &escape(task.owner().as_str()));
    push_field(&mut out, LAST_UPDATED, &timestamp(task.updated_at()));
    out.push('\n');

    push_line(&mut out, BRIEF_HEADER);
    for line in task.brief().as_str().split('\n') {
        push_line(&mut out, &escape_prose_line(line));
    }
    out.push('\n');

    push_line(&mut out, LOG_HEADER);
    for entry in task.log().entries() {
        out.push('\n');
        out.push_str(&render_entry(entry));
    }
    out
}

/// Renders one log entry as a block of lines.
#[must_use]
pub fn render_entry(entry: &LogEntry) -> String {
    match entry {
        LogEntry::Transition(record) => render_transition(record),
        LogEntry::Blocked(record) => render_blocked(record),
        LogEntry::Compacted(summary) => render_summary(summary),
    }
}

/// Renders an accepted transition block.
#[must_use]
pub fn render_transition(record: &TransitionRecord) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        &format!(
            "### [{}] TRANSITION {} @ {}",
            record.sequence,
            escape(record.gate.as_str()),
            timestamp(record.recorded_at)
        ),
    );
    push_field(&mut out, PERSONA, &escape(record.persona.as_str()));
    push_field(&mut out, SCOPE, &scope(record.scope));
    push_field(&mut out, MODE, record.mode.as_str());
    push_field(&mut out, FROM_STATE, &escape(record.from_state.as_str()));
    push_field(&mut out, TO_STATE, &escape(record.to_state.as_str()));
    if let Some(resolves) = record.resolves {
        push_field(&mut out, RESOLVES, &resolves.to_string());
    }
    push_gaps(&mut out, &record.gaps);

    push_line(&mut out, &format!("{WHY}:"));
    for bullet in &record.why {
        push_line(&mut out, &format!("- {}", escape(bullet)));
    }

    let output = &record.output;
    push_line(&mut out, &format!("{OUTPUT}:"));
    push_line(&mut out, &format!("- summary: {}", escape(&output.summary)));
    push_line(&mut out, "- inputs:");
    for (key, value) in &output.inputs {
        push_line(&mut out, &format!("  - {}={}", escape(key), escape(value)));
    }
    push_line(
        &mut out,
        &format!(
            "- evidence: {}|result={}|ref={}",
            escape(&output.evidence.kind),
            escape(&output.evidence.result),
            escape(&output.evidence.reference)
        ),
    );
    push_line(&mut out, "- risks:");
    for risk in &output.risks {
        push_line(&mut out, &format!("  - {}", risk_line(risk)));
    }

    push_line(&mut out, &format!("{FOLLOW_UP}:"));
    for follow_up in &record.follow_ups {
        push_line(&mut out, &format!("- {}", follow_up_line(follow_up)));
    }
    out
}

/// Renders a BLOCKED block with its marker line.
#[must_use]
pub fn render_blocked(record: &BlockedRecord) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        &format!(
            "### [{}] BLOCKED {} @ {}",
            record.sequence,
            escape(record.gate.as_str()),
            timestamp(record.recorded_at)
        ),
    );
    push_field(&mut out, PERSONA, &escape(record.persona.as_str()));
    push_field(&mut out, SCOPE, &scope(record.scope));
    push_field(&mut out, MODE, record.mode.as_str());
    push_field(&mut out, FROM_STATE, &escape(record.anchor_state.as_str()));
    push_line(
        &mut out,
        &format!(
            "BLOCKED(missing_inputs=[{}], unblock_steps=[{}])",
            escaped_list(&record.missing_inputs),
            escaped_list(&record.unblock_steps)
        ),
    );
    out
}

fn render_summary(summary: &CompactionSummary) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        &format!(
            "### [{}] COMPACTED @ {}",
            summary.sequence,
            timestamp(summary.compacted_at)
        ),
    );
    push_field(&mut out, FROM_STATE, &escape(summary.from_state.as_str()));
    push_field(&mut out, TO_STATE, &escape(summary.final_state.as_str()));
    let archive = &summary.archive;
    push_field(
        &mut out,
        ARCHIVE,
        &format!(
            "{} first={} last={} records={} digest={} through={}",
            archive.segment,
            archive.first,
            archive.last,
            archive.record_count,
            escape(&archive.digest),
            timestamp(archive.through)
        ),
    );
    push_gaps(&mut out, &summary.gaps);
    push_line(&mut out, &format!("{OPEN_RISKS}:"));
    for risk in &summary.open_risks {
        push_line(&mut out, &format!("- {}", risk_line(risk)));
    }
    push_line(&mut out, &format!("{OPEN_FOLLOW_UP}:"));
    for follow_up in &summary.open_follow_ups {
        push_line(&mut out, &format!("- {}", follow_up_line(follow_up)));
    }
    out
}

fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn scope(scope: RecordScope) -> String {
    match scope {
        RecordScope::Main => "main".to_owned(),
        RecordScope::Branch(branch) => format!("branch {branch}"),
        RecordScope::Merge(branch) => format!("merge {branch}"),
    }
}

fn risk_line(risk: &RiskEntry) -> String {
    let mut line = escape(&risk.description);
    if let Some(owner) = &risk.owner {
        line.push_str(&format!("|owner={}", escape(owner.as_str())));
    }
    if let Some(mitigation) = &risk.mitigation {
        line.push_str(&format!("|mitigation={}", escape(mitigation)));
    }
    line
}

fn follow_up_line(follow_up: &FollowUp) -> String {
    format!(
        "{} - owner={} - due={}",
        escape(&follow_up.action),
        escape(follow_up.owner.as_str()),
        follow_up.due.format("%Y-%m-%d")
    )
}

fn push_gaps(out: &mut String, gaps: &[Gap]) {
    if gaps.is_empty() {
        return;
    }
    let rendered: Vec<String> = gaps
        .iter()
        .map(|gap| match gap {
            Gap::SkippedGate(gate) => format!("skipped={}", escape(gate.as_str())),
            Gap::MissingInput(key) => format!("missing={}", escape(key)),
        })
        .collect();
    push_field(out, GAPS, &format!("[{}]", rendered.join(",")));
}

fn escaped_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| escape(item))
        .collect::<Vec<_>>()
        .join(",")
}

fn push_field(out: &mut String, key: &str, value: &str) {
    push_line(out, &format!("{key}: {value}"));
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}
