// src/scorm.rs

//! Completion of SCORM packages from the runtime `cmi` state the player posts back.
//!
//! Players are inconsistent about shape: some send nested objects
//! (`{"cmi": {"core": {"lesson_status": ..}}}`), some flat dotted keys
//! (`{"cmi.core.lesson_status": ..}`), and numbers sometimes arrive as strings.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScormOutcome {
    Passed,
    Completed,
    Failed,
    Incomplete,
    NotAttempted,
    Unknown,
}

impl ScormOutcome {
    pub fn is_complete(self) -> bool {
        matches!(self, ScormOutcome::Passed | ScormOutcome::Completed)
    }
}

/// Looks up a dotted SCORM element path, accepting nested, flat or mixed shapes.
fn lookup<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(v) = state.get(path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    let mut prefix = head.to_string();
    let mut remainder = rest;
    loop {
        if let Some(child) = state.get(prefix.as_str()) {
            if let Some(found) = lookup(child, remainder) {
                return Some(found);
            }
        }
        let (next, tail) = remainder.split_once('.')?;
        prefix.push('.');
        prefix.push_str(next);
        remainder = tail;
    }
}

fn text(state: &Value, path: &str) -> Option<String> {
    lookup(state, path)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty() && s != "unknown")
}

fn number(state: &Value, path: &str) -> Option<f64> {
    match lookup(state, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn evaluate(state: &Value) -> ScormOutcome {
    // SCORM 2004 success status wins over everything else.
    match text(state, "cmi.success_status").as_deref() {
        Some("passed") => return ScormOutcome::Passed,
        Some("failed") => return ScormOutcome::Failed,
        _ => {}
    }

    match text(state, "cmi.completion_status").as_deref() {
        Some("completed") => return ScormOutcome::Completed,
        Some("incomplete") => return ScormOutcome::Incomplete,
        Some("not attempted") => return ScormOutcome::NotAttempted,
        _ => {}
    }

    // SCORM 1.2
    match text(state, "cmi.core.lesson_status").as_deref() {
        Some("passed") => return ScormOutcome::Passed,
        Some("completed") => return ScormOutcome::Completed,
        Some("failed") => return ScormOutcome::Failed,
        Some("incomplete") | Some("browsed") => return ScormOutcome::Incomplete,
        Some("not attempted") => return ScormOutcome::NotAttempted,
        _ => {}
    }

    if let (Some(scaled), Some(threshold)) = (
        number(state, "cmi.score.scaled"),
        number(state, "cmi.scaled_passing_score"),
    ) {
        return if scaled >= threshold {
            ScormOutcome::Passed
        } else {
            ScormOutcome::Failed
        };
    }

    if let (Some(raw), Some(mastery)) = (
        number(state, "cmi.core.score.raw"),
        number(state, "cmi.student_data.mastery_score"),
    ) {
        return if raw >= mastery {
            ScormOutcome::Passed
        } else {
            ScormOutcome::Failed
        };
    }

    ScormOutcome::Unknown
}

/// Deep-merges `incoming` into `existing`; scalars in `incoming` win.
pub fn merge_state(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(slot) => merge_state(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
