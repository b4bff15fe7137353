use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bank::progress_key;
use crate::session::SessionOutcome;
use crate::storage::KvStore;


pub const EXPORT_VERSION: &str = "1.0";

const PROGRESS_KEY_SUFFIX: &str = "_progress";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub date: DateTime<Utc>,
    pub score: u32,
    pub passed: bool,
    #[serde(rename = "timeSpent")]
    pub time_spent: u64,
}

/// Append-only history of one exam's attempts. Prior attempts are never
/// rewritten; the only deletion is an explicit [`clear`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ProgressLog {
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(rename = "bestScore", default)]
    pub best_score: u32,
    #[serde(rename = "totalPassed", default)]
    pub total_passed: u32,
}

impl ProgressLog {
    pub fn pass_rate(&self) -> u32 {
        if self.attempts.is_empty() {
            return 0;
        }
        ((self.total_passed as f64 / self.attempts.len() as f64) * 100.0).round() as u32
    }

    pub fn average_score(&self) -> u32 {
        if self.attempts.is_empty() {
            return 0;
        }
        let sum: u64 = self.attempts.iter().map(|a| a.score as u64).sum();
        (sum as f64 / self.attempts.len() as f64).round() as u32
    }
}

/// Loads an exam's progress log. Absent or corrupt entries read as a fresh
/// log; corruption is logged, never fatal.
pub fn load(kv: &dyn KvStore, exam_id: &str) -> ProgressLog {
    let raw = match kv.get(&progress_key(exam_id)) {
        Some(raw) => raw,
        None => return ProgressLog::default(),
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("ignoring corrupt progress log for {}: {}", exam_id, e);
        ProgressLog::default()
    })
}

/// Appends one attempt and refreshes the aggregates. This is the only
/// mutation performed on persisted progress.
pub fn record_attempt(
    kv: &dyn KvStore,
    exam_id: &str,
    outcome: &SessionOutcome,
) -> Result<ProgressLog> {
    let mut log = load(kv, exam_id);
    log.attempts.push(AttemptRecord {
        date: Utc::now(),
        score: outcome.score,
        passed: outcome.passed,
        time_spent: outcome.time_spent_minutes,
    });
    log.best_score = log.best_score.max(outcome.score);
    if outcome.passed {
        log.total_passed += 1;
    }
    let raw = serde_json::to_string(&log)?;
    kv.set(&progress_key(exam_id), &raw)?;
    Ok(log)
}

/// Explicit full reset of one exam's history.
pub fn clear(kv: &dyn KvStore, exam_id: &str) {
    kv.remove(&progress_key(exam_id));
}

/// All progress logs present in the store, keyed by exam id.
pub fn all_logs(kv: &dyn KvStore) -> BTreeMap<String, ProgressLog> {
    let mut logs = BTreeMap::new();
    for key in kv.keys() {
        if !key.ends_with(PROGRESS_KEY_SUFFIX) {
            continue;
        }
        let exam_id = key[..key.len() - PROGRESS_KEY_SUFFIX.len()].to_owned();
        if exam_id.is_empty() {
            continue;
        }
        let raw = match kv.get(&key) {
            Some(raw) => raw,
            None => continue,
        };
        match serde_json::from_str::<ProgressLog>(&raw) {
            Ok(log) => {
                logs.insert(exam_id, log);
            }
            Err(e) => warn!("skipping corrupt progress log {}: {}", key, e),
        }
    }
    logs
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OverallStats {
    pub total_attempts: usize,
    pub best_score: u32,
    pub total_passed: u32,
    pub pass_rate: u32,
}

/// Aggregate across every exam with recorded attempts.
pub fn overall_stats(kv: &dyn KvStore) -> OverallStats {
    let mut stats = OverallStats::default();
    for log in all_logs(kv).values() {
        stats.total_attempts += log.attempts.len();
        stats.best_score = stats.best_score.max(log.best_score);
        stats.total_passed += log.total_passed;
    }
    if stats.total_attempts > 0 {
        stats.pass_rate = ((stats.total_passed as f64 / stats.total_attempts as f64) * 100.0)
            .round() as u32;
    }
    stats
}

#[derive(Serialize)]
struct ProgressExport {
    #[serde(rename = "exportDate")]
    export_date: DateTime<Utc>,
    version: &'static str,
    exams: BTreeMap<String, ProgressLog>,
}

/// Serializes every progress log for download. Returns the suggested
/// filename and the pretty-printed body; errors when there is nothing to
/// export.
pub fn export_all(kv: &dyn KvStore) -> Result<(String, String)> {
    let exams = all_logs(kv);
    if exams.is_empty() {
        return Err(anyhow!("no progress data to export"));
    }
    let now = Utc::now();
    let export = ProgressExport {
        export_date: now,
        version: EXPORT_VERSION,
        exams,
    };
    let filename = format!("exam-progress-{}.json", now.format("%Y-%m-%d"));
    Ok((filename, serde_json::to_string_pretty(&export)?))
}
