use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::lenient;

/// Remaining-time updates are pushed on multiples of this many seconds.
pub const NOTIFY_EVERY_SECS: u64 = 30;
pub const MAX_SESSION_XP: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    #[default]
    Work,
    Break,
}

/// A finished focus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: String,
    pub task_id: String,
    /// Whole minutes.
    #[serde(default, deserialize_with = "lenient::u64_from_any")]
    pub duration: u64,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub completed_at: String,
    #[serde(rename = "type", default)]
    pub kind: SessionKind,
}

impl PomodoroSession {
    pub fn focus_secs(&self) -> u64 {
        self.actual_duration.unwrap_or(self.duration * 60)
    }
}

/// XP for a completed session: two per whole minute, capped.
pub fn session_xp(actual_secs: u64) -> u64 {
    ((actual_secs / 60) * 2).min(MAX_SESSION_XP)
}

/// The `@activePomodoro` record that lets a run survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePomodoro {
    pub task_id: String,
    pub start_time: String,
    #[serde(default, deserialize_with = "lenient::u64_from_any")]
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomodoroRun {
    pub task_id: String,
    pub task_title: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub remaining_secs: u64,
}

impl PomodoroRun {
    pub fn elapsed_secs(&self) -> u64 {
        self.duration_secs.saturating_sub(self.remaining_secs)
    }

    pub fn snapshot(&self) -> PomodoroSnapshot {
        PomodoroSnapshot {
            active: true,
            task_id: Some(self.task_id.clone()),
            task_title: Some(self.task_title.clone()),
            started_at: Some(self.started_at),
            duration_secs: self.duration_secs,
            remaining_secs: self.remaining_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSnapshot {
    pub active: bool,
    pub task_id: Option<String>,
    pub task_title: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_secs: u64,
    pub remaining_secs: u64,
}
