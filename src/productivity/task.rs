use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_ESTIMATED_MINUTES: u32 = 30;
pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    #[default]
    Permanent,
    /// Completion is cleared at the first start of each day.
    Daily,
    /// Completion is cleared at the first start of each week (Sunday).
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn xp(self) -> u64 {
        match self {
            Difficulty::Easy => 25,
            Difficulty::Medium => 50,
            Difficulty::Hard => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_awarded: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductivityTask {
    /// Focus length for a pomodoro on this task.
    pub fn focus_secs(&self) -> u64 {
        match self.estimated_time {
            Some(minutes) if minutes > 0 => u64::from(minutes) * 60,
            _ => 25 * 60,
        }
    }

    pub fn clear_completion(&mut self) {
        self.completed = false;
        self.completed_at = None;
        self.xp_awarded = None;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub priority: Priority,
    pub difficulty: Difficulty,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub estimated_time: Option<u32>,
    pub reminder_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskFilter {
    /// Everything not yet completed.
    #[default]
    #[serde(alias = "all")]
    Pending,
    Permanent,
    Daily,
    Weekly,
    Completed,
}

impl TaskFilter {
    pub fn admits(self, task: &ProductivityTask) -> bool {
        match self {
            TaskFilter::Pending => !task.completed,
            TaskFilter::Permanent => task.kind == TaskKind::Permanent,
            TaskFilter::Daily => task.kind == TaskKind::Daily,
            TaskFilter::Weekly => task.kind == TaskKind::Weekly,
            TaskFilter::Completed => task.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_tasks_round_trip_unknown_fields() {
        let raw = r#"{"id":"1700000000000","title":"Revise optics","type":"daily","priority":"high","difficulty":"hard","estimatedTime":45,"completed":false,"tags":["physics"],"streak":2,"notificationId":"n-1"}"#;
        let task: ProductivityTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.kind, TaskKind::Daily);
        assert_eq!(task.difficulty.xp(), 100);
        assert_eq!(task.focus_secs(), 45 * 60);
        assert_eq!(task.extra.get("notificationId"), Some(&Value::from("n-1")));

        let encoded = serde_json::to_string(&task).unwrap();
        assert!(encoded.contains(r#""type":"daily""#));
        assert!(encoded.contains(r#""notificationId":"n-1""#));
    }

    #[test]
    fn focus_defaults_to_twenty_five_minutes() {
        let task: ProductivityTask = serde_json::from_str(r#"{"id":"t","title":"x"}"#).unwrap();
        assert_eq!(task.focus_secs(), 1500);
        assert!(TaskFilter::Pending.admits(&task));
        assert!(!TaskFilter::Completed.admits(&task));
    }
}
