use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    history::PaperHistoryEntry,
    productivity::{PomodoroSession, PomodoroSnapshot},
    session::SessionSnapshot,
};

const EVENT_CAPACITY: usize = 256;

/// Everything the core pushes to the UI shell without being asked.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum AppEvent {
    SessionStateChanged(SessionSnapshot),
    SessionHeartbeat(SessionSnapshot),
    #[serde(rename_all = "camelCase")]
    QuestionTimeHint {
        session_id: String,
        question_index: usize,
        elapsed_secs: u64,
        over_limit: bool,
    },
    SessionSubmitted(PaperHistoryEntry),
    PomodoroStateChanged(PomodoroSnapshot),
    #[serde(rename_all = "camelCase")]
    PomodoroNotification {
        task_id: String,
        task_title: String,
        remaining_secs: u64,
    },
    PomodoroCompleted(PomodoroSession),
    #[serde(rename_all = "camelCase")]
    LevelUp { level: u32 },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Fire and forget; having no listener is not an error.
    pub fn emit(&self, event: AppEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
