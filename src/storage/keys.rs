use serde::{Deserialize, Serialize};

/// Every key the app persists. The string forms match the keys already on
/// users' devices, including the `@` prefix on the older entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageKey {
    PaperHistory,
    CorrectAnswers,
    Bookmarks,
    LastScore,
    SelectedExam,
    ActivePomodoro,
    Xp,
    Level,
    Streak,
    XpHistory,
    DailyGoal,
    ProductivityTasks,
    PomodoroSessions,
    LastDailyReset,
    LastWeeklyReset,
    LastActiveDay,
}

impl StorageKey {
    pub const ALL: [StorageKey; 16] = [
        StorageKey::PaperHistory,
        StorageKey::CorrectAnswers,
        StorageKey::Bookmarks,
        StorageKey::LastScore,
        StorageKey::SelectedExam,
        StorageKey::ActivePomodoro,
        StorageKey::Xp,
        StorageKey::Level,
        StorageKey::Streak,
        StorageKey::XpHistory,
        StorageKey::DailyGoal,
        StorageKey::ProductivityTasks,
        StorageKey::PomodoroSessions,
        StorageKey::LastDailyReset,
        StorageKey::LastWeeklyReset,
        StorageKey::LastActiveDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::PaperHistory => "@paperHistory",
            StorageKey::CorrectAnswers => "@correctAnswers",
            StorageKey::Bookmarks => "@bookmarks",
            StorageKey::LastScore => "@lastScore",
            StorageKey::SelectedExam => "@selectedExam1",
            StorageKey::ActivePomodoro => "@activePomodoro",
            StorageKey::Xp => "xp",
            StorageKey::Level => "level",
            StorageKey::Streak => "streak",
            StorageKey::XpHistory => "xpHistory",
            StorageKey::DailyGoal => "dailyGoal",
            StorageKey::ProductivityTasks => "productivityTasks",
            StorageKey::PomodoroSessions => "pomodoroSessions",
            StorageKey::LastDailyReset => "lastDailyReset",
            StorageKey::LastWeeklyReset => "lastWeeklyReset",
            StorageKey::LastActiveDay => "lastActiveDay",
        }
    }

    pub fn parse(value: &str) -> Option<StorageKey> {
        StorageKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_strings_are_unique_and_reversible() {
        for key in StorageKey::ALL {
            assert_eq!(StorageKey::parse(key.as_str()), Some(key));
        }
        let mut names: Vec<_> = StorageKey::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), StorageKey::ALL.len());
    }
}
