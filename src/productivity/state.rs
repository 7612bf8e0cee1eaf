use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::KvWrite,
    history::paper::iso_timestamp,
    storage::{gateway::decode_or_default, Storage, StorageKey},
};

use super::{
    gamification::GamificationState,
    pomodoro::PomodoroSession,
    task::{NewTask, ProductivityTask, TaskFilter, TaskKind, DEFAULT_CATEGORY, DEFAULT_ESTIMATED_MINUTES},
};

pub const DEFAULT_DAILY_GOAL: u32 = 5;
const LAST_ACTIVE_DAY_FORMAT: &str = "%Y-%m-%d";

/// Day key in the `Wed Oct 17 2026` form the reset markers are stored in.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%a %b %d %Y").to_string()
}

pub fn week_key(day: NaiveDate) -> String {
    let start = day - Duration::days(i64::from(day.weekday().num_days_from_sunday()));
    day_key(start)
}

fn local_day(stamp: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(stamp)
        .ok()
        .map(|at| at.with_timezone(&Local).date_naive())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub task: Option<ProductivityTask>,
    pub xp_gained: u64,
    pub xp_lost: u64,
    pub levels_gained: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    /// New `lastDailyReset` value when daily tasks were reset.
    pub daily_key: Option<String>,
    pub weekly_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_tasks: usize,
    pub completed_today: usize,
    pub completed_this_week: usize,
    pub productivity_score: u32,
    pub focus_time_secs: u64,
    pub streak_days: u32,
    /// Mean estimate (minutes) of completed tasks.
    pub average_completion_time: f64,
}

/// Everything the tracker screen edits, loaded once and written back
/// through the auto-saver.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductivityState {
    pub tasks: Vec<ProductivityTask>,
    pub sessions: Vec<PomodoroSession>,
    pub gamification: GamificationState,
    pub daily_goal: u32,
}

impl Default for ProductivityState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            sessions: Vec::new(),
            gamification: GamificationState::default(),
            daily_goal: DEFAULT_DAILY_GOAL,
        }
    }
}

impl ProductivityState {
    pub async fn load(storage: &Storage) -> Result<Self> {
        let keys = [
            StorageKey::ProductivityTasks,
            StorageKey::PomodoroSessions,
            StorageKey::Xp,
            StorageKey::Level,
            StorageKey::Streak,
            StorageKey::XpHistory,
            StorageKey::DailyGoal,
            StorageKey::LastActiveDay,
        ];
        let raw = storage
            .database()
            .get_many_raw(keys.iter().map(|key| key.as_str().to_string()).collect())
            .await?;
        let value = |key: StorageKey| {
            raw.iter()
                .find(|(name, _)| name == key.as_str())
                .and_then(|(_, value)| value.clone())
        };

        let level: u32 = decode_or_default(StorageKey::Level, value(StorageKey::Level).as_deref());
        let daily_goal: u32 = decode_or_default(StorageKey::DailyGoal, value(StorageKey::DailyGoal).as_deref());
        let last_active_day = value(StorageKey::LastActiveDay)
            .and_then(|day| NaiveDate::parse_from_str(day.trim(), LAST_ACTIVE_DAY_FORMAT).ok());

        Ok(Self {
            tasks: decode_or_default(
                StorageKey::ProductivityTasks,
                value(StorageKey::ProductivityTasks).as_deref(),
            ),
            sessions: decode_or_default(
                StorageKey::PomodoroSessions,
                value(StorageKey::PomodoroSessions).as_deref(),
            ),
            gamification: GamificationState {
                xp: decode_or_default(StorageKey::Xp, value(StorageKey::Xp).as_deref()),
                level: level.max(1),
                streak: decode_or_default(StorageKey::Streak, value(StorageKey::Streak).as_deref()),
                xp_history: decode_or_default(StorageKey::XpHistory, value(StorageKey::XpHistory).as_deref()),
                last_active_day,
            },
            daily_goal: if daily_goal == 0 { DEFAULT_DAILY_GOAL } else { daily_goal },
        })
    }

    /// Whole-value writes for every key this state owns.
    pub fn persist_writes(&self) -> Result<Vec<KvWrite>> {
        let game = &self.gamification;
        let mut writes = vec![
            KvWrite::set(StorageKey::ProductivityTasks.as_str(), serde_json::to_string(&self.tasks)?),
            KvWrite::set(StorageKey::PomodoroSessions.as_str(), serde_json::to_string(&self.sessions)?),
            KvWrite::set(StorageKey::Xp.as_str(), game.xp.to_string()),
            KvWrite::set(StorageKey::Level.as_str(), game.level.to_string()),
            KvWrite::set(StorageKey::Streak.as_str(), game.streak.to_string()),
            KvWrite::set(StorageKey::XpHistory.as_str(), serde_json::to_string(&game.xp_history)?),
            KvWrite::set(StorageKey::DailyGoal.as_str(), self.daily_goal.to_string()),
        ];
        if let Some(day) = game.last_active_day {
            writes.push(KvWrite::set(
                StorageKey::LastActiveDay.as_str(),
                day.format(LAST_ACTIVE_DAY_FORMAT).to_string(),
            ));
        }
        Ok(writes)
    }

    pub fn task(&self, id: &str) -> Option<&ProductivityTask> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn filtered_tasks(&self, filter: TaskFilter) -> Vec<ProductivityTask> {
        self.tasks
            .iter()
            .filter(|task| filter.admits(task))
            .cloned()
            .collect()
    }

    pub fn add_task(&mut self, new: NewTask) -> Result<ProductivityTask> {
        let title = new.title.trim();
        if title.is_empty() {
            bail!("Please enter a task title");
        }

        let subject = new
            .subject
            .filter(|subject| !subject.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let topic = new
            .topic
            .filter(|topic| !topic.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let task = ProductivityTask {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: new.description.trim().to_string(),
            kind: new.kind,
            priority: new.priority,
            difficulty: new.difficulty,
            tags: vec![subject.to_lowercase()],
            subject: Some(subject),
            topic: Some(topic),
            estimated_time: Some(
                new.estimated_time
                    .filter(|minutes| *minutes > 0)
                    .unwrap_or(DEFAULT_ESTIMATED_MINUTES),
            ),
            reminder_time: new.reminder_time,
            completed: false,
            completed_at: None,
            streak: 0,
            last_completed: None,
            xp_awarded: None,
            extra: Default::default(),
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Completes or reopens a task, moving its difficulty XP accordingly.
    pub fn toggle_task(&mut self, id: &str, now: DateTime<Local>) -> Result<ToggleOutcome> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("No task with id {id}"))?;

        let mut outcome = ToggleOutcome::default();
        if task.completed {
            let awarded = task.xp_awarded.unwrap_or(0);
            task.clear_completion();
            outcome.xp_lost = awarded;
            outcome.task = Some(task.clone());
            if awarded > 0 {
                self.gamification.lose(awarded);
            }
        } else {
            let gained = task.difficulty.xp();
            let stamp = iso_timestamp(now.with_timezone(&Utc));
            task.completed = true;
            task.completed_at = Some(stamp.clone());
            task.last_completed = Some(stamp);
            task.streak += 1;
            task.xp_awarded = Some(gained);
            outcome.task = Some(task.clone());
            outcome.xp_gained = gained;
            outcome.levels_gained = self.gamification.gain(gained, now.date_naive());
        }
        Ok(outcome)
    }

    /// Removes a task and its sessions, taking back any XP it awarded.
    pub fn remove_task(&mut self, id: &str) -> Result<(ProductivityTask, u64)> {
        let position = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| anyhow!("No task with id {id}"))?;
        let task = self.tasks.remove(position);

        let refund = if task.completed { task.xp_awarded.unwrap_or(0) } else { 0 };
        if refund > 0 {
            self.gamification.lose(refund);
        }
        self.sessions.retain(|session| session.task_id != id);
        Ok((task, refund))
    }

    pub fn set_daily_goal(&mut self, goal: u32) -> Result<()> {
        if goal == 0 {
            bail!("Daily goal must be at least one task");
        }
        self.daily_goal = goal;
        Ok(())
    }

    /// Clears completion of daily tasks on a new day and weekly tasks in a
    /// new week, given the stored reset markers.
    pub fn apply_resets(
        &mut self,
        today: NaiveDate,
        last_daily: Option<&str>,
        last_weekly: Option<&str>,
    ) -> ResetOutcome {
        let mut outcome = ResetOutcome::default();

        let daily = day_key(today);
        if last_daily != Some(daily.as_str()) {
            self.clear_kind(TaskKind::Daily);
            outcome.daily_key = Some(daily);
        }

        let weekly = week_key(today);
        if last_weekly != Some(weekly.as_str()) {
            self.clear_kind(TaskKind::Weekly);
            outcome.weekly_key = Some(weekly);
        }

        outcome
    }

    fn clear_kind(&mut self, kind: TaskKind) {
        self.tasks
            .iter_mut()
            .filter(|task| task.kind == kind)
            .for_each(ProductivityTask::clear_completion);
    }

    pub fn statistics(&self, now: DateTime<Local>) -> Statistics {
        let today = now.date_naive();
        let week_ago = now - Duration::days(7);
        let completed: Vec<&ProductivityTask> = self.tasks.iter().filter(|task| task.completed).collect();

        let completed_today = completed
            .iter()
            .filter(|task| task.completed_at.as_deref().and_then(local_day) == Some(today))
            .count();
        let completed_this_week = completed
            .iter()
            .filter(|task| {
                task.completed_at
                    .as_deref()
                    .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
                    .is_some_and(|at| at.with_timezone(&Local) >= week_ago)
            })
            .count();

        let focus_time_secs: u64 = self
            .sessions
            .iter()
            .filter(|session| session.kind == super::pomodoro::SessionKind::Work)
            .map(PomodoroSession::focus_secs)
            .sum();

        let average_completion_time = if completed.is_empty() {
            0.0
        } else {
            let total: u32 = completed
                .iter()
                .map(|task| task.estimated_time.unwrap_or(DEFAULT_ESTIMATED_MINUTES))
                .sum();
            f64::from(total) / completed.len() as f64
        };

        let game = &self.gamification;
        let raw_score = completed_today as f64 / f64::from(self.daily_goal.max(1)) * 100.0
            + f64::from(game.streak) * 2.0
            + f64::from(game.level) * 5.0
            + focus_time_secs as f64 / 600.0;

        Statistics {
            total_tasks: self.tasks.len(),
            completed_today,
            completed_this_week,
            productivity_score: raw_score.round().min(100.0) as u32,
            focus_time_secs,
            streak_days: game.streak,
            average_completion_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        productivity::task::Difficulty,
    };
    use chrono::TimeZone;

    fn new_task(title: &str, kind: TaskKind, difficulty: Difficulty) -> NewTask {
        NewTask {
            title: title.into(),
            kind,
            difficulty,
            ..NewTask::default()
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn add_task_requires_title_and_fills_defaults() {
        let mut state = ProductivityState::default();
        assert!(state.add_task(new_task("   ", TaskKind::Daily, Difficulty::Easy)).is_err());

        let task = state.add_task(new_task(" Revise ", TaskKind::Daily, Difficulty::Easy)).unwrap();
        assert_eq!(task.title, "Revise");
        assert_eq!(task.subject.as_deref(), Some("General"));
        assert_eq!(task.tags, vec!["general"]);
        assert_eq!(task.estimated_time, Some(30));
    }

    #[test]
    fn toggling_awards_and_refunds_xp() {
        let mut state = ProductivityState::default();
        let task = state.add_task(new_task("Hard one", TaskKind::Permanent, Difficulty::Hard)).unwrap();

        let done = state.toggle_task(&task.id, at(2025, 3, 4)).unwrap();
        assert_eq!(done.xp_gained, 100);
        assert_eq!(state.gamification.xp, 100);
        assert_eq!(state.gamification.streak, 1);
        assert_eq!(state.tasks[0].streak, 1);

        let undone = state.toggle_task(&task.id, at(2025, 3, 4)).unwrap();
        assert_eq!(undone.xp_lost, 100);
        assert_eq!(state.gamification.xp, 0);
        assert!(state.tasks[0].xp_awarded.is_none());
        assert!(state.toggle_task("missing", at(2025, 3, 4)).is_err());
    }

    #[test]
    fn removing_completed_task_refunds_and_drops_sessions() {
        let mut state = ProductivityState::default();
        let task = state.add_task(new_task("Medium", TaskKind::Permanent, Difficulty::Medium)).unwrap();
        state.toggle_task(&task.id, at(2025, 3, 4)).unwrap();
        state.sessions.push(PomodoroSession {
            id: "s".into(),
            task_id: task.id.clone(),
            duration: 25,
            actual_duration: Some(1500),
            start_time: None,
            completed_at: String::new(),
            kind: Default::default(),
        });

        let (_, refund) = state.remove_task(&task.id).unwrap();
        assert_eq!(refund, 50);
        assert_eq!(state.gamification.xp, 0);
        assert!(state.sessions.is_empty());
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn resets_clear_only_their_kind() {
        let mut state = ProductivityState::default();
        let today = at(2025, 3, 5);
        for kind in [TaskKind::Daily, TaskKind::Weekly, TaskKind::Permanent] {
            let task = state.add_task(new_task("t", kind, Difficulty::Easy)).unwrap();
            state.toggle_task(&task.id, today).unwrap();
        }

        let day = today.date_naive();
        let outcome = state.apply_resets(day, Some(&day_key(day)), Some("Sun Jan 01 2023"));
        assert!(outcome.daily_key.is_none());
        assert_eq!(outcome.weekly_key.as_deref(), Some("Sun Mar 02 2025"));
        assert!(state.tasks[0].completed);
        assert!(!state.tasks[1].completed);
        assert!(state.tasks[2].completed);

        let next = state.apply_resets(day.succ_opt().unwrap(), Some(&day_key(day)), Some("Sun Mar 02 2025"));
        assert_eq!(next.daily_key.as_deref(), Some("Thu Mar 06 2025"));
        assert!(next.weekly_key.is_none());
        assert!(!state.tasks[0].completed);
    }

    #[test]
    fn statistics_follow_score_formula() {
        let mut state = ProductivityState::default();
        let now = Local::now();
        let task = state.add_task(new_task("t", TaskKind::Permanent, Difficulty::Easy)).unwrap();
        state.toggle_task(&task.id, now).unwrap();
        state.sessions.push(PomodoroSession {
            id: "s".into(),
            task_id: task.id.clone(),
            duration: 10,
            actual_duration: None,
            start_time: None,
            completed_at: String::new(),
            kind: Default::default(),
        });

        let stats = state.statistics(now);
        assert_eq!(stats.completed_today, 1);
        assert_eq!(stats.completed_this_week, 1);
        assert_eq!(stats.focus_time_secs, 600);
        assert_eq!(stats.average_completion_time, 30.0);
        // 1/5 * 100 + 1 * 2 + 1 * 5 + 600 / 600
        assert_eq!(stats.productivity_score, 28);
    }

    #[tokio::test]
    async fn state_round_trips_through_storage() {
        let storage = Storage::new(Database::in_memory().unwrap());
        let mut state = ProductivityState::default();
        let task = state.add_task(new_task("t", TaskKind::Weekly, Difficulty::Medium)).unwrap();
        state.toggle_task(&task.id, at(2025, 3, 4)).unwrap();
        state.set_daily_goal(3).unwrap();

        storage.apply(state.persist_writes().unwrap()).await.unwrap();
        assert_eq!(storage.read_text(StorageKey::Xp).await.unwrap().as_deref(), Some("50"));

        let loaded = ProductivityState::load(&storage).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn empty_storage_loads_defaults() {
        let storage = Storage::new(Database::in_memory().unwrap());
        let loaded = ProductivityState::load(&storage).await.unwrap();
        assert_eq!(loaded.gamification.level, 1);
        assert_eq!(loaded.daily_goal, DEFAULT_DAILY_GOAL);
    }
}
