use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Local, Utc};
use tokio::{sync::Mutex, task::JoinHandle, time};
use uuid::Uuid;

use crate::{
    events::{AppEvent, EventBus},
    history::paper::iso_timestamp,
    storage::{AutoSaver, Storage, StorageKey},
};

use super::{
    gamification::GamificationState,
    pomodoro::{session_xp, ActivePomodoro, PomodoroRun, PomodoroSession, PomodoroSnapshot, SessionKind, NOTIFY_EVERY_SECS},
    state::{ProductivityState, Statistics, ToggleOutcome},
    task::{NewTask, ProductivityTask, TaskFilter},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Tasks, XP and the focus timer. State lives in memory; every change is
/// handed to the auto-saver, which writes it back after a quiet period.
#[derive(Clone)]
pub struct ProductivityController {
    state: Arc<Mutex<ProductivityState>>,
    pomodoro: Arc<Mutex<Option<PomodoroRun>>>,
    storage: Storage,
    events: EventBus,
    autosaver: Arc<AutoSaver>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl ProductivityController {
    /// Loads persisted state and starts the auto-saver. Must run inside the
    /// tokio runtime.
    pub async fn load(storage: Storage, events: EventBus, autosave_delay: Duration) -> Result<Self> {
        let state = ProductivityState::load(&storage).await?;
        let autosaver = AutoSaver::spawn(storage.database().clone(), autosave_delay);

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            pomodoro: Arc::new(Mutex::new(None)),
            storage,
            events,
            autosaver: Arc::new(autosaver),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
        })
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Start-of-app housekeeping: period resets, then resuming a focus
    /// session that was running when the app last exited.
    pub async fn initialize(&self) -> Result<Option<PomodoroSnapshot>> {
        self.run_resets(Local::now()).await?;
        self.recover_pomodoro(Utc::now()).await
    }

    pub async fn run_resets(&self, now: DateTime<Local>) -> Result<()> {
        let last_daily = self.storage.read_text(StorageKey::LastDailyReset).await?;
        let last_weekly = self.storage.read_text(StorageKey::LastWeeklyReset).await?;

        let mut state = self.state.lock().await;
        let outcome = state.apply_resets(now.date_naive(), last_daily.as_deref(), last_weekly.as_deref());
        if let Some(key) = &outcome.daily_key {
            log_info!("daily tasks reset for {key}");
            self.storage.write_text(StorageKey::LastDailyReset, key.clone()).await?;
        }
        if let Some(key) = &outcome.weekly_key {
            log_info!("weekly tasks reset for week of {key}");
            self.storage.write_text(StorageKey::LastWeeklyReset, key.clone()).await?;
        }
        if outcome.daily_key.is_some() || outcome.weekly_key.is_some() {
            self.schedule_save(&state);
        }
        Ok(())
    }

    pub async fn tasks(&self, filter: TaskFilter) -> Vec<ProductivityTask> {
        self.state.lock().await.filtered_tasks(filter)
    }

    pub async fn gamification(&self) -> GamificationState {
        self.state.lock().await.gamification.clone()
    }

    pub async fn daily_goal(&self) -> u32 {
        self.state.lock().await.daily_goal
    }

    pub async fn sessions(&self) -> Vec<PomodoroSession> {
        self.state.lock().await.sessions.clone()
    }

    pub async fn statistics(&self) -> Statistics {
        self.state.lock().await.statistics(Local::now())
    }

    pub async fn add_task(&self, new: NewTask) -> Result<ProductivityTask> {
        let mut state = self.state.lock().await;
        let task = state.add_task(new)?;
        self.schedule_save(&state);
        Ok(task)
    }

    pub async fn toggle_task(&self, id: &str) -> Result<ToggleOutcome> {
        let outcome = {
            let mut state = self.state.lock().await;
            let outcome = state.toggle_task(id, Local::now())?;
            self.schedule_save(&state);
            if outcome.levels_gained > 0 {
                self.events.emit(AppEvent::LevelUp {
                    level: state.gamification.level,
                });
            }
            outcome
        };
        Ok(outcome)
    }

    pub async fn remove_task(&self, id: &str) -> Result<ProductivityTask> {
        let running_for_task = self
            .pomodoro
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| run.task_id == id);
        if running_for_task {
            self.stop_pomodoro().await?;
        }

        let mut state = self.state.lock().await;
        let (task, refund) = state.remove_task(id)?;
        if refund > 0 {
            log_info!("removed completed task {}; took back {refund} XP", task.id);
        }
        self.schedule_save(&state);
        Ok(task)
    }

    pub async fn set_daily_goal(&self, goal: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        state.set_daily_goal(goal)?;
        self.schedule_save(&state);
        Ok(())
    }

    fn schedule_save(&self, state: &ProductivityState) {
        match state.persist_writes() {
            Ok(writes) => self.autosaver.schedule(writes),
            Err(err) => log_error!("failed to encode productivity state: {err:?}"),
        }
    }

    pub async fn pomodoro_snapshot(&self) -> PomodoroSnapshot {
        self.pomodoro
            .lock()
            .await
            .as_ref()
            .map(PomodoroRun::snapshot)
            .unwrap_or_default()
    }

    pub async fn start_pomodoro(&self, task_id: &str) -> Result<PomodoroSnapshot> {
        let task = self
            .state
            .lock()
            .await
            .task(task_id)
            .cloned()
            .ok_or_else(|| anyhow!("No task with id {task_id}"))?;

        let snapshot = {
            let mut guard = self.pomodoro.lock().await;
            if guard.is_some() {
                bail!("A focus session is already running");
            }

            let started_at = Utc::now();
            let duration_secs = task.focus_secs();
            let record = ActivePomodoro {
                task_id: task.id.clone(),
                start_time: iso_timestamp(started_at),
                duration: duration_secs,
            };
            self.storage.write_json(StorageKey::ActivePomodoro, &record).await?;

            let run = PomodoroRun {
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                started_at,
                duration_secs,
                remaining_secs: duration_secs,
            };
            let snapshot = run.snapshot();
            *guard = Some(run);
            snapshot
        };

        log_info!("focus session started for task {} ({}s)", task.id, snapshot.duration_secs);
        self.spawn_ticker().await;
        self.events.emit(AppEvent::PomodoroStateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn stop_pomodoro(&self) -> Result<()> {
        let stopped = self.pomodoro.lock().await.take();
        self.cancel_ticker().await;
        self.storage.remove(StorageKey::ActivePomodoro).await?;
        if let Some(run) = stopped {
            log_info!("focus session for task {} stopped after {}s", run.task_id, run.elapsed_secs());
        }
        self.events.emit(AppEvent::PomodoroStateChanged(PomodoroSnapshot::default()));
        Ok(())
    }

    /// Resumes a persisted run with whatever time it has left, or drops the
    /// record when it has already expired.
    pub async fn recover_pomodoro(&self, now: DateTime<Utc>) -> Result<Option<PomodoroSnapshot>> {
        let Some(record) = self
            .storage
            .read_json::<Option<ActivePomodoro>>(StorageKey::ActivePomodoro)
            .await?
        else {
            return Ok(None);
        };

        let started_at = DateTime::parse_from_rfc3339(&record.start_time)
            .map(|at| at.with_timezone(&Utc))
            .ok();
        let task = self.state.lock().await.task(&record.task_id).cloned();
        let (Some(started_at), Some(task)) = (started_at, task) else {
            log_warn!("dropping unusable active focus session record for task {}", record.task_id);
            self.storage.remove(StorageKey::ActivePomodoro).await?;
            return Ok(None);
        };

        let duration_secs = task.focus_secs();
        let elapsed = (now - started_at).num_seconds().max(0) as u64;
        if elapsed >= duration_secs {
            log_info!("focus session for task {} expired while closed", task.id);
            self.storage.remove(StorageKey::ActivePomodoro).await?;
            return Ok(None);
        }

        let run = PomodoroRun {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            started_at,
            duration_secs,
            remaining_secs: duration_secs - elapsed,
        };
        let snapshot = run.snapshot();
        *self.pomodoro.lock().await = Some(run);

        log_info!("resumed focus session for task {} with {}s left", task.id, snapshot.remaining_secs);
        self.spawn_ticker().await;
        self.events.emit(AppEvent::PomodoroStateChanged(snapshot.clone()));
        Ok(Some(snapshot))
    }

    async fn complete_pomodoro(&self, run: PomodoroRun) -> Result<PomodoroSession> {
        let actual_secs = run.elapsed_secs();
        let session = PomodoroSession {
            id: Uuid::new_v4().to_string(),
            task_id: run.task_id.clone(),
            duration: actual_secs / 60,
            actual_duration: Some(actual_secs),
            start_time: Some(iso_timestamp(run.started_at)),
            completed_at: iso_timestamp(Utc::now()),
            kind: SessionKind::Work,
        };

        {
            let mut state = self.state.lock().await;
            state.sessions.push(session.clone());
            let levels = state.gamification.gain(session_xp(actual_secs), Local::now().date_naive());
            self.schedule_save(&state);
            if levels > 0 {
                self.events.emit(AppEvent::LevelUp {
                    level: state.gamification.level,
                });
            }
        }

        self.storage.remove(StorageKey::ActivePomodoro).await?;
        log_info!("focus session for task {} completed ({}s)", run.task_id, actual_secs);
        self.events.emit(AppEvent::PomodoroCompleted(session.clone()));
        self.events.emit(AppEvent::PomodoroStateChanged(PomodoroSnapshot::default()));
        Ok(session)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);

            loop {
                interval.tick().await;

                let finished = {
                    let mut guard = controller.pomodoro.lock().await;
                    let Some(run) = guard.as_mut() else {
                        break;
                    };
                    run.remaining_secs = run.remaining_secs.saturating_sub(1);

                    if run.remaining_secs > 0 && run.remaining_secs % NOTIFY_EVERY_SECS == 0 {
                        controller.events.emit(AppEvent::PomodoroNotification {
                            task_id: run.task_id.clone(),
                            task_title: run.task_title.clone(),
                            remaining_secs: run.remaining_secs,
                        });
                    }

                    if run.remaining_secs == 0 {
                        guard.take()
                    } else {
                        None
                    }
                };

                if let Some(run) = finished {
                    // Detach rather than abort: this task is the ticker.
                    controller.ticker.lock().await.take();
                    if let Err(err) = controller.complete_pomodoro(run).await {
                        log_error!("failed to record completed focus session: {err:?}");
                    }
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    /// Writes out anything the auto-saver is still holding.
    pub async fn flush(&self) {
        self.autosaver.flush().await;
    }

    /// Halts the focus timer in memory and writes out pending state. The
    /// persisted `@activePomodoro` record is left alone so `reload` can pick
    /// it up again.
    pub async fn suspend(&self) {
        self.pomodoro.lock().await.take();
        self.cancel_ticker().await;
        self.autosaver.flush().await;
    }

    /// Re-reads everything from storage, e.g. after a restore or reset.
    pub async fn reload(&self) -> Result<Option<PomodoroSnapshot>> {
        self.suspend().await;
        let fresh = ProductivityState::load(&self.storage).await?;
        *self.state.lock().await = fresh;
        self.events.emit(AppEvent::PomodoroStateChanged(PomodoroSnapshot::default()));
        self.recover_pomodoro(Utc::now()).await
    }

    /// Stops the timer and flushes pending writes.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        self.autosaver.shutdown().await;
    }
}
