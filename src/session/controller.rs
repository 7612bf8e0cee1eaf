use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use tokio::{sync::Mutex, task::JoinHandle, time};
use uuid::Uuid;

use crate::{
    events::{AppEvent, EventBus},
    history::{paper::append_paper, PaperHistoryEntry},
    storage::Storage,
};

use super::{
    question::Question,
    setup::TestSetup,
    state::{SessionSnapshot, SessionState, SessionStatus, TimerMode},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Owns the single active test session and the one-second ticker that
/// drives its clocks.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<Option<SessionState>>>,
    storage: Storage,
    events: EventBus,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u64,
    hint_every_secs: u64,
}

impl SessionController {
    pub fn new(storage: Storage, events: EventBus, heartbeat_every_secs: u64) -> Self {
        let debug_mode = std::env::var("TESTARENA_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            state: Arc::new(Mutex::new(None)),
            storage,
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: if debug_mode { 1 } else { heartbeat_every_secs.max(1) },
            hint_every_secs: heartbeat_every_secs.max(1),
        }
    }

    /// Shortens the clock's second; used to run sessions faster in tests.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.state.lock().await.as_ref().map(SessionState::snapshot)
    }

    pub async fn start_test(&self, setup: TestSetup) -> Result<SessionSnapshot> {
        let id = Uuid::new_v4().to_string();
        let state = SessionState::begin(id, setup, Utc::now())?;
        self.install(state).await
    }

    /// Starts an untimed practice run over `questions`.
    pub async fn start_practice(&self, setup: TestSetup, questions: Vec<Question>) -> Result<SessionSnapshot> {
        let id = Uuid::new_v4().to_string();
        let state = SessionState::practice(id, setup, questions, Utc::now())?;
        self.install(state).await
    }

    async fn install(&self, session: SessionState) -> Result<SessionSnapshot> {
        let snapshot = {
            let mut guard = self.state.lock().await;
            if let Some(active) = guard.as_ref() {
                if active.status != SessionStatus::Submitted {
                    bail!("A test session is already in progress");
                }
            }
            log_info!(
                "starting {:?} session {} with {} questions",
                session.mode,
                session.id,
                session.slots.len()
            );
            let snapshot = session.snapshot();
            *guard = Some(session);
            snapshot
        };

        self.spawn_ticker().await;
        self.events.emit(AppEvent::SessionStateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn select_option(&self, option: &str) -> Result<SessionSnapshot> {
        self.mutate(|session| session.select(option)).await
    }

    pub async fn navigate(&self, delta: i64) -> Result<SessionSnapshot> {
        self.mutate(|session| session.navigate(delta)).await
    }

    pub async fn jump_to(&self, index: usize) -> Result<SessionSnapshot> {
        self.mutate(|session| session.jump_to(index)).await
    }

    pub async fn add_question(&self) -> Result<SessionSnapshot> {
        self.mutate(SessionState::add_question).await
    }

    pub async fn open_submit_panel(&self) -> Result<SessionSnapshot> {
        self.mutate(SessionState::open_submit_panel).await
    }

    pub async fn back(&self) -> Result<SessionSnapshot> {
        self.mutate(SessionState::back).await
    }

    async fn mutate<F>(&self, op: F) -> Result<SessionSnapshot>
    where
        F: FnOnce(&mut SessionState) -> Result<()>,
    {
        let snapshot = {
            let mut guard = self.state.lock().await;
            let session = guard.as_mut().ok_or_else(|| anyhow!("No active test session"))?;
            op(session)?;
            session.snapshot()
        };
        self.events.emit(AppEvent::SessionStateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Finalises the pending submission. Timed papers are appended to the
    /// history before the session is marked submitted; if that write fails
    /// the session stays pending.
    pub async fn confirm_submit(&self) -> Result<PaperHistoryEntry> {
        let (paper, snapshot) = {
            let mut guard = self.state.lock().await;
            let session = guard.as_mut().ok_or_else(|| anyhow!("No active test session"))?;
            let SessionStatus::SubmitPending { .. } = session.status else {
                bail!("Open the submit panel before submitting");
            };

            let paper = PaperHistoryEntry::from_session(session, Utc::now());
            if session.mode == TimerMode::Countdown {
                append_paper(&self.storage, paper.clone()).await?;
            }
            session.mark_submitted()?;
            (paper, session.snapshot())
        };

        self.cancel_ticker().await;
        log_info!(
            "session {} submitted: {}/{} attempted",
            paper.id,
            snapshot.attempted,
            snapshot.question_count
        );

        self.events.emit(AppEvent::SessionStateChanged(snapshot));
        self.events.emit(AppEvent::SessionSubmitted(paper.clone()));
        Ok(paper)
    }

    /// Drops the active session without recording anything.
    pub async fn cancel(&self) -> Result<()> {
        let cancelled = self.state.lock().await.take();
        let Some(session) = cancelled else {
            bail!("No active test session");
        };
        self.cancel_ticker().await;
        log_info!("session {} cancelled", session.id);
        Ok(())
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;
        let heartbeat_every = self.heartbeat_every_ticks;
        let hint_every = self.hint_every_secs;

        let handle = tokio::spawn(async move {
            // The first tick lands one interval after start, not immediately.
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            let mut ticks: u64 = 0;

            loop {
                interval.tick().await;

                let (outcome, snapshot) = {
                    let mut guard = state.lock().await;
                    let Some(session) = guard.as_mut() else {
                        break;
                    };
                    if session.status == SessionStatus::Submitted {
                        break;
                    }
                    let outcome = session.tick(hint_every);
                    (outcome, session.snapshot())
                };

                if let Some(hint) = outcome.hint {
                    events.emit(AppEvent::QuestionTimeHint {
                        session_id: snapshot.session_id.clone(),
                        question_index: hint.question_index,
                        elapsed_secs: hint.elapsed_secs,
                        over_limit: hint.over_limit,
                    });
                }

                if outcome.forced_submit {
                    log_info!("session {} ran out of time", snapshot.session_id);
                    events.emit(AppEvent::SessionStateChanged(snapshot));
                    break;
                }

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    events.emit(AppEvent::SessionHeartbeat(snapshot));
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    log_error!("session ticker failed: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::Database, history::list_history};

    fn controller() -> SessionController {
        let storage = Storage::new(Database::in_memory().unwrap());
        SessionController::new(storage, EventBus::new(), 30).with_tick_interval(Duration::from_millis(10))
    }

    fn setup(per_question_secs: u64) -> TestSetup {
        TestSetup {
            exam: "NEET".into(),
            subject: "Physics".into(),
            chapter: "Waves".into(),
            chapter_number: 6,
            first_q: 1,
            last_q: 3,
            per_question_secs,
            total_secs: 3 * per_question_secs,
        }
    }

    #[tokio::test]
    async fn only_one_session_at_a_time() {
        let controller = controller();
        controller.start_test(setup(60)).await.unwrap();
        assert!(controller.start_test(setup(60)).await.is_err());
        controller.cancel().await.unwrap();
        assert!(controller.snapshot().await.is_none());
        controller.start_test(setup(60)).await.unwrap();
    }

    #[tokio::test]
    async fn submit_appends_history() {
        let controller = controller();
        controller.start_test(setup(60)).await.unwrap();
        controller.select_option("B").await.unwrap();
        controller.navigate(1).await.unwrap();
        controller.select_option("D").await.unwrap();

        assert!(controller.confirm_submit().await.is_err());
        controller.open_submit_panel().await.unwrap();
        let paper = controller.confirm_submit().await.unwrap();
        assert_eq!(paper.answers, vec!["B", "D", ""]);
        assert_eq!(paper.question_ids, vec!["6.1", "6.2", "6.3"]);

        let history = list_history(&controller.storage).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, paper.id);
        assert!(controller.select_option("A").await.is_err());
    }

    #[tokio::test]
    async fn ticker_forces_submit_when_budget_runs_out() {
        let controller = controller();
        let mut events = controller.events.subscribe();
        controller.start_test(setup(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::SubmitPending { forced: true });
        assert_eq!(snapshot.remaining_secs, 0);
        assert!(controller.back().await.is_err());

        let mut saw_forced = false;
        while let Ok(event) = events.try_recv() {
            if let AppEvent::SessionStateChanged(state) = event {
                saw_forced |= state.status == SessionStatus::SubmitPending { forced: true };
            }
        }
        assert!(saw_forced);

        controller.confirm_submit().await.unwrap();
    }

    #[tokio::test]
    async fn practice_runs_are_not_recorded() {
        let controller = controller();
        let questions = vec![Question::new("bm-1", 1, "Question 1.1")];
        controller.start_practice(setup(60), questions).await.unwrap();
        controller.select_option("A").await.unwrap();
        controller.open_submit_panel().await.unwrap();
        let paper = controller.confirm_submit().await.unwrap();
        assert_eq!(paper.question_ids, vec!["bm-1"]);
        assert!(list_history(&controller.storage).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hints_keep_their_cadence_when_heartbeats_run_every_tick() {
        let mut controller = controller();
        controller.heartbeat_every_ticks = 1;
        controller.hint_every_secs = 3;
        let mut events = controller.events.subscribe();
        controller.start_test(setup(600)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        controller.cancel().await.unwrap();

        let (mut heartbeats, mut hints) = (0, 0);
        while let Ok(event) = events.try_recv() {
            match event {
                AppEvent::SessionHeartbeat(_) => heartbeats += 1,
                AppEvent::QuestionTimeHint { elapsed_secs, .. } => {
                    assert_eq!(elapsed_secs % 3, 0);
                    hints += 1;
                }
                _ => {}
            }
        }
        assert!(heartbeats >= 3);
        assert!(hints <= heartbeats / 3);
    }
}
