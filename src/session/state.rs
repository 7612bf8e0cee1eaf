use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    question::{generate_questions, Question},
    setup::{TestSetup, MAX_QUESTIONS},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    /// Timed paper with a total budget and a forced submit at zero.
    #[default]
    Countdown,
    /// Untimed practice; only per-question stopwatches run.
    Stopwatch,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    SubmitPending { forced: bool },
    Submitted,
}

impl SessionStatus {
    fn clock_runs(self) -> bool {
        matches!(
            self,
            SessionStatus::Running | SessionStatus::SubmitPending { forced: false }
        )
    }
}

/// One question together with its answer and its accumulated time, so the
/// three ledgers can never drift apart in length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSlot {
    pub question: Question,
    /// Empty means unattempted.
    pub answer: String,
    pub time_secs: u64,
}

impl QuestionSlot {
    fn fresh(question: Question) -> Self {
        Self {
            question,
            answer: String::new(),
            time_secs: 0,
        }
    }

    pub fn attempted(&self) -> bool {
        !self.answer.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionHint {
    pub question_index: usize,
    pub elapsed_secs: u64,
    pub over_limit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub forced_submit: bool,
    pub hint: Option<QuestionHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub mode: TimerMode,
    pub status: SessionStatus,
    pub exam: String,
    pub subject: String,
    pub chapter: String,
    pub started_at: DateTime<Utc>,
    pub current_index: usize,
    pub current_question: Question,
    pub current_answer: String,
    pub question_count: usize,
    pub remaining_secs: u64,
    pub current_elapsed_secs: u64,
    pub per_question_limit_secs: u64,
    pub over_limit: bool,
    pub attempted: usize,
    pub unattempted: usize,
    pub can_go_back: bool,
    /// Attempted flag per question, in paper order.
    pub grid: Vec<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub id: String,
    pub mode: TimerMode,
    pub setup: TestSetup,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub slots: Vec<QuestionSlot>,
    pub current: usize,
    pub remaining_secs: u64,
}

impl SessionState {
    pub fn begin(id: String, setup: TestSetup, started_at: DateTime<Utc>) -> Result<Self> {
        setup.validate()?;
        let questions = generate_questions(setup.chapter_number, setup.first_q, setup.last_q);
        let remaining_secs = if setup.total_secs > 0 {
            setup.total_secs
        } else {
            questions.len() as u64 * setup.per_question_secs
        };
        Ok(Self::with_questions(id, TimerMode::Countdown, setup, questions, remaining_secs, started_at))
    }

    pub fn practice(
        id: String,
        setup: TestSetup,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        if questions.is_empty() {
            bail!("Select at least one question to practice");
        }
        Ok(Self::with_questions(
            id,
            TimerMode::Stopwatch,
            setup.normalized(),
            questions,
            0,
            started_at,
        ))
    }

    fn with_questions(
        id: String,
        mode: TimerMode,
        setup: TestSetup,
        questions: Vec<Question>,
        remaining_secs: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            mode,
            setup,
            status: SessionStatus::Running,
            started_at,
            slots: questions.into_iter().map(QuestionSlot::fresh).collect(),
            current: 0,
            remaining_secs,
        }
    }

    /// Advances both clocks by one second.
    pub fn tick(&mut self, hint_every_secs: u64) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if !self.status.clock_runs() {
            return outcome;
        }

        let limit = self.setup.per_question_secs;
        let mode = self.mode;
        let index = self.current;
        if let Some(slot) = self.slots.get_mut(index) {
            slot.time_secs = slot.time_secs.saturating_add(1);
            if hint_every_secs > 0 && slot.time_secs % hint_every_secs == 0 {
                outcome.hint = Some(QuestionHint {
                    question_index: index,
                    elapsed_secs: slot.time_secs,
                    over_limit: mode == TimerMode::Countdown && slot.time_secs > limit,
                });
            }
        }

        if self.mode == TimerMode::Countdown {
            self.remaining_secs = self.remaining_secs.saturating_sub(1);
            if self.remaining_secs == 0 {
                self.status = SessionStatus::SubmitPending { forced: true };
                outcome.forced_submit = true;
            }
        }

        outcome
    }

    pub fn select(&mut self, option: &str) -> Result<()> {
        self.ensure_running()?;
        let slot = self
            .slots
            .get_mut(self.current)
            .ok_or_else(|| anyhow!("no question at index {}", self.current))?;
        if !slot.question.offers(option) {
            bail!("Option {option} is not offered for question {}", slot.question.id);
        }

        if slot.answer == option {
            slot.answer.clear();
        } else {
            slot.answer = option.to_string();
        }
        Ok(())
    }

    pub fn navigate(&mut self, delta: i64) -> Result<()> {
        self.ensure_running()?;
        let last = self.slots.len().saturating_sub(1) as i64;
        self.current = (self.current as i64).saturating_add(delta).clamp(0, last) as usize;
        Ok(())
    }

    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        self.ensure_running()?;
        self.current = index.min(self.slots.len().saturating_sub(1));
        Ok(())
    }

    pub fn add_question(&mut self) -> Result<()> {
        self.ensure_running()?;
        if self.mode == TimerMode::Stopwatch {
            bail!("Questions cannot be added to a practice session");
        }
        if self.slots.len() >= MAX_QUESTIONS {
            bail!("A test can have at most {MAX_QUESTIONS} questions");
        }

        let next_number = self
            .slots
            .last()
            .map(|slot| slot.question.number.saturating_add(1))
            .unwrap_or(self.setup.first_q);
        let question = Question::generated(self.setup.chapter_number, next_number);
        self.slots.push(QuestionSlot::fresh(question));
        self.setup.last_q = next_number;
        self.remaining_secs = self.remaining_secs.saturating_add(self.setup.per_question_secs);
        Ok(())
    }

    pub fn open_submit_panel(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.status = SessionStatus::SubmitPending { forced: false };
        Ok(())
    }

    pub fn back(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::SubmitPending { forced: false } => {
                self.status = SessionStatus::Running;
                Ok(())
            }
            SessionStatus::SubmitPending { forced: true } => {
                bail!("Time is up; the paper has to be submitted")
            }
            SessionStatus::Running => bail!("No submission is pending"),
            SessionStatus::Submitted => bail!("The paper has already been submitted"),
        }
    }

    pub fn mark_submitted(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::SubmitPending { .. } => {
                self.status = SessionStatus::Submitted;
                Ok(())
            }
            SessionStatus::Running => bail!("Open the submit panel before submitting"),
            SessionStatus::Submitted => bail!("The paper has already been submitted"),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        match self.status {
            SessionStatus::Running => Ok(()),
            SessionStatus::SubmitPending { .. } => bail!("Submission is pending; go back to keep answering"),
            SessionStatus::Submitted => bail!("The paper has already been submitted"),
        }
    }

    pub fn answers(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.answer.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.slots.iter().map(|slot| slot.time_secs).collect()
    }

    pub fn question_ids(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.question.id.clone()).collect()
    }

    pub fn attempted(&self) -> usize {
        self.slots.iter().filter(|slot| slot.attempted()).count()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let slot = &self.slots[self.current.min(self.slots.len().saturating_sub(1))];
        let attempted = self.attempted();
        let limit = self.setup.per_question_secs;

        SessionSnapshot {
            session_id: self.id.clone(),
            mode: self.mode,
            status: self.status,
            exam: self.setup.exam.clone(),
            subject: self.setup.subject.clone(),
            chapter: self.setup.chapter.clone(),
            started_at: self.started_at,
            current_index: self.current,
            current_question: slot.question.clone(),
            current_answer: slot.answer.clone(),
            question_count: self.slots.len(),
            remaining_secs: self.remaining_secs,
            current_elapsed_secs: slot.time_secs,
            per_question_limit_secs: limit,
            over_limit: self.mode == TimerMode::Countdown && slot.time_secs > limit,
            attempted,
            unattempted: self.slots.len() - attempted,
            can_go_back: self.status == SessionStatus::SubmitPending { forced: false },
            grid: self.slots.iter().map(QuestionSlot::attempted).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(first_q: u32, last_q: u32, per_question_secs: u64) -> TestSetup {
        let count = u64::from(last_q - first_q + 1);
        TestSetup {
            exam: "NEET".into(),
            subject: "Physics".into(),
            chapter: "Kinematics".into(),
            chapter_number: 3,
            first_q,
            last_q,
            per_question_secs,
            total_secs: count * per_question_secs,
        }
    }

    fn running(first_q: u32, last_q: u32, per_question_secs: u64) -> SessionState {
        SessionState::begin("s-1".into(), setup(first_q, last_q, per_question_secs), Utc::now()).unwrap()
    }

    fn assert_ledgers_aligned(state: &SessionState) {
        assert_eq!(state.answers().len(), state.timestamps().len());
        assert_eq!(state.answers().len(), state.question_ids().len());
    }

    #[test]
    fn begin_builds_one_slot_per_question() {
        let state = running(5, 9, 60);
        assert_eq!(state.slots.len(), 5);
        assert_eq!(state.slots[0].question.id, "3.5");
        assert_eq!(state.slots[4].question.id, "3.9");
        assert_eq!(state.remaining_secs, 300);
        assert_eq!(state.status, SessionStatus::Running);
    }

    #[test]
    fn selecting_same_option_twice_clears_answer() {
        let mut state = running(1, 3, 60);
        state.select("B").unwrap();
        assert_eq!(state.answers()[0], "B");
        state.select("C").unwrap();
        assert_eq!(state.answers()[0], "C");
        state.select("C").unwrap();
        assert_eq!(state.answers()[0], "");
        assert!(state.select("E").is_err());
    }

    #[test]
    fn add_question_and_navigation_keep_ledgers_aligned() {
        let mut state = running(1, 2, 60);
        state.add_question().unwrap();
        assert_ledgers_aligned(&state);
        assert_eq!(state.slots[2].question.id, "3.3");
        assert_eq!(state.remaining_secs, 180);

        state.navigate(10).unwrap();
        assert_eq!(state.current, 2);
        state.navigate(-10).unwrap();
        assert_eq!(state.current, 0);
        state.jump_to(99).unwrap();
        assert_eq!(state.current, 2);
        state.add_question().unwrap();
        assert_ledgers_aligned(&state);
        assert_eq!(state.slots.len(), 4);
    }

    #[test]
    fn extra_questions_stop_at_the_cap() {
        let mut state = running(1, MAX_QUESTIONS as u32 - 1, 36);
        state.add_question().unwrap();
        assert_eq!(state.slots.len(), MAX_QUESTIONS);
        assert!(state.add_question().is_err());
        assert_ledgers_aligned(&state);
    }

    #[test]
    fn inverted_range_cannot_begin() {
        let mut bad = setup(1, 2, 60);
        bad.first_q = 3;
        assert!(SessionState::begin("s-2".into(), bad, Utc::now()).is_err());
    }

    #[test]
    fn question_clock_resumes_where_it_left_off() {
        let mut state = running(1, 3, 60);
        state.tick(0);
        state.tick(0);
        state.navigate(1).unwrap();
        state.tick(0);
        state.navigate(-1).unwrap();
        state.tick(0);
        assert_eq!(state.timestamps(), vec![3, 1, 0]);
        assert_eq!(state.remaining_secs, 176);
    }

    #[test]
    fn budget_exhaustion_forces_submit_and_blocks_back() {
        let mut state = running(1, 1, 2);
        assert!(!state.tick(0).forced_submit);
        assert!(state.tick(0).forced_submit);
        assert_eq!(state.status, SessionStatus::SubmitPending { forced: true });
        assert!(state.back().is_err());
        assert!(state.select("A").is_err());

        // Clocks stay frozen once forced.
        state.tick(0);
        assert_eq!(state.timestamps(), vec![2]);

        state.mark_submitted().unwrap();
        assert_eq!(state.status, SessionStatus::Submitted);
        assert!(state.mark_submitted().is_err());
    }

    #[test]
    fn manual_submit_panel_allows_back() {
        let mut state = running(1, 2, 60);
        assert!(state.back().is_err());
        state.open_submit_panel().unwrap();
        assert!(state.snapshot().can_go_back);
        assert!(state.navigate(1).is_err());
        state.back().unwrap();
        assert_eq!(state.status, SessionStatus::Running);
        state.navigate(1).unwrap();
    }

    #[test]
    fn hints_fire_on_cadence_and_flag_over_limit() {
        let mut state = running(1, 2, 3);
        let hints: Vec<_> = (0..4).filter_map(|_| state.tick(2).hint).collect();
        assert_eq!(hints.len(), 2);
        assert!(!hints[0].over_limit);
        assert_eq!(hints[1].elapsed_secs, 4);
        assert!(hints[1].over_limit);
        assert!(state.snapshot().over_limit);
    }

    #[test]
    fn practice_session_never_forces_submit() {
        let questions = vec![Question::new("bm-1", 1, "Question 2.4"), Question::new("bm-2", 2, "Question 7.1")];
        let mut state = SessionState::practice("p-1".into(), setup(1, 2, 60), questions, Utc::now()).unwrap();
        for _ in 0..500 {
            assert!(!state.tick(0).forced_submit);
        }
        assert_eq!(state.status, SessionStatus::Running);
        assert_eq!(state.timestamps(), vec![500, 0]);
        assert!(state.add_question().is_err());
        assert_eq!(state.question_ids(), vec!["bm-1", "bm-2"]);
    }

    #[test]
    fn snapshot_counts_attempts() {
        let mut state = running(1, 4, 60);
        state.select("A").unwrap();
        state.jump_to(2).unwrap();
        state.select("D").unwrap();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.attempted, 2);
        assert_eq!(snapshot.unattempted, 2);
        assert_eq!(snapshot.grid, vec![true, false, true, false]);
        assert_eq!(snapshot.current_index, 2);
        assert_eq!(snapshot.current_answer, "D");
    }
}
