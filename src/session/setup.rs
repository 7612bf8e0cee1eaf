use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Seconds allotted per question in the real exams.
const EXAM_TIMINGS: [(&str, u64); 4] = [
    ("NEET", 144),
    ("IIT JEE", 144),
    ("SSC JE", 36),
    ("SSC CGL", 36),
];

/// Largest paper a single session holds, extra questions included.
pub const MAX_QUESTIONS: usize = 500;

pub fn per_question_secs_for_exam(exam: &str) -> Option<u64> {
    let normalized = exam.trim().to_uppercase().replace('_', " ");
    EXAM_TIMINGS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, secs)| *secs)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSetup {
    pub exam: String,
    pub subject: String,
    pub chapter: String,
    pub chapter_number: u32,
    pub first_q: u32,
    pub last_q: u32,
    pub per_question_secs: u64,
    pub total_secs: u64,
}

impl TestSetup {
    /// Builds a setup the way the setup screen does: the budget is the
    /// question count times the exam's per-question allotment.
    pub fn planned(
        exam: &str,
        subject: &str,
        chapter: &str,
        chapter_number: u32,
        first_q: u32,
        last_q: u32,
        default_per_question_secs: u64,
    ) -> Result<Self> {
        let per_question_secs =
            per_question_secs_for_exam(exam).unwrap_or(default_per_question_secs);
        let mut setup = Self {
            exam: exam.to_string(),
            subject: subject.to_string(),
            chapter: chapter.to_string(),
            chapter_number,
            first_q,
            last_q,
            per_question_secs,
            total_secs: 0,
        };
        setup.validate()?;
        setup.total_secs = setup.question_count() as u64 * per_question_secs;
        Ok(setup)
    }

    /// Rejects setups a session cannot be started from.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() || self.chapter.trim().is_empty() || self.chapter_number == 0 {
            bail!("Please select subject, chapter and chapter number");
        }
        if self.first_q == 0 || self.last_q < self.first_q {
            bail!("Please enter a valid question range (Start <= End)");
        }
        if self.question_count() > MAX_QUESTIONS {
            bail!("A test can have at most {MAX_QUESTIONS} questions");
        }
        if self.per_question_secs == 0 {
            bail!("Time per question must be at least one second");
        }
        Ok(())
    }

    /// Raises practice defaults that carry no meaning for an untimed run.
    pub fn normalized(mut self) -> Self {
        self.per_question_secs = self.per_question_secs.max(1);
        self.chapter_number = self.chapter_number.max(1);
        self
    }

    pub fn question_count(&self) -> usize {
        (self.last_q.saturating_sub(self.first_q) as usize) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_follows_exam_timing() {
        let setup = TestSetup::planned("NEET", "Physics", "Kinematics", 2, 1, 10, 60).unwrap();
        assert_eq!(setup.per_question_secs, 144);
        assert_eq!(setup.total_secs, 1440);
        assert_eq!(setup.question_count(), 10);

        let ssc = TestSetup::planned("ssc_cgl", "Maths", "Algebra", 1, 5, 6, 60).unwrap();
        assert_eq!(ssc.per_question_secs, 36);
        assert_eq!(ssc.total_secs, 72);

        let other = TestSetup::planned("GATE", "CS", "Graphs", 1, 1, 3, 60).unwrap();
        assert_eq!(other.total_secs, 180);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(TestSetup::planned("NEET", "Physics", "Optics", 1, 5, 4, 60).is_err());
        assert!(TestSetup::planned("NEET", "Physics", "Optics", 1, 0, 4, 60).is_err());
        assert!(TestSetup::planned("NEET", "", "Optics", 1, 1, 4, 60).is_err());
    }

    fn custom(first_q: u32, last_q: u32, per_question_secs: u64) -> TestSetup {
        TestSetup {
            exam: "NEET".into(),
            subject: "Biology".into(),
            chapter: "Cells".into(),
            chapter_number: 2,
            first_q,
            last_q,
            per_question_secs,
            total_secs: 0,
        }
    }

    #[test]
    fn caller_built_setups_are_validated() {
        assert!(custom(1, 3, 60).validate().is_ok());
        assert!(custom(4, 1, 60).validate().is_err());
        assert!(custom(0, 3, 60).validate().is_err());
        assert!(custom(1, 3, 0).validate().is_err());
    }

    #[test]
    fn question_count_is_capped() {
        assert!(custom(1, MAX_QUESTIONS as u32, 36).validate().is_ok());
        assert!(custom(1, MAX_QUESTIONS as u32 + 1, 36).validate().is_err());
        assert!(custom(1, u32::MAX, 36).validate().is_err());
        assert!(TestSetup::planned("NEET", "Biology", "Cells", 1, 1, u32::MAX, 60).is_err());
    }

    #[test]
    fn normalized_raises_practice_defaults() {
        let mut setup = custom(1, 2, 0);
        setup.chapter_number = 0;
        let setup = setup.normalized();
        assert_eq!(setup.per_question_secs, 1);
        assert_eq!(setup.chapter_number, 1);
    }
}
