use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkingScheme {
    pub correct: f64,
    pub wrong: f64,
}

impl MarkingScheme {
    pub const JEE: MarkingScheme = MarkingScheme { correct: 4.0, wrong: -1.0 };
    pub const NEET: MarkingScheme = MarkingScheme { correct: 4.0, wrong: -1.0 };
    pub const SSC: MarkingScheme = MarkingScheme { correct: 1.0, wrong: -0.25 };
    pub const DEFAULT: MarkingScheme = MarkingScheme { correct: 1.0, wrong: -0.25 };

    /// Case-insensitive substring match on the exam name, first hit wins.
    pub fn for_exam(exam: &str) -> MarkingScheme {
        let exam = exam.to_lowercase();
        if exam.contains("jee") || exam.contains("iit") {
            Self::JEE
        } else if exam.contains("neet") {
            Self::NEET
        } else if exam.contains("ssc") {
            Self::SSC
        } else {
            Self::DEFAULT
        }
    }
}

/// What to show when wrong answers outweigh correct ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScorePolicy {
    #[default]
    Raw,
    ClampToZero,
}

impl ScorePolicy {
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            ScorePolicy::Raw => raw,
            ScorePolicy::ClampToZero => raw.max(0.0),
        }
    }
}
