use serde::{Deserialize, Serialize};

pub const OPTION_LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// A question is only a numbered slot; its content lives in the printed
/// paper the student is working from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub number: u32,
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, number: u32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number,
            text: text.into(),
            options: OPTION_LABELS.iter().map(|label| label.to_string()).collect(),
        }
    }

    /// `"{chapter}.{number}"`, e.g. question 12 of chapter 3 is `3.12`.
    pub fn generated(chapter: u32, number: u32) -> Self {
        let id = format!("{chapter}.{number}");
        let text = format!("Question {id}");
        Self::new(id, number, text)
    }

    pub fn offers(&self, option: &str) -> bool {
        self.options.iter().any(|candidate| candidate == option)
    }
}

/// Questions `first_q..=last_q` of a chapter; an empty or inverted range
/// still yields the first question.
pub fn generate_questions(chapter: u32, first_q: u32, last_q: u32) -> Vec<Question> {
    let count = last_q.saturating_sub(first_q).saturating_add(1).max(1);
    (0..count)
        .map(|offset| Question::generated(chapter, first_q.saturating_add(offset)))
        .collect()
}
