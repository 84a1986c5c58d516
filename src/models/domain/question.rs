use serde::{Deserialize, Serialize};

/// A single quiz question. The grading rule is carried by the `kind` variant
/// so that scoring dispatch is exhaustive rather than string-matched.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub points: f64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq {
        multiple_correct: bool,
        options: Vec<QuestionOption>,
    },
    TrueFalse {
        correct: bool,
    },
    /// Free-text answers always wait for manual grading.
    ShortAnswer,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

impl Question {
    /// Whether correctness can be decided without human review.
    pub fn is_auto_gradable(&self) -> bool {
        !matches!(self.kind, QuestionKind::ShortAnswer)
    }

    pub fn option_count(&self) -> usize {
        match &self.kind {
            QuestionKind::Mcq { options, .. } => options.len(),
            _ => 0,
        }
    }
}
