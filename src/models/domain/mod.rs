pub mod attempt;
pub mod question;
pub mod quiz;

pub use attempt::{AnswerValue, Attempt, AttemptProgress, AttemptStatus};
pub use question::{Question, QuestionKind, QuestionOption};
pub use quiz::{Quiz, QuizStatus};
