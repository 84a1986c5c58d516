pub mod attempt_service;
pub mod quiz_service;
pub mod scoring;

pub use attempt_service::{AttemptService, AttemptStatistics, StartOutcome};
pub use quiz_service::QuizService;
pub use scoring::{QuestionOutcome, QuestionResult, ScoreSummary, ScoringEngine};
