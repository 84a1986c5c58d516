pub mod attempt_handler;
pub mod quiz_handler;

pub use attempt_handler::{
    abandon_attempt, attempt_statistics, get_attempt, list_my_attempts, resume_attempt,
    start_attempt, submit_attempt, update_progress,
};
pub use quiz_handler::{get_quiz, health_check};
