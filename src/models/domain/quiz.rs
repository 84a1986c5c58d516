use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::question::Question;

/// Catalog entry for a takeable quiz. The attempt engine reads these but
/// never writes them; authoring lives in another service.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Quiz {
    pub id: String,
    pub owner_user_id: String,
    pub title: String,
    pub status: QuizStatus,
    /// 0 or None means untimed.
    pub timer_seconds: Option<u32>,
    pub allow_multiple_attempts: bool,
    pub max_attempts: Option<u32>,
    pub negative_marking: bool,
    /// Magnitude deducted per answered-and-wrong question. Only read when
    /// `negative_marking` is set.
    pub negative_mark_value: Option<f64>,
    pub randomize_questions: bool,
    pub randomize_answers: bool,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Draft,
    Published,
    Archived,
}

impl Quiz {
    pub fn is_takeable(&self) -> bool {
        self.status == QuizStatus::Published
    }

    /// Effective lifetime attempt cap for one user. Single-attempt quizzes
    /// default to 1 even when no explicit cap was authored.
    pub fn effective_max_attempts(&self) -> Option<u64> {
        if self.allow_multiple_attempts {
            self.max_attempts.map(u64::from)
        } else {
            Some(u64::from(self.max_attempts.unwrap_or(1)))
        }
    }

    /// Timer in seconds, normalizing the "0 means untimed" authoring form.
    pub fn effective_timer_seconds(&self) -> Option<u32> {
        match self.timer_seconds {
            Some(0) | None => None,
            Some(t) => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    #[test]
    fn effective_max_attempts_defaults_to_one_for_single_attempt_quizzes() {
        let mut quiz = fixtures::published_quiz("quiz-1", "owner-1");
        quiz.allow_multiple_attempts = false;
        quiz.max_attempts = None;

        assert_eq!(quiz.effective_max_attempts(), Some(1));
    }

    #[test]
    fn effective_max_attempts_unlimited_when_multiple_allowed_without_cap() {
        let mut quiz = fixtures::published_quiz("quiz-1", "owner-1");
        quiz.allow_multiple_attempts = true;
        quiz.max_attempts = None;

        assert_eq!(quiz.effective_max_attempts(), None);
    }

    #[test]
    fn zero_timer_means_untimed() {
        let mut quiz = fixtures::published_quiz("quiz-1", "owner-1");
        quiz.timer_seconds = Some(0);
        assert_eq!(quiz.effective_timer_seconds(), None);

        quiz.timer_seconds = Some(300);
        assert_eq!(quiz.effective_timer_seconds(), Some(300));
    }

    #[test]
    fn only_published_quizzes_are_takeable() {
        let mut quiz = fixtures::published_quiz("quiz-1", "owner-1");
        assert!(quiz.is_takeable());

        quiz.status = QuizStatus::Draft;
        assert!(!quiz.is_takeable());

        quiz.status = QuizStatus::Archived;
        assert!(!quiz.is_takeable());
    }
}
