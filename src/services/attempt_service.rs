use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    guard::AbuseGuard,
    models::domain::{AnswerValue, Attempt, AttemptStatus, Question, Quiz},
    models::dto::request::{SubmitAttemptRequest, UpdateProgressRequest},
    repositories::{AttemptRepository, QuizRepository},
    services::scoring::{ScoreSummary, ScoringEngine},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Created,
    Resumed,
}

#[derive(Clone, Debug)]
pub struct AttemptStatistics {
    pub total_attempts: u64,
    pub completed_attempts: u64,
    pub completion_rate: f64,
    pub average_score: f64,
    pub best_score: f64,
    pub total_time_spent: i64,
    pub recent_attempts: Vec<Attempt>,
}

/// The attempt state machine: `in_progress -> {completed, abandoned,
/// expired}`, terminal states absorbing. Every operation takes the calling
/// principal explicitly; ownership is enforced here, not in ambient request
/// state.
pub struct AttemptService {
    attempts: Arc<dyn AttemptRepository>,
    quizzes: Arc<dyn QuizRepository>,
    guard: Arc<AbuseGuard>,
}

impl AttemptService {
    pub fn new(
        attempts: Arc<dyn AttemptRepository>,
        quizzes: Arc<dyn QuizRepository>,
        guard: Arc<AbuseGuard>,
    ) -> Self {
        Self {
            attempts,
            quizzes,
            guard,
        }
    }

    /// Start a new attempt, or hand back the existing in-progress one unless
    /// `force_new` is set. The attempt cap is validated before a force-new
    /// abandons the prior attempt, so forcing never frees a slot.
    pub async fn start(
        &self,
        user_id: &str,
        quiz_id: &str,
        force_new: bool,
    ) -> AppResult<(StartOutcome, Attempt, Quiz)> {
        let quiz = self
            .quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz with id '{}' not found", quiz_id)))?;

        if !quiz.is_takeable() {
            return Err(AppError::InvalidState(
                "Quiz is not open for attempts".to_string(),
            ));
        }

        if !self.quizzes.is_user_enrolled(user_id, quiz_id).await? {
            return Err(AppError::Forbidden(
                "User is not enrolled in this quiz".to_string(),
            ));
        }

        let now = Utc::now();
        let mut cap_checked = false;

        if let Some(existing) = self.attempts.find_in_progress(user_id, quiz_id).await? {
            if existing.has_timed_out(now) {
                // Stale row past its timer: persist the expiry and fall
                // through to the create path. It still counts toward the cap.
                self.attempts.mark_expired(&existing.id).await?;
            } else if !force_new {
                let mut resumed = existing;
                resumed.remaining_time_seconds = resumed.remaining_seconds(now);
                return Ok((StartOutcome::Resumed, resumed, quiz));
            } else {
                self.check_attempt_cap(&quiz, user_id).await?;
                cap_checked = true;
                self.attempts.mark_abandoned(&existing.id, true).await?;
            }
        }

        if !cap_checked {
            self.check_attempt_cap(&quiz, user_id).await?;
        }

        let (question_order, option_orders) = self.quizzes.snapshot_order(&quiz);
        let attempt = Attempt::start(user_id, &quiz, question_order, option_orders, now);
        let attempt = self.attempts.create(attempt).await?;

        // Advisory only.
        let in_progress = self.attempts.count_in_progress_for_user(user_id).await?;
        self.guard.check_concurrency(user_id, in_progress);

        Ok((StartOutcome::Created, attempt, quiz))
    }

    /// Return the live attempt with its remaining time recomputed, or expire
    /// it as a persisted side effect and fail.
    pub async fn resume(
        &self,
        user_id: &str,
        attempt_id: &str,
        origin: Option<&str>,
    ) -> AppResult<Attempt> {
        let attempt = self.fetch_owned(user_id, attempt_id, origin).await?;
        let mut attempt = self.ensure_live(attempt).await?;

        attempt.remaining_time_seconds = attempt.remaining_seconds(Utc::now());
        Ok(attempt)
    }

    pub async fn update_progress(
        &self,
        user_id: &str,
        attempt_id: &str,
        request: &UpdateProgressRequest,
        origin: Option<&str>,
    ) -> AppResult<Attempt> {
        let attempt = self.fetch_owned(user_id, attempt_id, origin).await?;
        let mut attempt = self.ensure_live(attempt).await?;

        let quiz = self.quizzes.find_by_id(&attempt.quiz_id).await?;
        validate_answers(&attempt, quiz.as_ref(), &request.answers)?;

        let now = Utc::now();
        attempt.progress.merge_answers(&request.answers);
        attempt.progress.record_time_spent(request.time_spent_seconds);
        attempt.progress.current_question_index = request.current_question_index;
        attempt.progress.last_activity_at = now;
        attempt.current_question_index = request.current_question_index;
        attempt.remaining_time_seconds = attempt.remaining_seconds(now);

        self.attempts.update(attempt).await
    }

    /// Merge the final answers, grade, and finalize the attempt.
    pub async fn submit(
        &self,
        user_id: &str,
        attempt_id: &str,
        request: &SubmitAttemptRequest,
        origin: Option<&str>,
    ) -> AppResult<(Attempt, ScoreSummary)> {
        // The rapid-submission heuristic counts every submit-type call by
        // this user, including ones rejected further down.
        self.guard.note_submission(user_id).await;

        let attempt = self.fetch_owned(user_id, attempt_id, origin).await?;
        let mut attempt = self.ensure_live(attempt).await?;

        let quiz = self
            .quizzes
            .find_by_id(&attempt.quiz_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Quiz with id '{}' not found", attempt.quiz_id))
            })?;
        validate_answers(&attempt, Some(&quiz), &request.answers)?;

        let now = Utc::now();
        attempt.progress.merge_answers(&request.answers);
        attempt.progress.record_time_spent(request.time_spent_seconds);
        attempt.progress.last_activity_at = now;

        // Grade in the snapshotted question order, with answer indices
        // translated back from display order to catalog order.
        let questions: Vec<Question> = attempt
            .question_order
            .iter()
            .filter_map(|qid| quiz.questions.iter().find(|q| &q.id == qid).cloned())
            .collect();
        let answers = translate_to_catalog_order(&attempt);

        let summary = ScoringEngine::grade(
            &questions,
            &answers,
            quiz.negative_marking,
            quiz.negative_mark_value,
        );

        attempt.status = AttemptStatus::Completed;
        attempt.completed_at = Some(now);
        attempt.score = Some(summary.score);
        attempt.correct_answers = Some(summary.correct_answers);
        attempt.incorrect_answers = Some(summary.incorrect_answers);
        attempt.pending_answers = Some(summary.pending_answers);
        attempt.earned_points = Some(summary.earned_points);
        attempt.penalty_points = Some(summary.penalty_points);
        attempt.remaining_time_seconds = attempt.remaining_seconds(now);

        let attempt = self.attempts.update(attempt).await?;

        // Advisory anomaly telemetry; never blocks the submission.
        self.guard.check_timing(
            user_id,
            attempt.progress.time_spent_seconds,
            attempt.progress.answered_questions,
        );

        Ok((attempt, summary))
    }

    /// Abandon an in-progress attempt. Abandoning an already-terminal
    /// attempt is an idempotent no-op success.
    pub async fn abandon(
        &self,
        user_id: &str,
        attempt_id: &str,
        origin: Option<&str>,
    ) -> AppResult<Attempt> {
        let attempt = self.fetch_owned(user_id, attempt_id, origin).await?;

        if attempt.is_terminal() {
            return Ok(attempt);
        }

        match self.attempts.mark_abandoned(attempt_id, false).await? {
            Some(abandoned) => Ok(abandoned),
            // Lost a race against another terminal transition; report the
            // current state.
            None => self.fetch_owned(user_id, attempt_id, origin).await,
        }
    }

    pub async fn get_attempt(
        &self,
        user_id: &str,
        attempt_id: &str,
        origin: Option<&str>,
    ) -> AppResult<Attempt> {
        self.fetch_owned(user_id, attempt_id, origin).await
    }

    pub async fn list_attempts(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)> {
        self.attempts.list_for_user(user_id, offset, limit).await
    }

    /// Read-side aggregation over the caller's attempts.
    pub async fn statistics(&self, user_id: &str) -> AppResult<AttemptStatistics> {
        let all = self.attempts.list_all_for_user(user_id).await?;

        let total_attempts = all.len() as u64;
        let completed: Vec<&Attempt> = all
            .iter()
            .filter(|a| a.status == AttemptStatus::Completed)
            .collect();
        let completed_attempts = completed.len() as u64;

        let completion_rate = if total_attempts == 0 {
            0.0
        } else {
            completed_attempts as f64 / total_attempts as f64 * 100.0
        };

        let scores: Vec<f64> = completed.iter().filter_map(|a| a.score).collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        let best_score = scores.iter().copied().fold(0.0, f64::max);

        let total_time_spent = all.iter().map(|a| a.progress.time_spent_seconds).sum();

        let recent_attempts = all.into_iter().take(5).collect();

        Ok(AttemptStatistics {
            total_attempts,
            completed_attempts,
            completion_rate,
            average_score,
            best_score,
            total_time_spent,
            recent_attempts,
        })
    }

    async fn fetch_owned(
        &self,
        user_id: &str,
        attempt_id: &str,
        origin: Option<&str>,
    ) -> AppResult<Attempt> {
        let attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Attempt with id '{}' not found", attempt_id))
            })?;

        if attempt.user_id != user_id {
            self.guard
                .log_ownership_violation(user_id, &attempt.user_id, attempt_id, origin);
            return Err(AppError::Forbidden(
                "Attempt belongs to another user".to_string(),
            ));
        }

        Ok(attempt)
    }

    /// Rejects terminal attempts and lazily expires timed-out ones. The
    /// expiry write is conditional on the stored status, so it persists
    /// exactly once however many callers race here.
    async fn ensure_live(&self, attempt: Attempt) -> AppResult<Attempt> {
        match attempt.status {
            AttemptStatus::InProgress => {}
            AttemptStatus::Completed => {
                return Err(AppError::InvalidState(
                    "Attempt is already completed".to_string(),
                ))
            }
            AttemptStatus::Abandoned => {
                return Err(AppError::InvalidState(
                    "Attempt was abandoned".to_string(),
                ))
            }
            AttemptStatus::Expired => {
                return Err(AppError::InvalidState("Attempt has expired".to_string()))
            }
        }

        if attempt.has_timed_out(Utc::now()) {
            self.attempts.mark_expired(&attempt.id).await?;
            return Err(AppError::InvalidState("Attempt has expired".to_string()));
        }

        Ok(attempt)
    }

    async fn check_attempt_cap(&self, quiz: &Quiz, user_id: &str) -> AppResult<()> {
        let Some(cap) = quiz.effective_max_attempts() else {
            return Ok(());
        };

        let used = self.attempts.count_countable(user_id, &quiz.id).await?;
        if used >= cap {
            return Err(AppError::MaxAttemptsExceeded(format!(
                "Maximum of {} attempt(s) reached for this quiz",
                cap
            )));
        }

        Ok(())
    }
}

/// Answer keys must come from the attempt's question snapshot, and choice
/// indices must be in range for the question. Questions since removed from
/// the catalog are tolerated (the snapshot governs).
fn validate_answers(
    attempt: &Attempt,
    quiz: Option<&Quiz>,
    answers: &HashMap<String, AnswerValue>,
) -> AppResult<()> {
    for (question_id, value) in answers {
        if !attempt.question_order.iter().any(|id| id == question_id) {
            return Err(AppError::ValidationError(format!(
                "Unknown question id '{}' in answers",
                question_id
            )));
        }

        let Some(question) = quiz.and_then(|q| q.questions.iter().find(|q| &q.id == question_id))
        else {
            continue;
        };

        let option_count = question.option_count() as u32;
        let out_of_range = match value {
            AnswerValue::Choice(index) => *index >= option_count,
            AnswerValue::Choices(indices) => indices.iter().any(|i| *i >= option_count),
            AnswerValue::Boolean(_) | AnswerValue::Text(_) => false,
        };

        if option_count > 0 && out_of_range {
            return Err(AppError::ValidationError(format!(
                "Option index out of range for question '{}'",
                question_id
            )));
        }
    }

    Ok(())
}

/// Maps display-order indices back to catalog-order indices using the
/// attempt's snapshotted option permutations.
fn translate_to_catalog_order(attempt: &Attempt) -> HashMap<String, AnswerValue> {
    attempt
        .progress
        .answers
        .iter()
        .map(|(question_id, value)| {
            let translated = match attempt.option_orders.get(question_id) {
                None => value.clone(),
                Some(order) => match value {
                    AnswerValue::Choice(i) => {
                        AnswerValue::Choice(order.get(*i as usize).copied().unwrap_or(*i))
                    }
                    AnswerValue::Choices(indices) => AnswerValue::Choices(
                        indices
                            .iter()
                            .map(|i| order.get(*i as usize).copied().unwrap_or(*i))
                            .collect(),
                    ),
                    other => other.clone(),
                },
            };
            (question_id.clone(), translated)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::guard::InMemoryRateLimitStore;
    use crate::repositories::{MockAttemptRepository, MockQuizRepository};
    use crate::test_utils::fixtures;
    use chrono::Utc;

    fn test_guard() -> Arc<AbuseGuard> {
        Arc::new(AbuseGuard::new(
            Arc::new(InMemoryRateLimitStore::new()),
            GuardConfig::default(),
        ))
    }

    fn completed_attempt(user_id: &str) -> Attempt {
        let quiz = fixtures::published_quiz("quiz-1", "owner-1");
        let mut attempt = Attempt::start(
            user_id,
            &quiz,
            quiz.questions.iter().map(|q| q.id.clone()).collect(),
            HashMap::new(),
            Utc::now(),
        );
        attempt.status = AttemptStatus::Completed;
        attempt
    }

    #[tokio::test]
    async fn rejected_submit_still_counts_toward_rapid_submission_heuristic() {
        let mut attempts = MockAttemptRepository::new();
        let stored = completed_attempt("user-1");
        attempts
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let guard = test_guard();
        let service = AttemptService::new(
            Arc::new(attempts),
            Arc::new(MockQuizRepository::new()),
            guard.clone(),
        );

        let request = SubmitAttemptRequest {
            answers: HashMap::new(),
            time_spent_seconds: 10,
        };

        let result = service.submit("user-1", "attempt-1", &request, None).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));

        // The call was rejected but the heuristic still saw it.
        assert_eq!(guard.submissions_in_window("user-1").await, 1);
    }

    #[tokio::test]
    async fn non_owner_fetch_is_forbidden_with_caller_origin() {
        let mut attempts = MockAttemptRepository::new();
        let stored = completed_attempt("owner-user");
        attempts
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let service = AttemptService::new(
            Arc::new(attempts),
            Arc::new(MockQuizRepository::new()),
            test_guard(),
        );

        let result = service
            .get_attempt("intruder", "attempt-1", Some("203.0.113.9"))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn translate_maps_display_indices_to_catalog_indices() {
        let quiz = fixtures::published_quiz("quiz-1", "owner-1");
        let mcq_id = quiz.questions[0].id.clone();

        let mut option_orders = HashMap::new();
        // Display order [2, 0, 1]: display index 0 is catalog option 2.
        option_orders.insert(mcq_id.clone(), vec![2, 0, 1]);

        let mut attempt = Attempt::start(
            "user-1",
            &quiz,
            quiz.questions.iter().map(|q| q.id.clone()).collect(),
            option_orders,
            Utc::now(),
        );
        attempt
            .progress
            .answers
            .insert(mcq_id.clone(), AnswerValue::Choice(0));

        let translated = translate_to_catalog_order(&attempt);
        assert_eq!(translated[&mcq_id], AnswerValue::Choice(2));
    }

    #[test]
    fn validate_rejects_unknown_question_id() {
        let quiz = fixtures::published_quiz("quiz-1", "owner-1");
        let attempt = Attempt::start(
            "user-1",
            &quiz,
            quiz.questions.iter().map(|q| q.id.clone()).collect(),
            HashMap::new(),
            Utc::now(),
        );

        let mut answers = HashMap::new();
        answers.insert("no-such-question".to_string(), AnswerValue::Choice(0));

        let result = validate_answers(&attempt, Some(&quiz), &answers);
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_option_index() {
        let quiz = fixtures::published_quiz("quiz-1", "owner-1");
        let mcq_id = quiz.questions[0].id.clone();
        let attempt = Attempt::start(
            "user-1",
            &quiz,
            quiz.questions.iter().map(|q| q.id.clone()).collect(),
            HashMap::new(),
            Utc::now(),
        );

        let mut answers = HashMap::new();
        answers.insert(mcq_id, AnswerValue::Choice(99));

        let result = validate_answers(&attempt, Some(&quiz), &answers);
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
