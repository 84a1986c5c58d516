use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::quiz::Quiz;

/// A submitted answer value. The wire shape depends on the question kind:
/// booleans for true/false, option indices (into the snapshotted order) for
/// multiple choice, free text for short answers.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Boolean(bool),
    Choice(u32),
    Choices(Vec<u32>),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
    Expired,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

/// Embedded record of in-flight answers and timing for one attempt.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AttemptProgress {
    pub answers: HashMap<String, AnswerValue>,
    pub answered_questions: u32,
    pub time_spent_seconds: i64,
    pub completion_percentage: f64,
    pub last_activity_at: DateTime<Utc>,
    pub current_question_index: u32,
    pub total_questions: u32,
}

impl AttemptProgress {
    pub fn new(total_questions: u32, now: DateTime<Utc>) -> Self {
        Self {
            answers: HashMap::new(),
            answered_questions: 0,
            time_spent_seconds: 0,
            completion_percentage: 0.0,
            last_activity_at: now,
            current_question_index: 0,
            total_questions,
        }
    }

    /// Merges incoming answers over the stored map. Last write wins per
    /// question id; there is no per-question versioning.
    pub fn merge_answers(&mut self, incoming: &HashMap<String, AnswerValue>) {
        for (question_id, value) in incoming {
            self.answers.insert(question_id.clone(), value.clone());
        }
        self.answered_questions = self.answers.len() as u32;
        self.completion_percentage = if self.total_questions == 0 {
            0.0
        } else {
            f64::from(self.answered_questions) / f64::from(self.total_questions) * 100.0
        };
    }

    /// Time spent is server-side monotonic: a submitted value lower than the
    /// stored one (out-of-order or retried request) is ignored.
    pub fn record_time_spent(&mut self, submitted_seconds: i64) {
        self.time_spent_seconds = self.time_spent_seconds.max(submitted_seconds);
    }
}

/// One user's stateful pass at answering a quiz. `total_questions`, the
/// question order and per-question option orders are snapshotted at creation
/// and never recalculated against later catalog edits.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub status: AttemptStatus,
    pub current_question_index: u32,
    pub total_questions: u32,
    pub question_order: Vec<String>,
    /// Per question id, the permutation of original option indices in the
    /// order presented to the taker. Missing entry means catalog order.
    pub option_orders: HashMap<String, Vec<u32>>,
    pub progress: AttemptProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorrect_answers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_answers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_points: Option<f64>,
    /// Quiz timer snapshot; None means untimed.
    pub timer_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time_seconds: Option<i64>,
    /// Set when a force-new start abandoned this attempt.
    pub superseded: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn start(
        user_id: &str,
        quiz: &Quiz,
        question_order: Vec<String>,
        option_orders: HashMap<String, Vec<u32>>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_questions = question_order.len() as u32;
        let timer_seconds = quiz.effective_timer_seconds();

        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quiz_id: quiz.id.clone(),
            status: AttemptStatus::InProgress,
            current_question_index: 0,
            total_questions,
            question_order,
            option_orders,
            progress: AttemptProgress::new(total_questions, now),
            score: None,
            correct_answers: None,
            incorrect_answers: None,
            pending_answers: None,
            earned_points: None,
            penalty_points: None,
            timer_seconds,
            remaining_time_seconds: timer_seconds.map(i64::from),
            superseded: false,
            started_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }

    /// Whether the wall-clock timer has run out. Untimed attempts never
    /// time out.
    pub fn has_timed_out(&self, now: DateTime<Utc>) -> bool {
        match self.timer_seconds {
            Some(limit) => self.elapsed_seconds(now) > i64::from(limit),
            None => false,
        }
    }

    /// Seconds left on the timer, clamped at zero. None for untimed attempts.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.timer_seconds
            .map(|limit| (i64::from(limit) - self.elapsed_seconds(now)).max(0))
    }
}
