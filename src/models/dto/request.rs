use std::collections::HashMap;

use serde::Deserialize;
use validator::Validate;

use crate::models::domain::AnswerValue;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StartAttemptRequest {
    /// Abandon any in-progress attempt and start fresh.
    #[serde(default)]
    pub force_new: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    pub current_question_index: u32,

    #[validate(range(min = 0))]
    pub time_spent_seconds: i64,

    /// Partial map; merged over stored answers, last write wins.
    #[serde(default)]
    pub answers: HashMap<String, AnswerValue>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: HashMap<String, AnswerValue>,

    #[validate(range(min = 0))]
    pub time_spent_seconds: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaginationParams {
    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            offset: Some(0),
            limit: Some(20),
        }
    }
}

impl PaginationParams {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).min(100)
    }
}
