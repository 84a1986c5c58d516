use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{AnswerValue, Attempt, AttemptStatus, Question, QuestionKind, Quiz};
use crate::services::scoring::{QuestionResult, ScoreSummary};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDto {
    pub answers: HashMap<String, AnswerValue>,
    pub answered_questions: u32,
    pub time_spent: i64,
    pub completion_percentage: f64,
    pub last_activity_at: DateTime<Utc>,
    pub current_question_index: u32,
    pub total_questions: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDto {
    pub id: String,
    pub quiz_id: String,
    pub status: AttemptStatus,
    pub current_question_index: u32,
    pub total_questions: u32,
    pub question_order: Vec<String>,
    pub progress: ProgressDto,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time_seconds: Option<i64>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Attempt> for AttemptDto {
    fn from(attempt: Attempt) -> Self {
        AttemptDto {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            status: attempt.status,
            current_question_index: attempt.current_question_index,
            total_questions: attempt.total_questions,
            question_order: attempt.question_order,
            progress: ProgressDto {
                answers: attempt.progress.answers,
                answered_questions: attempt.progress.answered_questions,
                time_spent: attempt.progress.time_spent_seconds,
                completion_percentage: attempt.progress.completion_percentage,
                last_activity_at: attempt.progress.last_activity_at,
                current_question_index: attempt.progress.current_question_index,
                total_questions: attempt.progress.total_questions,
            },
            score: attempt.score,
            correct_answers: attempt.correct_answers,
            incorrect_answers: attempt.incorrect_answers,
            pending_answers: attempt.pending_answers,
            earned_points: attempt.earned_points,
            penalty_points: attempt.penalty_points,
            remaining_time_seconds: attempt.remaining_time_seconds,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
        }
    }
}

/// Taker-facing question view: correctness flags stripped, options in the
/// attempt's snapshotted display order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionViewDto {
    pub id: String,
    pub prompt: String,
    pub points: f64,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl QuestionViewDto {
    fn from_question(question: &Question, display_order: Option<&Vec<u32>>) -> Self {
        match &question.kind {
            QuestionKind::Mcq {
                multiple_correct,
                options,
            } => {
                let texts: Vec<String> = match display_order {
                    Some(order) => order
                        .iter()
                        .filter_map(|&i| options.get(i as usize))
                        .map(|opt| opt.text.clone())
                        .collect(),
                    None => options.iter().map(|opt| opt.text.clone()).collect(),
                };
                QuestionViewDto {
                    id: question.id.clone(),
                    prompt: question.prompt.clone(),
                    points: question.points,
                    question_type: "mcq",
                    multiple_correct: Some(*multiple_correct),
                    options: Some(texts),
                }
            }
            QuestionKind::TrueFalse { .. } => QuestionViewDto {
                id: question.id.clone(),
                prompt: question.prompt.clone(),
                points: question.points,
                question_type: "true_false",
                multiple_correct: None,
                options: None,
            },
            QuestionKind::ShortAnswer => QuestionViewDto {
                id: question.id.clone(),
                prompt: question.prompt.clone(),
                points: question.points,
                question_type: "short_answer",
                multiple_correct: None,
                options: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizViewDto {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_seconds: Option<u32>,
    pub negative_marking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_mark_value: Option<f64>,
    pub total_questions: u32,
    pub questions: Vec<QuestionViewDto>,
}

impl QuizViewDto {
    /// Quiz in catalog order, for browsing before an attempt exists.
    pub fn public(quiz: &Quiz) -> Self {
        QuizViewDto {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            timer_seconds: quiz.effective_timer_seconds(),
            negative_marking: quiz.negative_marking,
            negative_mark_value: quiz.negative_mark_value,
            total_questions: quiz.questions.len() as u32,
            questions: quiz
                .questions
                .iter()
                .map(|q| QuestionViewDto::from_question(q, None))
                .collect(),
        }
    }

    /// Quiz as presented to the taker of `attempt`: questions in the
    /// snapshotted order, options permuted per the snapshot.
    pub fn for_attempt(quiz: &Quiz, attempt: &Attempt) -> Self {
        let questions = attempt
            .question_order
            .iter()
            .filter_map(|qid| quiz.questions.iter().find(|q| &q.id == qid))
            .map(|q| QuestionViewDto::from_question(q, attempt.option_orders.get(&q.id)))
            .collect();

        QuizViewDto {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            timer_seconds: quiz.effective_timer_seconds(),
            negative_marking: quiz.negative_marking,
            negative_mark_value: quiz.negative_mark_value,
            total_questions: attempt.total_questions,
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub status: &'static str,
    pub attempt: AttemptDto,
    pub quiz: QuizViewDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeAttemptResponse {
    pub attempt: AttemptDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSavedResponse {
    pub status: &'static str,
    pub attempt: AttemptDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsDto {
    pub score: f64,
    pub max_score: f64,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub pending_answers: u32,
    pub completion_percentage: f64,
    pub time_spent: i64,
    pub breakdown: Vec<QuestionResult>,
}

impl ResultsDto {
    pub fn new(summary: ScoreSummary, completion_percentage: f64, time_spent: i64) -> Self {
        ResultsDto {
            score: summary.score,
            max_score: summary.max_score,
            correct_answers: summary.correct_answers,
            incorrect_answers: summary.incorrect_answers,
            pending_answers: summary.pending_answers,
            completion_percentage,
            time_spent,
            breakdown: summary.question_results,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptResponse {
    pub status: &'static str,
    pub attempt: AttemptDto,
    pub results: ResultsDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonAttemptResponse {
    pub status: &'static str,
    pub attempt: AttemptDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptListResponse {
    pub attempts: Vec<AttemptDto>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    pub total_attempts: u64,
    pub completed_attempts: u64,
    pub completion_rate: f64,
    pub average_score: f64,
    pub best_score: f64,
    pub total_time_spent: i64,
    pub recent_attempts: Vec<AttemptDto>,
}
