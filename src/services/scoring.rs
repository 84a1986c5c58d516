use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::domain::{AnswerValue, Question, QuestionKind};

/// Outcome of grading a single question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    /// No answer submitted. Counts as incorrect but never draws a penalty.
    Unanswered,
    /// Short answers wait for manual grading and never affect the auto-score.
    Pending,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub outcome: QuestionOutcome,
    pub awarded_points: f64,
    pub penalty_points: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Percentage in [0, 100], clamped so negative marking cannot drive it
    /// below zero.
    pub score: f64,
    /// Sum of points over auto-gradable questions only.
    pub max_score: f64,
    pub earned_points: f64,
    pub penalty_points: f64,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub pending_answers: u32,
    pub question_results: Vec<QuestionResult>,
}

pub struct ScoringEngine;

impl ScoringEngine {
    /// Grade a merged answer set against the quiz's question list.
    ///
    /// Answer indices must already refer to the catalog option order; the
    /// caller translates snapshotted display orders back before grading.
    pub fn grade(
        questions: &[Question],
        answers: &HashMap<String, AnswerValue>,
        negative_marking: bool,
        negative_mark_value: Option<f64>,
    ) -> ScoreSummary {
        let penalty_per_wrong = if negative_marking {
            negative_mark_value.unwrap_or(0.0).max(0.0)
        } else {
            0.0
        };

        let mut earned_points = 0.0_f64;
        let mut penalty_points = 0.0_f64;
        let mut max_score = 0.0_f64;
        let mut correct_answers = 0_u32;
        let mut incorrect_answers = 0_u32;
        let mut pending_answers = 0_u32;
        let mut question_results = Vec::with_capacity(questions.len());

        for question in questions {
            let answer = answers.get(&question.id);
            let outcome = Self::grade_question(question, answer);

            let (awarded, penalty) = match outcome {
                QuestionOutcome::Correct => (question.points, 0.0),
                QuestionOutcome::Incorrect => (0.0, penalty_per_wrong),
                QuestionOutcome::Unanswered | QuestionOutcome::Pending => (0.0, 0.0),
            };

            match outcome {
                QuestionOutcome::Correct => correct_answers += 1,
                QuestionOutcome::Incorrect | QuestionOutcome::Unanswered => incorrect_answers += 1,
                QuestionOutcome::Pending => pending_answers += 1,
            }

            if question.is_auto_gradable() {
                max_score += question.points;
            }
            earned_points += awarded;
            penalty_points += penalty;

            question_results.push(QuestionResult {
                question_id: question.id.clone(),
                outcome,
                awarded_points: awarded,
                penalty_points: penalty,
            });
        }

        let score = if max_score > 0.0 {
            ((earned_points - penalty_points) / max_score * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        ScoreSummary {
            score,
            max_score,
            earned_points,
            penalty_points,
            correct_answers,
            incorrect_answers,
            pending_answers,
            question_results,
        }
    }

    fn grade_question(question: &Question, answer: Option<&AnswerValue>) -> QuestionOutcome {
        match &question.kind {
            QuestionKind::ShortAnswer => QuestionOutcome::Pending,
            QuestionKind::TrueFalse { correct } => match answer {
                None => QuestionOutcome::Unanswered,
                Some(AnswerValue::Boolean(submitted)) => {
                    if submitted == correct {
                        QuestionOutcome::Correct
                    } else {
                        QuestionOutcome::Incorrect
                    }
                }
                // Wrong-shaped answers were still answers.
                Some(_) => QuestionOutcome::Incorrect,
            },
            QuestionKind::Mcq { options, .. } => {
                let submitted = match answer {
                    None => return QuestionOutcome::Unanswered,
                    Some(AnswerValue::Choice(index)) => BTreeSet::from([*index]),
                    Some(AnswerValue::Choices(indices)) => indices.iter().copied().collect(),
                    Some(_) => return QuestionOutcome::Incorrect,
                };

                let correct: BTreeSet<u32> = options
                    .iter()
                    .enumerate()
                    .filter(|(_, opt)| opt.is_correct)
                    .map(|(i, _)| i as u32)
                    .collect();

                // An authored question with no correct option is a data
                // anomaly; it grades as always-incorrect rather than erroring.
                // Exact set equality, no partial credit.
                if !correct.is_empty() && submitted == correct {
                    QuestionOutcome::Correct
                } else {
                    QuestionOutcome::Incorrect
                }
            }
        }
    }
}
