pub mod fixtures {
    use chrono::Utc;

    use crate::models::domain::{
        Question, QuestionKind, QuestionOption, Quiz, QuizStatus,
    };

    /// A published quiz with one question of each kind: a 3-option mcq
    /// (option 0 correct), a true/false (true correct) and a short answer.
    pub fn published_quiz(id: &str, owner_user_id: &str) -> Quiz {
        Quiz {
            id: id.to_string(),
            owner_user_id: owner_user_id.to_string(),
            title: format!("Quiz {}", id),
            status: QuizStatus::Published,
            timer_seconds: Some(600),
            allow_multiple_attempts: true,
            max_attempts: None,
            negative_marking: false,
            negative_mark_value: None,
            randomize_questions: false,
            randomize_answers: false,
            questions: vec![
                mcq_question("q-mcq", 1.0, &[true, false, false]),
                Question {
                    id: "q-tf".to_string(),
                    prompt: "True or false?".to_string(),
                    points: 1.0,
                    kind: QuestionKind::TrueFalse { correct: true },
                },
                Question {
                    id: "q-sa".to_string(),
                    prompt: "Explain your reasoning".to_string(),
                    points: 2.0,
                    kind: QuestionKind::ShortAnswer,
                },
            ],
            created_at: Some(Utc::now()),
            modified_at: Some(Utc::now()),
        }
    }

    pub fn mcq_question(id: &str, points: f64, correct_flags: &[bool]) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("Question {}", id),
            points,
            kind: QuestionKind::Mcq {
                multiple_correct: correct_flags.iter().filter(|&&c| c).count() > 1,
                options: correct_flags
                    .iter()
                    .enumerate()
                    .map(|(i, &is_correct)| QuestionOption {
                        text: format!("option {}", i),
                        is_correct,
                    })
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use crate::models::domain::QuizStatus;

    #[test]
    fn test_fixture_quiz_shape() {
        let quiz = published_quiz("quiz-1", "owner-1");

        assert_eq!(quiz.status, QuizStatus::Published);
        assert_eq!(quiz.questions.len(), 3);
        assert_eq!(quiz.questions[0].option_count(), 3);
        assert!(quiz.questions[0].is_auto_gradable());
        assert!(!quiz.questions[2].is_auto_gradable());
    }
}
