use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};
use uuid::Uuid;

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::{Question, QuestionKind, Quiz},
};

/// Read-only view of the quiz/question catalog plus the enrollment check.
/// Authoring writes happen in another service; the attempt engine only
/// consumes these.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quiz>>;

    async fn is_user_enrolled(&self, user_id: &str, quiz_id: &str) -> AppResult<bool>;

    /// Ordering request for a new attempt: question ids in presentation
    /// order and, for quizzes that randomize answers, a display permutation
    /// of option indices per question. The engine persists whatever order
    /// the catalog hands back; it does not own randomization.
    fn snapshot_order(&self, quiz: &Quiz) -> (Vec<String>, HashMap<String, Vec<u32>>);
}

pub struct MongoQuizRepository {
    quizzes: Collection<Quiz>,
    enrollments: Collection<Document>,
}

impl MongoQuizRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            quizzes: db.get_collection("quizzes"),
            enrollments: db.get_collection("enrollments"),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quizzes and enrollments collections");

        let quiz_id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();
        self.quizzes.create_index(quiz_id_index).await?;

        let enrollment_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "quiz_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_quiz_unique".to_string())
                    .build(),
            )
            .build();
        self.enrollments.create_index(enrollment_index).await?;

        Ok(())
    }

    fn shuffled<T>(mut items: Vec<T>) -> Vec<T> {
        // v4 UUIDs are random, so sorting by a fresh one per element is a
        // dependency-free shuffle.
        let mut keyed: Vec<(String, T)> = items
            .drain(..)
            .map(|item| (Uuid::new_v4().to_string(), item))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, item)| item).collect()
    }
}

#[async_trait]
impl QuizRepository for MongoQuizRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quiz>> {
        let quiz = self.quizzes.find_one(doc! { "id": id }).await?;
        Ok(quiz)
    }

    async fn is_user_enrolled(&self, user_id: &str, quiz_id: &str) -> AppResult<bool> {
        let enrollment = self
            .enrollments
            .find_one(doc! { "user_id": user_id, "quiz_id": quiz_id })
            .await?;
        Ok(enrollment.is_some())
    }

    fn snapshot_order(&self, quiz: &Quiz) -> (Vec<String>, HashMap<String, Vec<u32>>) {
        let mut question_ids: Vec<String> = quiz.questions.iter().map(|q| q.id.clone()).collect();
        if quiz.randomize_questions {
            question_ids = Self::shuffled(question_ids);
        }

        let mut option_orders = HashMap::new();
        if quiz.randomize_answers {
            for question in &quiz.questions {
                if let Question {
                    kind: QuestionKind::Mcq { options, .. },
                    ..
                } = question
                {
                    let order = Self::shuffled((0..options.len() as u32).collect());
                    option_orders.insert(question.id.clone(), order);
                }
            }
        }

        (question_ids, option_orders)
    }
}
