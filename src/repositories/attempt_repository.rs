use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::Attempt};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn create(&self, attempt: Attempt) -> AppResult<Attempt>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Attempt>>;

    async fn find_in_progress(&self, user_id: &str, quiz_id: &str)
        -> AppResult<Option<Attempt>>;

    /// Replaces the stored attempt document. Fails with NotFound if the id
    /// does not exist.
    async fn update(&self, attempt: Attempt) -> AppResult<Attempt>;

    /// Conditional `in_progress -> expired` transition. Returns whether this
    /// call performed it, so lazy expiry persists exactly once under
    /// concurrent resumes.
    async fn mark_expired(&self, id: &str) -> AppResult<bool>;

    /// Conditional `in_progress -> abandoned` transition; `superseded` marks
    /// abandonment by a force-new start. Returns the updated attempt, or
    /// None if the attempt was no longer in progress.
    async fn mark_abandoned(&self, id: &str, superseded: bool) -> AppResult<Option<Attempt>>;

    /// Attempts that count toward the quiz's max-attempts cap: everything
    /// except abandoned ones.
    async fn count_countable(&self, user_id: &str, quiz_id: &str) -> AppResult<u64>;

    /// In-progress attempts for the user across all quizzes, for the
    /// concurrency heuristic.
    async fn count_in_progress_for_user(&self, user_id: &str) -> AppResult<u64>;

    async fn list_for_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)>;

    async fn list_all_for_user(&self, user_id: &str) -> AppResult<Vec<Attempt>>;
}

pub struct MongoAttemptRepository {
    collection: Collection<Attempt>,
}

impl MongoAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("attempts");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        // Single-writer guarantee for the "one in_progress attempt per
        // (user, quiz)" invariant: concurrent force-new starts race on this
        // partial unique index instead of both inserting.
        let in_progress_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "quiz_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "status": "in_progress" })
                    .name("user_quiz_in_progress_unique".to_string())
                    .build(),
            )
            .build();

        let user_id_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "started_at": -1 })
            .options(IndexOptions::builder().name("user_started".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(in_progress_index).await?;
        self.collection.create_index(user_id_index).await?;

        log::info!("Successfully created indexes for attempts collection");
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for MongoAttemptRepository {
    async fn create(&self, attempt: Attempt) -> AppResult<Attempt> {
        self.collection.insert_one(&attempt).await?;
        Ok(attempt)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Attempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn find_in_progress(
        &self,
        user_id: &str,
        quiz_id: &str,
    ) -> AppResult<Option<Attempt>> {
        let attempt = self
            .collection
            .find_one(doc! {
                "user_id": user_id,
                "quiz_id": quiz_id,
                "status": "in_progress"
            })
            .await?;
        Ok(attempt)
    }

    async fn update(&self, attempt: Attempt) -> AppResult<Attempt> {
        let result = self
            .collection
            .replace_one(doc! { "id": &attempt.id }, &attempt)
            .await?;

        if result.matched_count == 0 {
            return Err(crate::errors::AppError::NotFound(format!(
                "Attempt with id '{}' not found",
                attempt.id
            )));
        }

        Ok(attempt)
    }

    async fn mark_expired(&self, id: &str) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "id": id, "status": "in_progress" },
                doc! { "$set": { "status": "expired", "remaining_time_seconds": 0_i64 } },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn mark_abandoned(&self, id: &str, superseded: bool) -> AppResult<Option<Attempt>> {
        let attempt = self
            .collection
            .find_one_and_update(
                doc! { "id": id, "status": "in_progress" },
                doc! { "$set": { "status": "abandoned", "superseded": superseded } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(attempt)
    }

    async fn count_countable(&self, user_id: &str, quiz_id: &str) -> AppResult<u64> {
        let count = self
            .collection
            .count_documents(doc! {
                "user_id": user_id,
                "quiz_id": quiz_id,
                "status": { "$ne": "abandoned" }
            })
            .await?;
        Ok(count)
    }

    async fn count_in_progress_for_user(&self, user_id: &str) -> AppResult<u64> {
        let count = self
            .collection
            .count_documents(doc! { "user_id": user_id, "status": "in_progress" })
            .await?;
        Ok(count)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)> {
        let filter = doc! { "user_id": user_id };

        let total = self.collection.count_documents(filter.clone()).await?;

        let attempts = self
            .collection
            .find(filter)
            .skip(offset as u64)
            .limit(limit)
            .sort(doc! { "started_at": -1 })
            .await?
            .try_collect()
            .await?;

        Ok((attempts, total as i64))
    }

    async fn list_all_for_user(&self, user_id: &str) -> AppResult<Vec<Attempt>> {
        let attempts = self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "started_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }
}
