use std::sync::Arc;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    guard::{AbuseGuard, InMemoryRateLimitStore},
    repositories::{MongoAttemptRepository, MongoQuizRepository},
    services::{AttemptService, QuizService},
};

#[derive(Clone)]
pub struct AppState {
    pub attempt_service: Arc<AttemptService>,
    pub quiz_service: Arc<QuizService>,
    pub guard: Arc<AbuseGuard>,
    pub db: Database,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let quiz_repository = Arc::new(MongoQuizRepository::new(&db));
        quiz_repository.ensure_indexes().await?;

        let attempt_repository = Arc::new(MongoAttemptRepository::new(&db));
        attempt_repository.ensure_indexes().await?;

        let guard = Arc::new(AbuseGuard::new(
            Arc::new(InMemoryRateLimitStore::new()),
            config.guard.clone(),
        ));

        let attempt_service = Arc::new(AttemptService::new(
            attempt_repository,
            quiz_repository.clone(),
            guard.clone(),
        ));
        let quiz_service = Arc::new(QuizService::new(quiz_repository));

        Ok(Self {
            attempt_service,
            quiz_service,
            guard,
            db,
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
