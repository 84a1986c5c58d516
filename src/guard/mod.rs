pub mod middleware;
pub mod rate_limit;

pub use middleware::RateLimitMiddleware;
pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::config::GuardConfig;
use crate::errors::{AppError, AppResult};

/// Feature key under which attempt traffic is rate limited.
pub const RATE_LIMIT_FEATURE: &str = "quiz_attempt";

/// Upper bound on retained submit timestamps per user.
const SUBMISSION_HISTORY_CAP: usize = 32;

/// Per-user abuse checks in front of the attempt state machine. Rate-limit
/// and ownership failures are hard rejections; the anomaly heuristics only
/// produce log lines and never block a request.
pub struct AbuseGuard {
    store: Arc<dyn RateLimitStore>,
    config: GuardConfig,
    submissions: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl AbuseGuard {
    pub fn new(store: Arc<dyn RateLimitStore>, config: GuardConfig) -> Self {
        Self {
            store,
            config,
            submissions: Mutex::new(HashMap::new()),
        }
    }

    /// Fixed 1-minute-bucket limit on mutating attempt requests. Exceeding
    /// the cap rejects before any state-machine call is made.
    pub async fn check_rate_limit(&self, user_id: &str) -> AppResult<()> {
        let key = format!("{}:{}", user_id, RATE_LIMIT_FEATURE);
        let count = self.store.increment(&key, 60).await;

        if count > self.config.rate_limit_per_minute {
            log::warn!(
                "rate limit exceeded: user={} feature={} count={}",
                user_id,
                RATE_LIMIT_FEATURE,
                count
            );
            return Err(AppError::RateLimited(
                "Too many quiz attempt requests, slow down".to_string(),
            ));
        }

        Ok(())
    }

    /// Records a submit-type call and flags the user when more than the
    /// configured number land within the trailing window.
    pub async fn note_submission(&self, user_id: &str) -> bool {
        let now = Utc::now();
        let cutoff = now - Duration::seconds(self.config.rapid_submission_window_seconds);

        let mut submissions = self.submissions.lock().await;
        let timestamps = submissions.entry(user_id.to_string()).or_default();

        timestamps.retain(|ts| *ts > cutoff);
        timestamps.push(now);
        if timestamps.len() > SUBMISSION_HISTORY_CAP {
            let excess = timestamps.len() - SUBMISSION_HISTORY_CAP;
            timestamps.drain(..excess);
        }

        let flagged = timestamps.len() > self.config.rapid_submission_threshold;
        if flagged {
            log::warn!(
                "anomaly rapid_submissions: user={} submits_in_window={}",
                user_id,
                timestamps.len()
            );
        }
        flagged
    }

    /// Flags implausibly fast answering based on the client-reported time.
    pub fn check_timing(&self, user_id: &str, time_spent_seconds: i64, answered: u32) -> bool {
        if answered == 0 {
            return false;
        }
        let per_question = time_spent_seconds as f64 / f64::from(answered);
        let flagged = per_question < self.config.min_seconds_per_question;
        if flagged {
            log::warn!(
                "anomaly implausible_timing: user={} seconds_per_question={:.2}",
                user_id,
                per_question
            );
        }
        flagged
    }

    /// Flags an excessive number of simultaneous in-progress attempts across
    /// quizzes at start time.
    pub fn check_concurrency(&self, user_id: &str, in_progress_count: u64) -> bool {
        let flagged = in_progress_count > self.config.concurrent_attempt_threshold;
        if flagged {
            log::warn!(
                "anomaly concurrent_attempts: user={} in_progress={}",
                user_id,
                in_progress_count
            );
        }
        flagged
    }

    #[cfg(test)]
    pub(crate) async fn submissions_in_window(&self, user_id: &str) -> usize {
        self.submissions
            .lock()
            .await
            .get(user_id)
            .map_or(0, Vec::len)
    }

    /// Security event for an attempt accessed by a non-owner.
    pub fn log_ownership_violation(
        &self,
        caller_id: &str,
        owner_id: &str,
        attempt_id: &str,
        origin: Option<&str>,
    ) {
        log::warn!(
            "security ownership_violation: caller={} owner={} attempt={} origin={}",
            caller_id,
            owner_id,
            attempt_id,
            origin.unwrap_or("unknown")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with(config: GuardConfig) -> AbuseGuard {
        AbuseGuard::new(Arc::new(InMemoryRateLimitStore::new()), config)
    }

    #[tokio::test]
    async fn rate_limit_rejects_request_over_cap() {
        let guard = guard_with(GuardConfig {
            rate_limit_per_minute: 30,
            ..GuardConfig::default()
        });

        for _ in 0..30 {
            guard
                .check_rate_limit("user-1")
                .await
                .expect("requests within the cap should pass");
        }

        let over_cap = guard.check_rate_limit("user-1").await;
        assert!(matches!(over_cap, Err(AppError::RateLimited(_))));
    }

    #[tokio::test]
    async fn rate_limit_is_per_user() {
        let guard = guard_with(GuardConfig {
            rate_limit_per_minute: 1,
            ..GuardConfig::default()
        });

        guard.check_rate_limit("user-1").await.expect("first passes");
        assert!(guard.check_rate_limit("user-1").await.is_err());
        guard
            .check_rate_limit("user-2")
            .await
            .expect("other users are unaffected");
    }

    #[tokio::test]
    async fn rapid_submissions_flag_after_threshold() {
        let guard = guard_with(GuardConfig::default());

        assert!(!guard.note_submission("user-1").await);
        assert!(!guard.note_submission("user-1").await);
        assert!(!guard.note_submission("user-1").await);
        // Fourth submit inside the window crosses the "more than 3" line.
        assert!(guard.note_submission("user-1").await);
    }

    #[test]
    fn timing_flag_fires_below_five_seconds_per_question() {
        let guard = guard_with(GuardConfig::default());

        assert!(guard.check_timing("user-1", 8, 10));
        assert!(!guard.check_timing("user-1", 100, 10));
        // No answers means nothing to measure.
        assert!(!guard.check_timing("user-1", 0, 0));
    }

    #[test]
    fn concurrency_flag_fires_above_threshold() {
        let guard = guard_with(GuardConfig::default());

        assert!(!guard.check_concurrency("user-1", 2));
        assert!(guard.check_concurrency("user-1", 3));
    }
}
