use secrecy::SecretString;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub jwt_secret: SecretString,
    pub cors_allowed_origin: String,
    pub guard: GuardConfig,
}

/// Thresholds for the abuse guard. All of these are per-user.
#[derive(Clone, Debug)]
pub struct GuardConfig {
    /// Mutating attempt requests allowed per fixed one-minute window.
    pub rate_limit_per_minute: u64,
    /// Submit calls within the trailing window before the rapid-submission
    /// flag is raised.
    pub rapid_submission_threshold: usize,
    pub rapid_submission_window_seconds: i64,
    /// Average seconds per answered question below which timing is flagged.
    pub min_seconds_per_question: f64,
    /// Simultaneous in-progress attempts (across all quizzes) above which the
    /// concurrency flag is raised.
    pub concurrent_attempt_threshold: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 30,
            rapid_submission_threshold: 3,
            rapid_submission_window_seconds: 60,
            min_seconds_per_question: 5.0,
            concurrent_attempt_threshold: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME")
                .unwrap_or_else(|_| "attempt-engine-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: SecretString::from(
                env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "dev_secret_key_change_in_production".to_string()),
            ),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            guard: GuardConfig {
                rate_limit_per_minute: env::var("ATTEMPT_RATE_LIMIT_PER_MINUTE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                rapid_submission_threshold: env::var("RAPID_SUBMISSION_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                rapid_submission_window_seconds: 60,
                min_seconds_per_question: env::var("MIN_SECONDS_PER_QUESTION")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5.0),
                concurrent_attempt_threshold: env::var("CONCURRENT_ATTEMPT_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2),
            },
        }
    }

    /// Validate that production-critical configuration is set
    /// Panics if required secrets are using default values
    pub fn validate_for_production(&self) {
        use secrecy::ExposeSecret;

        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == "dev_secret_key_change_in_production" {
            panic!(
                "FATAL: JWT_SECRET is using default value! Set JWT_SECRET environment variable to a secure random string."
            );
        }

        if jwt_secret.len() < 32 {
            panic!(
                "FATAL: JWT_SECRET is too short ({}). Must be at least 32 characters for security.",
                jwt_secret.len()
            );
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "attempt-engine-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            cors_allowed_origin: "http://localhost:5173".to_string(),
            guard: GuardConfig::default(),
        }
    }
}
