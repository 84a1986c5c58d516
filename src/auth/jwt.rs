use jsonwebtoken::{decode, DecodingKey, EncodingKey, Validation};
#[cfg(test)]
use jsonwebtoken::{encode, Header};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    auth::claims::Claims,
    errors::{AppError, AppResult},
};

/// Validates bearer tokens minted by the platform's auth service. This
/// engine never issues tokens to real users; the test-only minting helper
/// exists so middleware tests can forge a caller.
#[derive(Clone)]
pub struct JwtService {
    #[cfg(test)]
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &SecretString) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        Self {
            #[cfg(test)]
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation: Validation::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn create_token(
        &self,
        user_id: &str,
        email: &str,
        expiration_hours: i64,
    ) -> AppResult<String> {
        let claims = Claims::new(user_id, email, expiration_hours);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to create JWT: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}
