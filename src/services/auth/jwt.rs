use crate::error::AppError;
use crate::models::auth_jwt_claims::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, error, info, trace};
use std::sync::OnceLock;
use uuid::Uuid;

// Default JWT duration in days
pub const DEFAULT_JWT_DURATION_DAYS: i64 = 30;

// Issuer name for JWT tokens
pub const JWT_ISSUER: &str = "pawhome";

// Global static holders for JWT keys
static JWT_ENCODING_KEY: OnceLock<EncodingKey> = OnceLock::new();
static JWT_DECODING_KEY: OnceLock<DecodingKey> = OnceLock::new();

/// Initialize the JWT keys from the secret
/// This should be called once at application startup
pub fn init_jwt_keys(jwt_secret_str: &str) -> Result<(), AppError> {
    info!("Initializing JWT keys from configuration");

    let jwt_secret = jwt_secret_str.as_bytes();

    let encoding_key = EncodingKey::from_secret(jwt_secret);
    JWT_ENCODING_KEY
        .set(encoding_key)
        .map_err(|_| AppError::Internal("JWT_ENCODING_KEY was already initialized".to_string()))?;

    let decoding_key = DecodingKey::from_secret(jwt_secret);
    JWT_DECODING_KEY
        .set(decoding_key)
        .map_err(|_| AppError::Internal("JWT_DECODING_KEY was already initialized".to_string()))?;

    info!("JWT keys initialized successfully");
    Ok(())
}

fn get_encoding_key() -> Result<EncodingKey, AppError> {
    JWT_ENCODING_KEY
        .get()
        .cloned()
        .ok_or_else(|| AppError::Configuration("JWT encoding key not initialized.".to_string()))
}

fn get_decoding_key() -> Result<DecodingKey, AppError> {
    JWT_DECODING_KEY
        .get()
        .cloned()
        .ok_or_else(|| AppError::Configuration("JWT decoding key not initialized.".to_string()))
}

/// Generate a JWT token for a user
pub fn generate_token(
    user_id: Uuid,
    email: &str,
    role: &str,
    token_duration_days: i64,
) -> Result<String, AppError> {
    let iat = Utc::now();
    let exp = iat
        .checked_add_signed(
            Duration::try_days(token_duration_days)
                .unwrap_or_else(|| Duration::days(DEFAULT_JWT_DURATION_DAYS)),
        )
        .ok_or_else(|| AppError::Internal("Failed to calculate JWT expiration time".to_string()))?;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp() as usize,
        iat: iat.timestamp() as usize,
        iss: Some(JWT_ISSUER.to_string()),
        email: email.to_string(),
        role: role.to_string(),
    };

    let encoding_key = get_encoding_key()?;
    let header = Header::new(Algorithm::HS256);

    debug!("Generating JWT token for user {} (exp: {})", user_id, exp);
    encode(&header, &claims, &encoding_key).map_err(|e| {
        error!("Failed to generate JWT token: {}", e);
        AppError::Internal(format!("Token generation failed: {}", e))
    })
}

/// Verify a JWT token and extract the claims
pub fn verify_token(token: &str) -> Result<Claims, AppError> {
    trace!("Verifying JWT token");

    let decoding_key = get_decoding_key()?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[JWT_ISSUER]);

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|err| {
        error!("JWT validation failed: {}", err);
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Auth("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                AppError::Auth("Invalid token issuer".to_string())
            }
            _ => AppError::Auth(format!("Invalid token: {}", err)),
        }
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_round_trip() {
        // Keys may already be set by another test in this process.
        let _ = init_jwt_keys("test-secret-for-unit-tests");

        let user_id = Uuid::new_v4();
        let token = generate_token(user_id, "ana@example.com", "adopter", 1).expect("generate");

        let claims = verify_token(&token).expect("verify");
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.role, "adopter");
        assert_eq!(claims.iss.as_deref(), Some(JWT_ISSUER));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let _ = init_jwt_keys("test-secret-for-unit-tests");
        assert!(matches!(
            verify_token("not-a-token"),
            Err(AppError::Auth(_))
        ));
    }
}
