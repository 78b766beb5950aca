use actix_web::HttpRequest;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FunnelError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn create_token(user_id: &str, jwt_secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (Utc::now() + Duration::hours(24)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims.sub)
}

/// Extracts and validates the bearer token, returning the caller's user id.
/// Ownership checks beyond identity live with the upstream account layer.
pub fn verify_token(req: &HttpRequest, jwt_secret: &str) -> Result<Uuid, FunnelError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| FunnelError::Unauthorized("no authorization header".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| FunnelError::Unauthorized("invalid authorization header".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| FunnelError::Unauthorized("invalid token format".to_string()))?;
    let subject = validate_token(token, jwt_secret)
        .map_err(|e| FunnelError::Unauthorized(format!("invalid token: {e}")))?;
    Uuid::parse_str(&subject)
        .map_err(|_| FunnelError::Unauthorized("token subject is not a user id".to_string()))
}
