use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

pub const BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

// bcrypt is CPU bound, keep it off the async workers
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hash)
}

pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(matches)
}

pub fn issue_token(user: &User, config: &JwtConfig) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.expires_in_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(AppError::TokenSigning)
}

/// Verifies signature and expiry. Any failure is reported as 401.
pub fn decode_token(token: &str, config: &JwtConfig) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("rejected access token: {}", e);
        AppError::Unauthorized
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_config(expires_in_hours: i64) -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expires_in_hours,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Jamie Rahman".to_string(),
            email: "jamie@gmail.com".to_string(),
            password: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_carries_identity_and_role() {
        let config = jwt_config(24);
        let admin = user(Role::Admin);
        let token = issue_token(&admin, &config).unwrap();

        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.sub, admin.id);
        assert_eq!(claims.email, admin.email);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let config = jwt_config(-2);
        let token = issue_token(&user(Role::User), &config).unwrap();
        assert!(matches!(decode_token(&token, &config), Err(AppError::Unauthorized)));
    }

    #[test]
    fn token_signed_with_other_secret_is_unauthorized() {
        let token = issue_token(&user(Role::User), &jwt_config(1)).unwrap();
        let other = JwtConfig {
            secret: "another-secret".to_string(),
            expires_in_hours: 1,
        };
        assert!(matches!(decode_token(&token, &other), Err(AppError::Unauthorized)));
        assert!(matches!(decode_token("garbage", &other), Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn password_hash_verifies_only_the_original() {
        let hash = hash_password("Sup3r$ecret").await.unwrap();
        assert_ne!(hash, "Sup3r$ecret");
        assert!(verify_password("Sup3r$ecret", &hash).await.unwrap());
        assert!(!verify_password("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_a_hashing_error() {
        let err = verify_password("Sup3r$ecret", "not-a-bcrypt-hash").await.unwrap_err();
        assert!(matches!(err, AppError::Hashing(_)));
    }
}
