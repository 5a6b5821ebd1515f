use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::{Role, User};
use crate::services::auth::{hash_password, issue_token, verify_password};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
}

const PASSWORD_SPECIALS: &str = "@$!%*?&";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "fullName should not be empty"))]
    pub full_name: String,
    #[validate(
        email(message = "email must be an email"),
        custom(function = "validate_gmail")
    )]
    pub email: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters long."),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be an email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password should not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

fn validate_gmail(email: &str) -> Result<(), ValidationError> {
    let valid = email
        .strip_suffix("@gmail.com")
        .filter(|local| !local.is_empty())
        .is_some_and(|local| {
            local
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        });
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("gmail")
            .with_message(Cow::Borrowed("Email must be a valid @gmail.com address")))
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
    let strong = allowed
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if strong {
        Ok(())
    } else {
        Err(ValidationError::new("password_strength").with_message(Cow::Borrowed(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character (@$!%*?&)",
        )))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    if User::exists_with_email(&req.email, &state.db.pool).await? {
        return Err(AppError::Conflict("User with this email already exists".to_string()));
    }

    let hash = hash_password(&req.password).await?;
    let user = User::create(&req.full_name, &req.email, &hash, Role::User, &state.db.pool)
        .await
        .map_err(|e| {
            // lost a race against a concurrent registration
            if is_unique_violation(&e) {
                AppError::Conflict("User with this email already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = User::find_by_email(&req.email, &state.db.pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password).await? {
        return Err(AppError::InvalidCredentials);
    }

    let access_token = issue_token(&user, &state.config.jwt)?;
    tracing::debug!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse { access_token }))
}

// GET /api/auth/profile
async fn profile(user: AuthUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: user.id,
        email: user.email,
        role: user.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Nadia Karim".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn accepts_gmail_with_strong_password() {
        assert!(request("nadia.karim@gmail.com", "Str0ng!pass").validate().is_ok());
    }

    #[test]
    fn rejects_non_gmail_address() {
        let errors = request("nadia@example.com", "Str0ng!pass").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(validate_gmail("@gmail.com").is_err());
        assert!(validate_gmail("a+b@gmail.com").is_err());
        assert!(validate_gmail("é@gmail.com").is_err());
        assert!(validate_gmail("nadia_k-1.x@gmail.com").is_ok());
    }

    #[test]
    fn rejects_weak_passwords() {
        for weak in ["alllowercase1!", "NOLOWER1!", "NoDigits!!", "NoSpecial11", "Has space1!"] {
            assert!(validate_password_strength(weak).is_err(), "{weak} should be rejected");
        }
        assert!(validate_password_strength("Exact1!a").is_ok());
        let errors = request("nadia@gmail.com", "Ab1!").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }
}
