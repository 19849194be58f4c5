use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use habit_db::Database;
use habit_types::api::{Claims, TokenRequest, TokenResponse};

use crate::error::ApiError;
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
}

/// Token lifetime.
const TOKEN_TTL_DAYS: i64 = 30;

/// POST /users/token/: exchange email and password for a bearer token.
pub async fn obtain_token(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<TokenRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| {
        let user = db
            .get_user_by_email(&req.email)?
            .filter(|u| u.is_active)
            .ok_or(ApiError::Unauthorized)?;
        if !verify_password(&req.password, &user.password)? {
            return Err(ApiError::Unauthorized);
        }
        Ok(user)
    })
    .await?;

    let user_id: Uuid = user.id.parse().map_err(anyhow::Error::from)?;
    let access = issue_token(&state.jwt_secret, user_id, &user.email)?;

    Ok(Json(TokenResponse { user_id, access }))
}

/// Hash a password with Argon2id.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

pub fn issue_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
