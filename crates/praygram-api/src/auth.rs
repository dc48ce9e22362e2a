use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use praygram_db::Database;
use praygram_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nickname = req.nickname.trim().to_string();
    if nickname.len() < 2 || nickname.len() > 32 {
        return Err(ApiError::InvalidInput(
            "Nickname must be 2-32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::InvalidInput(
            "Password must be at least 8 characters".into(),
        ));
    }

    let db = state.clone();
    let nick = nickname.clone();
    let password = req.password;
    let user_id = tokio::task::spawn_blocking(move || create_account(&db.db, &nick, &password))
        .await
        .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    let token = create_token(&state.jwt_secret, user_id, &nickname)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let nickname = req.nickname.trim().to_string();
    let password = req.password;
    let (user_id, nickname) =
        tokio::task::spawn_blocking(move || verify_credentials(&db.db, &nickname, &password))
            .await
            .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    let token = create_token(&state.jwt_secret, user_id, &nickname)?;

    Ok(Json(LoginResponse {
        user_id,
        nickname,
        token,
    }))
}

/// Hash the password with Argon2id and create the profile. Argon2 burns tens
/// of milliseconds of CPU on purpose, so callers run this in spawn_blocking.
fn create_account(db: &Database, nickname: &str, password: &str) -> Result<Uuid, ApiError> {
    if db.get_profile_by_nickname(nickname)?.is_some() {
        return Err(ApiError::Conflict("Nickname is already taken".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    db.create_profile(&user_id.to_string(), nickname, &password_hash)?;

    Ok(user_id)
}

/// Check the password against the stored hash. A missing profile and a wrong
/// password are indistinguishable to the caller.
fn verify_credentials(
    db: &Database,
    nickname: &str,
    password: &str,
) -> Result<(Uuid, String), ApiError> {
    let profile = db
        .get_profile_by_nickname(nickname)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash =
        PasswordHash::new(&profile.password).map_err(|e| anyhow!("corrupt password hash: {}", e))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = profile
        .id
        .parse()
        .map_err(|e| anyhow!("corrupt profile id '{}': {}", profile.id, e))?;

    Ok((user_id, profile.nickname))
}

fn create_token(secret: &str, user_id: Uuid, nickname: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        nickname: nickname.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
