//! Auth services - Gestione autenticazione e registrazione utenti

use crate::core::{AppError, AppState, encode_jwt};
use crate::dtos::{CreateUserDTO, LoginDTO, UserDTO};
use crate::entities::User;
use crate::repositories::Create;
use axum::{
    extract::{Json, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

#[instrument(skip(state, body), fields(username = %body.username))]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginDTO>,
) -> Result<impl IntoResponse, AppError> {
    let user = match state.user.find_by_username(&body.username).await? {
        Some(user) => user,
        None => {
            warn!("Login attempt for unknown username");
            return Err(AppError::unauthorized("Username or password are not correct."));
        }
    };

    if !user.verify_password(&body.password) {
        warn!("Login attempt with wrong password");
        return Err(AppError::unauthorized("Username or password are not correct."));
    }

    let token = encode_jwt(user.username.clone(), user.user_id, &state.jwt_secret)?;

    let cookie_value = format!(
        "token={}; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
        token,
        60 * 60 * 24
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        HeaderValue::from_str(&cookie_value)
            .map_err(|_| AppError::internal_server_error("Failed to build cookie header"))?,
    );
    headers.insert(
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AppError::internal_server_error("Failed to build auth header"))?,
    );

    info!("User logged in successfully");
    Ok((StatusCode::OK, headers, Json(UserDTO::from(user))))
}

#[instrument(skip(state, body), fields(username = %body.username))]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserDTO>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    if state.user.find_by_username(&body.username).await?.is_some() {
        warn!("Registration attempt with taken username");
        return Err(AppError::conflict("Username already taken"));
    }

    let hashed = User::hash_password(&body.password)
        .map_err(|_| AppError::internal_server_error("Failed to hash password"))?;

    let user = state
        .user
        .create(&CreateUserDTO {
            username: body.username,
            password: hashed,
            full_name: body.full_name,
        })
        .await?;

    info!(user_id = user.user_id, "User registered");
    Ok((StatusCode::CREATED, Json(UserDTO::from(user))))
}
