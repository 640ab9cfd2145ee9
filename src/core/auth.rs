use crate::core::{AppError, AppState};
use crate::entities::{ConversationParticipant, User};
use axum::extract::State;
use axum::{Error, body::Body, extract::Request, http, http::Response, middleware::Next};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// struct che codifica il contenuto del token jwt
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub id: i32,
    pub username: String,
}

#[instrument(skip(secret), fields(username = %username, id = %id))]
pub fn encode_jwt(username: String, id: i32, secret: &String) -> Result<String, Error> {
    debug!("Encoding JWT token for user");
    let now = Utc::now();
    let expire: chrono::TimeDelta = Duration::hours(24);
    let exp: usize = (now + expire).timestamp() as usize;
    let iat: usize = now.timestamp() as usize;
    let claim = Claims {
        iat,
        exp,
        username,
        id,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| {
        error!("Failed to encode JWT token: {:?}", e);
        Error::new("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: String, secret: &String) -> Result<TokenData<Claims>, Error> {
    debug!("Decoding JWT token");
    decode(
        &jwt_token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        error!("Failed to decode JWT token: {:?}", e);
        Error::new("Error in decoding jwt token")
    })
}

/// Middleware di autenticazione: risolve la connessione in un utente verificato.
/// È il collaboratore di identità usato anche dall'upgrade WebSocket: se fallisce,
/// la connessione viene rifiutata prima di qualunque registrazione di presenza.
#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let auth_header = req.headers_mut().get(http::header::AUTHORIZATION);
    let auth_header = match auth_header {
        Some(header) => header.to_str().map_err(|_| {
            warn!("Invalid authorization header format");
            AppError::forbidden("Empty header is not allowed")
        })?,
        None => {
            warn!("Missing authorization header");
            return Err(AppError::forbidden("Please add the JWT token to the header"));
        }
    };
    let mut header = auth_header.split_whitespace();
    let (_bearer, token) = (header.next(), header.next());
    let token = token.ok_or_else(|| {
        warn!("Malformed authorization header, token missing");
        AppError::unauthorized("Malformed authorization header")
    })?;
    let token_data = match decode_jwt(token.to_string(), &state.jwt_secret) {
        Ok(data) => data,
        Err(_) => {
            warn!("Failed to decode JWT token");
            return Err(AppError::unauthorized("Unable to decode token"));
        }
    };

    // Fetch the user details from the database
    let current_user = match state
        .user
        .find_by_username(&token_data.claims.username)
        .await?
    {
        Some(user) => {
            info!("User authenticated: {}", user.username);
            user
        }
        None => {
            warn!("User not found in database: {}", token_data.claims.username);
            return Err(AppError::unauthorized("You are not an authorized user"));
        }
    };
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// Middleware che verifica che l'utente corrente sia partecipante della conversazione.
/// Estrae conversation_id dal path, verifica la partecipazione e inserisce la riga
/// del partecipante nell'Extension per gli handler successivi.
#[instrument(skip(state, req, next))]
pub async fn conversation_membership_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running conversation membership middleware");
    let current_user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| {
            warn!("User not found in request extensions");
            AppError::unauthorized("User not authenticated")
        })?
        .clone();

    let conversation_id: i32 = req
        .uri()
        .path()
        .split('/')
        .find_map(|segment| segment.parse::<i32>().ok())
        .ok_or_else(|| {
            warn!("Conversation ID not found in path: {}", req.uri().path());
            AppError::bad_request("Conversation ID not found in path")
        })?;

    debug!(
        "Checking membership for user {} in conversation {}",
        current_user.user_id, conversation_id
    );

    let participant: ConversationParticipant = state
        .participants
        .find(&conversation_id, &current_user.user_id)
        .await?
        .ok_or_else(|| {
            warn!(
                "User {} is not a participant of conversation {}",
                current_user.user_id, conversation_id
            );
            AppError::forbidden("You are not a participant in this conversation")
        })?;

    req.extensions_mut().insert(participant);

    Ok(next.run(req).await)
}
