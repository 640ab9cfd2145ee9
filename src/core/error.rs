//! Error handling - Errori applicativi per HTTP e per il dispatcher WebSocket

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

pub struct AppError {
    status: StatusCode,
    message: &'static str,
    details: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status,
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Common error constructors
    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: &'static str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: &'static str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_server_error(message: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: &'static str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("Resource not found"),

            sqlx::Error::Database(_) => Self::bad_request("Database error"),

            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::service_unavailable("Database unavailable")
            }

            _ => Self::internal_server_error("Internal server error"),
        }
    }
}

impl From<axum::Error> for AppError {
    fn from(err: axum::Error) -> Self {
        Self::internal_server_error("Internal server error").with_details(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::bad_request("Validation error").with_details(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorResponse {
            error: self.message,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

/// Errori delle operazioni del dispatcher, consegnati al client sul canale
/// WebSocket come `ServerEvent::Error { code, message }`.
///
/// La connessione resta aperta in ogni caso: un'operazione rifiutata non è
/// mai motivo di disconnessione. `TransientStorage` NON viene ritentato
/// automaticamente, per non rischiare invii duplicati.
#[derive(Debug)]
pub enum DispatchError {
    /// Utente, messaggio o conversazione referenziati non esistono
    NotFound(&'static str),
    /// Violazione di autorizzazione (es. edit di un messaggio altrui)
    Forbidden(&'static str),
    /// Input malformato, rifiutato prima di qualunque accesso al database
    Validation(String),
    /// Lo storage non è raggiungibile: l'operazione fallisce ed è ritentabile dal client
    TransientStorage(sqlx::Error),
}

impl DispatchError {
    /// Codice numerico inviato al client, allineato agli status HTTP
    pub fn code(&self) -> u16 {
        match self {
            DispatchError::NotFound(_) => 404,
            DispatchError::Forbidden(_) => 403,
            DispatchError::Validation(_) => 400,
            DispatchError::TransientStorage(_) => 503,
        }
    }

    pub fn message(&self) -> String {
        match self {
            DispatchError::NotFound(msg) | DispatchError::Forbidden(msg) => (*msg).to_string(),
            DispatchError::Validation(msg) => msg.clone(),
            DispatchError::TransientStorage(_) => "Storage temporarily unavailable, retry the operation".to_string(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::TransientStorage(e) => write!(f, "transient storage error: {}", e),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found"),
            other => Self::TransientStorage(other),
        }
    }
}

impl From<validator::ValidationErrors> for DispatchError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound(msg) => AppError::not_found(msg),
            DispatchError::Forbidden(msg) => AppError::forbidden(msg),
            DispatchError::Validation(details) => {
                AppError::bad_request("Validation error").with_details(details)
            }
            DispatchError::TransientStorage(e) => {
                AppError::service_unavailable("Database unavailable").with_details(e.to_string())
            }
        }
    }
}
