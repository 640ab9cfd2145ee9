//! Server library - espone i moduli principali per i test

pub mod core;
pub mod dtos;
pub mod entities;
pub mod repositories;
pub mod services;
pub mod ws;

// Re-export dei tipi principali per facilitare l'import
pub use core::{AppError, AppState, DispatchError};
pub use services::root;

use axum::{
    Router, middleware,
    routing::{any, delete, get, post},
};
use std::sync::Arc;

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    use core::authentication_middleware;
    use ws::ws_handler;

    Router::new()
        .route("/", get(root))
        .nest("/auth", configure_auth_routes())
        .nest("/users", configure_user_routes(state.clone()))
        .nest("/conversations", configure_conversation_routes(state.clone()))
        .route(
            "/ws",
            any(ws_handler).layer(middleware::from_fn_with_state(
                state.clone(),
                authentication_middleware,
            )),
        )
        .with_state(state)
}

/// Configura le routes di autenticazione (login, register)
fn configure_auth_routes() -> Router<Arc<AppState>> {
    use services::*;
    Router::new()
        .route("/login", post(login_user))
        .route("/register", post(register_user))
}

/// Configura le routes di ricerca utenti
fn configure_user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/search", get(search_users))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes delle conversazioni
fn configure_conversation_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::{authentication_middleware, conversation_membership_middleware};
    use services::*;

    // La lista e il badge richiedono solo autenticazione
    let list_routes = Router::new()
        .route("/", get(list_conversations))
        .route("/unread-count", get(get_unread_count))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authentication_middleware,
        ));

    // Cronologia e abbandono richiedono anche la partecipazione alla conversazione
    let member_routes = Router::new()
        .route("/{conversation_id}/messages", get(get_conversation_messages))
        .route("/{conversation_id}", delete(delete_conversation))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            conversation_membership_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ));

    list_routes.merge(member_routes)
}
