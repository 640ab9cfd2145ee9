//! User services - Ricerca utenti per avviare una nuova conversazione

use crate::core::{AppError, AppState};
use crate::dtos::{UserDTO, UserSearchQuery};
use crate::entities::User;
use axum::{
    Extension,
    extract::{Json, Query, State},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Ricerca per username o nome completo, escludendo il chiamante.
/// Una query vuota o di soli spazi non tocca il database e ritorna lista vuota.
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id, search = %params.search))]
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<UserSearchQuery>,
) -> Result<Json<Vec<UserDTO>>, AppError> {
    debug!("Searching users");

    let search = params.search.trim();
    if search.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let users = state
        .user
        .search_by_username_partial(search, &current_user.user_id)
        .await?;

    info!("Found {} users matching search criteria", users.len());
    let users_dto = users.into_iter().map(UserDTO::from).collect::<Vec<_>>();
    Ok(Json(users_dto))
}
