//! Staff-only management of users and logos.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::accounts::{self, UserQuery, UserUpdate};
use crate::entities::{logo, user};
use crate::error::AppError;
use crate::logos::{self, LogoInput};
use crate::routes::auth::require_staff;
use crate::state::AppState;

/// Columns shown in the user list.
#[derive(Debug, Serialize)]
pub struct UserRow {
    pub id: i32,
    pub phone: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_customer: bool,
    pub is_wholesale: bool,
}

impl From<user::Model> for UserRow {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            phone: u.phone,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            is_staff: u.is_staff,
            is_customer: u.is_customer,
            is_wholesale: u.is_wholesale,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

// ─── Users ───

pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<UserRow>>, AppError> {
    require_staff(&state, &headers).await?;
    let users = accounts::list_users(&state.db, query).await?;
    Ok(Json(users.into_iter().map(UserRow::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i32>,
) -> Result<Json<user::Model>, AppError> {
    require_staff(&state, &headers).await?;
    Ok(Json(accounts::find_user(&state.db, user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i32>,
    Json(changes): Json<UserUpdate>,
) -> Result<Json<user::Model>, AppError> {
    let actor = require_staff(&state, &headers).await?;
    let target = accounts::find_user(&state.db, user_id).await?;
    ensure_can_edit(&actor, &target, &changes)?;
    let updated = accounts::update_user(&state.db, user_id, changes).await?;
    tracing::info!(actor = actor.id, target = updated.id, "Admin updated user");
    Ok(Json(updated))
}

/// Superusers may change anyone. Plain staff may not touch superuser
/// accounts, may not grant staff or superuser, and may not change the
/// credentials or status of other staff.
fn ensure_can_edit(
    actor: &user::Model,
    target: &user::Model,
    changes: &UserUpdate,
) -> Result<(), AppError> {
    if actor.is_superuser {
        return Ok(());
    }

    let touches_privileges = changes.is_superuser.is_some() || changes.is_staff.is_some();
    let touches_credentials =
        changes.password.is_some() || changes.phone.is_some() || changes.is_active.is_some();
    let other_staff = target.is_staff && target.id != actor.id;

    if target.is_superuser || touches_privileges || (other_staff && touches_credentials) {
        tracing::warn!(actor = actor.id, target = target.id, "Refused admin user update");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

// ─── Logos ───

pub async fn list_logos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<logo::Model>>, AppError> {
    require_staff(&state, &headers).await?;
    Ok(Json(logos::list_logos(&state.db).await?))
}

pub async fn create_logo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LogoInput>,
) -> Result<(StatusCode, Json<logo::Model>), AppError> {
    require_staff(&state, &headers).await?;
    let created = logos::save_logo(&state.db, None, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_logo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(logo_id): Path<i32>,
    Json(input): Json<LogoInput>,
) -> Result<Json<logo::Model>, AppError> {
    require_staff(&state, &headers).await?;
    Ok(Json(logos::save_logo(&state.db, Some(logo_id), input).await?))
}

pub async fn delete_logo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(logo_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_staff(&state, &headers).await?;
    logos::delete_logo(&state.db, logo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cleanup_logos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, AppError> {
    require_staff(&state, &headers).await?;
    let removed = logos::delete_invalid_logos(&state.db).await?;
    Ok(Json(CleanupResponse { removed }))
}
