use axum::{extract::State, Json};

use crate::entities::logo;
use crate::error::AppError;
use crate::logos;
use crate::state::AppState;

/// The storefront header logo.
pub async fn get_active_logo(State(state): State<AppState>) -> Result<Json<logo::Model>, AppError> {
    logos::active_logo(&state.db)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("اللوغو"))
}
