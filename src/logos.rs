//! Logo management. Every write goes through a transaction so the single
//! active logo rule holds even with concurrent admins.

use sea_orm::*;
use serde::Deserialize;

use crate::entities::logo;
use crate::error::{AppError, ValidationError};
use crate::validators::{validate_image_url, validate_logo_name};

pub const PLACEHOLDER_PREFIX: &str = "https://via.placeholder";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoInput {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Validated form of a [`LogoInput`].
struct CleanLogo {
    name: String,
    image_url: String,
    is_active: bool,
}

impl LogoInput {
    fn clean(self) -> Result<CleanLogo, ValidationError> {
        let image_url = validate_image_url(self.image_url.as_deref())?.to_string();
        let name = match self.name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => logo::DEFAULT_NAME.to_string(),
        };
        validate_logo_name(&name)?;
        Ok(CleanLogo {
            name,
            image_url,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Insert (`id = None`) or update a logo. Activating it deactivates all the
/// others in the same transaction. Invalid input fails before the
/// transaction is opened.
pub async fn save_logo(
    db: &DatabaseConnection,
    id: Option<i32>,
    input: LogoInput,
) -> Result<logo::Model, AppError> {
    let clean = input.clean()?;

    let txn = db.begin().await?;

    let mut active: logo::ActiveModel = match id {
        Some(id) => logo::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("اللوغو"))?
            .into(),
        None => logo::ActiveModel::new(),
    };
    active.name = Set(clean.name);
    active.image_url = Set(clean.image_url);
    active.is_active = Set(clean.is_active);

    // The hook has already deactivated the other logos on this transaction;
    // a failed row write must take that back with it.
    let saved = match active.save(&txn).await.and_then(|m| m.try_into_model()) {
        Ok(saved) => saved,
        Err(e) => {
            tracing::warn!("Logo write failed, rolling back: {e}");
            txn.rollback().await?;
            return Err(e.into());
        }
    };
    txn.commit().await?;

    tracing::info!(id = saved.id, active = saved.is_active, "Saved logo");
    Ok(saved)
}

pub async fn active_logo(db: &DatabaseConnection) -> Result<Option<logo::Model>, AppError> {
    Ok(logo::Entity::find()
        .filter(logo::Column::IsActive.eq(true))
        .one(db)
        .await?)
}

pub async fn list_logos(db: &DatabaseConnection) -> Result<Vec<logo::Model>, AppError> {
    Ok(logo::Entity::find()
        .order_by_desc(logo::Column::UpdatedAt)
        .order_by_desc(logo::Column::Id)
        .all(db)
        .await?)
}

pub async fn delete_logo(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let result = logo::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("اللوغو"));
    }
    tracing::info!(id, "Deleted logo");
    Ok(())
}

/// Same rule as the `0004_delete_invalid_logos` migration, for rows that
/// slipped in through direct SQL afterwards. Returns the number removed.
pub async fn delete_invalid_logos(db: &DatabaseConnection) -> Result<u64, AppError> {
    let result = logo::Entity::delete_many()
        .filter(
            Condition::any()
                .add(logo::Column::ImageUrl.is_null())
                .add(logo::Column::ImageUrl.eq(""))
                .add(logo::Column::ImageUrl.starts_with(PLACEHOLDER_PREFIX)),
        )
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        tracing::warn!(removed = result.rows_affected, "Removed invalid logos");
    }
    Ok(result.rows_affected)
}
