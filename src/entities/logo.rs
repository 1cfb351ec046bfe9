use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set, Unchanged};
use sea_orm::sea_query::Expr;
use sea_orm::QueryFilter;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "شركة الريادة";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "logos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub image_url: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Keeps the active flag exclusive. Run it inside a transaction so the
    /// mass deactivation and the write land together.
    async fn before_save<C>(mut self, db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let image_missing = match &self.image_url {
            Set(url) | Unchanged(url) => url.trim().is_empty(),
            NotSet => insert,
        };
        if image_missing {
            return Err(DbErr::Custom("صورة اللوغو مطلوبة".into()));
        }

        let now = crate::db::now_timestamp();
        if insert {
            self.created_at = Set(now.clone());
        }
        self.updated_at = Set(now);

        let activating = match &self.is_active {
            Set(active) | Unchanged(active) => *active,
            // column default is active
            NotSet => insert,
        };

        if activating {
            let mut others = Entity::update_many()
                .col_expr(Column::IsActive, Expr::value(false))
                .filter(Column::IsActive.eq(true));
            if let Set(id) | Unchanged(id) = &self.id {
                others = others.filter(Column::Id.ne(*id));
            }
            let result = others.exec(db).await?;
            if result.rows_affected > 0 {
                tracing::debug!(deactivated = result.rows_affected, "Deactivated previous logos");
            }
        }

        Ok(self)
    }
}
