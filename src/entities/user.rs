use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// Login identifier
    #[sea_orm(unique)]
    pub phone: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub governorate: Option<String>,
    pub is_customer: bool,
    pub is_wholesale: bool,
    pub is_staff_member: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<String>,
    pub date_joined: String,
}

impl Model {
    /// Staff and superusers may use the admin API.
    pub fn can_manage(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
