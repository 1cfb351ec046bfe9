//! User accounts: field validation on every write, argon2 password hashes,
//! phone + password authentication and the admin listing query.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sea_orm::*;
use serde::Deserialize;

use crate::db::now_timestamp;
use crate::entities::user;
use crate::error::{AppError, ValidationError};
use crate::validators::{validate_email, validate_governorate, validate_phone, validate_username};

const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub governorate: Option<String>,
    #[serde(default = "default_true")]
    pub is_customer: bool,
    #[serde(default)]
    pub is_wholesale: bool,
    #[serde(default)]
    pub is_staff_member: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

fn default_true() -> bool {
    true
}

impl NewUser {
    /// A plain customer account, as created by self-registration.
    pub fn customer(username: &str, phone: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            phone: phone.to_string(),
            password: password.to_string(),
            email: None,
            first_name: String::new(),
            last_name: String::new(),
            address: None,
            governorate: None,
            is_customer: true,
            is_wholesale: false,
            is_staff_member: false,
            is_staff: false,
            is_superuser: false,
        }
    }
}

/// Partial update. `None` leaves the column as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub governorate: Option<String>,
    pub is_customer: Option<bool>,
    pub is_wholesale: Option<bool>,
    pub is_staff_member: Option<bool>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Admin list filters. Results are always ordered by phone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    /// Matches email, username, phone, first and last name.
    pub search: Option<String>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    pub is_active: Option<bool>,
    pub is_customer: Option<bool>,
    pub is_wholesale: Option<bool>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingRequiredField { field: "password" });
    }
    let actual = password.chars().count();
    if actual < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidLength {
            field: "password",
            min: MIN_PASSWORD_LEN,
            max: usize::MAX,
            actual,
        });
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Hash error: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn create_user(db: &DatabaseConnection, new: NewUser) -> Result<user::Model, AppError> {
    let username = new.username.trim().to_string();
    let phone = new.phone.trim().to_string();
    let governorate = blank_to_none(new.governorate);
    let email = blank_to_none(new.email);

    validate_username(&username).map_err(ValidationError::from)?;
    validate_phone(&phone)?;
    validate_email(email.as_deref())?;
    validate_governorate(governorate.as_deref())?;
    check_password(&new.password)?;

    let password_hash = hash_password(&new.password)?;

    let created = user::ActiveModel {
        username: Set(username),
        phone: Set(phone),
        email: Set(email),
        first_name: Set(new.first_name.trim().to_string()),
        last_name: Set(new.last_name.trim().to_string()),
        address: Set(blank_to_none(new.address)),
        governorate: Set(governorate),
        is_customer: Set(new.is_customer),
        is_wholesale: Set(new.is_wholesale),
        is_staff_member: Set(new.is_staff_member),
        password_hash: Set(password_hash),
        is_active: Set(true),
        is_staff: Set(new.is_staff),
        is_superuser: Set(new.is_superuser),
        last_login: Set(None),
        date_joined: Set(now_timestamp()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(id = created.id, username = %created.username, "Created user");
    Ok(created)
}

pub async fn update_user(
    db: &DatabaseConnection,
    id: i32,
    changes: UserUpdate,
) -> Result<user::Model, AppError> {
    let existing = find_user(db, id).await?;
    let mut active: user::ActiveModel = existing.clone().into();

    if let Some(username) = changes.username {
        let username = username.trim().to_string();
        validate_username(&username).map_err(ValidationError::from)?;
        active.username = Set(username);
    }
    if let Some(phone) = changes.phone {
        let phone = phone.trim().to_string();
        validate_phone(&phone)?;
        active.phone = Set(phone);
    }
    if let Some(governorate) = changes.governorate {
        let governorate = blank_to_none(Some(governorate));
        validate_governorate(governorate.as_deref())?;
        active.governorate = Set(governorate);
    }
    if let Some(password) = changes.password {
        check_password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }
    if let Some(email) = changes.email {
        let email = blank_to_none(Some(email));
        validate_email(email.as_deref())?;
        active.email = Set(email);
    }
    if let Some(address) = changes.address {
        active.address = Set(blank_to_none(Some(address)));
    }
    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if let Some(v) = changes.is_customer {
        active.is_customer = Set(v);
    }
    if let Some(v) = changes.is_wholesale {
        active.is_wholesale = Set(v);
    }
    if let Some(v) = changes.is_staff_member {
        active.is_staff_member = Set(v);
    }
    if let Some(v) = changes.is_active {
        active.is_active = Set(v);
    }
    if let Some(v) = changes.is_staff {
        active.is_staff = Set(v);
    }
    if let Some(v) = changes.is_superuser {
        active.is_superuser = Set(v);
    }

    if !active.is_changed() {
        return Ok(existing);
    }

    let updated = active.update(db).await?;
    tracing::info!(id = updated.id, "Updated user");
    Ok(updated)
}

pub async fn find_user(db: &DatabaseConnection, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("المستخدم"))
}

/// Phone + password login. Inactive accounts are refused with the same
/// message as a wrong password.
pub async fn authenticate(
    db: &DatabaseConnection,
    phone: &str,
    password: &str,
) -> Result<user::Model, AppError> {
    const INVALID: AppError = AppError::Unauthorized("رقم الهاتف أو كلمة المرور غير صحيحة");

    let user = user::Entity::find()
        .filter(user::Column::Phone.eq(phone.trim()))
        .one(db)
        .await?
        .ok_or(INVALID)?;

    if !user.is_active || !verify_password(password, &user.password_hash) {
        tracing::debug!(id = user.id, "Rejected login");
        return Err(INVALID);
    }

    let mut active: user::ActiveModel = user.into();
    active.last_login = Set(Some(now_timestamp()));
    Ok(active.update(db).await?)
}

pub async fn list_users(
    db: &DatabaseConnection,
    query: UserQuery,
) -> Result<Vec<user::Model>, AppError> {
    let mut select = user::Entity::find();

    if let Some(term) = blank_to_none(query.search) {
        select = select.filter(
            Condition::any()
                .add(user::Column::Email.contains(&term))
                .add(user::Column::Username.contains(&term))
                .add(user::Column::Phone.contains(&term))
                .add(user::Column::FirstName.contains(&term))
                .add(user::Column::LastName.contains(&term)),
        );
    }

    let flags = [
        (user::Column::IsStaff, query.is_staff),
        (user::Column::IsSuperuser, query.is_superuser),
        (user::Column::IsActive, query.is_active),
        (user::Column::IsCustomer, query.is_customer),
        (user::Column::IsWholesale, query.is_wholesale),
    ];
    for (column, wanted) in flags {
        if let Some(wanted) = wanted {
            select = select.filter(column.eq(wanted));
        }
    }

    Ok(select.order_by_asc(user::Column::Phone).all(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let db = test_db().await;
        let created = create_user(&db, NewUser::customer("محمد", "07701112222", "secret1"))
            .await
            .unwrap();
        assert!(created.is_customer);
        assert!(!created.is_wholesale);
        assert_ne!(created.password_hash, "secret1");
        assert_eq!(created.to_string(), "محمد");

        let logged_in = authenticate(&db, "07701112222", "secret1").await.unwrap();
        assert_eq!(logged_in.id, created.id);
        assert!(logged_in.last_login.is_some());

        let wrong = authenticate(&db, "07701112222", "nope").await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));
        let unknown = authenticate(&db, "0000", "secret1").await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_duplicate_phone_and_username() {
        let db = test_db().await;
        create_user(&db, NewUser::customer("ali", "0770", "secret1")).await.unwrap();

        let same_phone = create_user(&db, NewUser::customer("other", "0770", "secret1")).await;
        assert!(matches!(same_phone, Err(AppError::UniquenessConflict { field: "phone" })));

        let same_name = create_user(&db, NewUser::customer("ali", "0771", "secret1")).await;
        assert!(matches!(same_name, Err(AppError::UniquenessConflict { field: "username" })));
    }

    #[tokio::test]
    async fn test_email_is_not_unique() {
        let db = test_db().await;
        let mut a = NewUser::customer("aa", "1", "secret1");
        a.email = Some("shop@example.com".into());
        let mut b = NewUser::customer("bb", "2", "secret1");
        b.email = Some("shop@example.com".into());
        create_user(&db, a).await.unwrap();
        create_user(&db, b).await.unwrap();
    }

    #[tokio::test]
    async fn test_email_format_checked_on_create_and_update() {
        let db = test_db().await;
        let mut bad = NewUser::customer("mail", "1", "secret1");
        bad.email = Some("not-an-email".into());
        assert!(matches!(
            create_user(&db, bad).await,
            Err(AppError::Validation(ValidationError::InvalidFormat { field: "email" }))
        ));

        let user = create_user(&db, NewUser::customer("mail", "1", "secret1")).await.unwrap();
        let update = update_user(
            &db,
            user.id,
            UserUpdate { email: Some("shop@".into()), ..Default::default() },
        )
        .await;
        assert!(matches!(
            update,
            Err(AppError::Validation(ValidationError::InvalidFormat { field: "email" }))
        ));

        // blank clears the address
        let cleared = update_user(
            &db,
            user.id,
            UserUpdate { email: Some("  ".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(cleared.email, None);
    }

    #[tokio::test]
    async fn test_username_validated_on_create_and_update() {
        let db = test_db().await;
        let bad = create_user(&db, NewUser::customer("user@name", "1", "secret1")).await;
        assert!(matches!(
            bad,
            Err(AppError::Validation(ValidationError::InvalidCharacter { character: '@', .. }))
        ));

        let user = create_user(&db, NewUser::customer("good", "1", "secret1")).await.unwrap();
        let short = update_user(
            &db,
            user.id,
            UserUpdate { username: Some("a".into()), ..Default::default() },
        )
        .await;
        assert!(matches!(
            short,
            Err(AppError::Validation(ValidationError::InvalidLength { field: "username", .. }))
        ));
        assert_eq!(find_user(&db, user.id).await.unwrap().username, "good");
    }

    #[tokio::test]
    async fn test_update_role_flags_and_deactivate() {
        let db = test_db().await;
        let user = create_user(&db, NewUser::customer("trader", "1", "secret1")).await.unwrap();

        let updated = update_user(
            &db,
            user.id,
            UserUpdate {
                is_wholesale: Some(true),
                is_customer: Some(false),
                governorate: Some("البصرة".into()),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.is_wholesale);
        assert!(!updated.is_customer);
        assert_eq!(updated.governorate.as_deref(), Some("البصرة"));

        let login = authenticate(&db, "1", "secret1").await;
        assert!(matches!(login, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_list_users_filters_search_and_order() {
        let db = test_db().await;
        let mut wholesale = NewUser::customer("tajir", "0790", "secret1");
        wholesale.is_wholesale = true;
        wholesale.first_name = "Karim".into();
        create_user(&db, wholesale).await.unwrap();
        create_user(&db, NewUser::customer("zaid", "0750", "secret1")).await.unwrap();
        let mut staff = NewUser::customer("admin", "0780", "secret1");
        staff.is_staff = true;
        create_user(&db, staff).await.unwrap();

        let all = list_users(&db, UserQuery::default()).await.unwrap();
        let phones: Vec<_> = all.iter().map(|u| u.phone.as_str()).collect();
        assert_eq!(phones, ["0750", "0780", "0790"]);

        let only_wholesale = list_users(
            &db,
            UserQuery { is_wholesale: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(only_wholesale.len(), 1);
        assert_eq!(only_wholesale[0].username, "tajir");

        let staff = list_users(&db, UserQuery { is_staff: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(staff[0].username, "admin");

        let by_name = list_users(
            &db,
            UserQuery { search: Some("Kar".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].phone, "0790");
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let db = test_db().await;
        let err = create_user(&db, NewUser::customer("abc", "1", "123")).await;
        assert!(matches!(
            err,
            Err(AppError::Validation(ValidationError::InvalidLength { field: "password", .. }))
        ));
    }
}
