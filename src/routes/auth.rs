use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, NewUser};
use crate::entities::user;
use crate::error::AppError;
use crate::state::AppState;

const TOKEN_TTL_DAYS: i64 = 30;

// ─── JWT Claims ───

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i32, // user id
    pub iat: usize,
    pub exp: usize,
}

// ─── Request/Response types ───

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
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
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: user::Model,
}

// ─── Routes ───

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    // Self-registration only ever creates plain customers.
    let new = NewUser {
        email: req.email,
        first_name: req.first_name,
        last_name: req.last_name,
        address: req.address,
        governorate: req.governorate,
        ..NewUser::customer(&req.username, &req.phone, &req.password)
    };
    let user = accounts::create_user(&state.db, new).await?;
    let token = create_jwt(&state.jwt_secret, &user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = accounts::authenticate(&state.db, &req.phone, &req.password).await?;
    let token = create_jwt(&state.jwt_secret, &user)?;

    Ok(Json(AuthResponse { token, user }))
}

pub async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<user::Model>, AppError> {
    Ok(Json(current_user(&state, &headers).await?))
}

/// Resolve the bearer token to a live, active account.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<user::Model, AppError> {
    let claims = extract_claims(&state.jwt_secret, headers)?;
    let user = match accounts::find_user(&state.db, claims.sub).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::Unauthorized("الحساب غير موجود")),
        Err(e) => return Err(e),
    };
    if !user.is_active {
        return Err(AppError::Unauthorized("الحساب غير مفعل"));
    }
    Ok(user)
}

/// Like [`current_user`], but the account must be staff. Flags are read from
/// the database, not the token, so revoking staff takes effect at once.
pub async fn require_staff(state: &AppState, headers: &HeaderMap) -> Result<user::Model, AppError> {
    let user = current_user(state, headers).await?;
    if !user.can_manage() {
        tracing::warn!(id = user.id, "Non-staff user tried an admin endpoint");
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

// ─── JWT helpers ───

pub fn create_jwt(secret: &str, user: &user::Model) -> Result<String, AppError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id,
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("JWT error: {e}")))
}

pub fn extract_claims(secret: &str, headers: &HeaderMap) -> Result<Claims, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized("مطلوب تسجيل الدخول"))?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("صيغة التفويض غير صحيحة"))?;

    decode_jwt(secret, token)
}

pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Invalid token: {e}");
        AppError::Unauthorized("رمز الدخول غير صالح")
    })?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewUser;
    use crate::db::test_db;
    use sea_orm::ConnectionTrait;

    const SECRET: &str = "auth-test-secret";

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn test_jwt_carries_only_the_user_id() {
        let user = user::Model {
            id: 7,
            username: "u".into(),
            phone: "0700".into(),
            email: None,
            first_name: String::new(),
            last_name: String::new(),
            address: None,
            governorate: None,
            is_customer: true,
            is_wholesale: false,
            is_staff_member: false,
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            last_login: None,
            date_joined: String::new(),
        };
        let token = create_jwt(SECRET, &user).unwrap();
        let claims = decode_jwt(SECRET, &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert!(claims.exp > claims.iat);
        assert!(matches!(decode_jwt("other", &token), Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_current_user_missing_account_is_unauthorized() {
        let db = test_db().await;
        let user = accounts::create_user(&db, NewUser::customer("gone", "0700", "secret1"))
            .await
            .unwrap();
        let token = create_jwt(SECRET, &user).unwrap();
        db.execute_unprepared("DELETE FROM users").await.unwrap();

        let state = AppState::new(db, SECRET.to_string(), "localhost".to_string());
        let err = current_user(&state, &bearer(&token)).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_current_user_database_failure_is_not_masked() {
        let db = test_db().await;
        let user = accounts::create_user(&db, NewUser::customer("here", "0700", "secret1"))
            .await
            .unwrap();
        let token = create_jwt(SECRET, &user).unwrap();
        db.execute_unprepared("DROP TABLE users").await.unwrap();

        let state = AppState::new(db, SECRET.to_string(), "localhost".to_string());
        let err = current_user(&state, &bearer(&token)).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
