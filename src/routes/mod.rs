pub mod admin;
pub mod auth;
pub mod logo;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_auth));

    Router::new()
        .merge(auth_routes)
        .route("/api/me", get(auth::get_me))
        // Storefront
        .route("/api/products/logo", get(logo::get_active_logo))
        // Admin: users
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{user_id}", get(admin::get_user).put(admin::update_user))
        // Admin: logos
        .route("/api/admin/logos", get(admin::list_logos).post(admin::create_logo))
        .route("/api/admin/logos/cleanup", post(admin::cleanup_logos))
        .route(
            "/api/admin/logos/{logo_id}",
            put(admin::update_logo).delete(admin::delete_logo),
        )
        .with_state(state)
}

/// Per-IP limit on login/register. Requests without peer info (tests,
/// unix sockets) share the unspecified-address bucket.
async fn rate_limit_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(retry_after) = state.auth_rate_limiter.hit(ip) {
        tracing::warn!(%ip, "Auth rate limit hit");
        // round up so clients never retry early
        let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        return AppError::RateLimited { retry_after_secs }.into_response();
    }
    next.run(req).await
}
