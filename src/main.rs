mod accounts;
mod db;
mod entities;
mod error;
mod logos;
mod routes;
mod state;
mod validators;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use clap::Parser;
use sea_orm::{EntityTrait, PaginatorTrait};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use accounts::NewUser;
use state::{AppState, RateLimiter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Database path
    #[arg(short, long, env = "DATABASE_PATH", default_value = "riyada.db")]
    db_path: String,

    /// Public host name accepted in the Host header (besides localhost)
    #[arg(long, env = "EXTERNAL_HOST", default_value = "localhost")]
    external_host: String,

    /// Phone of the superuser created on first run
    #[arg(long, env = "ADMIN_PHONE", requires = "admin_username")]
    admin_phone: Option<String>,

    /// Username of the superuser created on first run
    #[arg(long, env = "ADMIN_USERNAME", requires = "admin_phone")]
    admin_username: Option<String>,

    /// Login/register requests allowed per client within one window
    #[arg(long, env = "AUTH_RATE_LIMIT", default_value_t = 10)]
    auth_rate_limit: u32,

    /// Length of the login/register rate-limit window, in seconds
    #[arg(long, env = "AUTH_RATE_WINDOW_SECS", default_value_t = 60)]
    auth_rate_window_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Server stopped: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let port = args.port;
    let jwt_secret = load_jwt_secret();

    tracing::info!("Initializing database at {}", args.db_path);
    let db = db::init_pool(&args.db_path).await?;

    // --- First-Run Admin ---
    if let (Some(phone), Some(username)) = (args.admin_phone, args.admin_username) {
        create_first_admin(&db, phone, username).await?;
    }

    let limiter = RateLimiter::new(
        args.auth_rate_limit,
        Duration::from_secs(args.auth_rate_window_secs),
    );
    let state = AppState::new(db, jwt_secret, args.external_host).with_auth_rate_limit(limiter);

    let limiter = state.auth_rate_limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(limiter.window().max(Duration::from_secs(60)));
        loop {
            tick.tick().await;
            limiter.prune();
        }
    });

    let allowed_host = state.external_host.clone();
    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(move |req, next| {
            validate_host(req, next, allowed_host.clone())
        }));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Riyada store backend listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// JWT secret: from env, from file, or generate and save to file
fn load_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        return secret;
    }

    let secret_path = std::path::Path::new("jwt_secret.key");
    if let Ok(saved) = std::fs::read_to_string(secret_path) {
        let saved = saved.trim().to_string();
        if !saved.is_empty() {
            tracing::info!("Loaded JWT secret from jwt_secret.key");
            return saved;
        }
    }

    let secret = random_alphanumeric(64);
    if let Err(e) = std::fs::write(secret_path, &secret) {
        tracing::warn!("Could not save JWT secret to file: {e}");
    } else {
        tracing::info!("Generated and saved JWT secret to jwt_secret.key");
    }
    secret
}

fn random_alphanumeric(len: usize) -> String {
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Creates a superuser with a random password when the users table is empty.
async fn create_first_admin(
    db: &sea_orm::DatabaseConnection,
    phone: String,
    username: String,
) -> Result<(), error::AppError> {
    let user_count = entities::user::Entity::find().count(db).await?;
    if user_count > 0 {
        return Ok(());
    }

    let temp_password = random_alphanumeric(12);
    let admin = accounts::create_user(
        db,
        NewUser {
            is_customer: false,
            is_staff: true,
            is_staff_member: true,
            is_superuser: true,
            ..NewUser::customer(&username, &phone, &temp_password)
        },
    )
    .await?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          FIRST-RUN ADMIN CREATED!            ║");
    println!("  ╠══════════════════════════════════════════════╣");
    println!("  ║  Phone:    {:<34}║", admin.phone);
    println!("  ║  Password: {:<34}║", temp_password);
    println!("  ╠══════════════════════════════════════════════╣");
    println!("  ║  PLEASE SAVE THESE CREDENTIALS NOW!          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    Ok(())
}

/// Reject requests with an unexpected Host header (DNS rebinding protection).
async fn validate_host(req: Request, next: Next, allowed_host: String) -> Response {
    if let Some(host_val) = req.headers().get("host").and_then(|v| v.to_str().ok()) {
        let host_str = match host_val.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => host_val,
        };
        let is_local = host_str == "localhost" || host_str == "127.0.0.1" || host_str == "[::1]";
        let is_allowed = host_str == allowed_host;
        if !is_local && !is_allowed {
            return (axum::http::StatusCode::MISDIRECTED_REQUEST, "Misdirected Request")
                .into_response();
        }
    }
    next.run(req).await
}
