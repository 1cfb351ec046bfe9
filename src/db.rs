use sea_orm::{DatabaseConnection, SqlxSqliteConnector};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

pub async fn init_pool(db_path: &str) -> Result<DatabaseConnection, sqlx::Error> {
    let abs_path = std::fs::canonicalize(db_path)
        .unwrap_or_else(|_| std::path::PathBuf::from(db_path));
    tracing::info!("Database absolute path: {:?}", abs_path);

    // Ensure parent directory exists
    if let Some(parent) = Path::new(db_path).parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let url = format!("sqlite:{}?mode=rwc", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    run_migrations(&pool).await?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if let Err(e) = sqlx::migrate!("./migrations").run(pool).await {
        tracing::error!("Database migration failed: {}", e);
        return Err(e.into());
    }

    tracing::info!("Database migrations applied successfully");
    Ok(())
}

/// Timestamp format shared by every text timestamp column.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Fresh in-memory database with every migration applied. A single
/// connection, since each SQLite memory connection is its own database.
#[cfg(test)]
pub async fn test_db() -> DatabaseConnection {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    run_migrations(&pool).await.expect("migrations apply");
    SqlxSqliteConnector::from_sqlx_sqlite_pool(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn raw_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_delete_invalid_logos_migration() {
        let pool = raw_pool().await;
        for sql in [
            include_str!("../migrations/0001_create_users.sql"),
            include_str!("../migrations/0002_create_logos.sql"),
        ] {
            sqlx::raw_sql(sql).execute(&pool).await.unwrap();
        }

        // Rows as they could exist before image_url became required.
        sqlx::raw_sql(
            "INSERT INTO logos (name, image_url, is_active) VALUES ('null', NULL, 0);
             INSERT INTO logos (name, image_url, is_active) VALUES ('empty', '', 0);
             INSERT INTO logos (name, is_active) VALUES ('default', 0);
             INSERT INTO logos (name, image_url, is_active) VALUES ('placeholder', 'https://via.placeholder.com/300x100', 0);
             INSERT INTO logos (name, image_url, is_active) VALUES ('real', 'https://i.ibb.co/abc/logo.png', 1);",
        )
        .execute(&pool)
        .await
        .unwrap();

        for sql in [
            include_str!("../migrations/0003_remove_logo_default.sql"),
            include_str!("../migrations/0004_delete_invalid_logos.sql"),
        ] {
            sqlx::raw_sql(sql).execute(&pool).await.unwrap();
        }

        let remaining: Vec<(String, String)> =
            sqlx::query_as("SELECT name, image_url FROM logos ORDER BY id")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            remaining,
            vec![("real".to_string(), "https://i.ibb.co/abc/logo.png".to_string())]
        );

        let invalid: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM logos
             WHERE image_url IS NULL OR image_url = '' OR image_url LIKE 'https://via.placeholder%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(invalid, 0);
    }

    #[tokio::test]
    async fn test_image_url_has_no_default_after_migrations() {
        let pool = raw_pool().await;
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query("INSERT INTO logos (name) VALUES ('no image')")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_single_active_index() {
        let pool = raw_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query("INSERT INTO logos (image_url, is_active) VALUES ('https://a', 1)")
            .execute(&pool)
            .await
            .unwrap();
        let second = sqlx::query("INSERT INTO logos (image_url, is_active) VALUES ('https://b', 1)")
            .execute(&pool)
            .await;
        assert!(second.is_err());

        sqlx::query("INSERT INTO logos (image_url, is_active) VALUES ('https://c', 0)")
            .execute(&pool)
            .await
            .unwrap();
    }
}
