use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::User;

const SCHEMA_ATTEMPTS: u32 = 3;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(100) NOT NULL,
    photo VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_EMAIL_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_users_email ON users (email)";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_acquire_timeout))
            .idle_timeout(Duration::from_secs(config.database_idle_timeout))
            .connect(&config.database_url)
            .await?;

        Ok(Database { pool })
    }

    /// Creates the table and index if missing. Retried because the database
    /// may still be coming up when the server starts; once retries run out
    /// the caller treats the failure as fatal.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.create_schema().await {
                Ok(()) => {
                    info!("database schema ready");
                    return Ok(());
                }
                Err(e) if attempt < SCHEMA_ATTEMPTS => {
                    warn!(
                        "schema initialization attempt {} failed: {}, retrying",
                        attempt, e
                    );
                    tokio::time::sleep(Duration::from_millis(500) * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_EMAIL_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Drains the pool; called once during graceful shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // User operations

    pub async fn insert_user(
        &self,
        name: &str,
        email: &str,
        photo: Option<&str>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, photo)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, photo, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(photo)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, photo, created_at
            FROM users
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, photo, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// COALESCE keeps the stored photo reference when no replacement file
    /// was uploaded. Returns `None` when the id does not exist.
    pub async fn update_user(
        &self,
        id: i32,
        name: &str,
        email: &str,
        photo: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, email = $3, photo = COALESCE($4, photo)
            WHERE id = $1
            RETURNING id, name, email, photo, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(photo)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Returns the deleted row so the caller can clean up its blob.
    pub async fn delete_user(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "DELETE FROM users WHERE id = $1 RETURNING id, name, email, photo, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
