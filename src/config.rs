use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout: u64,
    pub database_idle_timeout: u64,
    pub port: u16,
    pub upload_dir: String,
    pub upload_field: String,
    pub allowed_mime_types: Vec<String>,
    pub max_file_size: usize,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/user_registry".to_string()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            database_acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string()) // seconds
                .parse()?,
            database_idle_timeout: env::var("DATABASE_IDLE_TIMEOUT")
                .unwrap_or_else(|_| "300".to_string()) // seconds
                .parse()?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            upload_field: env::var("UPLOAD_FIELD").unwrap_or_else(|_| "photo".to_string()),
            allowed_mime_types: parse_mime_list(
                &env::var("ALLOWED_MIME_TYPES")
                    .unwrap_or_else(|_| "image/jpeg,image/png,image/webp,image/gif".to_string()),
            ),
            max_file_size: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| "5242880".to_string()) // 5MB
                .parse()?,
            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        })
    }
}

fn parse_mime_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
