use std::{env, path::PathBuf, str::FromStr};

use anyhow::{Context, anyhow};

/// Which storage adapter the process runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    JsonFile { data_dir: PathBuf },
    Postgres { database_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Approve,
    Decline,
}

impl FromStr for PaymentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approve" => Ok(PaymentMode::Approve),
            "decline" => Ok(PaymentMode::Decline),
            other => Err(anyhow!("unknown PAYMENT_MODE `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    /// Plaintext relay, for local mail catchers only.
    pub insecure: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub low_stock_threshold: i64,
    pub default_country: String,
    pub payment_mode: PaymentMode,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "file".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "file" | "json" => StorageBackend::JsonFile {
                data_dir: env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data")),
            },
            "postgres" => StorageBackend::Postgres {
                database_url: env::var("DATABASE_URL")
                    .context("DATABASE_URL is required when STORAGE_BACKEND=postgres")?,
            },
            other => return Err(anyhow!("unknown STORAGE_BACKEND `{other}`")),
        };

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 5000)?;
        let payment_mode = match env::var("PAYMENT_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => PaymentMode::Approve,
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from_address: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "noreply@storefront.local".to_string()),
                insecure: parse_or("SMTP_INSECURE", false)?,
            }),
            _ => None,
        };

        Ok(Self {
            storage,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout_secs: parse_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24 * 7)?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5_000_000)?,
            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", 10)?,
            default_country: env::var("DEFAULT_COUNTRY").unwrap_or_else(|_| "Tunisia".to_string()),
            payment_mode,
            smtp,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_value(key, env::var(key).ok(), default)
}

/// Unset or blank falls back to `default`; anything else must parse.
fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid {key} `{value}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_blank_values_use_the_default() {
        assert_eq!(parse_value::<u16>("APP_PORT", None, 5000).unwrap(), 5000);
        assert_eq!(parse_value::<u16>("APP_PORT", Some("  ".into()), 5000).unwrap(), 5000);
        assert_eq!(parse_value::<u16>("APP_PORT", Some(" 8080 ".into()), 5000).unwrap(), 8080);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = parse_value::<u16>("APP_PORT", Some("abc".into()), 5000).unwrap_err();
        assert_eq!(err.to_string(), "invalid APP_PORT `abc`");

        let err = parse_value::<usize>("MAX_UPLOAD_BYTES", Some("5MB".into()), 5_000_000)
            .unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_BYTES"));

        assert!(parse_value::<bool>("SMTP_INSECURE", Some("yes".into()), false).is_err());
    }
}
