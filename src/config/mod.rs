use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub cors_origin: String,
    pub upload_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{other}', expected pretty or json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

// Administrator account created on first start
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_or("PORT", 3000)?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "event_buddy=debug,tower_http=debug"),
                log_format: parse_or("LOG_FORMAT", LogFormat::Pretty)?,
                cors_origin: var_or("CORS_ORIGIN", "http://localhost:3001"),
                upload_dir: var_or("UPLOAD_DIR", "./uploads"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parse_or("DB_POOL_SIZE", 10)?,
            },
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
                expires_in_hours: parse_or("JWT_EXPIRES_IN_HOURS", 24)?,
            },
            seed: SeedConfig {
                admin_email: var_or("ADMIN_EMAIL", "admin@eventbuddy.com"),
                admin_password: var_or("ADMIN_PASSWORD", "adminpassword"),
                admin_name: var_or("ADMIN_NAME", "Admin"),
            },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn parse_or_falls_back_and_reports_bad_values() {
        assert_eq!(parse_or::<u16>("EVENT_BUDDY_TEST_UNSET_PORT", 3000).unwrap(), 3000);

        env::set_var("EVENT_BUDDY_TEST_BAD_POOL", "lots");
        let err = parse_or::<u32>("EVENT_BUDDY_TEST_BAD_POOL", 10).unwrap_err();
        assert!(err.to_string().contains("EVENT_BUDDY_TEST_BAD_POOL"));
        env::remove_var("EVENT_BUDDY_TEST_BAD_POOL");
    }

    #[test]
    fn missing_required_variable_is_named() {
        let err = required("EVENT_BUDDY_TEST_MISSING_SECRET").unwrap_err();
        assert_eq!(err.to_string(), "EVENT_BUDDY_TEST_MISSING_SECRET must be set");
    }
}
