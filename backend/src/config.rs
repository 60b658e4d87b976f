use std::env;

/// Scheme that selects the in-memory store instead of PostgreSQL
pub const MEMORY_DB_URL: &str = "memory://";

const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:3000,https://dashboard.xydevs.com,https://*.xydevs.com";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (`memory://` for the in-memory store)
    pub database_url: String,
    /// Logical database name reported by system endpoints
    pub database_name: String,
    /// Maximum database connections in pool
    pub database_max_connections: u32,
    /// Run embedded migrations on startup
    pub run_migrations: bool,
    /// HS256 secret shared with the login backend
    pub jwt_secret: Option<String>,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Origins allowed by CORS; a `*.` host prefix matches any subdomain
    pub cors_allowed_origins: Vec<String>,
    /// Mount the `/debug` routes
    pub enable_debug_routes: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DB_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("DB_URL"))?;

        let database_name = lookup("DB_NAME").unwrap_or_else(|| "UsersDatabase".to_string());

        let database_max_connections = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS"))?;

        let run_migrations = parse_bool(lookup("RUN_MIGRATIONS"), true)
            .ok_or(ConfigError::InvalidValue("RUN_MIGRATIONS"))?;

        let jwt_secret = lookup("JWT_SECRET").filter(|secret| !secret.is_empty());

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        let enable_debug_routes = parse_bool(lookup("ENABLE_DEBUG_ROUTES"), false)
            .ok_or(ConfigError::InvalidValue("ENABLE_DEBUG_ROUTES"))?;

        Ok(Self {
            database_url,
            database_name,
            database_max_connections,
            run_migrations,
            jwt_secret,
            host,
            port,
            cors_allowed_origins,
            enable_debug_routes,
        })
    }

    /// Whether the in-memory store was requested
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DB_URL)
    }

    /// Check an `Origin` header value against the allowed origin list
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.cors_allowed_origins
            .iter()
            .any(|pattern| origin_matches(pattern, origin))
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Option<bool> {
    match value {
        None => Some(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
    }
}

/// `https://*.example.com` matches `https://a.example.com` but not the apex
fn origin_matches(pattern: &str, origin: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    match pattern.split_once("://*.") {
        Some((scheme, suffix)) => origin
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix("://"))
            .and_then(|host| host.strip_suffix(suffix))
            .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
        None => pattern.eq_ignore_ascii_case(origin),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
