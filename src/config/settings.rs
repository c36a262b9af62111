//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Identity service configuration (token verification)
    pub identity: IdentitySettings,

    /// Internal service-to-service API settings
    pub internal: InternalSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Report generation settings
    pub report: ReportSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Identity service configuration.
///
/// Every WebSocket handshake is verified against this service before the
/// connection is allowed to join rooms or emit events.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySettings {
    /// Base URL of the identity service (e.g., "http://localhost:5000")
    pub base_url: String,

    /// Path of the "who am I" endpoint
    pub verify_path: String,

    /// Timeout for the verification call in seconds
    pub timeout_secs: u64,

    /// Shared JWT secret for local fallback verification
    pub jwt_secret: String,
}

/// Internal API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InternalSettings {
    /// Bearer token required on /internal routes (service-to-service calls)
    pub service_token: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,
}

/// Report generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    /// Interval between progress ticks in milliseconds
    pub tick_ms: u64,

    /// Progress increment per tick (progress always ends at exactly 100)
    pub progress_step: u8,
}

/// Minimum required length for the JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4000)?
            .set_default("identity.base_url", "http://localhost:5000")?
            .set_default("identity.verify_path", "/api/auth/me")?
            .set_default("identity.timeout_secs", 5)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // WebSocket limits to prevent oversized frames
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("report.tick_ms", 500_i64)?
            .set_default("report.progress_step", 20_i64)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=4000 -> server.port = 4000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("identity.base_url", std::env::var("IDENTITY_BASE_URL").ok())?
            .set_override_option("identity.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("internal.service_token", std::env::var("SERVICE_TOKEN").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.identity.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.identity.jwt_secret.len()
            )));
        }
        if self.internal.service_token.is_empty() {
            return Err(ConfigError::Message(
                "internal.service_token must not be empty".into(),
            ));
        }
        if self.report.progress_step == 0 {
            return Err(ConfigError::Message(
                "report.progress_step must be greater than zero".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl IdentitySettings {
    /// Full URL of the "who am I" endpoint.
    pub fn verify_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.verify_path)
    }
}
