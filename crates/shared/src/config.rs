//! Application configuration management.

use serde::Deserialize;

use crate::error::AppError;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// SMTP configuration. Email delivery is disabled when absent.
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// Workflow policy knobs.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT validation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key shared with the identity service that issues tokens.
    pub secret: String,
    /// Access token expiration in seconds (used for locally minted tokens).
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// SMTP configuration for outbound workflow emails.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// SMTP username.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: String,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// Base URL of the web client, used for deep links.
    pub frontend_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "noreply@procura.local".to_string(),
            from_name: "Procura".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// What to do with a bid submitted after the RFQ's `bid_deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LateSubmission {
    /// Accept late bids; the deadline is advisory.
    #[default]
    Allow,
    /// Refuse submission once the deadline has passed.
    Reject,
}

/// Workflow policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Days added to the publish time when an RFQ has no bid deadline.
    #[serde(default = "default_bid_window_days")]
    pub bid_window_days: i64,
    /// Late bid handling.
    #[serde(default)]
    pub late_submission: LateSubmission,
    /// When set, derived purchase orders start in `pending_approval`
    /// instead of going straight to the supplier.
    #[serde(default)]
    pub purchase_order_requires_approval: bool,
}

fn default_bid_window_days() -> i64 {
    14
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            bid_window_days: default_bid_window_days(),
            late_submission: LateSubmission::default(),
            purchase_order_requires_approval: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `PROCURA__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, AppError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("PROCURA").separator("__"))
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.workflow.bid_window_days <= 0 {
            return Err(AppError::Config(
                "workflow.bid_window_days must be positive".to_string(),
            ));
        }
        if self.jwt.secret.trim().is_empty() {
            return Err(AppError::Config("jwt.secret must not be empty".to_string()));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::Config(
                "database.min_connections exceeds database.max_connections".to_string(),
            ));
        }
        Ok(())
    }
}
