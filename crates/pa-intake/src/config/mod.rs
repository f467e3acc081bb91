use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_AVAILITY_TOKEN_URL: &str = "https://api.availity.com/availity/v1/token";
const DEFAULT_AVAILITY_COVERAGE_URL: &str = "https://api.availity.com/availity/v1/coverages";
const DEFAULT_BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
    pub availity: AvailityConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let intake = IntakeConfig::from_env(&host, port)?;
        let availity = AvailityConfig::from_env();
        let mail = MailConfig::from_env(environment)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            intake,
            availity,
            mail,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Workflow knobs shared by the intake and account services.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Upper bound for every outbound call (eligibility, mail, token exchange).
    pub upstream_timeout: Duration,
    /// Reject intake calls that do not carry a session token.
    pub require_session: bool,
    /// Base URL placed in confirmation e-mails; the token is appended as a query parameter.
    pub confirm_url: String,
    pub admin: Option<AdminSeed>,
}

impl IntakeConfig {
    fn from_env(host: &str, port: u16) -> Result<Self, ConfigError> {
        let upstream_timeout = match env::var("INTAKE_UPSTREAM_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidTimeout);
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };

        let require_session = match env::var("INTAKE_REQUIRE_SESSION") {
            Ok(raw) => parse_flag("INTAKE_REQUIRE_SESSION", &raw)?,
            Err(_) => false,
        };

        let confirm_url = env::var("INTAKE_CONFIRM_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}/intake/auth/confirm"));

        let admin = match (
            non_empty_var("INTAKE_ADMIN_EMAIL"),
            non_empty_var("INTAKE_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingSetting("INTAKE_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::MissingSetting("INTAKE_ADMIN_EMAIL")),
        };

        Ok(Self {
            upstream_timeout,
            require_session,
            confirm_url,
            admin,
        })
    }
}

/// Administrator account created at startup; admins cannot self-register.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Availity OAuth2 client and coverage endpoints.
#[derive(Clone)]
pub struct AvailityConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub coverage_url: String,
    /// Fixed token handed out at login instead of calling the token endpoint.
    pub static_token: Option<String>,
}

impl AvailityConfig {
    fn from_env() -> Self {
        Self {
            client_id: env::var("AVAILITY_KEY").unwrap_or_default(),
            client_secret: env::var("AVAILITY_SECRET").unwrap_or_default(),
            token_url: env::var("AVAILITY_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_AVAILITY_TOKEN_URL.to_string()),
            coverage_url: env::var("AVAILITY_COVERAGE_URL")
                .unwrap_or_else(|_| DEFAULT_AVAILITY_COVERAGE_URL.to_string()),
            static_token: non_empty_var("AVAILITY_STATIC_TOKEN"),
        }
    }
}

impl fmt::Debug for AvailityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailityConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(!self.client_secret.is_empty()))
            .field("token_url", &self.token_url)
            .field("coverage_url", &self.coverage_url)
            .field("static_token", &redacted(self.static_token.is_some()))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Brevo,
    /// Writes confirmation links to the log instead of sending mail.
    Log,
}

/// Outbound e-mail settings.
#[derive(Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub api_key: Option<String>,
    pub api_url: String,
    pub sender_name: String,
    pub sender_email: String,
}

impl MailConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let api_key = non_empty_var("BREVO_API_KEY");

        let transport = match env::var("MAIL_TRANSPORT") {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "brevo" => MailTransport::Brevo,
                "log" => MailTransport::Log,
                _ => return Err(ConfigError::UnknownMailTransport(raw)),
            },
            Err(_) if api_key.is_some() || environment == AppEnvironment::Production => {
                MailTransport::Brevo
            }
            Err(_) => MailTransport::Log,
        };

        if transport == MailTransport::Brevo && api_key.is_none() {
            return Err(ConfigError::MissingSetting("BREVO_API_KEY"));
        }

        Ok(Self {
            transport,
            api_key,
            api_url: env::var("BREVO_API_URL").unwrap_or_else(|_| DEFAULT_BREVO_API_URL.to_string()),
            sender_name: env::var("MAIL_SENDER_NAME").unwrap_or_else(|_| "PA Intake".to_string()),
            sender_email: env::var("MAIL_SENDER_EMAIL")
                .unwrap_or_else(|_| "no-reply@pa-intake.local".to_string()),
        })
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("transport", &self.transport)
            .field("api_key", &redacted(self.api_key.is_some()))
            .field("api_url", &self.api_url)
            .field("sender_name", &self.sender_name)
            .field("sender_email", &self.sender_email)
            .finish()
    }
}

fn redacted(present: bool) -> &'static str {
    if present {
        "<set>"
    } else {
        "<unset>"
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidFlag { name: &'static str },
    UnknownMailTransport(String),
    MissingSetting(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "INTAKE_UPSTREAM_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::UnknownMailTransport(value) => {
                write!(f, "MAIL_TRANSPORT '{value}' is not one of brevo, log")
            }
            ConfigError::MissingSetting(name) => write!(f, "{name} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
