use std::env;
use std::str::FromStr;

use crate::core::shared::models::CustomerDeletePolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub jwt_secret: String,
    pub email: EmailConfig,
    pub llm: LlmConfig,
    pub helpdesk: HelpdeskConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS. Empty means localhost development
    /// origins only.
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl EmailConfig {
    /// SMTP relay is usable only with both a user and a password.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Substring that hands an agent's message to the assistant.
    pub trigger: String,
}

#[derive(Clone, Debug)]
pub struct HelpdeskConfig {
    pub public_url: String,
    pub customer_delete_policy: CustomerDeletePolicy,
    pub public_token_single_use: bool,
    pub tickets_per_page: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_origins: Vec::new(),
            },
            database_url: "postgres://localhost/helpdesk".to_string(),
            jwt_secret: String::new(),
            email: EmailConfig {
                smtp_server: "localhost".to_string(),
                smtp_port: 587,
                username: String::new(),
                password: String::new(),
                from: "helpdesk@localhost".to_string(),
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: 1000,
                trigger: "@ia".to_string(),
            },
            helpdesk: HelpdeskConfig {
                public_url: "http://localhost:8080".to_string(),
                customer_delete_policy: CustomerDeletePolicy::Restrict,
                public_token_single_use: false,
                tickets_per_page: 20,
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid value {raw:?} for {key}");
            default
        }),
        _ => default,
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a local `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let customer_delete_policy = match env::var("CUSTOMER_DELETE_POLICY") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("CUSTOMER_DELETE_POLICY: {e}"))?,
            _ => defaults.helpdesk.customer_delete_policy,
        };

        Ok(Self {
            server: ServerConfig {
                host: env_or("HOST", &defaults.server.host),
                port: env_parse("PORT", defaults.server.port),
                cors_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            database_url,
            jwt_secret,
            email: EmailConfig {
                smtp_server: env_or("SMTP_HOST", &defaults.email.smtp_server),
                smtp_port: env_parse("SMTP_PORT", defaults.email.smtp_port),
                username: env::var("SMTP_USER").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: env_or("SMTP_FROM", &defaults.email.from),
            },
            llm: LlmConfig {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url: env_or("OPENAI_BASE_URL", &defaults.llm.base_url),
                model: env_or("OPENAI_MODEL", &defaults.llm.model),
                temperature: defaults.llm.temperature,
                max_tokens: defaults.llm.max_tokens,
                trigger: env_or("ASSISTANT_TRIGGER", &defaults.llm.trigger),
            },
            helpdesk: HelpdeskConfig {
                public_url: env_or("PUBLIC_URL", &defaults.helpdesk.public_url)
                    .trim_end_matches('/')
                    .to_string(),
                customer_delete_policy,
                public_token_single_use: env_parse(
                    "PUBLIC_TOKEN_SINGLE_USE",
                    defaults.helpdesk.public_token_single_use,
                ),
                tickets_per_page: env_parse("TICKETS_PER_PAGE", defaults.helpdesk.tickets_per_page)
                    .clamp(1, 100),
            },
        })
    }
}
