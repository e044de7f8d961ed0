use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub accounting: AccountingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the control database holding tenants and sessions
    pub main_database: String,
    /// Database cloned when provisioning a tenant
    pub template_database: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_ttl_hours: u64,
    pub secure_cookies: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingConfig {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    /// Lists the organisations a token can reach; empty when the provider has no such endpoint
    pub connections_url: String,
    pub scopes: String,
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Page sizes stay at least 1 and the default never exceeds the max
    fn clamp_page_sizes(&mut self) {
        self.max_page_size = self.max_page_size.max(1);
        self.default_page_size = self.default_page_size.clamp(1, self.max_page_size);
    }
}

impl AccountingConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAIN_NAME") {
            self.database.main_database = v;
        }
        if let Ok(v) = env::var("DATABASE_TEMPLATE_NAME") {
            self.database.template_database = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("BIZOPS_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_TTL_HOURS") {
            self.security.session_ttl_hours = v.parse().unwrap_or(self.security.session_ttl_hours);
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Accounting overrides
        if let Ok(v) = env::var("ACCOUNTING_PROVIDER") {
            self.accounting.provider = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_CLIENT_ID") {
            self.accounting.client_id = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_CLIENT_SECRET") {
            self.accounting.client_secret = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_REDIRECT_URI") {
            self.accounting.redirect_uri = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_AUTHORIZE_URL") {
            self.accounting.authorize_url = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_TOKEN_URL") {
            self.accounting.token_url = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_API_BASE_URL") {
            self.accounting.api_base_url = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_CONNECTIONS_URL") {
            self.accounting.connections_url = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_SCOPES") {
            self.accounting.scopes = v;
        }
        if let Ok(v) = env::var("ACCOUNTING_REQUEST_TIMEOUT_SECS") {
            self.accounting.request_timeout_secs = v.parse().unwrap_or(self.accounting.request_timeout_secs);
        }

        self.api.clamp_page_sizes();
        self
    }

    fn accounting_defaults() -> AccountingConfig {
        AccountingConfig {
            provider: "xero".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:3000/accounting/callback".to_string(),
            authorize_url: "https://login.xero.com/identity/connect/authorize".to_string(),
            token_url: "https://identity.xero.com/connect/token".to_string(),
            api_base_url: "https://api.xero.com/api.xro/2.0".to_string(),
            connections_url: "https://api.xero.com/connections".to_string(),
            scopes: "offline_access accounting.contacts accounting.transactions".to_string(),
            request_timeout_secs: 30,
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                main_database: "bizops_main".to_string(),
                template_database: "template_bizops".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                default_page_size: 50,
                max_page_size: 500,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                session_ttl_hours: 24 * 7,
                secure_cookies: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            accounting: Self::accounting_defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                main_database: "bizops_main".to_string(),
                template_database: "template_bizops".to_string(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                default_page_size: 50,
                max_page_size: 200,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_ttl_hours: 24,
                secure_cookies: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            accounting: Self::accounting_defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                main_database: "bizops_main".to_string(),
                template_database: "template_bizops".to_string(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                default_page_size: 50,
                max_page_size: 100,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                session_ttl_hours: 12,
                secure_cookies: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            accounting: Self::accounting_defaults(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.secure_cookies);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.api.default_page_size, 50);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.secure_cookies);
        assert!(config.security.jwt_secret.is_empty(), "production secret must come from env");
        assert_eq!(config.api.max_page_size, 100);
    }

    #[test]
    fn test_page_sizes_are_clamped() {
        let mut api = AppConfig::development().api;
        api.max_page_size = 0;
        api.default_page_size = -5;
        api.clamp_page_sizes();
        assert_eq!(api.max_page_size, 1);
        assert_eq!(api.default_page_size, 1);

        let mut api = AppConfig::production().api;
        api.default_page_size = 1_000;
        api.clamp_page_sizes();
        assert_eq!(api.default_page_size, api.max_page_size);
    }

    #[test]
    fn test_accounting_requires_credentials() {
        let mut accounting = AppConfig::development().accounting;
        assert!(!accounting.is_configured());
        accounting.client_id = "id".into();
        accounting.client_secret = "secret".into();
        assert!(accounting.is_configured());
    }
}
