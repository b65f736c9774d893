use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use social_client::{ClientConfig, DEFAULT_ERROR_URL, DEFAULT_SUCCESS_URL, OAuthRedirects};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TOKEN_FILE: &str = ".social_token";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub log_level: String,
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,
    pub oauth_success_url: String,
    pub oauth_error_url: String,
    pub token_file: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Те же правила, что у [`Settings::from_env`], но значения берутся из `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url =
            lookup("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let log_level = lookup("LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| "info".to_string());
        let http_connect_timeout_secs =
            parse_u64_var(&lookup, "HTTP_CONNECT_TIMEOUT_SECS", 5)?;
        let http_request_timeout_secs =
            parse_u64_var(&lookup, "HTTP_REQUEST_TIMEOUT_SECS", 60)?;
        let oauth_success_url =
            lookup("OAUTH_SUCCESS_URL").unwrap_or_else(|| DEFAULT_SUCCESS_URL.to_string());
        let oauth_error_url =
            lookup("OAUTH_ERROR_URL").unwrap_or_else(|| DEFAULT_ERROR_URL.to_string());
        let token_file = lookup("SOCIAL_TOKEN_FILE")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string())
            .into();

        Ok(Self {
            api_base_url,
            log_level,
            http_connect_timeout_secs,
            http_request_timeout_secs,
            oauth_success_url,
            oauth_error_url,
            token_file,
        })
    }

    pub fn client_config(&self, base_url: String) -> ClientConfig {
        ClientConfig {
            base_url,
            connect_timeout: Duration::from_secs(self.http_connect_timeout_secs),
            request_timeout: Duration::from_secs(self.http_request_timeout_secs),
        }
    }

    pub fn redirects(&self) -> Result<OAuthRedirects> {
        OAuthRedirects::parse(&self.oauth_success_url, &self.oauth_error_url)
            .context("OAUTH_SUCCESS_URL and OAUTH_ERROR_URL must be absolute URLs")
    }
}

fn parse_u64_var(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    let value = lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?;

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}
