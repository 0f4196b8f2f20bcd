//! Environment-driven configuration shared by the pipeline binaries.
//!
//! The database password is never inlined: it is fetched once per
//! process from the parameter store (`PARAM_STORE_URL` +
//! `DB_PASSWORD_PARAM`) and memoized. `DB_PASSWORD` and `DATABASE_URL`
//! remain as local-development escapes.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;

/// Timeout applied to every outbound HTTP request (object store,
/// parameter store, topic, OCDS API).
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("failed to fetch secret {name}: {reason}")]
    Secret { name: String, reason: String },
}

static DB_PASSWORD: OnceCell<String> = OnceCell::const_new();

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Resolve the DB password: `DB_PASSWORD` env wins, otherwise one fetch
/// from the parameter store, memoized for the process lifetime.
async fn resolve_db_password() -> Result<String, ConfigError> {
    DB_PASSWORD
        .get_or_try_init(|| async {
            if let Ok(password) = env::var("DB_PASSWORD") {
                if !password.is_empty() {
                    return Ok(password);
                }
            }

            let param = require("DB_PASSWORD_PARAM")?;
            let base = require("PARAM_STORE_URL")?;
            let url = format!("{}/{}", base.trim_end_matches('/'), param);

            let client = reqwest::Client::builder()
                .timeout(HTTP_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default();
            let resp = client.get(&url).send().await.map_err(|e| ConfigError::Secret {
                name: param.clone(),
                reason: e.to_string(),
            })?;

            if !resp.status().is_success() {
                return Err(ConfigError::Secret {
                    name: param,
                    reason: format!("status {}", resp.status()),
                });
            }

            resp.text()
                .await
                .map(|body| body.trim().to_string())
                .map_err(|e| ConfigError::Secret {
                    name: param,
                    reason: e.to_string(),
                })
        })
        .await
        .cloned()
}

/// Connection string for the relational store.
///
/// `DATABASE_URL` is used verbatim when present; otherwise the URL is
/// composed from `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER` plus the
/// resolved password.
pub async fn database_url() -> Result<String, ConfigError> {
    if let Ok(url) = env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }

    let host = require("DB_HOST")?;
    let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".into());
    let name = require("DB_NAME")?;
    let user = require("DB_USER")?;
    let password = resolve_db_password().await?;

    Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}

pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}
