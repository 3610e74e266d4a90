use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub watch: WatchConfig,
    pub telegram: TelegramConfig,
    /// Directory holding the session and ledger files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }
}

// ============================================================================
// SourceConfig
// ============================================================================

/// Upstream source endpoint and credentials.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Some accounts are asked for the email during login challenges.
    #[serde(default)]
    pub email: Option<String>,
}

// ============================================================================
// WatchConfig
// ============================================================================

/// Which account to watch and how often.
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    /// Account handle to watch (with or without a leading '@').
    pub account: String,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,
    /// Wait after a failed cycle before retrying. Longer than the poll
    /// interval so a rejecting source is not hammered.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// How many posts to request per cycle.
    #[serde(default = "default_fetch_count")]
    pub fetch_count: usize,
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes * 60)
    }
}

// ============================================================================
// TelegramConfig
// ============================================================================

/// Destination chat and bot identity.
#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Chat that receives relayed posts.
    pub chat_id: i64,
    /// Forum topic to post into, if the chat uses topics.
    #[serde(default)]
    pub thread_id: Option<i32>,
    /// Chat that receives the best-effort startup notification.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_state_dir() -> PathBuf {
    PathBuf::from(".xrelay")
}

fn default_base_url() -> String {
    "https://api.x.com".to_string()
}

fn default_poll_interval_minutes() -> u64 {
    5
}

fn default_cooldown_minutes() -> u64 {
    15
}

fn default_fetch_count() -> usize {
    20
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports shell-compatible syntax:
/// - `${VAR}` - Required variable, errors if not set
/// - `${VAR:-default}` - Optional variable with default value
/// - `$$` - Escaped `$` (only needed before `{` to prevent expansion)
///
/// Nested expansion (`${VAR:-${DEFAULT}}`) is not supported.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                result.push_str(&resolve_var(&mut chars)?);
            }
            // Plain $ is not a variable reference
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Resolve one variable reference after the opening `${`.
fn resolve_var(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut name = String::new();
    let mut default_value: Option<String> = None;

    loop {
        match chars.next() {
            None => return Err(ConfigError::UnclosedVarReference),
            Some('}') => break,
            Some(':') if default_value.is_none() && chars.peek() == Some(&'-') => {
                chars.next();
                default_value = Some(String::new());
            }
            Some(c) => match default_value.as_mut() {
                Some(default) => default.push(c),
                None => name.push(c),
            },
        }
    }

    match std::env::var(&name) {
        Ok(value) => Ok(value),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(name)),
    }
}

// ============================================================================
// Tests
// ============================================================================
