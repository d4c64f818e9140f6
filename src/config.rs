use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password, Select};
use reqwest::Url;
use std::io::Write;
use std::path::PathBuf;

use crate::auth::SESSION_EXPIRED_MESSAGE;
use crate::transport::DEFAULT_TIMEOUT_SECS;

/// Storefront API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the storefront API
    #[arg(short = 'u', long, env = "API_BASE_URL")]
    pub base_url: Option<String>,

    /// Environment (development, production)
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: String,

    /// Path to the encrypted credential database
    #[arg(short = 'd', long, env = "CREDENTIALS_DB_FILE")]
    pub db_file: Option<String>,

    /// Path to the credential encryption key (created on first use)
    #[arg(long, env = "CREDENTIALS_KEY_FILE")]
    pub key_file: Option<String>,

    /// HTTP request timeout in seconds (applies to the token refresh too)
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    /// Exact error text the server sends for an expired access token
    #[arg(long, env = "SESSION_EXPIRED_MESSAGE")]
    pub session_expired_message: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session credentials
    Login {
        #[arg(short, long)]
        email: String,

        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// End this session
    Logout,
    /// End every session of this account
    LogoutAll,
    /// Show the logged-in user's profile
    Profile,
    /// Check that the API is reachable
    Health,
    /// Show the stored session
    Status,
    /// Send an authenticated GET request and print the response
    Get { path: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub api_base_url: String,
    pub app_env: AppEnv,

    // Credential storage
    pub credentials_db_file: PathBuf,
    pub credentials_key_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Refresh
    pub session_expired_message: String,

    // Logging
    pub log_level: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AppEnv {
    Development,
    Production,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let api_base_url = args
            .base_url
            .context("API_BASE_URL is required (use -u or set API_BASE_URL env var)")?;

        let credentials_db_file = args
            .db_file
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(default_db_path);

        let credentials_key_file = args
            .key_file
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(|| credentials_db_file.with_extension("key"));

        Ok(Config {
            api_base_url,
            app_env: parse_app_env(&args.app_env),
            credentials_db_file,
            credentials_key_file,

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),

            http_request_timeout: args.http_timeout,

            session_expired_message: args
                .session_expired_message
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),

            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("API_BASE_URL is not a valid URL: {}", self.api_base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("API_BASE_URL must use http or https: {}", self.api_base_url);
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Default location of the credential database
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("storefront").join("credentials.sqlite3"))
        .unwrap_or_else(|| PathBuf::from("credentials.sqlite3"))
}

fn parse_app_env(s: &str) -> AppEnv {
    match s.to_lowercase().as_str() {
        "production" | "prod" => AppEnv::Production,
        _ => AppEnv::Development,
    }
}

/// Ask for a password without echoing it
pub fn prompt_password(prompt: &str) -> Result<String> {
    let password: String = Password::new()
        .with_prompt(prompt)
        .interact()
        .context("Failed to read password")?;

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and no API base URL)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();
    let has_base_url = std::env::var("API_BASE_URL").is_ok();

    !env_file_exists && !has_base_url
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub api_base_url: String,
    pub app_env: String,
}

/// Run interactive setup to collect required configuration
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("No configuration found. Let's point the client at your storefront API.");
    println!();

    let api_base_url: String = Input::new()
        .with_prompt("API base URL (API_BASE_URL)")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("Not a valid URL: {}", e))
        })
        .interact_text()
        .context("Failed to read API_BASE_URL")?;

    let envs = ["development", "production"];
    let env_idx = Select::new()
        .with_prompt("Environment")
        .items(&envs)
        .default(0)
        .interact()
        .context("Failed to read environment selection")?;

    let config = InteractiveConfig {
        api_base_url,
        app_env: envs[env_idx].to_string(),
    };

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!("Configuration saved to .env file");
    }
    println!();

    Ok(config)
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let env_content = format!(
        r#"# Storefront client configuration
# Generated by interactive setup

# Base URL of the storefront API (required)
API_BASE_URL={}

# development or production
APP_ENV={}

# HTTP timeout in seconds
HTTP_REQUEST_TIMEOUT=10

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.api_base_url, config.app_env,
    );

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
