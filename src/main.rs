use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use storefront_client::api::AuthApi;
use storefront_client::auth::{token_preview, CredentialStore, RefreshCoordinator, SessionController};
use storefront_client::config::{self, AppEnv, Command, Config};
use storefront_client::http_client::ApiClient;
use storefront_client::storage::{self, SqliteStorage};
use storefront_client::transport::{ReqwestTransport, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Ask for the API address on first run (no .env and no API_BASE_URL)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;
        std::env::set_var("API_BASE_URL", &interactive_config.api_base_url);
        std::env::set_var("APP_ENV", &interactive_config.app_env);
    }

    let (config, command) = Config::load()?;
    config.validate()?;

    init_tracing(&config);

    tracing::debug!(
        base_url = %config.api_base_url,
        env = ?config.app_env,
        db = %config.credentials_db_file.display(),
        "Configuration loaded"
    );

    let api = build_api(&config).await?;
    run(command, &api).await
}

/// Initialize logging; RUST_LOG overrides the configured level
fn init_tracing(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match config.app_env {
        AppEnv::Production => builder.json().init(),
        AppEnv::Development => builder.init(),
    }
}

/// Wire storage, session, refresh coordinator and transport together
async fn build_api(config: &Config) -> Result<AuthApi> {
    let key = storage::load_or_create_key(&config.credentials_key_file)
        .context("Failed to load credential key")?;
    let sqlite = SqliteStorage::open(&config.credentials_db_file, &key)
        .context("Failed to open credential database")?;
    let store = Arc::new(
        CredentialStore::open(Arc::new(sqlite)).context("Failed to load stored credentials")?,
    );

    let session = Arc::new(SessionController::new());
    if let Some(credentials) = store.read_all().await {
        tracing::debug!(
            token = %token_preview(&credentials.access_token),
            "Resuming stored session"
        );
        session.set_authenticated(true);
    }

    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
        &config.api_base_url,
        Duration::from_secs(config.http_connect_timeout),
        Duration::from_secs(config.http_request_timeout),
    )?);

    let coordinator = Arc::new(
        RefreshCoordinator::new(transport.clone(), store, session)
            .with_expired_message(config.session_expired_message.clone()),
    );
    let client = Arc::new(ApiClient::new(transport, coordinator));
    tracing::debug!("HTTP client initialized");

    Ok(AuthApi::new(client))
}

async fn run(command: Command, api: &AuthApi) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => config::prompt_password("Password")?,
            };
            let outcome = api.login(&email, &password).await.map_err(report)?;
            println!("Logged in as {}", email);
            if !outcome.email_verified {
                println!("Email verification required: please verify your email to access your account.");
            }
        }
        Command::Logout => {
            api.logout().await.map_err(report)?;
            println!("Logged out");
        }
        Command::LogoutAll => {
            api.logout_all().await.map_err(report)?;
            println!("Logged out of all sessions");
        }
        Command::Profile => {
            let user = api.profile().await.map_err(report)?;
            println!("Name:     {}", user.full_name);
            println!("Email:    {}", user.email);
            println!("Phone:    {}", user.phone_number);
            println!("Role:     {}", user.role_name);
            println!("Verified: {}", user.email_verified);
        }
        Command::Health => {
            let body = api.health_check().await.map_err(report)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Status => print_status(api).await,
        Command::Get { path } => {
            let response = api.client().get(&path).await.map_err(report)?;
            match response.json::<serde_json::Value>() {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(_) => println!("{}", response.text()),
            }
        }
    }

    Ok(())
}

async fn print_status(api: &AuthApi) {
    let client = api.client();
    let state = client.session().state();

    println!("Authenticated: {}", state.is_authenticated);
    match client.store().read_all().await {
        Some(credentials) => {
            println!("Session id:    {}", credentials.session_id);
            println!("Access token:  {}", token_preview(&credentials.access_token));
            println!("Access expiry: {}", credentials.access_expiry);
            println!("Refresh expiry: {}", credentials.refresh_expiry);
        }
        None => println!("No stored credentials"),
    }
}

/// Log the full error and turn it into the user-facing message
fn report(err: storefront_client::error::ApiError) -> anyhow::Error {
    tracing::error!(error = %err, "Request failed");
    anyhow::anyhow!(err.user_message())
}
