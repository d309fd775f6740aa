//! annotator - command line client for the annotation platform.
//!
//! Logs in against the platform's REST API, keeps the session in a cookie
//! jar under the cache directory and issues authenticated requests.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use annotator_core::api::ApiClient;
use annotator_core::auth::{
    parse_claims, CookieJar, CredentialStore, GuardDecision, KeyValueStore, Navigator, RouteGuard,
    SessionStore,
};
use annotator_core::{Clock, Config, SystemClock};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "annotator.log";

#[derive(Parser)]
#[command(name = "annotator", version, about = "Annotation platform command line client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// End the session locally and on the backend
    Logout,
    /// Show who is logged in
    Status,
    /// Show what the route guard decides for a view path
    Guard { path: String },
    /// GET an API path with the session's credentials and print the JSON
    Get { path: String },
    /// List datasets and their progress (admin)
    Datasets {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// Export a dataset with its annotations as CSV (admin)
    Download {
        id: i64,
        /// Output file; defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the logged-in annotator's progress per dataset
    Tasks,
    /// Show the dashboard statistics (admin)
    Stats,
    /// Ask the backend to send a new password to an email address
    ForgotPassword { email: String },
    /// Remove a remembered password from the OS keychain
    Forget {
        #[arg(short, long)]
        username: Option<String>,
    },
}

/// Sends the user back to `annotator login` when the session ends
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect(&self, path: &str) {
        info!(path, "Redirect requested");
        eprintln!("Session ended. Run `annotator login` to sign in again.");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

fn open_storage(config: &Config, clock: Arc<dyn Clock>) -> Result<Box<dyn KeyValueStore>> {
    let path = config.session_path()?;
    Ok(match config.session_key {
        Some(ref key) => Box::new(CookieJar::encrypted(path, key.clone(), clock)),
        None => Box::new(CookieJar::open(path, clock)),
    })
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let _log_guard = init_tracing(config.cache_dir().ok());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let storage = open_storage(&config, clock.clone())?;
    let session = Arc::new(SessionStore::new(storage, clock, Arc::new(TerminalNavigator)));
    session.initialize();

    let api = ApiClient::new(&config, session.clone())?;

    match cli.command {
        Command::Login { username, remember } => {
            login(&api, &mut config, username, remember).await?
        }
        Command::Logout => {
            if !session.is_authenticated() {
                eprintln!("Not logged in.");
            }
            api.logout().await;
        }
        Command::Status => status(&session),
        Command::Guard { path } => match RouteGuard::default().evaluate(&session, &path) {
            GuardDecision::Allow => println!("allow {}", path),
            GuardDecision::Redirect(to) => println!("redirect {} -> {}", path, to),
        },
        Command::Get { path } => {
            let body: serde_json::Value = api.get(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Datasets { page, size } => {
            let page = api.list_datasets(page, size).await?;
            for dataset in &page.datasets {
                println!("{:>5}  {:<30} {:>5.1}%", dataset.id, dataset.name, dataset.progress);
            }
            println!(
                "Page {} of {} ({} datasets)",
                page.current_page + 1,
                page.total_pages.max(1),
                page.total_elements
            );
        }
        Command::Download { id, output } => {
            let csv = api.download_dataset(id).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {} bytes to {}", csv.len(), path.display());
                }
                None => io::stdout().write_all(&csv)?,
            }
        }
        Command::Tasks => {
            let user = session.user().context("Not logged in")?;
            for summary in api.task_summary(user.id).await? {
                println!(
                    "{:>5}  {:<30} {:>7}  {:>5.1}%",
                    summary.dataset_id,
                    summary.dataset_name,
                    summary.progress,
                    summary.percent_complete()
                );
            }
        }
        Command::Stats => {
            let stats = api.statistics().await?;
            for item in &stats.stats {
                println!("{}: {}", item.title, item.value);
            }
            for dataset in &stats.datasets_progress {
                println!("{}: {} done, {} pending", dataset.name, dataset.completed, dataset.pending);
            }
        }
        Command::ForgotPassword { email } => {
            let message = api.forgot_password(&email).await?;
            println!("{}", message);
        }
        Command::Forget { username } => {
            let username = username
                .or_else(|| config.last_username.clone())
                .context("No username given and none remembered")?;
            CredentialStore::delete(&username)?;
            println!("Forgot password for {}", username);
        }
    }

    Ok(())
}

async fn login(
    api: &ApiClient,
    config: &mut Config,
    username: Option<String>,
    remember: bool,
) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(u) => u,
        None => prompt_line("Username: ")?,
    };
    if username.is_empty() {
        bail!("Username is required");
    }

    let stored = match CredentialStore::get_password(&username) {
        Ok(password) => password,
        Err(e) => {
            warn!(error = %e, "Could not read keychain");
            None
        }
    };
    let from_keychain = stored.is_some();
    let password = match stored {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    if !api.login(&username, &password).await? {
        bail!("Login rejected: the backend issued an invalid or expired token");
    }

    config.last_username = Some(username.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    if remember && !from_keychain {
        if let Err(e) = CredentialStore::store(&username, &password) {
            eprintln!("Could not remember the password: {:#}", e);
        }
    }

    let name = api
        .session()
        .user()
        .map(|u| u.display_name())
        .unwrap_or_else(|| username.clone());
    println!("Logged in as {}", name);
    Ok(())
}

fn status(session: &SessionStore) {
    if !session.check_expiry() {
        println!("Not logged in");
        return;
    }
    let Some(user) = session.user() else {
        println!("Not logged in");
        return;
    };

    println!("Logged in as {} ({})", user.display_name(), user.username);
    if let Some(role) = user.role {
        println!("Role: {}", role);
    }
    if let Some(expires) = session
        .token()
        .and_then(|t| parse_claims(&t))
        .and_then(|c| c.expires_at())
    {
        println!("Token expires: {}", expires.to_rfc3339());
    }
}
