mod chat;
mod config;
mod render;

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use pagedesk_api::auth::{self, LoginForm, RegisterForm};
use pagedesk_api::home::HomePage;
use pagedesk_api::middleware::{self, Route, RouteDecision};
use pagedesk_api::oauth::{self, Countdown, OAuthOutcome};
use pagedesk_api::{ApiClient, ApiError};
use pagedesk_session::SessionStore;

use config::Config;

#[derive(Parser)]
#[command(name = "pagedesk")]
#[command(about = "Answer Facebook Page conversations from the terminal", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PAGEDESK_PASSWORD", hide_env_values = true)]
        password: String,
        /// Keep the session for 30 days instead of one
        #[arg(long)]
        remember_me: bool,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, env = "PAGEDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the page integration and how to connect one
    Home,
    /// Remove the connected page
    Disconnect,
    /// Finish connecting a page with the code Facebook returned
    Oauth {
        #[arg(long)]
        code: Option<String>,
        /// Don't wait out the redirect countdown
        #[arg(long)]
        skip: bool,
    },
    /// Open the inbox
    Chat,
}

impl Commands {
    fn route(&self) -> Route {
        match self {
            Self::Login { .. } | Self::Logout => Route::Login,
            Self::Register { .. } => Route::Register,
            Self::Home | Self::Disconnect => Route::Home,
            Self::Oauth { .. } => Route::FbOauth,
            Self::Chat => Route::Chat,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagedesk=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let sessions = Arc::new(SessionStore::open(&config.session_db)?);
    let client = ApiClient::new(&config.backend_url);

    // Logging out is always allowed, signed in or not.
    if !matches!(cli.command, Commands::Logout) {
        if let RouteDecision::Redirect(to) = middleware::check(&sessions, cli.command.route()) {
            info!(to = to.path(), "Redirected by route guard");
            match to {
                Route::Login => println!("Not signed in. Run `pagedesk login` first."),
                _ => println!("Already signed in. Run `pagedesk home` or `pagedesk logout`."),
            }
            return Ok(());
        }
    }

    match cli.command {
        Commands::Login {
            email,
            password,
            remember_me,
        } => {
            let form = LoginForm {
                email,
                password,
                remember_me,
            };
            match auth::login_flow(&client, &sessions, &form).await {
                Ok(session) => println!("Signed in until {}", session.expires_at),
                Err(ApiError::Rejected(reason)) => bail!("Login failed: {}", reason),
                Err(e) => bail!("Login failed: {}", e),
            }
        }
        Commands::Register {
            email,
            full_name,
            password,
        } => {
            let form = RegisterForm {
                email,
                full_name,
                password,
            };
            match auth::register_flow(&client, &form).await {
                Ok(_) => println!("Account created. Run `pagedesk login` to sign in."),
                Err(ApiError::Rejected(reason)) => bail!("Registration failed: {}", reason),
                Err(e) => bail!("Registration failed: {}", e),
            }
        }
        Commands::Logout => {
            auth::logout(&sessions);
            println!("Signed out.");
        }
        Commands::Home => {
            let page = load_home(&client, &sessions, &config).await?;
            print!("{}", render::home(&page));
        }
        Commands::Disconnect => {
            let mut page = load_home(&client, &sessions, &config).await?;
            let Some(page_id) = page.connected_page_id().cloned() else {
                println!("No Facebook page connected.");
                return Ok(());
            };
            page.disconnect(&client, &page_id).await;
            print!("{}", render::home(&page));
        }
        Commands::Oauth { code, skip } => {
            let Some(session) = sessions.get() else {
                bail!("Session expired. Run `pagedesk login` to sign in again.");
            };
            match oauth::complete_oauth(&client, &session, code.as_deref(), &config.frontend_url)
                .await
            {
                OAuthOutcome::Connected => println!("Facebook page connected."),
                OAuthOutcome::Failed(message) => println!("{}", message),
            }

            let countdown = Countdown::default();
            if skip {
                countdown.skip_token().cancel();
            }
            let to = countdown
                .run(|remaining| {
                    if remaining > 0 {
                        println!("Redirecting to Home in {}s...", remaining);
                    }
                })
                .await;

            if let Ok(page) = HomePage::load(&client, &sessions, &config.frontend_url).await {
                info!(to = to.path(), "Redirecting");
                print!("{}", render::home(&page));
            }
        }
        Commands::Chat => {
            let Some(session) = sessions.get() else {
                bail!("Session expired. Run `pagedesk login` to sign in again.");
            };
            chat::run(&config, sessions.clone(), session).await?;
        }
    }

    Ok(())
}

async fn load_home(client: &ApiClient, sessions: &SessionStore, config: &Config) -> Result<HomePage> {
    match HomePage::load(client, sessions, &config.frontend_url).await {
        Ok(page) => Ok(page),
        Err(_) => bail!("Session expired. Run `pagedesk login` to sign in again."),
    }
}
