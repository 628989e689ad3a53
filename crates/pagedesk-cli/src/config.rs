use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use pagedesk_inbox::PollerConfig;

/// Settings shared by every subcommand. Each flag falls back to its
/// environment variable, then to the default.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Base URL of the helpdesk backend
    #[arg(long, global = true, env = "PAGEDESK_BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Public URL of this frontend, used to build the OAuth callback
    #[arg(long, global = true, env = "PAGEDESK_FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// SQLite file holding the session token
    #[arg(long, global = true, env = "PAGEDESK_SESSION_DB", default_value = "pagedesk-session.db")]
    pub session_db: PathBuf,

    /// Conversation poll period in milliseconds
    #[arg(
        long,
        global = true,
        env = "PAGEDESK_POLL_INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(100..)
    )]
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}
