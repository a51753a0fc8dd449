use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Journal CLI - command-line client for the Journal blog API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the Journal API
    #[arg(short = 'u', long, env = "JOURNAL_API_URL")]
    pub api_url: Option<String>,

    /// Path to the credential database (SQLite)
    #[arg(short = 'c', long, env = "JOURNAL_CREDENTIALS_DB")]
    pub credentials_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store a credential pair
    Login {
        /// Username; prompted for when omitted
        #[arg(long)]
        username: Option<String>,
    },
    /// Clear stored credentials (and tell the backend)
    Logout,
    /// Show the currently authenticated user
    Whoami,
    /// Post operations
    #[command(subcommand)]
    Posts(PostsCommand),
}

#[derive(Subcommand, Debug)]
pub enum PostsCommand {
    /// List posts
    List {
        #[arg(long, default_value = "1")]
        page: u64,
    },
    /// Show one post
    Show { id: u64 },
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the Journal API
    pub api_url: String,

    /// Credential database path; None disables persistence
    pub credentials_db: Option<PathBuf>,

    // Timeouts (seconds)
    pub connect_timeout: u64,
    pub request_timeout: u64,
    pub refresh_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            api_url: args
                .api_url
                .or_else(|| std::env::var("JOURNAL_API_URL").ok())
                .context("JOURNAL_API_URL is required (use -u or set JOURNAL_API_URL env var)")?,

            credentials_db: args
                .credentials_db
                .map(|s| expand_tilde(&s))
                .or_else(default_credentials_db),

            connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            request_timeout: args.http_timeout,

            refresh_timeout: std::env::var("TOKEN_REFRESH_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            log_level: args.log_level,
        };

        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("JOURNAL_API_URL must be an http(s) URL: {}", self.api_url);
        }
        Ok(())
    }
}

/// Default credential database under the platform data directory
fn default_credentials_db() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("journal-cli").join("credentials.sqlite3"))
}

/// Expand tilde (~) in file paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
