use clap::{Args, Parser, Subcommand};
use jiff::Timestamp;
use keyhole_shortener::ShortenerConfig;

pub const SECRET_ENV: &str = "KEYHOLE_SECRET";
pub const PREFIX_ENV: &str = "KEYHOLE_PREFIX";
pub const STORE_ENV: &str = "KEYHOLE_STORE";
pub const OFFSET_ENV: &str = "KEYHOLE_OFFSET";

pub const DEFAULT_OFFSET: &str = "0";

#[derive(Debug, Parser)]
#[command(name = "keyhole", about = "Persistent, reversible URI shortening")]
pub struct CLI {
    #[command(flatten)]
    pub shortener: ShortenerArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ShortenerArgs {
    /// Secret alphabet; keep it out of shell history by using the env var.
    #[arg(long, env = SECRET_ENV, hide_env_values = true, global = true)]
    pub secret: Option<String>,

    #[arg(long, env = PREFIX_ENV, global = true)]
    pub prefix: Option<String>,

    /// SQLite database path, or `:memory:`.
    #[arg(long, env = STORE_ENV, global = true)]
    pub store: Option<String>,

    #[arg(long, env = OFFSET_ENV, default_value = DEFAULT_OFFSET, global = true)]
    pub offset: u64,
}

impl ShortenerArgs {
    pub fn to_config(&self) -> ShortenerConfig {
        ShortenerConfig {
            secret: self.secret.clone(),
            prefix: self.prefix.clone(),
            store: self.store.clone(),
            offset: self.offset,
        }
    }

    /// The same parameters pointed at another store.
    pub fn with_store(&self, store: &str) -> ShortenerConfig {
        ShortenerConfig {
            store: Some(store.to_string()),
            ..self.to_config()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the short URL for each URI.
    Shorten {
        #[arg(required = true)]
        uris: Vec<String>,
    },
    /// Print the URI behind a short URL; exits with status 1 if unknown.
    Lengthen { short_url: String },
    /// Delete records created before a cutoff.
    Prune(PruneArgs),
    /// Print a freshly shuffled secret alphabet.
    NewSecret,
    /// Copy every record of the configured store into another store.
    Transfer {
        /// Destination database path, or `:memory:`.
        #[arg(long)]
        to: String,
    },
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct PruneArgs {
    /// RFC 3339 instant, e.g. `2024-01-01T00:00:00Z`.
    #[arg(long)]
    pub before: Option<Timestamp>,

    /// Age in seconds.
    #[arg(long)]
    pub older_than: Option<u64>,
}
