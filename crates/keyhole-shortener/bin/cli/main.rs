mod cli;

use crate::cli::{Command, PruneArgs, CLI};
use anyhow::Context;
use clap::Parser;
use jiff::{SignedDuration, Timestamp};
use keyhole_cipher::new_letter_ordering;
use keyhole_shortener::{
    ConfigError, Shortener, ShortenerService, StoreLocation, StoreRegistry,
};
use keyhole_storage::transfer;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = CLI::parse();
    let registry = StoreRegistry::new();

    match cli.command {
        Command::NewSecret => {
            println!("{}", new_letter_ordering());
        }
        Command::Shorten { uris } => {
            let service = ShortenerService::open(cli.shortener.to_config(), &registry).await?;
            for uri in uris {
                let short = service
                    .shorten(&uri)
                    .await
                    .with_context(|| format!("failed to shorten {uri}"))?;
                println!("{short}");
            }
        }
        Command::Lengthen { short_url } => {
            let service = ShortenerService::open(cli.shortener.to_config(), &registry).await?;
            match service.lengthen(&short_url).await? {
                Some(uri) => println!("{uri}"),
                None => {
                    info!(short_url = %short_url, "no uri behind short url");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Prune(args) => {
            let cutoff = cutoff(&args)?;
            let service = ShortenerService::open(cli.shortener.to_config(), &registry).await?;
            let removed = service.prune_before(cutoff).await?;
            println!("{removed}");
        }
        Command::Transfer { to } => {
            let from: StoreLocation = cli
                .shortener
                .store
                .as_deref()
                .ok_or(ConfigError::Missing("store"))?
                .parse()?;
            let to: StoreLocation = to.parse()?;

            let source = registry.open(&from).await?;
            let target = registry.open(&to).await?;
            let report = transfer(&source, &target)
                .await
                .with_context(|| format!("failed to transfer {from} into {to}"))?;

            info!(
                from = %from,
                to = %to,
                copied = report.copied,
                skipped = report.skipped,
                "transfer finished"
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn cutoff(args: &PruneArgs) -> anyhow::Result<Timestamp> {
    match (args.before, args.older_than) {
        (Some(before), _) => Ok(before),
        (None, Some(secs)) => {
            let age = SignedDuration::from_secs(
                i64::try_from(secs).context("--older-than is out of range")?,
            );
            Timestamp::now()
                .checked_sub(age)
                .context("--older-than reaches before the earliest timestamp")
        }
        (None, None) => anyhow::bail!("either --before or --older-than is required"),
    }
}
