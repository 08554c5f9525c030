use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rss_digest::app::ViewMode;
use rss_digest::config::Config;
use rss_digest::controller::Controller;
use rss_digest::gateway::Gateway;
use rss_digest::sync::SourceDraft;
use rss_digest::ui::{self, Panels, DEFAULT_WIDTH};
use rss_digest::util::{validate_api_base, validate_feed_url};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "rss-digest",
    about = "Manage subscriptions and read daily digests from an RSS digest service"
)]
struct Args {
    /// Backend base URL (overrides config and RSS_DIGEST_API_BASE)
    #[arg(long, global = true, value_name = "URL")]
    api_base: Option<String>,

    /// Config file (default: ~/.config/rss-digest/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print raw JSON instead of the structured view
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscriptions with unread counts
    Sources,
    /// Subscribe to a feed
    Add {
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Unsubscribe
    Remove { id: i64 },
    /// Subscribe the configured default feeds
    Seed,
    /// Show the digest of a day (default: today, UTC)
    Digest {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Mark an entry read and show the updated views
    Read {
        entry_id: i64,
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Run backend ingestion now and show the updated views
    Ingest {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Check that the backend is reachable
    Health,
}

impl Command {
    fn date(&self) -> Option<NaiveDate> {
        match self {
            Command::Digest { date } | Command::Read { date, .. } | Command::Ingest { date } => {
                *date
            }
            _ => None,
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match args.config.as_deref() {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load(&path).context("Failed to load config")?,
            None => {
                tracing::debug!("HOME not set, using default configuration");
                Config::default()
            }
        },
    };
    Ok(config.with_env())
}

/// Output width from `COLUMNS`, if the shell exports it.
fn output_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .filter(|&w: &usize| w > 0)
        .unwrap_or(DEFAULT_WIDTH)
}

async fn check_health(gateway: &Gateway) -> Result<ExitCode> {
    let health = gateway
        .health()
        .await
        .with_context(|| format!("Backend at {} is not reachable", gateway.base_url()))?;
    println!("{}: {}", gateway.base_url(), health.status);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries the rendered views.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let base = match args.api_base.as_deref() {
        Some(raw) => validate_api_base(raw).context("Invalid --api-base")?,
        None => config.api_base_url()?,
    };
    let gateway = Gateway::new(base, config.request_timeout(), config.api_token())
        .context("Failed to build HTTP client")?;

    let date = args
        .command
        .date()
        .unwrap_or_else(|| Utc::now().date_naive());
    let mut controller = Controller::new(gateway.clone(), config.sync_options(), date);
    if args.raw {
        controller.set_view_mode(ViewMode::Raw);
    }

    let panels = match args.command {
        Command::Sources => {
            controller.refresh_sources();
            Panels::Sources
        }
        Command::Add {
            url,
            title,
            category,
        } => {
            let url = validate_feed_url(&url).context("Invalid feed URL")?;
            let draft = SourceDraft::new(url.as_str(), title)?
                .with_category(config.category_or_default(category.as_deref()));
            controller.create_source(draft);
            Panels::Sources
        }
        Command::Remove { id } => {
            controller.remove_source(id);
            Panels::Sources
        }
        Command::Seed => {
            controller.seed_default_sources();
            Panels::Sources
        }
        Command::Digest { .. } => {
            controller.refresh_digest();
            Panels::Digest
        }
        Command::Read { entry_id, .. } => {
            controller.mark_read(entry_id);
            Panels::Both
        }
        Command::Ingest { .. } => {
            controller.ingest_now();
            Panels::Both
        }
        Command::Health => return check_health(&gateway).await,
    };

    controller.settle().await;

    let snapshot = controller.snapshot();
    let mut stdout = std::io::stdout().lock();
    ui::render(&mut stdout, &snapshot, panels, output_width()).context("Failed to write output")?;

    Ok(if snapshot.message.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
