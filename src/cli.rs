use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Config, MUSIC_API_KEY_ENV};
use crate::outcome::Outcome;
use crate::pipeline::{Pipeline, Target, http_client};
use crate::player::{CommandPlayer, Player};
use crate::tools;
use crate::types::Provider;

const DEFAULT_LOG_FILTER: &str = "music_mcp=info";

#[derive(Parser)]
#[command(name = "music-mcp", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server over stdio (the default)
    Serve,
    /// Print the resolved configuration and optionally test the music API
    Check(CheckArgs),
    /// Find one song or audiobook, play it, and print the result JSON
    Play(PlayArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Send one search request to the music API
    #[arg(long)]
    ping: bool,
}

#[derive(clap::Args)]
struct PlayArgs {
    /// Song name and/or artist
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
    /// Search the audiobook provider instead of the music provider
    #[arg(long)]
    audiobook: bool,
    /// Download and report the size without playing
    #[arg(long)]
    download_only: bool,
    /// Probe the media URL before downloading
    #[arg(long)]
    validate: bool,
}

pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_logging(config.log_file.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Check(args) => check(config, args).await,
        Command::Play(args) => play(config, args).await,
    }
}

/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_music_credential() {
        tracing::warn!("{MUSIC_API_KEY_ENV} is not set; music searches will be rejected");
    }
    let server = tools::MusicServer::new(config)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "music-mcp serving on stdio");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

fn local_pipeline(config: Config) -> Result<Pipeline, reqwest::Error> {
    let player: Arc<dyn Player> =
        Arc::new(CommandPlayer::from_config(config.player_command.as_deref()));
    Ok(Pipeline::new(config, player, http_client()?))
}

async fn check(config: Config, args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("music API:      {}", config.music.url);
    println!(
        "{MUSIC_API_KEY_ENV}:  {}",
        if config.has_music_credential() {
            "set"
        } else {
            "MISSING"
        }
    );
    println!("audiobook API:  {}", config.audiobook.url);
    println!("temp dir:       {}", config.fetch.temp_dir.display());
    match config.fetch.max_bytes {
        Some(max) => println!("max download:   {} MB", max / 1024 / 1024),
        None => println!("max download:   unlimited"),
    }

    let pipeline = local_pipeline(config)?;
    println!("player:         {}", pipeline.player_description());

    if !pipeline.config().fetch.temp_dir.is_dir() {
        return Err(format!(
            "temp dir {} does not exist",
            pipeline.config().fetch.temp_dir.display()
        )
        .into());
    }

    if args.ping {
        match pipeline.search(Provider::Music, "test", Some(1)).await {
            Outcome::Success(report) => println!(
                "ping:           ok ({} result(s))",
                report.results.as_ref().map_or(0, Vec::len)
            ),
            Outcome::Failure(e) => return Err(format!("ping failed: {e}").into()),
        }
    }
    Ok(())
}

async fn play(config: Config, args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let provider = if args.audiobook {
        Provider::Audiobook
    } else {
        Provider::Music
    };
    let target = Target {
        validate: args.validate,
        ..Target::query(args.query.join(" "))
    };

    let pipeline = local_pipeline(config)?;
    let outcome = if args.download_only {
        pipeline.download(provider, &target).await
    } else {
        pipeline.play(provider, &target).await
    };

    println!("{}", serde_json::to_string_pretty(&outcome.to_json()?)?);
    match outcome.failure_kind() {
        Some(kind) => Err(format!("{kind}").into()),
        None => Ok(()),
    }
}
