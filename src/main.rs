mod auth;
mod catalog;
mod config;
mod dryrun;
mod error;
mod logging;
mod matcher;
mod migrate;
mod model;
mod normalize;
mod ports;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{Result, eyre::Context, eyre::eyre};
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{AuthToken, OAuthRefresher},
    catalog::{spotify::SpotifyCatalog, youtube::YouTubeCatalog},
    config::Config,
    dryrun::{DryRunPlanner, DryRunReport, ProgressEvent},
    logging::init_tracing,
    migrate::{MigrateProgress, MigrationExecutor},
    model::{DestinationMode, MigrateOptions, PlaylistSummary, PrivacyStatus},
    ports::catalog::CatalogClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_PORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Direction {
    /// Richer-catalog playlists into the video catalog
    #[value(name = "spotify-to-youtube", alias = "sp2yt")]
    SpotifyToYoutube,
    /// Video-catalog playlists into the richer catalog
    #[value(name = "youtube-to-spotify", alias = "yt2sp")]
    YoutubeToSpotify,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PrivacyArg {
    Private,
    Public,
    Unlisted,
}

impl From<PrivacyArg> for PrivacyStatus {
    fn from(privacy: PrivacyArg) -> Self {
        match privacy {
            PrivacyArg::Private => PrivacyStatus::Private,
            PrivacyArg::Public => PrivacyStatus::Public,
            PrivacyArg::Unlisted => PrivacyStatus::Unlisted,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the playlists of the source catalog
    Playlists {
        /// Which way the migration runs
        #[arg(short, long, value_enum)]
        direction: Direction,
    },
    /// Preview a migration without writing anything
    DryRun {
        /// Which way the migration runs
        #[arg(short, long, value_enum)]
        direction: Direction,

        /// Source playlist ids to analyze (default: all)
        #[arg(short, long = "playlist")]
        playlists: Vec<String>,

        /// Pause between match lookups, in milliseconds
        #[arg(long, default_value = "120")]
        throttle_ms: u64,
    },
    /// Migrate playlists into the destination catalog
    Migrate {
        /// Which way the migration runs
        #[arg(short, long, value_enum)]
        direction: Direction,

        /// Source playlist ids to migrate (default: all)
        #[arg(short, long = "playlist")]
        playlists: Vec<String>,

        /// Merge into an existing destination playlist with this exact id
        #[arg(long, conflicts_with = "merge_by_name")]
        merge_into: Option<String>,

        /// Merge into the destination playlist with the same title
        #[arg(long)]
        merge_by_name: bool,

        /// Fail instead of creating the playlist when merge-by-name finds none
        #[arg(long)]
        no_create_if_missing: bool,

        /// Keep duplicate matches from the source playlist
        #[arg(long)]
        no_dedupe_input: bool,

        /// Re-add items the destination playlist already contains
        #[arg(long)]
        no_dedupe_existing: bool,

        /// Privacy of newly created playlists
        #[arg(long, value_enum, default_value = "private")]
        privacy: PrivacyArg,

        /// Pause between match lookups, in milliseconds
        #[arg(long, default_value = "120")]
        throttle_ms: u64,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a template config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(&args.log_level)?;

    if let Commands::Config(config_commands) = &args.command {
        match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("Created {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        }
        return Ok(());
    }

    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load playlist-porter config")?;

    let spotify = SpotifyCatalog::new(
        token_from_env("SPOTIFY")?,
        Box::new(OAuthRefresher::spotify(
            config.spotify.client_id.clone(),
            config.spotify.client_secret.clone(),
        )),
    );
    let youtube = YouTubeCatalog::new(
        token_from_env("GOOGLE")?,
        Box::new(OAuthRefresher::google(
            config.youtube.client_id.clone(),
            config.youtube.client_secret.clone(),
        )),
    );

    match args.command {
        Commands::Playlists { direction } => {
            let (source, _) = pick_catalogs(direction, &spotify, &youtube);
            for playlist in source.list_playlists().await? {
                match playlist.track_count {
                    Some(count) => println!("{}  {} ({count} tracks)", playlist.id, playlist.title),
                    None => println!("{}  {}", playlist.id, playlist.title),
                }
            }
        }
        Commands::DryRun {
            direction,
            playlists,
            throttle_ms,
        } => {
            let (source, destination) = pick_catalogs(direction, &spotify, &youtube);
            let selected = select_playlists(source, &playlists).await?;
            let report = run_dry_run(source, destination, &selected, throttle_ms).await;
            print_report(&report);
        }
        Commands::Migrate {
            direction,
            playlists,
            merge_into,
            merge_by_name,
            no_create_if_missing,
            no_dedupe_input,
            no_dedupe_existing,
            privacy,
            throttle_ms,
        } => {
            let (source, destination) = pick_catalogs(direction, &spotify, &youtube);
            let selected = select_playlists(source, &playlists).await?;
            let report = run_dry_run(source, destination, &selected, throttle_ms).await;
            print_report(&report);
            if report.cancelled {
                println!("Cancelled before writing; destination unchanged.");
                return Ok(());
            }

            let mode = if let Some(id) = merge_into {
                DestinationMode::MergeInto(id)
            } else if merge_by_name {
                DestinationMode::MergeByName
            } else {
                DestinationMode::Create
            };
            let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = receiver.recv().await {
                    if let MigrateProgress::GroupStarted {
                        playlist_title,
                        index,
                        of,
                    } = event
                    {
                        println!("[{}/{of}] migrating {playlist_title}", index + 1);
                    }
                }
            });

            let executor = MigrationExecutor::new(
                destination,
                MigrateOptions {
                    mode,
                    allow_create_if_missing: !no_create_if_missing,
                    dedupe_input: !no_dedupe_input,
                    dedupe_existing: !no_dedupe_existing,
                    privacy: privacy.into(),
                },
            )
            .with_progress(sender);
            let outcomes = executor.migrate_all(&report.groups).await;
            drop(executor);
            let _ = printer.await;

            for outcome in outcomes {
                match outcome {
                    Ok(outcome) => println!(
                        "{}: wrote {} to {} ({} unmatched, {} duplicates skipped)",
                        outcome.playlist_title,
                        outcome.written,
                        outcome.destination_id,
                        outcome.skipped_unmatched,
                        outcome.skipped_duplicates,
                    ),
                    Err(error) => println!("failed: {error}"),
                }
            }
        }
        Commands::Config(_) => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Access tokens come from the environment; expiry is unknown at that point,
/// so they are taken at face value until the first 401 forces a refresh.
fn token_from_env(prefix: &str) -> Result<AuthToken> {
    let access = std::env::var(format!("{prefix}_ACCESS_TOKEN"))
        .wrap_err(format!("{prefix}_ACCESS_TOKEN is not set"))?;
    let refresh = std::env::var(format!("{prefix}_REFRESH_TOKEN")).ok();
    Ok(AuthToken::new(access, 3600, refresh))
}

fn pick_catalogs<'a>(
    direction: Direction,
    spotify: &'a SpotifyCatalog<catalog::ReqwestTransport>,
    youtube: &'a YouTubeCatalog<catalog::ReqwestTransport>,
) -> (&'a dyn CatalogClient, &'a dyn CatalogClient) {
    match direction {
        Direction::SpotifyToYoutube => (spotify, youtube),
        Direction::YoutubeToSpotify => (youtube, spotify),
    }
}

/// Resolves the `--playlist` selection against the source catalog. An empty
/// selection means every playlist; an unknown id is an error.
async fn select_playlists(
    source: &dyn CatalogClient,
    ids: &[String],
) -> Result<Vec<PlaylistSummary>> {
    let all = source.list_playlists().await?;
    if ids.is_empty() {
        return Ok(all);
    }

    let mut selected = Vec::with_capacity(ids.len());
    for id in ids {
        let playlist = all
            .iter()
            .find(|playlist| &playlist.id == id)
            .ok_or_else(|| eyre!("No source playlist with id `{id}`"))?;
        selected.push(playlist.clone());
    }
    Ok(selected)
}

async fn run_dry_run(
    source: &dyn CatalogClient,
    destination: &dyn CatalogClient,
    playlists: &[PlaylistSummary],
    throttle_ms: u64,
) -> DryRunReport {
    let cancel = CancellationToken::new();
    let cancel_on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Stopping after the current item...");
            cancel_on_ctrl_c.cancel();
        }
    });

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                ProgressEvent::PlaylistStarted {
                    playlist_title,
                    index,
                    of,
                    ..
                } => println!("[{}/{of}] {playlist_title}", index + 1),
                ProgressEvent::ItemProcessed {
                    processed,
                    total,
                    matched,
                    ..
                } => {
                    let mark = if matched { "+" } else { "-" };
                    println!("  {mark} {processed}/{total}");
                }
                ProgressEvent::PlaylistFinished { matched, total, .. } => {
                    println!("  matched {matched}/{total}");
                }
            }
        }
    });

    let report = DryRunPlanner::new(source, destination)
        .with_cancellation(cancel)
        .with_progress(sender)
        .with_throttle(Duration::from_millis(throttle_ms))
        .run(playlists)
        .await;
    let _ = printer.await;
    report
}

fn print_report(report: &DryRunReport) {
    println!(
        "Dry run: {} of {} tracks matched across {} playlists",
        report.matched(),
        report.total(),
        report.groups.len(),
    );
    for group in &report.groups {
        for item in group.items.iter().filter(|item| item.destination_id.is_none()) {
            println!("  no match in `{}`: {}", group.playlist_title, item.title);
        }
    }
    for failure in &report.failures {
        println!("  failed `{}`: {}", failure.playlist_title, failure.error);
    }
    if report.cancelled {
        println!("  (cancelled before completion)");
    }
}
