// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use podcatch::{
    CancelToken, Downloadable, NoopReporter, Podcast, ProgressEvent, ProgressReporter,
    RefreshOptions, RefreshOutcome, ReqwestClient, ResourceError, RssFeedSource,
    SharedProgressReporter, Subscriptions, local_file_name,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Exit code when at least one feed host could not be resolved
const EXIT_OFFLINE: i32 = 2;

/// Keep podcast subscriptions in sync with their RSS feeds
#[derive(Parser, Debug)]
#[command(name = "podcatch")]
#[command(about = "Keep podcast subscriptions in sync with their RSS feeds")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh one or more feeds and print the resulting podcasts
    Refresh(RefreshArgs),
    /// Subscribe to every feed listed in an OPML file
    Import(ImportArgs),
    /// Refresh a feed and download its newest episodes
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
struct RefreshArgs {
    /// RSS feed URLs (file:// URLs read local files)
    #[arg(required = true)]
    feeds: Vec<Url>,

    /// Shrink each podcast to this many episodes before refreshing
    #[arg(short, long)]
    keep: Option<usize>,

    /// Add new episodes at the end of the list
    #[arg(long)]
    append: bool,

    /// Do not give episodes their own artwork
    #[arg(long)]
    no_episode_art: bool,

    /// Print the podcasts and refresh summary as JSON
    #[arg(long)]
    json: bool,
}

impl RefreshArgs {
    fn options(&self) -> RefreshOptions {
        RefreshOptions {
            use_episode_artwork: !self.no_episode_art,
            episodes_to_keep: self.keep,
            append_to_end: self.append,
        }
    }
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// OPML file listing the feeds
    opml_file: PathBuf,

    /// Print the imported podcasts as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// RSS feed URL
    feed: Url,

    /// Number of most recent episodes to download
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    /// Directory to write downloaded media to; kept in memory only when absent
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, url: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = bars.get(url) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bar.set_message(truncate_title(file_part(url), 40));
        bars.insert(url.to_string(), bar.clone());
        bar
    }

    fn finish_bar(&self, url: &str) -> Option<ProgressBar> {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.remove(url)
    }

    fn finish(&self) {
        self.main_bar.finish_and_clear();
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RefreshingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Refreshing feed: {}", url.cyan()));
            }

            ProgressEvent::FeedRefreshed {
                podcast_title,
                new_episodes,
                total_episodes,
            } => {
                self.multi
                    .println(format!(
                        "{HEADPHONES}{} • {} episodes total, {} new",
                        podcast_title.bold().green(),
                        total_episodes.to_string().cyan(),
                        new_episodes.to_string().yellow()
                    ))
                    .ok();
            }

            ProgressEvent::RefreshFailed { url, error, offline } => {
                let kind = if offline { "offline" } else { "failed" };
                self.multi
                    .println(format!("{FAILURE}{} {} - {}", url.red(), kind, error.dimmed()))
                    .ok();
            }

            ProgressEvent::DownloadStarting {
                url,
                content_length,
            } => {
                let bar = self.get_or_create_bar(&url);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
            }

            ProgressEvent::DownloadProgress { url, progress } => {
                let bar = self.get_or_create_bar(&url);
                if let Some(total) = progress.total {
                    bar.set_length(total);
                }
                bar.set_position(progress.received);
            }

            ProgressEvent::DownloadCompleted {
                url,
                bytes_downloaded,
            } => {
                if let Some(bar) = self.finish_bar(&url) {
                    bar.set_position(bytes_downloaded);
                    bar.finish_with_message(format!(
                        "{SUCCESS}{}",
                        truncate_title(file_part(&url), 40).green()
                    ));
                }
            }

            ProgressEvent::DownloadCancelled { url } => {
                if let Some(bar) = self.finish_bar(&url) {
                    bar.abandon_with_message(format!(
                        "{CROSS}{}",
                        truncate_title(file_part(&url), 40).yellow()
                    ));
                }
            }

            ProgressEvent::ImportingEntry { title } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Importing {}", title.cyan()));
            }
        }
    }
}

fn file_part(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Initialize logging from `RUST_LOG` plus the verbosity flag
fn init_logging(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { "warn" };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("podcatch={level}").parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Verbose logging enabled");
}

struct CliReporter {
    shared: SharedProgressReporter,
    indicatif: Option<Arc<IndicatifReporter>>,
}

impl CliReporter {
    fn new(quiet: bool) -> Self {
        if quiet {
            Self {
                shared: NoopReporter::shared(),
                indicatif: None,
            }
        } else {
            let indicatif = Arc::new(IndicatifReporter::new());
            Self {
                shared: indicatif.clone(),
                indicatif: Some(indicatif),
            }
        }
    }

    fn finish(&self) {
        if let Some(indicatif) = &self.indicatif {
            indicatif.finish();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    info!("podcatch v{} starting", env!("CARGO_PKG_VERSION"));

    if !cli.quiet {
        eprintln!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podcatch".bold().magenta(),
            "- Podcast Subscriptions".dimmed()
        );
    }

    let client = ReqwestClient::new().context("Failed to create HTTP client")?;
    let source = RssFeedSource::new(client.clone());
    let reporter = CliReporter::new(cli.quiet);

    let code = match &cli.command {
        Command::Refresh(args) => handle_refresh(args, &source, &client, &reporter).await?,
        Command::Import(args) => handle_import(args, &source, &client, &reporter).await?,
        Command::Download(args) => handle_download(args, &source, &client, &reporter).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

async fn handle_refresh(
    args: &RefreshArgs,
    source: &RssFeedSource<ReqwestClient>,
    client: &ReqwestClient,
    reporter: &CliReporter,
) -> Result<i32> {
    let mut subscriptions = Subscriptions::new();
    for feed in &args.feeds {
        if subscriptions.contains_feed(feed) {
            continue;
        }
        subscriptions.add(Podcast::new(feed.clone()));
    }

    let summary = subscriptions
        .refresh_all(source, client, &args.options(), &reporter.shared)
        .await;
    reporter.finish();

    if args.json {
        let output = serde_json::json!({
            "summary": summary,
            "podcasts": subscriptions,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to encode JSON")?
        );
    } else {
        for podcast in subscriptions.iter() {
            println!("{}", podcast.title().bold());
            for episode in podcast.episodes() {
                println!(
                    "  {} {}",
                    episode.published.format("%Y-%m-%d").to_string().dimmed(),
                    episode.title()
                );
            }
        }
        println!(
            "\n{PARTY}{} {} refreshed, {} new episodes, {} failed",
            "Refresh complete:".bold().green(),
            summary.refreshed.to_string().green().bold(),
            summary.new_episodes.to_string().yellow(),
            summary.failures.len().to_string().red()
        );
    }

    Ok(match summary.outcome {
        RefreshOutcome::Success => 0,
        RefreshOutcome::Offline => EXIT_OFFLINE,
        RefreshOutcome::Error => 1,
    })
}

async fn handle_import(
    args: &ImportArgs,
    source: &RssFeedSource<ReqwestClient>,
    client: &ReqwestClient,
    reporter: &CliReporter,
) -> Result<i32> {
    let mut subscriptions = Subscriptions::new();
    let skipped = subscriptions
        .import_opml_file(
            &args.opml_file,
            source,
            client,
            &RefreshOptions::default(),
            &reporter.shared,
        )
        .await
        .with_context(|| format!("Failed to import {}", args.opml_file.display()))?;
    reporter.finish();

    if args.json {
        let output = serde_json::json!({
            "skipped": skipped,
            "podcasts": subscriptions,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to encode JSON")?
        );
    } else {
        println!(
            "\n{PARTY}{} {} subscribed, {} skipped",
            "Import complete:".bold().green(),
            subscriptions.len().to_string().green().bold(),
            skipped.to_string().yellow()
        );
    }

    Ok(0)
}

async fn handle_download(
    args: &DownloadArgs,
    source: &RssFeedSource<ReqwestClient>,
    client: &ReqwestClient,
    reporter: &CliReporter,
) -> Result<i32> {
    let mut podcast = Podcast::fetch(
        args.feed.clone(),
        source,
        client,
        &RefreshOptions::default(),
        &reporter.shared,
    )
    .await
    .with_context(|| format!("Failed to read feed {}", args.feed))?;

    let mut newest: Vec<(chrono::DateTime<chrono::Utc>, String)> = podcast
        .episodes()
        .iter()
        .map(|ep| (ep.published, ep.guid.clone()))
        .collect();
    newest.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, guid) in newest.iter().take(args.count) {
        if let Some(episode) = podcast.episode_mut(guid) {
            episode.pending_download = true;
        }
    }

    let id = podcast.id();
    let mut subscriptions = Subscriptions::new();
    subscriptions.add(podcast);

    let pending: Vec<String> = subscriptions
        .pending_downloads(Some(args.count))
        .into_iter()
        .map(|ep| ep.guid.clone())
        .collect();

    if let Some(dir) = &args.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let Some(podcast) = subscriptions.podcast_mut(id) else {
        bail!("Podcast vanished from its subscription set");
    };

    let mut downloaded = 0;
    let mut failed = 0;
    for guid in &pending {
        let Some(episode) = podcast.episode_mut(guid) else {
            continue;
        };

        match episode
            .download(client, Some(&reporter.shared), Some(&cancel))
            .await
        {
            Ok(()) => {}
            Err(ResourceError::Cancelled { .. }) => break,
            Err(e) => {
                eprintln!("{CROSS}{} - {}", episode.title().yellow(), e.to_string().dimmed());
                failed += 1;
                continue;
            }
        }

        if let Some(dir) = &args.output_dir {
            let path = dir.join(local_file_name(episode));
            let bytes = episode.resource().bytes()?.clone();
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            episode.mark_downloaded(path.display().to_string());
        }
        downloaded += 1;
    }
    reporter.finish();

    if cancel.is_cancelled() {
        eprintln!("\n{}", "Download cancelled".yellow());
        return Ok(130);
    }

    println!(
        "\n{PARTY}{} {} downloaded, {} failed",
        "Download complete:".bold().green(),
        downloaded.to_string().green().bold(),
        if failed > 0 {
            failed.to_string().red().bold()
        } else {
            failed.to_string().green()
        }
    );

    Ok(if failed > 0 && downloaded == 0 { 1 } else { 0 })
}
