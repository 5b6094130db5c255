//! Command-line interface for vidscribe.
//!
//! Provides commands for browsing channel and playlist catalogs, checking
//! quota, transcribing a selection of videos, and managing stored videos.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::adapters::{CatalogSource, WorkerClient, YouTubeClient};
use crate::config::{self, ResolvedConfig};
use crate::core::{select_all, Service, Store};
use crate::domain::{CatalogItem, VideoOrigin};
use crate::library::{CatalogPage, CatalogPaginator, CatalogRef};

/// vidscribe - Quota-gated YouTube catalog browser and transcriber
#[derive(Parser, Debug)]
#[command(name = "vidscribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Acting user
#[derive(Args, Debug, Clone)]
pub struct UserArg {
    /// User email the command acts for
    #[arg(short, long, env = "VIDSCRIBE_USER")]
    pub user: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Browse a channel's uploads page by page
    Browse {
        /// Channel handle (e.g. @veritasium)
        handle: String,

        /// Number of pages to walk
        #[arg(short, long, default_value = "1")]
        pages: u32,
    },

    /// Browse a playlist page by page
    Playlist {
        /// Playlist ID
        playlist_id: String,

        /// Number of pages to walk
        #[arg(short, long, default_value = "1")]
        pages: u32,
    },

    /// Show remaining quota
    Quota {
        #[command(flatten)]
        user: UserArg,
    },

    /// Transcribe videos from one catalog page
    Transcribe {
        #[command(flatten)]
        user: UserArg,

        /// Channel handle to take videos from
        #[arg(long, conflicts_with = "playlist", required_unless_present = "playlist")]
        channel: Option<String>,

        /// Playlist ID to take videos from
        #[arg(long)]
        playlist: Option<String>,

        /// Catalog page to select from
        #[arg(long, default_value = "1")]
        page: u32,

        /// Video IDs to select (comma-separated)
        #[arg(long, value_delimiter = ',', conflicts_with = "all", required_unless_present = "all")]
        ids: Vec<String>,

        /// Select every video on the page that fits the quota
        #[arg(long)]
        all: bool,

        /// Videos processed concurrently (defaults to config)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// List stored videos
    Videos {
        #[command(flatten)]
        user: UserArg,
    },

    /// Show a stored video's transcript chunks
    Show {
        /// Video ID
        video_id: String,

        #[command(flatten)]
        user: UserArg,
    },

    /// Retry a failed video
    Retry {
        /// Video ID
        video_id: String,

        #[command(flatten)]
        user: UserArg,
    },

    /// Delete stored videos, restoring quota for completed ones
    Delete {
        /// Video IDs
        #[arg(required = true)]
        video_ids: Vec<String>,

        #[command(flatten)]
        user: UserArg,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Browse { handle, pages } => {
                browse(channel_ref(&handle), pages).await
            }
            Commands::Playlist { playlist_id, pages } => {
                browse(CatalogRef::Playlist(playlist_id), pages).await
            }
            Commands::Quota { user } => show_quota(&user.user),
            Commands::Transcribe {
                user,
                channel,
                playlist,
                page,
                ids,
                all,
                batch_size,
            } => {
                let catalog_ref = match (channel, playlist) {
                    (Some(handle), _) => channel_ref(&handle),
                    (None, Some(id)) => CatalogRef::Playlist(id),
                    (None, None) => anyhow::bail!("Pass --channel or --playlist"),
                };
                transcribe(&user.user, catalog_ref, page, ids, all, batch_size).await
            }
            Commands::Videos { user } => list_videos(&user.user),
            Commands::Show { video_id, user } => show_video(&video_id, &user.user),
            Commands::Retry { video_id, user } => retry_video(&video_id, &user.user).await,
            Commands::Delete { video_ids, user } => delete_videos(&video_ids, &user.user),
            Commands::Config => show_config(),
        }
    }
}

/// Channel reference, adding the `@` when it was left off
fn channel_ref(handle: &str) -> CatalogRef {
    let handle = handle.trim();
    if handle.starts_with('@') {
        CatalogRef::parse(handle)
    } else {
        CatalogRef::parse(&format!("@{}", handle))
    }
}

/// Catalog client from config; the API key is required
fn catalog_source(cfg: &ResolvedConfig) -> Result<Arc<dyn CatalogSource>> {
    let api_key = cfg
        .catalog
        .api_key
        .clone()
        .context("No YouTube API key configured (set YOUTUBE_API_KEY or catalog.api_key)")?;

    let client = YouTubeClient::with_base_url(
        api_key,
        cfg.catalog.api_base_url.clone(),
        Duration::from_secs(cfg.catalog.timeout_seconds),
    )?;
    Ok(Arc::new(client))
}

/// Service over the configured store, catalog and worker
fn open_service(cfg: &ResolvedConfig, source: Option<Arc<dyn CatalogSource>>) -> Result<Service> {
    let source = match source {
        Some(source) => source,
        None => {
            // Commands that never touch the catalog still need a client
            let client = YouTubeClient::with_base_url(
                cfg.catalog.api_key.clone().unwrap_or_default(),
                cfg.catalog.api_base_url.clone(),
                Duration::from_secs(cfg.catalog.timeout_seconds),
            )?;
            Arc::new(client) as Arc<dyn CatalogSource>
        }
    };

    let pipeline = WorkerClient::new(
        cfg.pipeline.worker_url.clone(),
        Duration::from_secs(cfg.pipeline.timeout_seconds),
    )?;

    let store = Store::open(&cfg.database)
        .with_context(|| format!("Failed to open database: {}", cfg.database.display()))?;
    debug!(database = %cfg.database.display(), "Store ready");

    Ok(Service::new(
        source,
        Arc::new(pipeline),
        store,
        cfg.quota.clone(),
        cfg.catalog.page_size,
    ))
}

/// Walk `pages` pages of a catalog
async fn browse(catalog_ref: CatalogRef, pages: u32) -> Result<()> {
    let cfg = config::config()?;
    let source = catalog_source(cfg)?;
    let mut paginator = CatalogPaginator::new(source, cfg.catalog.page_size);

    let meta = paginator.get_uploads_metadata(&catalog_ref).await?;
    println!(
        "Playlist: {} ({})",
        meta.playlist_title.as_deref().unwrap_or("untitled"),
        meta.uploads_playlist_id
    );
    println!(
        "Videos: {}  Pages: {}",
        meta.total_count,
        paginator.total_pages()
    );

    for page_number in 1..=pages.max(1) {
        if page_number > 1 && !paginator.can_go_forward(page_number - 1) {
            break;
        }
        let page = paginator.get_page(page_number, None).await?;
        print_page(&page);
    }

    Ok(())
}

fn print_page(page: &CatalogPage) {
    println!();
    println!("Page {}", page.page_number);
    println!("{:<13} {:>6}  {}", "VIDEO ID", "MIN", "TITLE");
    println!("{}", "-".repeat(75));
    for item in &page.items {
        println!(
            "{:<13} {:>6}  {}",
            item.video_id,
            item.duration_in_minutes,
            truncate(&item.title, 54)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn show_quota(user: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = open_service(cfg, None)?;
    let quota = service.get_quota(user)?;

    println!("User:        {}", quota.user_email);
    println!("Video-hours: {}", quota.video_hours_left);
    println!("Messages:    {}", quota.messages_left);
    println!("Resets at:   {}", quota.reset_at.format("%Y-%m-%d %H:%M UTC"));

    Ok(())
}

/// Select videos from one catalog page and dispatch them
async fn transcribe(
    user: &str,
    catalog_ref: CatalogRef,
    page_number: u32,
    ids: Vec<String>,
    all: bool,
    batch_size: Option<usize>,
) -> Result<()> {
    let cfg = config::config()?;
    let source = catalog_source(cfg)?;
    let service = open_service(cfg, Some(source.clone()))?;

    let mut paginator = CatalogPaginator::new(source, cfg.catalog.page_size);
    let meta = paginator.get_uploads_metadata(&catalog_ref).await?;

    // Tokens are only learned walking forward
    let mut page = None;
    for number in 1..=page_number.max(1) {
        page = Some(paginator.get_page(number, None).await?);
    }
    let page = page.context("No catalog page fetched")?;

    let candidates: Vec<CatalogItem> = if all {
        page.items
    } else {
        let missing: Vec<&String> = ids
            .iter()
            .filter(|id| !page.items.iter().any(|item| &item.video_id == *id))
            .collect();
        if !missing.is_empty() {
            eprintln!("Not on page {}: {:?}", page_number, missing);
        }
        page.items
            .into_iter()
            .filter(|item| ids.contains(&item.video_id))
            .collect()
    };

    let quota = service.get_quota(user)?;
    let (selection, report) = select_all(&candidates, &quota);
    if report.truncated() {
        eprintln!(
            "Selected {} of {} videos; the rest exceed the remaining {} video-hours",
            report.selected, report.requested, quota.video_hours_left
        );
    }
    if selection.is_empty() {
        println!("Nothing to transcribe");
        return Ok(());
    }

    let origin = match &catalog_ref {
        CatalogRef::Channel(handle) => {
            VideoOrigin::channel(handle.clone(), meta.uploads_playlist_id.clone())
        }
        CatalogRef::Playlist(id) => VideoOrigin::playlist(id.clone(), meta.playlist_title.clone()),
    };

    println!(
        "Transcribing {} videos ({} min, {} video-hours)",
        selection.len(),
        selection.total_minutes(),
        selection.hours_required()
    );

    let summary = service
        .transcribe_videos(
            selection.items(),
            user,
            batch_size.unwrap_or(cfg.pipeline.batch_size),
            &origin,
        )
        .await?;

    println!();
    println!("Attempted: {}", summary.total_attempts);
    println!("Completed: {}", summary.completed);
    println!("Failed:    {}", summary.failed);
    println!("Skipped:   {}", summary.skipped);
    println!("Debited:   {} video-hours", summary.hours_debited);

    if summary.failed > 0 {
        eprintln!("\nRetry failed videos with `vidscribe retry <id> --user {}`", user);
    }

    Ok(())
}

fn list_videos(user: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = open_service(cfg, None)?;
    let videos = service.list_videos(user)?;

    if videos.is_empty() {
        println!("No videos stored");
        return Ok(());
    }

    println!("{:<38} {:<17} {:>6}  {}", "ID", "STATUS", "MIN", "TITLE");
    println!("{}", "-".repeat(90));
    for video in &videos {
        println!(
            "{:<38} {:<17} {:>6}  {}",
            video.id,
            video.status,
            video.duration_in_minutes,
            truncate(&video.title, 40)
        );
    }

    let failed = videos.iter().filter(|v| v.status.is_error()).count();
    if failed > 0 {
        eprintln!("\n{} failed; retry with `vidscribe retry <id>`", failed);
    }

    Ok(())
}

fn show_video(video_id: &str, user: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = open_service(cfg, None)?;
    let video = service.lifecycle().get(video_id, user)?;
    let chunks = service.lifecycle().chunks(video_id, user)?;

    println!("Title:   {}", video.title);
    println!("YouTube: https://www.youtube.com/watch?v={}", video.youtube_id);
    println!("Status:  {}", video.status);
    println!("Length:  {} min", video.duration_in_minutes);
    if let Some(channel) = &video.channel_handle {
        println!("Channel: {}", channel);
    }
    if let Some(playlist) = video.playlist_title.as_ref().or(video.playlist_id.as_ref()) {
        println!("Playlist: {}", playlist);
    }
    println!();

    if chunks.is_empty() {
        println!("(no transcript)");
    }
    for chunk in chunks {
        let secs = chunk.timestamp_in_seconds;
        println!("[{:02}:{:02}:{:02}] {}", secs / 3600, (secs % 3600) / 60, secs % 60, chunk.text);
    }

    Ok(())
}

async fn retry_video(video_id: &str, user: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = open_service(cfg, None)?;
    let report = service.retry_video(video_id, user).await?;

    if report.success {
        println!("Retried {} ({}): completed", video_id, report.action);
        Ok(())
    } else {
        anyhow::bail!(
            "Retry {} of {} failed: {}",
            report.action,
            video_id,
            report.error.unwrap_or_default()
        )
    }
}

fn delete_videos(video_ids: &[String], user: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = open_service(cfg, None)?;

    if let [video_id] = video_ids {
        let outcome = service.delete_stored_video(video_id, user)?;
        println!("Deleted 1 video, restored {} video-hours", outcome.quota_restored);
    } else {
        let outcome = service.bulk_delete_stored_videos(video_ids, user)?;
        println!(
            "Deleted {} videos, restored {} video-hours",
            outcome.deleted_count, outcome.quota_restored
        );
    }

    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("vidscribe configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database.display());
    println!();
    println!("Catalog:");
    println!("  API:       {}", cfg.catalog.api_base_url);
    println!(
        "  API key:   {}",
        if cfg.catalog.api_key.is_some() { "set" } else { "(not set)" }
    );
    println!("  Page size: {}", cfg.catalog.page_size);
    println!("  Timeout:   {}s", cfg.catalog.timeout_seconds);
    println!();
    println!("Quota defaults:");
    println!("  Video-hours: {}", cfg.quota.video_hours);
    println!("  Messages:    {}", cfg.quota.messages);
    println!("  Period:      {} days", cfg.quota.reset_period_days);
    println!();
    println!("Pipeline:");
    println!("  Worker:     {}", cfg.pipeline.worker_url);
    println!("  Batch size: {}", cfg.pipeline.batch_size);
    println!("  Timeout:    {}s", cfg.pipeline.timeout_seconds);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcribe_with_ids() {
        let cli = Cli::try_parse_from([
            "vidscribe",
            "transcribe",
            "--user",
            "a@x.com",
            "--channel",
            "@chan",
            "--ids",
            "v1,v2",
            "--page",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Transcribe {
                user,
                channel,
                ids,
                page,
                all,
                ..
            } => {
                assert_eq!(user.user, "a@x.com");
                assert_eq!(channel.as_deref(), Some("@chan"));
                assert_eq!(ids, vec!["v1", "v2"]);
                assert_eq!(page, 2);
                assert!(!all);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_transcribe_requires_a_source() {
        let result = Cli::try_parse_from(["vidscribe", "transcribe", "--user", "a@x.com", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_accepts_many_ids() {
        let cli =
            Cli::try_parse_from(["vidscribe", "delete", "id1", "id2", "--user", "a@x.com"]).unwrap();
        match cli.command {
            Commands::Delete { video_ids, .. } => assert_eq!(video_ids.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_channel_ref_adds_at() {
        assert_eq!(channel_ref("veritasium"), CatalogRef::Channel("@veritasium".to_string()));
        assert_eq!(channel_ref("@veritasium"), CatalogRef::Channel("@veritasium".to_string()));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long title here", 10), "a long ...");
    }
}
