use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    settings::{self, default_preferences_path, load_preferences, save_preferences},
    AssetBrowser, BrowserEvent, HttpAssetBackend, NotificationLevel, Preferences, SortOrder,
    UploadFile, UploadStatus,
};
use shared::{
    domain::{AssetId, FileCategory, TagId, Theme, ViewMode},
    protocol::{default_palette_color, palette_color, AssetRecord, TAG_PALETTE},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "asset-cli", about = "Browse and manage assets on an asset server")]
struct Cli {
    /// Overrides `server_url` from asset-browser.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    page_limit: Option<u32>,
    /// Preferences file; defaults to the per-user config directory.
    #[arg(long)]
    prefs: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one page of assets, filtered and sorted locally.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Repeat to allow several categories.
        #[arg(long = "type")]
        types: Vec<FileCategory>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        sort: Option<SortOrder>,
        #[arg(long)]
        json: bool,
    },
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    Delete {
        id: String,
    },
    BulkDelete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Compress {
        id: String,
    },
    BulkCompress {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Download {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    #[command(subcommand)]
    Tags(TagCommand),
    /// Replace the tag set of each asset with exactly the given tags.
    TagAssets {
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(required = true)]
        assets: Vec<String>,
    },
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    List,
    Create {
        name: String,
        #[arg(long, default_value = default_palette_color(), value_parser = parse_tag_color)]
        color: String,
    },
    Update {
        id: String,
        name: String,
        #[arg(long, default_value = default_palette_color(), value_parser = parse_tag_color)]
        color: String,
    },
    /// Deletes the tag and every asset that carries it.
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    Show,
    Set {
        #[arg(long, value_parser = parse_theme)]
        theme: Option<Theme>,
        #[arg(long)]
        panel_width: Option<f32>,
        #[arg(long)]
        sort: Option<SortOrder>,
        #[arg(long, value_parser = parse_view_mode)]
        view: Option<ViewMode>,
    },
}

fn parse_theme(value: &str) -> Result<Theme, String> {
    match value.to_ascii_lowercase().as_str() {
        "light" => Ok(Theme::Light),
        "dark" => Ok(Theme::Dark),
        "system" => Ok(Theme::System),
        other => Err(format!("unknown theme '{other}'")),
    }
}

fn parse_tag_color(value: &str) -> Result<String, String> {
    palette_color(value)
        .map(str::to_string)
        .ok_or_else(|| format!("color must be one of {}", TAG_PALETTE.join(", ")))
}

fn parse_view_mode(value: &str) -> Result<ViewMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "list" => Ok(ViewMode::List),
        "grid" => Ok(ViewMode::Grid),
        other => Err(format!("unknown view mode '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = settings::load_settings();
    if let Some(url) = cli.server_url {
        settings.server_url = url;
    }
    if let Some(limit) = cli.page_limit {
        settings.page_limit = limit.clamp(1, settings::MAX_PAGE_LIMIT);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.log_filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!(server_url = %settings.server_url, page_limit = settings.page_limit, "asset-cli: settings loaded");

    let prefs_path = match cli.prefs {
        Some(path) => path,
        None => default_preferences_path()?,
    };

    let prefs = load_preferences(&prefs_path).unwrap_or_else(|err| {
        warn!(error = %err, "asset-cli: using default preferences");
        Preferences::default()
    });
    let backend = Arc::new(HttpAssetBackend::new(&settings.server_url)?);
    let browser = AssetBrowser::with_preferences(backend, settings.page_limit, &prefs);
    let mut events = browser.subscribe_events();

    let outcome = run(&browser, &prefs_path, cli.command).await;
    print_notifications(&mut events);
    outcome
}

async fn run(browser: &AssetBrowser, prefs_path: &Path, command: Command) -> Result<()> {
    match command {
        Command::List {
            page,
            types,
            tag,
            search,
            sort,
            json,
        } => {
            browser.set_tag_filter(tag).await?;
            browser.set_filter_types(types).await?;
            browser.set_search_query(search).await?;
            if let Some(sort) = sort {
                browser.set_sort_order(sort).await?;
            }
            // Every view change above resets to page 1.
            if page > 1 {
                browser.set_page(page).await?;
            }

            let snapshot = browser.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.visible)?);
            } else {
                for asset in &snapshot.visible {
                    println!("{}", format_asset(asset));
                }
                println!(
                    "page {} of {} ({} assets on server, {} shown)",
                    snapshot.view.current_page(),
                    snapshot.total_pages.max(1),
                    snapshot.total_count,
                    snapshot.visible.len()
                );
            }
        }
        Command::Upload { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(read_upload(path).await?);
            }
            let entries = browser.upload_files(uploads).await;
            let mut failed = 0;
            for entry in &entries {
                match entry.status {
                    UploadStatus::Success => println!("uploaded {}", entry.file_name),
                    _ => {
                        failed += 1;
                        println!(
                            "failed   {}: {}",
                            entry.file_name,
                            entry.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
            }
            browser.finish_uploads().await;
            if failed > 0 {
                bail!("{failed} of {} uploads failed", entries.len());
            }
        }
        Command::Delete { id } => {
            browser.select_asset(Some(AssetId::new(id.clone()))).await;
            browser.request_delete().await;
            browser.confirm_delete().await?;
            println!("deleted {id}");
        }
        Command::BulkDelete { ids } => {
            select_for_bulk(browser, ids).await;
            let count = browser.bulk_delete().await?;
            println!("deleted {count} assets");
        }
        Command::Compress { id } => {
            browser.compress(&AssetId::new(id.clone())).await?;
            println!("compression requested for {id}");
        }
        Command::BulkCompress { ids } => {
            select_for_bulk(browser, ids).await;
            let count = browser.bulk_compress().await?;
            println!("compression requested for {count} assets");
        }
        Command::Download { id, out } => {
            let id = AssetId::new(id);
            let bytes = browser.download(&id).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(id.as_str()));
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(asset_id = %id, bytes = bytes.len(), path = %out.display(), "asset-cli: downloaded");
            println!("saved {} bytes to {}", bytes.len(), out.display());
        }
        Command::Tags(command) => run_tags(browser, command).await?,
        Command::TagAssets { tags, assets } => {
            browser
                .tag_assets(
                    assets.into_iter().map(AssetId::new).collect(),
                    tags.into_iter().map(TagId::new).collect(),
                )
                .await?;
            println!("tags applied");
        }
        Command::Prefs(command) => run_prefs(prefs_path, command)?,
    }
    Ok(())
}

async fn run_tags(browser: &AssetBrowser, command: TagCommand) -> Result<()> {
    match command {
        TagCommand::List => {
            browser.refresh_tags().await?;
            for tag in browser.tags().await {
                println!("{}\t{}\t{}", tag.id, tag.color, tag.name);
            }
        }
        TagCommand::Create { name, color } => {
            let tag = browser.create_tag(&name, &color).await?;
            println!("created tag {} ({})", tag.name, tag.id);
        }
        TagCommand::Update { id, name, color } => {
            let tag = browser.update_tag(&TagId::new(id), &name, &color).await?;
            println!("updated tag {} ({})", tag.name, tag.id);
        }
        TagCommand::Delete { id, yes } => {
            if !yes {
                eprintln!("deleting a tag also deletes every asset carrying it; pass --yes to confirm");
            }
            browser.delete_tag(&TagId::new(id.clone()), yes).await?;
            println!("deleted tag {id} and its assets");
        }
    }
    Ok(())
}

fn run_prefs(path: &Path, command: PrefsCommand) -> Result<()> {
    let mut prefs = load_preferences(path)?;
    match command {
        PrefsCommand::Show => {}
        PrefsCommand::Set {
            theme,
            panel_width,
            sort,
            view,
        } => {
            if let Some(theme) = theme {
                prefs.theme = theme;
            }
            if let Some(width) = panel_width {
                if !prefs.set_panel_width(width) {
                    return Err(anyhow!(
                        "panel width must be between {} and {}",
                        settings::MIN_PANEL_WIDTH,
                        settings::MAX_PANEL_WIDTH
                    ));
                }
            }
            if let Some(sort) = sort {
                prefs.sort_order = sort;
            }
            if let Some(view) = view {
                prefs.view_mode = view;
            }
            save_preferences(path, &prefs)?;
        }
    }
    println!("{}", serde_json::to_string_pretty(&prefs)?);
    Ok(())
}

async fn select_for_bulk(browser: &AssetBrowser, ids: Vec<String>) {
    browser.toggle_selection_mode().await;
    for id in ids {
        browser.toggle_asset_selection(AssetId::new(id)).await;
    }
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    let mut file = UploadFile::new(file_name, bytes);
    file.mime_type = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string());
    Ok(file)
}

fn format_asset(asset: &AssetRecord) -> String {
    let tags: Vec<&str> = asset.tags.iter().map(|tag| tag.name.as_str()).collect();
    let compressed = match asset.compression_ratio {
        Some(ratio) if asset.is_compressed => format!(" compressed:{:.0}%", ratio * 100.0),
        _ => String::new(),
    };
    format!(
        "{}\t{:<8}\t{:>10}\t{}\t{}{}{}",
        asset.id,
        asset.file_type.as_str(),
        human_size(asset.file_size_bytes),
        asset.created_at.format("%Y-%m-%d %H:%M"),
        asset.original_filename,
        if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        },
        compressed
    )
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn print_notifications(events: &mut broadcast::Receiver<BrowserEvent>) {
    while let Ok(event) = events.try_recv() {
        if let BrowserEvent::Notification(notification) = event {
            let level = match notification.level {
                NotificationLevel::Success => "ok",
                NotificationLevel::Info => "info",
                NotificationLevel::Error => "error",
            };
            eprintln!("[{level}] {}", notification.message);
        }
    }
}
