use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;

use readn::api::{FeedId, FolderId, HttpApi, RemoteApi, Scope, Settings, StatusFilter};
use readn::app::App;
use readn::config::Config;
use readn::runtime::Controller;

/// Get the config directory path (~/.config/readn/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("readn"))
}

fn parse_filter(s: &str) -> Result<StatusFilter, String> {
    StatusFilter::from_str_name(s).ok_or_else(|| format!("expected unread or starred, got {s:?}"))
}

/// Folder selector; `none` selects feeds without a folder.
#[derive(Debug, Clone, Copy)]
struct FolderArg(Option<FolderId>);

fn parse_folder(s: &str) -> Result<FolderArg, String> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(FolderArg(None));
    }
    s.parse()
        .map(|id| FolderArg(Some(id)))
        .map_err(|_| format!("expected a folder id or \"none\", got {s:?}"))
}

#[derive(Parser, Debug)]
#[command(name = "readn", about = "Command-line client for a self-hosted feed reader")]
struct Args {
    /// Config file (default: ~/.config/readn/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server URL, overriding the config file
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show per-feed counts and the unread title
    Status,
    /// List items page by page
    Items {
        /// Only items of this feed
        #[arg(long, conflicts_with = "folder")]
        feed: Option<FeedId>,
        /// Only items of this folder ("none" for feeds without a folder)
        #[arg(long, value_parser = parse_folder)]
        folder: Option<FolderArg>,
        /// unread or starred
        #[arg(long, value_parser = parse_filter)]
        filter: Option<StatusFilter>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        oldest_first: bool,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Refresh all feeds and wait until the server is done
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }

    let mut api = HttpApi::new(&config.server_url, config.request_timeout())
        .context("Failed to create HTTP client")?;
    if let (Some(username), Some(password)) = (&config.username, config.resolve_password()) {
        api = api.with_basic_auth(username.clone(), SecretString::from(password));
    }

    // Start from the persisted preferences so guarded fields are initialized,
    // then narrow them with the command-line flags without writing anything.
    let mut settings = match api.settings().await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings, using defaults");
            Settings::default()
        }
    };

    let mut controller = Controller::new(api, App::new(config.tuning()));

    match args.command {
        Command::Status => {
            settings.feed = None;
            controller.act(|app, _| app.bootstrap(&settings));
            controller.settle().await;
            print_status(controller.app());
        }

        Command::Items {
            feed,
            folder,
            filter,
            search,
            oldest_first,
            pages,
        } => {
            settings.feed = Some(match (feed, folder) {
                (Some(id), _) => Scope::Feed(id),
                (None, Some(FolderArg(folder))) => Scope::Folder(folder),
                (None, None) => Scope::All,
            });
            settings.filter = filter;
            settings.sort_newest_first = Some(!oldest_first);

            if let Some(search) = search {
                controller.app_mut().seed_search(search);
            }
            controller.act(|app, _| app.bootstrap(&settings));
            controller.settle().await;

            for _ in 1..pages {
                if !controller.app().items.has_more() {
                    break;
                }
                controller.act(|app, _| app.load_more());
                controller.settle().await;
            }
            print_items(controller.app());
        }

        Command::Refresh => {
            settings.feed = None;
            controller.act(|app, _| app.bootstrap(&settings));
            controller.settle().await;
            controller.act(|app, _| app.fetch_all_feeds());
            controller.settle().await;
            println!("{}", controller.app().title());
        }
    }

    if let Some((message, _)) = &controller.app().status_message {
        eprintln!("{}", message);
    }
    Ok(())
}

fn print_status(app: &App) {
    println!("{}", app.title());
    for feed in &app.feeds {
        let (unread, starred) = app
            .stats
            .get(feed.id)
            .map_or((0, 0), |s| (s.unread, s.starred));
        let error = app.feed_errors.get(&feed.id).map_or("", String::as_str);
        println!("{:>6} {:>5} {:>5}  {} {}", feed.id, unread, starred, feed.title, error);
    }
}

fn print_items(app: &App) {
    for item in app.items.items() {
        let date = item
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{:>8} {:<7} {:<16} {}", item.id, item.status.as_str(), date, item.title);
    }
    if app.items.has_more() {
        println!("(more available, use --pages)");
    }
}
