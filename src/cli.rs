use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::ConfigStore;
use crate::filter::Radius;
use crate::geolocation::{self, LocationResult};
use crate::models::{Coordinate, Event};
use crate::scraping::HtmlCardSource;
use crate::storage::{SqliteStore, Storage};
use crate::{utils, Calendar};

#[derive(Parser)]
#[command(name = "krawl")]
#[command(about = "Filter the event calendar by category, time window, radius and venue")]
struct Cli {
    /// Rendered calendar page: a file path or an http(s) URL
    #[arg(short, long, default_value = "_site/index.html")]
    source: String,

    /// Config file (defaults to the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite file holding preferences and bookmarks
    #[arg(long)]
    db: Option<PathBuf>,

    /// Your latitude, enables the radius filter together with --lng
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Your longitude
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events matching the current filters
    List {
        /// Toggle a category (repeatable)
        #[arg(short, long)]
        category: Vec<String>,

        /// Time range id, e.g. "sunrise", "tatort", "moon", "all" or "24h"
        #[arg(short, long)]
        time_range: Option<String>,

        /// Radius in km, or "unlimited"
        #[arg(short, long)]
        radius: Option<String>,

        /// Only events at this venue ("none" clears it)
        #[arg(short, long)]
        venue: Option<String>,

        /// Show at most this many events
        #[arg(short, long)]
        limit: Option<usize>,

        /// Remember these filters for the next run
        #[arg(long)]
        save: bool,
    },
    /// Toggle a bookmark by event identifier
    Bookmark { id: String },
    /// Show bookmarked events
    Bookmarks {
        /// Remove all bookmarks
        #[arg(long)]
        clear: bool,

        /// Confirm --clear without prompting
        #[arg(long)]
        yes: bool,
    },
    /// Show counts and the categories and venues present
    Stats,
    /// Delete saved filters and bookmarks
    Reset {
        /// Confirm without prompting
        #[arg(long)]
        yes: bool,
    },
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.command {
        let config_path = cli.config.clone().unwrap_or_else(utils::config_path);
        ConfigStore::write_default(&config_path, force)?;
        println!("Wrote default config to {}", config_path.display());
        return Ok(());
    }

    let config_store = match cli.config.clone() {
        Some(path) => ConfigStore::load_from(path),
        None => ConfigStore::load(),
    };
    tracing::debug!("using config {}", config_store.path().display());
    let config = config_store.read();
    let backend = match &cli.db {
        Some(path) => SqliteStore::open(path)
            .with_context(|| format!("unable to open {}", path.display()))?,
        None => SqliteStore::open_default().context("unable to open the default database")?,
    };
    let storage = Storage::new(Arc::new(backend));
    let source = HtmlCardSource::from_location(&cli.source);
    let mut calendar = Calendar::open(config, storage, &source);

    if let (Some(lat), Some(lng)) = (cli.lat, cli.lng) {
        let location = resolve_location(Coordinate::new(lat, lng))?;
        if let Some(message) = calendar.set_user_location(location) {
            eprintln!("{message}");
        }
    }

    match cli.command {
        Commands::List {
            category,
            time_range,
            radius,
            venue,
            limit,
            save,
        } => cmd_list(&mut calendar, category, time_range, radius, venue, limit, save),
        Commands::Bookmark { id } => {
            let bookmarked = calendar.bookmarks_mut().toggle(&id);
            println!(
                "{} {id}",
                if bookmarked { "Bookmarked" } else { "Removed" }
            );
            Ok(())
        }
        Commands::Bookmarks { clear, yes } => cmd_bookmarks(&mut calendar, clear, yes),
        Commands::Stats => {
            calendar.refresh();
            let stats = calendar.events().stats(calendar.filters().now());
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Reset { yes } => {
            if yes {
                calendar.reset();
                println!("Saved filters and bookmarks deleted");
            } else {
                eprintln!("Refusing to reset without --yes");
            }
            Ok(())
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

/// Feeds the coordinate flags through the same single-shot request a browser
/// bridge would answer.
fn resolve_location(coordinate: Coordinate) -> Result<LocationResult> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("unable to start location runtime")?;
    let (responder, pending) = geolocation::request();
    Ok(runtime.block_on(async move {
        tokio::spawn(async move {
            responder.resolve(Ok(coordinate));
        });
        pending.wait(geolocation::DEFAULT_TIMEOUT).await
    }))
}

fn cmd_list(
    calendar: &mut Calendar,
    categories: Vec<String>,
    time_range: Option<String>,
    radius: Option<String>,
    venue: Option<String>,
    limit: Option<usize>,
    save: bool,
) -> Result<()> {
    let filters = calendar.filters_mut();
    for category in &categories {
        filters.toggle_category(category);
    }
    if let Some(id) = time_range {
        filters.set_time_range_id(&id);
    }
    if let Some(raw) = radius {
        let parsed = Radius::parse(&raw).with_context(|| format!("invalid radius {raw:?}"))?;
        filters.set_radius(parsed);
    }
    if let Some(name) = venue {
        filters.set_venue(Some(name).filter(|n| !n.eq_ignore_ascii_case("none")));
    }
    if save {
        calendar.save_prefs();
    }

    let now = calendar.filters().now();
    let bookmarks = calendar.bookmarks().all();
    let total = calendar.events().all().len();
    let matched = calendar.refresh_at(now);
    let shown = limit.unwrap_or(matched.len()).min(matched.len());
    for event in &matched[..shown] {
        let star = if bookmarks.contains(&event.url) { "★" } else { " " };
        println!("{star} {}", describe(event));
    }
    println!("{} of {total} events", matched.len());
    Ok(())
}

fn cmd_bookmarks(calendar: &mut Calendar, clear: bool, yes: bool) -> Result<()> {
    if clear {
        let cleared = calendar.bookmarks_mut().clear(|count| {
            if !yes {
                eprintln!("Refusing to delete {count} bookmarks without --yes");
            }
            yes
        });
        if cleared {
            println!("All bookmarks deleted");
        }
        return Ok(());
    }

    let events = calendar.events().all();
    for event in calendar.bookmarks().bookmarked_events(events) {
        println!("★ {}", describe(event));
    }
    let missing = calendar.bookmarks().missing_count(events);
    if missing > 0 {
        println!("({missing} bookmarked events are no longer listed)");
    }
    Ok(())
}

fn describe(event: &Event) -> String {
    let when = match event.time {
        Some(time) => format!("{} {}", event.date.format("%d.%m.%Y"), time.format("%H:%M")),
        None => event.date.format("%d.%m.%Y").to_string(),
    };
    let mut line = format!("{when}  {}", event.title());
    if !event.location.is_empty() {
        line.push_str(&format!(" @ {}", event.location));
    }
    if !event.categories.is_empty() {
        line.push_str(&format!(" [{}]", event.categories.join(", ")));
    }
    line.push_str(&format!("  {}", event.url));
    line
}
