mod app;
mod handler;
mod markdown;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use routinely_core::{filter_products, Catalog, Config, FileStore, ProductStore};
use app::App;
use tui::EventHandler;

const LOG_ENV: &str = "ROUTINELY_LOG";

#[derive(Parser)]
#[command(name = "routinely")]
#[command(version, about = "Browse beauty products and build a routine with an AI assistant")]
struct Cli {
    /// Product catalog: a JSON file path or an http(s) URL
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Chat relay endpoint
    #[arg(long, global = true)]
    relay_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog categories
    Categories,
    /// Search product names and descriptions
    Search {
        /// Search text
        query: String,
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Print the saved selection
    Selection,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.is_none())?;

    let mut config = Config::load()?;
    if let Some(catalog) = cli.catalog {
        config.catalog = Some(catalog);
    }
    if let Some(url) = cli.relay_url {
        config.relay_url = Some(url);
    }

    match cli.command {
        None => run_tui(&config).await,
        Some(Commands::Categories) => list_categories(&config).await,
        Some(Commands::Search { query, category, limit }) => {
            search(&config, &query, category.as_deref().unwrap_or(""), limit).await
        }
        Some(Commands::Selection) => print_selection(&config),
    }
}

/// The TUI owns the terminal, so interactive sessions log to a file
fn init_logging(interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    if interactive {
        let log_dir = dirs::data_local_dir()
            .context("Could not determine data directory")?
            .join("routinely");
        fs::create_dir_all(&log_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("routinely.log"))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn run_tui(config: &Config) -> Result<()> {
    let mut app = App::new(config).await?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    info!("terminal ready");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            let Some(event) = events.next().await else {
                break;
            };
            handler::handle_event(&mut app, event).await?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("terminal restored");
    result
}

async fn load_catalog(config: &Config) -> Result<Catalog> {
    Catalog::load(config.catalog_source())
        .await
        .with_context(|| format!("Failed to load catalog from {}", config.catalog_source()))
}

async fn list_categories(config: &Config) -> Result<()> {
    let catalog = load_catalog(config).await?;

    for category in catalog.categories() {
        let count = catalog
            .products()
            .iter()
            .filter(|p| &p.category == category)
            .count();
        println!("{} ({})", category, count);
    }
    Ok(())
}

async fn search(config: &Config, query: &str, category: &str, limit: usize) -> Result<()> {
    let catalog = load_catalog(config).await?;
    let results = filter_products(catalog.products(), category, query);

    if results.is_empty() {
        println!("No products match your filters");
        return Ok(());
    }

    println!("Found {} product(s):\n", results.len());
    for product in results.iter().take(limit) {
        println!("{} - {} [{}]", product.name, product.brand, product.category);
        if !product.description.is_empty() {
            println!("  {}", product.description);
        }
    }
    if results.len() > limit {
        println!("\n... and {} more", results.len() - limit);
    }
    Ok(())
}

fn print_selection(config: &Config) -> Result<()> {
    let mut store = ProductStore::new(Box::new(FileStore::new(config.storage_path()?)));
    store.restore();

    if store.selection().is_empty() {
        println!("No products selected");
        return Ok(());
    }
    for product in store.selection().products() {
        println!("{} - {}", product.name, product.brand);
    }
    Ok(())
}
