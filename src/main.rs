use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing::{info, warn};

use wazewatch::app::{self, App};
use wazewatch::config::Config;
use wazewatch::db::StateStore;
use wazewatch::feed::WazeClient;
use wazewatch::pipeline::jobs;
use wazewatch::state::CategoryFilters;

/// Wazewatch: polls a Waze area for alerts and fans new ones out.
///
/// Every alert is delivered once: to the live /events stream, to the alert
/// history, and to the push sink (Telegram, or stdout without credentials).
#[derive(Parser)]
#[command(name = "wazewatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the state database
    Init,

    /// Run the scheduler and the web server until Ctrl-C
    Run {
        /// Don't start the web server
        #[arg(long)]
        no_web: bool,
    },

    /// Fetch and ingest one alert batch, printing what's new
    Poll,

    /// Show persisted state (processed alerts, peak, filters, last save)
    Status,

    /// Show the live stream filters, or replace them
    Filters {
        /// Comma-separated categories to enable (comment, police, jam,
        /// accident, unknown), "all", or "none"
        #[arg(long)]
        set: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wazewatch=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = Config::load()?;
            init_database(&config).await?;
        }

        Commands::Run { no_web } => {
            let config = Config::load()?;
            run(config, !no_web).await?;
        }

        Commands::Poll => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            let client = Arc::new(WazeClient::new(
                &config.feed_url,
                &config.broadcast_url,
                config.bounds,
            )?);
            let app = App::start(config, store, None).await;

            let report = jobs::fetch_alerts(client.as_ref(), &app.pipeline).await?;
            for entry in app.hub.log().snapshot() {
                println!("{}\n", entry.rendered.text);
            }
            println!(
                "{} received, {} new, {} duplicates, {} malformed",
                report.received,
                report.dispatched.to_string().green(),
                report.duplicates,
                report.malformed
            );
            app.shutdown().await;
        }

        Commands::Status => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            wazewatch::status::show(store.as_ref(), &config.db_path).await?;
        }

        Commands::Filters { set } => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            match set {
                Some(list) => {
                    let filters = if list.trim().eq_ignore_ascii_case("none") {
                        CategoryFilters::default()
                    } else {
                        CategoryFilters::from_names(&list).map_err(|e| anyhow::anyhow!(e))?
                    };
                    store.save_filters(&filters).await?;
                    println!(
                        "Filters saved: {}",
                        wazewatch::status::describe_filters(&filters).green()
                    );
                    println!(
                        "{}",
                        "A running instance picks these up on its next restart.".dimmed()
                    );
                }
                None => {
                    let state = store.load().await?;
                    let filters = state
                        .filters
                        .as_deref()
                        .and_then(|raw| serde_json::from_str::<CategoryFilters>(raw).ok())
                        .unwrap_or_default();
                    println!("Filters: {}", wazewatch::status::describe_filters(&filters));
                }
            }
        }
    }

    Ok(())
}

/// Wire everything up and run until Ctrl-C, then shut down in order:
/// stop the job loops, stop the web server, drain pushes, save state.
async fn run(config: Config, with_web: bool) -> Result<()> {
    let store = open_store(&config)?;
    let sink = app::build_sink(&config)?;
    let client = Arc::new(WazeClient::new(
        &config.feed_url,
        &config.broadcast_url,
        config.bounds,
    )?);
    let app = App::start(config, store, Some(sink)).await;
    info!(
        processed = app.dedup.len(),
        peak = app.peak.current(),
        "State restored"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job_handles = app
        .scheduler(client.clone(), client)
        .start(shutdown_rx.clone());

    #[cfg(feature = "web")]
    let server = with_web.then(|| {
        let state = wazewatch::web::AppState::from(&app);
        let bind = app.config.bind.clone();
        let port = app.config.port;
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { wazewatch::web::run_server(state, &bind, port, rx).await })
    });
    #[cfg(not(feature = "web"))]
    if with_web {
        warn!("Built without the 'web' feature, running without the web server");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    for handle in job_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Job loop ended abnormally");
        }
    }

    #[cfg(feature = "web")]
    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => warn!(error = %e, "Web server error"),
            Err(e) => warn!(error = %e, "Web server task ended abnormally"),
            Ok(Ok(())) => {}
        }
    }

    app.shutdown().await;
    info!("Stopped");
    Ok(())
}

/// Open the state database, or an in-memory store when built without SQLite.
fn open_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    #[cfg(feature = "sqlite")]
    {
        let store: Arc<dyn StateStore> = wazewatch::db::open_sqlite(&config.db_path)?;
        Ok(store)
    }
    #[cfg(not(feature = "sqlite"))]
    {
        warn!(
            db_path = %config.db_path,
            "Built without the 'sqlite' feature, state will not survive a restart"
        );
        Ok(Arc::new(wazewatch::db::MemoryStore::new()))
    }
}

async fn init_database(config: &Config) -> Result<()> {
    #[cfg(feature = "sqlite")]
    {
        info!("Initializing Wazewatch database...");
        let db = wazewatch::db::open_sqlite(&config.db_path)?;
        let table_count = db.table_count().await?;
        println!("Database initialized at: {}", config.db_path);
        println!("Tables created: {table_count}");
        println!("\nNext step: set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID in .env");
        println!("Then run: cargo run -- run");
    }
    #[cfg(not(feature = "sqlite"))]
    {
        println!(
            "{} built without the 'sqlite' feature, nothing to initialize ({})",
            "Note:".yellow(),
            config.db_path
        );
    }
    Ok(())
}
