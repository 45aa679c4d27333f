//! Binary entrypoint for the lumenmud CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml`
//! - `check` - load the world and quests and print a summary
//! - `reset-all` - load the world, apply every room's resets and report counts
//!
//! See the library crate docs for module-level details: `lumenmud::`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::sync::Arc;

use lumenmud::config::Config;
use lumenmud::storage::SledProfileStoreBuilder;
use lumenmud::world::{World, WorldBuilder};

#[derive(Parser)]
#[command(name = "lumenmud")]
#[command(about = "World simulation core for a persistent multiplayer text world")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Load areas, overlay and quests, then print a summary
    Check,
    /// Load the world and top up every room's population
    ResetAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init has no config to read logging settings from yet
    let pre_config = match cli.command {
        Commands::Init { .. } => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init { force } => {
            if !force && tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                error!("{} already exists (use --force to overwrite)", cli.config);
                std::process::exit(1);
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Check => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let world = match open_world(&config) {
                Ok(world) => world,
                Err(e) => {
                    error!("World failed to load: {:#}", e);
                    std::process::exit(1);
                }
            };
            let summary = world.summary();
            println!("rooms:         {}", summary.rooms);
            println!("builder rooms: {}", summary.builder_rooms);
            println!("npcs:          {}", summary.npcs);
            println!("items:         {}", summary.items);
            println!("resets:        {}", summary.resets);
            println!("quests:        {}", summary.quests);
        }
        Commands::ResetAll => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let world = open_world(&config)?;
            let report = world.apply_all_resets();
            println!("npcs spawned:  {}", report.npcs_spawned);
            println!("items spawned: {}", report.items_spawned);
        }
    }

    Ok(())
}

fn open_world(config: &Config) -> Result<Arc<World>> {
    let profiles = SledProfileStoreBuilder::new(&config.storage.profiles_db)
        .open()
        .with_context(|| format!("opening profile store {}", config.storage.profiles_db))?;
    let world = WorldBuilder::from_config(config)
        .profile_store(Arc::new(profiles))
        .build()
        .with_context(|| format!("loading world from {}", config.world.areas_path))?;
    info!("Loaded {} rooms from {}", world.summary().rooms, config.world.areas_path);
    Ok(world)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Mirror to the console only when someone is watching it
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
