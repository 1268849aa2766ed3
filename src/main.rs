//! vgctl - inspect a virtual group store
//!
//! Usage:
//!   vgctl init               - Write a default config and initialize the store
//!   vgctl params             - Show module params
//!   vgctl show-gvg <id>      - Show a global virtual group
//!   vgctl show-family <id>   - Show a family
//!   vgctl show-stats <sp-id> - Show per-SP group statistics
//!   vgctl audit              - Check statistics against stored groups

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use virtualgroup::{
    config::Config,
    group::{GroupStore, GvgStatisticsWithinSp},
    types::Address,
    Error, Result,
};

#[derive(Parser)]
#[command(name = "vgctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect storage provider virtual groups")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "~/.config/virtualgroup/config.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and initialize the store
    Init {
        /// Governance authority address (0x-prefixed hex)
        #[arg(long)]
        authority: Option<Address>,

        /// Account receiving forfeited stake (0x-prefixed hex)
        #[arg(long)]
        governance_address: Option<Address>,
    },

    /// Show module params
    Params,

    /// Show a global virtual group
    ShowGvg {
        /// Group id
        id: u32,
    },

    /// Show a global virtual group family
    ShowFamily {
        /// Family id
        id: u32,
    },

    /// Show group statistics of a storage provider
    ShowStats {
        /// Storage provider id
        sp_id: u32,
    },

    /// Check per-SP statistics and recorded deposits against stored groups
    Audit,
}

fn main() {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);

    // The store config may not exist yet (init); fall back to defaults
    let logging = Config::load(&config_path)
        .map(|config| config.logging)
        .unwrap_or_default();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        logging.level.parse().unwrap_or(Level::INFO)
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false);

    let log_file = logging.file.as_deref().map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(expand_tilde(path))
    });
    let installed = match log_file {
        Some(Ok(file)) => tracing::subscriber::set_global_default(
            builder.with_writer(Mutex::new(file)).with_ansi(false).finish(),
        ),
        Some(Err(e)) => {
            eprintln!("Failed to open log file, logging to stdout: {}", e);
            tracing::subscriber::set_global_default(builder.finish())
        }
        None => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = installed {
        eprintln!("Failed to set subscriber: {}", e);
    }

    if let Err(e) = run_command(cli.command, &config_path) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Init {
            authority,
            governance_address,
        } => cmd_init(config_path, authority, governance_address),
        Commands::Params => cmd_params(config_path),
        Commands::ShowGvg { id } => cmd_show_gvg(config_path, id),
        Commands::ShowFamily { id } => cmd_show_family(config_path, id),
        Commands::ShowStats { sp_id } => cmd_show_stats(config_path, sp_id),
        Commands::Audit => cmd_audit(config_path),
    }
}

fn open_store(config_path: &Path) -> Result<GroupStore> {
    let config = Config::load(config_path)?;
    GroupStore::open(config.store_path())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(
    config_path: &Path,
    authority: Option<Address>,
    governance_address: Option<Address>,
) -> Result<()> {
    if config_path.exists() {
        return Err(Error::Config(format!(
            "{} already exists, refusing to overwrite",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    if let Some(authority) = authority {
        config.authority = authority;
    }
    if let Some(governance_address) = governance_address {
        config.governance_address = governance_address;
    }
    config.save(config_path)?;
    info!("Wrote config to {:?}", config_path);
    if config.validate().is_err() {
        warn!("Set authority and governance_address in the config before using it");
    }

    config.ensure_directories()?;
    let store = GroupStore::open(config.store_path())?;
    if store.init_params(&config.params)? {
        info!("Initialized group store at {:?}", config.store_path());
    }
    store.flush()?;
    Ok(())
}

fn cmd_params(config_path: &Path) -> Result<()> {
    let store = open_store(config_path)?;
    print_json(&store.params()?)
}

fn cmd_show_gvg(config_path: &Path, id: u32) -> Result<()> {
    let store = open_store(config_path)?;
    print_json(&store.gvg_required(id)?)
}

fn cmd_show_family(config_path: &Path, id: u32) -> Result<()> {
    let store = open_store(config_path)?;
    print_json(&store.family_required(id)?)
}

fn cmd_show_stats(config_path: &Path, sp_id: u32) -> Result<()> {
    let store = open_store(config_path)?;
    let stat = store
        .get_statistics(sp_id)?
        .unwrap_or_else(|| GvgStatisticsWithinSp::new(sp_id));
    print_json(&stat)
}

fn cmd_audit(config_path: &Path) -> Result<()> {
    let store = open_store(config_path)?;
    let gvgs = store.gvgs()?;
    let families = store.families()?;
    let stats = store.all_statistics()?;

    let recorded: u128 = gvgs.iter().map(|g| g.total_deposit).sum();
    let secondary_slots: u64 = gvgs.iter().map(|g| g.secondary_sp_ids.len() as u64).sum();
    let breaking: u64 = gvgs.iter().filter(|g| g.breaks_redundancy()).count() as u64;

    let primary_sum: u64 = stats.iter().map(|s| s.primary_count as u64).sum();
    let secondary_sum: u64 = stats.iter().map(|s| s.secondary_count as u64).sum();
    let break_sum: u64 = stats
        .iter()
        .map(|s| s.break_redundancy_reqmt_gvg_count as u64)
        .sum();

    println!("Virtual Group Audit");
    println!("===================");
    println!();
    println!("Groups: {}", gvgs.len());
    println!("Families: {}", families.len());
    println!("Recorded deposits: {}", recorded);
    println!("Primary counters: {} (groups {})", primary_sum, gvgs.len());
    println!("Secondary counters: {} (slots {})", secondary_sum, secondary_slots);
    println!("Redundancy breaks: {} (groups {})", break_sum, breaking);

    let mut consistent = true;
    if primary_sum != gvgs.len() as u64 {
        warn!("Primary counters do not match group count");
        consistent = false;
    }
    if secondary_sum != secondary_slots {
        warn!("Secondary counters do not match secondary slots");
        consistent = false;
    }
    if break_sum != breaking {
        warn!("Redundancy break counters do not match groups");
        consistent = false;
    }
    for family in &families {
        for id in &family.global_virtual_group_ids {
            match gvgs.iter().find(|g| g.id == *id) {
                Some(gvg) if gvg.primary_sp_id != family.primary_sp_id => {
                    warn!(
                        "gvg {} has primary {} but family {} has primary {}",
                        gvg.id, gvg.primary_sp_id, family.id, family.primary_sp_id
                    );
                    consistent = false;
                }
                Some(_) => {}
                None => {
                    warn!("Family {} lists missing gvg {}", family.id, id);
                    consistent = false;
                }
            }
        }
    }

    if consistent {
        println!("Status: consistent");
        Ok(())
    } else {
        Err(Error::Internal("store is inconsistent".to_string()))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
