use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use badgesheet::commands;
use badgesheet::config::{Config, DEFAULT_CONFIG_FILE};
use badgesheet::pipeline::Target;

#[derive(Parser, Debug)]
#[command(name = "badgesheet", version)]
#[command(about = "Turn sponsor and contributor lists into packed SVG badge sheets.", long_about = None)]
struct Cli {
    #[arg(short = 'C', long, default_value = ".")]
    cwd: PathBuf,

    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold badgesheet.toml and project folders
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Validate config and report how the current data falls into tiers
    Check,

    /// Render the sponsor and contributor SVG sheets
    Generate {
        #[arg(long, value_enum, default_value_t = Target::All)]
        only: Target,
    },

    /// Refresh the data files from OpenCollective and GitHub
    UpdateData {
        #[arg(long, value_enum, default_value_t = Target::All)]
        only: Target,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("{cli:?}");

    let load = || {
        Config::load(&cli.cwd, &cli.config).with_context(|| format!("failed to load {}", cli.config.display()))
    };

    match cli.command {
        Commands::Init { force } => {
            let path = commands::init(&cli.cwd, &cli.config, force)?;
            println!("wrote {}", path.display());
        }
        Commands::Check => {
            let config = load()?;
            let report = commands::check(&config)?;
            for tier in &report.tiers {
                println!("{:<12} {:>4} sponsors  ({}px) {}", tier.id, tier.sponsors, tier.size, tier.name);
            }
            if report.unplaced > 0 {
                println!("{} sponsors fall below the lowest tier", report.unplaced);
            }
            match report.contributors {
                Some(n) => println!("{n} contributors"),
                None => println!("no contributor data"),
            }
            println!("{} logo overrides", report.overrides);
            println!("config ok");
        }
        Commands::Generate { only } => {
            let config = load()?;
            let summary = commands::generate(&config, only).await?;
            for (label, sheet) in [("sponsors", &summary.sponsors), ("contributors", &summary.contributors)] {
                if let Some(sheet) = sheet {
                    println!(
                        "{label}: {} badges, {} dropped, {}px tall -> {}",
                        sheet.rendered,
                        sheet.dropped,
                        sheet.height,
                        sheet.path.display()
                    );
                }
            }
        }
        Commands::UpdateData { only } => {
            let config = load()?;
            let summary = commands::update_data(&config, only).await?;
            if let Some(n) = summary.sponsors {
                println!("sponsors: {n}");
            }
            if let Some(n) = summary.contributors {
                println!("contributors: {n}");
            }
        }
    }
    Ok(())
}
