use std::path::PathBuf;

use clap::{Parser, Subcommand};

use event_demux::config::load_config;
use event_demux::routing::RoutingTable;

#[derive(Parser)]
#[command(name = "demux-cli")]
#[command(about = "Offline checks for event-demux routing rules", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "demux.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the config and build the routing table
    Check,
    /// Print the destinations for one event
    Resolve {
        org: String,
        repo: String,
        event: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.config)?;
    let table = RoutingTable::build(&loaded.config.demux)?;

    match cli.command {
        Commands::Check => {
            println!("version:      {}", loaded.version);
            println!("rules:        {}", loaded.config.demux.rules.len());
            println!("routing keys: {}", table.key_count());
            println!("exclusions:   {}", table.exclusion().len());
        }
        Commands::Resolve { org, repo, event } => {
            for destination in table.destinations(&org, &repo, &event) {
                println!("{}", destination);
            }
        }
    }

    Ok(())
}
