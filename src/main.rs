//! profile-aggregator - Consolidated GitHub and Bitbucket profiles
//!
//! Main entry point for the profile-aggregator CLI.

use clap::{Parser, Subcommand};
use profile_aggregator::config::{validate_config_result, ServiceConfig};
use profile_aggregator::server::ProfileServer;
use profile_aggregator::service::ProfileService;
use std::path::PathBuf;
use std::process;

/// profile-aggregator - Merge GitHub and Bitbucket account statistics
#[derive(Parser, Debug)]
#[command(name = "profile-aggregator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/profile-aggregator/config.yaml)
    #[arg(short, long, global = true, env = "PROFILE_AGGREGATOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fetch one consolidated profile and print it as JSON
    Fetch {
        /// GitHub username
        #[arg(long)]
        github: String,

        /// Bitbucket username or team
        #[arg(long)]
        bitbucket: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective configuration as YAML
    Config {
        /// Write the default configuration to the config path instead
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    if let Err(e) = profile_aggregator::logging::init(default_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> profile_aggregator::Result<()> {
    if let Commands::Config { init: true } = cli.command {
        let path = cli.config.unwrap_or_else(ServiceConfig::default_path);
        ServiceConfig::init(&path)?;
        println!("Created configuration at {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::load_default()?,
    };
    validate_config_result(&config)?;

    match cli.command {
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| config.server.bind.clone());
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(ProfileServer::new(config).run(&addr))
        }
        Commands::Fetch {
            github,
            bitbucket,
            pretty,
        } => {
            let service = ProfileService::new(config);
            let runtime = tokio::runtime::Runtime::new()?;
            let profile = runtime.block_on(service.consolidated_profile(&github, &bitbucket))?;

            let output = if pretty {
                serde_json::to_string_pretty(&profile)?
            } else {
                serde_json::to_string(&profile)?
            };
            println!("{}", output);
            Ok(())
        }
        Commands::Config { .. } => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}
