use clap::Parser;
use poly_harvest::cli::{Cli, Commands};
use poly_harvest::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    }
    .with_env();

    // Initialize telemetry
    poly_harvest::telemetry::init_telemetry(&config.telemetry)?;

    match &cli.command {
        Commands::Collect(args) => args.execute(&config).await?,
        Commands::Monitor(args) => {
            tracing::info!("Starting fluctuation monitor");
            args.execute(&config).await?;
        }
        Commands::Checkpoint(args) => args.execute(&config).await?,
        Commands::Relations(args) => args.execute(&config).await?,
        Commands::Config => {
            println!("Current configuration ({}):", cli.config);
            print!("{}", toml::to_string_pretty(&config)?);
            if config.api.api_key.is_some() {
                println!("# api_key is set");
            }
        }
    }

    Ok(())
}
