use clap::Parser;

use tripwire::cli::{self, Cli, Commands};
use tripwire::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    match &cli.command {
        Commands::Run(args) => cli::run::execute(config, args).await?,
        Commands::Status(args) => cli::status::execute(config, args).await?,
        Commands::Check => cli::check::execute(&config)?,
    }
    Ok(())
}
