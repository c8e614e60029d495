use agent_swap::cli::{commands, Cli, Commands, Runtime};
use agent_swap::core::Config;
use anyhow::Context;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // Parse CLI arguments
    let cli = Cli::parse();
    let runtime = Runtime::connect(config, cli.simulate).context("failed to set up chain access")?;

    // Execute command
    match cli.command {
        Commands::Pool(args) => commands::pool::execute(args, &runtime).await?,
        Commands::Quote(args) => commands::quote::execute(args, &runtime).await?,
        Commands::Swap(args) => commands::swap::execute(args, &runtime).await?,
        Commands::AddLiquidity(args) => commands::add_liquidity::execute(args, &runtime).await?,
    }

    Ok(())
}
