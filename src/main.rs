use anyhow::Result;
use clap::Parser;
use unit_pipeline::cli::{execute_chain, execute_single, init_tracing, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let reports = match cli.command {
        Commands::Single(args) => vec![execute_single(args).await?],
        Commands::Chain(args) => execute_chain(args).await?,
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
