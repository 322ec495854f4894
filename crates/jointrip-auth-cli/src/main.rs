mod cli;
mod commands;
mod observability;

use anyhow::{Context, Result};
use clap::Parser;
use jointrip_auth::TokenCodec;
use jointrip_auth::config::loader::load_config;

use cli::{Cli, Commands, TokenCommands};

#[tokio::main]
async fn main() {
    // Optional .env for local development.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(issuer = %config.issuer, "Configuration loaded");

    let output = match cli.command {
        Commands::CheckConfig => commands::check_config(&config)?,
        Commands::AuthUrl(args) => commands::auth_url(&config, &args.state)?,
        Commands::Token(args) => {
            let codec = TokenCodec::new(config.issuer.clone(), &config.tokens)?;
            match args.command {
                TokenCommands::Issue { account_id } => commands::issue(&codec, account_id)?,
                TokenCommands::Inspect { token } => commands::inspect(&codec, &token)?,
                TokenCommands::Verify { token, kind } => {
                    commands::verify(&codec, &token, kind.into())?
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
