//! SwiftPredict - Main Entry Point

use clap::Parser;
use swiftpredict::cli::{cmd_predict, cmd_profile, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swiftpredict=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, target, project, config, export, key, runs_dir } => {
            cmd_train(
                &data,
                &target,
                &project,
                config.as_deref(),
                export.as_deref(),
                key.as_deref(),
                runs_dir.as_deref(),
            )?;
        }
        Commands::Profile { data } => {
            cmd_profile(&data)?;
        }
        Commands::Predict { model, row } => {
            cmd_predict(&model, &row)?;
        }
    }

    Ok(())
}
