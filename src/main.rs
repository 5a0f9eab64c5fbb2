//! Fraud pipeline - Main Entry Point

use clap::Parser;
use fraud_pipeline::cli::{cmd_info, cmd_inspect, cmd_predict, cmd_train, cmd_validate, Cli, Commands};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraud_pipeline=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Validate { data, config } => cmd_validate(&data, config.as_deref()),
        Commands::Train {
            data,
            output,
            config,
            seed,
            n_estimators,
            test_fraction,
            report,
        } => cmd_train(
            &data,
            &output,
            config.as_deref(),
            seed,
            n_estimators,
            test_fraction,
            report.as_deref(),
        )
        .map(|_| true),
        Commands::Inspect { bundle } => cmd_inspect(&bundle).map(|_| true),
        Commands::Predict { bundle, input } => cmd_predict(&bundle, &input).map(|_| true),
        Commands::Info { data } => cmd_info(&data).map(|_| true),
    };

    match outcome {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            eprintln!("error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
