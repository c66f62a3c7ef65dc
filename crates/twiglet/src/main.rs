/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! twiglet CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "twiglet")]
#[command(version)]
#[command(about = "Compile and render twiglet templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template with JSON data
    Render(commands::render::RenderArgs),

    /// Compile a template and report problems without rendering it
    Check(commands::check::CheckArgs),
}

fn main() -> Result<()> {
    // Logs go to stderr so rendered output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "twiglet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::execute(args),
        Commands::Check(args) => commands::check::execute(args),
    }
}
