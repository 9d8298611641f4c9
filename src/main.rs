//! Gocpg CLI - build a code property graph for a Go project

use clap::Parser;
use gocpg::config::{load_config, CpgConfig};
use gocpg::frontend;
use gocpg::project::Project;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gocpg")]
#[command(version)]
#[command(about = "Code property graph construction for Go projects")]
#[command(long_about = r#"
Gocpg builds an in-memory code property graph from a Go project:
declarations, types, statements, expressions, scopes, data flow and
inter-procedural call targets.

Example usage:
  gocpg ./my-project
  gocpg ./my-project --json
"#)]
struct Cli {
    /// Project root to analyze
    path: PathBuf,

    /// Path to a gocpg.toml configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config(cli.config.as_deref())?.unwrap_or_else(CpgConfig::default);

    let project = Project::discover(&cli.path, &config)?;
    if project.files.is_empty() {
        anyhow::bail!("no Go files found under {}", cli.path.display());
    }

    let translation = frontend::construct(&project, &config)?;
    let stats = translation.graph.stats();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Analyzed".green().bold(),
        cli.path.display().to_string().bold()
    );
    if let Some(module) = &project.module_path {
        println!("Module: {}", module);
    }
    println!();
    println!("{}", stats);

    Ok(())
}
