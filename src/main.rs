use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use minori::build::build_site;
use minori::config::Config;
use minori::math::MathMlTypesetter;
use minori::note::create_note;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "minori")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file. Defaults to the nearest `config.yml`
    /// in the current directory or one of its parents.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site
    Build,

    /// Create a new note in the source directory
    Note {
        /// Note name, relative to the source directory, without `.md`
        name: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_project_file(path)
            .with_context(|| format!("Loading configuration `{}`", path.display())),
        None => Config::from_directory(&std::env::current_dir()?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Build => {
            let report = build_site(&config, &MathMlTypesetter)
                .await
                .context("Building site")?;
            if !report.is_success() {
                tracing::error!("Build finished with {} failure(s)", report.failures.len());
                std::process::exit(1);
            }
        }
        Commands::Note { name } => {
            let path = create_note(&config, &name)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
