//! The `lumen models` command for managing tagger models.

use clap::{Args, Subcommand};
use lumen_core::engine::download::{ensure_model_files, ModelFiles, REQUIRED_FILES};
use lumen_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the configured tagger (model.onnx + selected_tags.csv)
    Download,

    /// List installed files for the configured tagger
    List,

    /// Show model directory path
    Path,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, mut config: Config) -> anyhow::Result<()> {
    let files = ModelFiles::new(config.repo_dir());

    match args.command {
        ModelsCommand::Download => {
            if files.is_complete() {
                tracing::info!("{} already installed at {:?}", config.model.repo, files.dir());
                return Ok(());
            }

            // An explicit download ignores skip_auto_download.
            config.model.skip_auto_download = false;
            tracing::info!("Downloading {}...", config.model.repo);
            ensure_model_files(&config.model, &files, &reqwest::Client::new()).await?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            println!("Model: {}", config.model.repo);
            println!("  Directory: {}\n", files.dir().display());

            let missing = files.missing();
            for name in REQUIRED_FILES {
                let status = if missing.contains(&name) {
                    "not installed"
                } else {
                    "ready"
                };
                println!("    - {:30} {}", name, status);
            }

            if !missing.is_empty() {
                println!("\nRun `lumen models download` to fetch missing files.");
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

