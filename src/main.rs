use anyhow::Context;
use clap::Parser;
use tracing::info;

use morphlink::cli::{Cli, Commands, ConfigCommands, DEFAULT_SAMPLE_PATH};
use morphlink::config::{StaticConfig, init_config};
use morphlink::runtime;
use morphlink::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config {
            action: ConfigCommands::Generate { output_path },
        }) => {
            let path = output_path.unwrap_or_else(|| DEFAULT_SAMPLE_PATH.to_string());
            StaticConfig::sample()
                .save_to_file(&path)
                .with_context(|| format!("Failed to write {}", path))?;
            println!("Sample configuration written to {}", path);
            Ok(())
        }
        Some(Commands::Serve) | None => {
            let config = init_config(StaticConfig::load(&cli.config)?);
            let _guard = init_logging(&config.logging)?;
            info!("Morphlink v{} starting", env!("CARGO_PKG_VERSION"));
            runtime::run_server().await
        }
    }
}
