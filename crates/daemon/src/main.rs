use clap::Parser;
use tracing_subscriber::EnvFilter;

use sentinel_daemon::app::App;
use sentinel_daemon::cli::{run_skill_command, Cli, Commands};
use sentinel_daemon::config::DaemonConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match DaemonConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e:#}");
            std::process::exit(sentinel_daemon::cli::EXIT_INVALID_INPUT);
        }
    };

    let marketplace_url = std::env::var("SENTINEL_MARKETPLACE_URL")
        .unwrap_or_else(|_| "http://localhost:8787".to_string());
    let llm_endpoint = std::env::var("SENTINEL_LLM_ENDPOINT").ok();

    let app = App::new(config, &marketplace_url, llm_endpoint.as_deref());
    if let Err(e) = app.initialize().await {
        eprintln!("failed to initialize daemon: {e:#}");
        std::process::exit(sentinel_daemon::cli::EXIT_FAILURE);
    }

    let exit_code = match cli.command {
        Commands::Skill { command } => run_skill_command(&app, command).await,
    };

    if let Err(e) = app.shutdown().await {
        eprintln!("failed to shut down cleanly: {e:#}");
    }

    std::process::exit(exit_code);
}
