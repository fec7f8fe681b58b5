use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use vigil::application::Application;
use vigil::logging::{init_console_logging, init_logging};
use vigil::Config;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Operational telemetry: metrics, alerting and health probes behind one HTTP surface")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitoring loops and the HTTP API
    Serve,
    /// Run one collection tick and one probe round, print the result as JSON
    CheckHealth,
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::CheckHealth => {
            init_console_logging(&config.log_level)?;
            let app = Application::new(config)?;
            let snapshot = app.container.health_check().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let _guard = init_logging(&config.log_level, &config.log_dir)?;
    info!(
        "Starting vigil {} (logs in {})",
        env!("CARGO_PKG_VERSION"),
        config.log_dir.display()
    );

    let app = Application::new(config)?;
    app.initialize().await?;

    let served = app.serve().await;
    app.shutdown().await?;
    served
}
