use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nodelink_cli::{
    cli::{Cli, Commands},
    commands,
    console::Output,
};
use nodelink_config::ClientSettings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable
    let env_filter = match cli.log_filter() {
        Some(level) => EnvFilter::new(format!(
            "nodelink_cli={level},nodelink_client={level},nodelink_config={level}"
        )),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = ClientSettings::load(cli.config.as_deref())?;
    if cli.headless {
        settings.headless = true;
    }

    match cli.command {
        Commands::Connect { watch, stop } => {
            let output = Output::new(settings.headless);
            commands::connect::execute(settings, &output, watch, stop).await?
        }
        Commands::Call { method, params } => {
            let output = Output::new(settings.headless);
            commands::call::execute(settings, &output, method, params).await?
        }
        Commands::Provision => commands::provision::execute(settings).await?,
        Commands::Conf(cmd) => commands::conf::execute(settings, cmd)?,
        Commands::Settings => commands::settings::execute(&settings)?,
    }

    Ok(())
}
