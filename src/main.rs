use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// deckplug: Stream Deck buttons for Google Meet, OBS and Elgato Key Lights
#[derive(Parser)]
#[command(name = "deckplug", version, about)]
struct Cli {
    /// Path to the config file (TOML).
    #[arg(short, long, default_value = "deckplug.toml")]
    config: PathBuf,

    /// Enable JSON log output (for journald).
    #[arg(long)]
    json: bool,

    /// Validate config and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config first: it carries the default log level.
    let config = deckplug::config::load(&cli.config)?;

    if cli.check {
        println!(
            "config OK: {} plugins, {} command buttons",
            [
                config.googlemeet.is_some(),
                config.obs.is_some(),
                config.keylight.is_some(),
            ]
            .iter()
            .filter(|enabled| **enabled)
            .count(),
            config.buttons.len(),
        );
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deckplug={}", config.deckplug.log_level)));

    if cli.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    info!("deckplug v{}", env!("CARGO_PKG_VERSION"));
    info!("loaded config from {}", cli.config.display());

    deckplug::daemon::run(config).await?;

    Ok(())
}
