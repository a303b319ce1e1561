mod config_commands;
mod relay;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "maxrelay", about = "maxrelay: forward MAX chat messages to Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/maxrelay/).
    #[arg(long, global = true, env = "MAXRELAY_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
    /// Directory for the persisted state files and the browser profile.
    #[arg(long, global = true, env = "MAXRELAY_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot and the forwarding engine (default).
    Run,
    /// Configuration checks.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    // Directory overrides must land before the config is discovered.
    if let Some(ref dir) = cli.config_dir {
        maxrelay_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        maxrelay_config::set_data_dir(dir.clone());
    }
    let config = maxrelay_config::discover_and_load();

    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "maxrelay starting");
            let data_dir = maxrelay_config::data_dir();
            relay::run(config, &data_dir).await
        },
        Some(Commands::Config { action }) => config_commands::handle_config(action, &config),
    }
}
