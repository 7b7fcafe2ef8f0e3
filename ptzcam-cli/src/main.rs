//! ptzcam: entry point.
//!
//! ```text
//! ptzcam                         Run the console on stdin/stdout
//! ptzcam --config <path>         Load a custom config TOML
//! ptzcam --data-dir <dir>        Override the endpoint/preset/profile directory
//! ptzcam --gen-config            Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ptzcam_core::{
    CameraEndpoint, Dispatcher, EndpointStore, JsonFileStore, Preset, PresetProfile, PresetStore,
    ProfileStore, VideoSignal,
};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ptzcam_cli::config::PtzcamConfig;
use ptzcam_cli::console;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ptzcam", about = "Operator console for PTZ cameras")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ptzcam.toml")]
    config: PathBuf,

    /// Directory for endpoints.json, presets.json and profiles.json.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Endpoint id or name to activate, overriding the config.
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&PtzcamConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = PtzcamConfig::load(&cli.config);

    // Logs go to stderr so they never interleave with console replies.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("ptzcam v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = cli.data_dir.unwrap_or_else(|| config.storage.data_dir.clone());
    info!("data dir: {}", data_dir.display());
    let endpoints: Arc<dyn EndpointStore> =
        Arc::new(JsonFileStore::<CameraEndpoint>::endpoints(&data_dir).await?);
    let presets: Arc<dyn PresetStore> =
        Arc::new(JsonFileStore::<Preset>::presets(&data_dir).await?);
    let profiles: Arc<dyn ProfileStore> =
        Arc::new(JsonFileStore::<PresetProfile>::profiles(&data_dir).await?);

    let dispatcher = Dispatcher::new(
        config.to_dispatcher_config(),
        endpoints,
        presets,
        VideoSignal::new(config.camera.video_connected),
    )
    .with_controller_options(config.to_controller_options())
    .with_profile_store(profiles);

    if let Some(profile) = dispatcher.ensure_default_profile().await? {
        info!("created profile '{}'", profile.name);
    }

    let startup = cli.endpoint.unwrap_or_else(|| config.camera.endpoint.clone());
    if !startup.is_empty() {
        match console::activate(&dispatcher, &startup).await {
            Ok(endpoint) => info!("active endpoint: {} ({})", endpoint.name, endpoint.protocol),
            Err(e) => warn!("cannot activate '{startup}': {e}"),
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console::run(&dispatcher, stdin, tokio::io::stdout()) => result?,
        _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
    }

    dispatcher.shutdown().await;
    Ok(())
}
