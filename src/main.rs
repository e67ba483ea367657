//! `hub-publish`: publish a single message to the service hub.
//!
//! Loads settings from `hub.toml` and `HUB_*` environment variables, then
//! publishes one message with the configured retry policy. Ctrl-C cancels a
//! pending retry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hub_client::{Metadata, Publisher};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod settings;

use settings::{Settings, CONFIG_FILE};

/// Publish a message to the service hub.
#[derive(Debug, Parser)]
#[command(name = "hub-publish", version, about)]
struct Cli {
    /// Settings file.
    #[arg(long, value_name = "PATH", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Environment tag, overriding every other source.
    #[arg(long)]
    env: Option<String>,

    /// Extra envelope fields as a JSON object.
    #[arg(long, value_name = "JSON")]
    metadata: Option<String>,

    /// Message type.
    message_type: String,

    /// Message content as JSON.
    #[arg(default_value = "{}")]
    content: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    init_tracing(&settings.log);

    let content: Value =
        serde_json::from_str(&cli.content).context("content must be valid JSON")?;
    let metadata = build_metadata(&cli.message_type, cli.metadata.as_deref())?;

    let publisher = Publisher::new(settings.to_hub_config())?;

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("received CTRL+C, cancelling publish");
                cancellation.cancel();
            }
        }
    });

    publisher
        .publish_with_cancellation(metadata, &content, cli.env.as_deref(), &cancellation)
        .await
        .with_context(|| format!("failed to publish {}", cli.message_type))?;

    info!(message_type = %cli.message_type, "message published");
    Ok(())
}

/// Bare type name, or the `--metadata` object with `type` set.
fn build_metadata(message_type: &str, extra: Option<&str>) -> Result<Metadata> {
    let Some(extra) = extra else {
        return Ok(Metadata::from(message_type));
    };

    let mut fields: Map<String, Value> =
        serde_json::from_str(extra).context("--metadata must be a JSON object")?;
    fields.insert("type".to_string(), Value::String(message_type.to_string()));

    Ok(Metadata::from(fields))
}

/// Initializes tracing with an `EnvFilter` from `RUST_LOG`, falling back to
/// the configured directive.
fn init_tracing(default_directive: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
