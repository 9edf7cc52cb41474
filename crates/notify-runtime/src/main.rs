//! # Notify Runtime
//!
//! Runs the notification subsystem until interrupted.
//!
//! ```text
//! notify-runtime --config notify.toml
//! notify-runtime --send-to 0812-3456-7890 --text "Your order is ready"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use notify_dispatch::{MessageOutcome, NotificationKind, SendRequest};
use notify_runtime::{NotifyConfig, NotifyRuntime};
use notify_telemetry::{init_telemetry, log_event, log_message_event, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "notify-runtime")]
#[command(about = "Outbound notification dispatcher for the lab records application")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send one message to this number once connected, then keep running
    #[arg(long, requires = "text")]
    send_to: Option<String>,

    /// Text of the one-shot message
    #[arg(long)]
    text: Option<String>,

    /// Seconds to wait for the session before giving up on the one-shot send
    #[arg(long, default_value = "60")]
    connect_timeout: u64,

    /// Log filter, overriding NOTIFY_LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    init_telemetry(&telemetry).context("Failed to initialize logging")?;

    let config = NotifyConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let mut runtime = NotifyRuntime::new(config).context("Failed to wire runtime")?;
    runtime.start().await;

    if let (Some(to), Some(text)) = (args.send_to, args.text) {
        if runtime
            .wait_until_connected(Duration::from_secs(args.connect_timeout))
            .await
        {
            let request = SendRequest::new(to, text).with_kind(NotificationKind::Custom);
            let result = runtime.dispatcher().send_message(request).await;
            match &result {
                Ok(receipt) => log_message_event!(
                    info,
                    "One-shot message sent",
                    receipt.recipient,
                    message_id = %receipt.message_id
                ),
                Err(e) => log_event!(warn, "One-shot message failed", code = %e.code()),
            }
            let outcome = MessageOutcome::from(result);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            warn!(
                timeout_secs = args.connect_timeout,
                "Gateway not connected in time, message not sent"
            );
        }
    }

    info!("Notification runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
