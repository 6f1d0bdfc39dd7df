use anyhow::Result;
use log::{debug, info, warn};
use std::path::Path;
use std::{thread, time::Duration};

use print_pager::config::{Config, constants};
use print_pager::message::NotificationPayload;
use print_pager::printer::{self, PrinterService, PrintStatus};
use print_pager::router::Notifier;

/// print-pager - SMS notifications for 3D print jobs.
///
/// This binary polls a Moonraker printer API for print-state transitions,
/// translates them into events (PrintStarted, PrintDone, PrintFailed, ...)
/// and routes each event through the notification pipeline: optional webcam
/// snapshot, optional image hosting, message rendering, and one Twilio SMS
/// per configured recipient.
///
/// # Environment Variables
///
/// Required:
/// * `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN` - gateway credentials
/// * `SMS_FROM_NUMBER` - sender number registered with the gateway
/// * `SMS_RECIPIENT_NUMBERS` - comma-separated recipient numbers
/// * `MOONRAKER_API_URL` - Moonraker API endpoint to poll
///
/// Optional (with defaults):
/// * `SMS_ENABLED` - master switch (default: "true")
/// * `PRINTER_NAME` - display name used in messages (default: "3D printer")
/// * `EVENT_RULES` - JSON list of event rules (default: PrintDone/PrintFailed)
/// * `SNAPSHOT_URL` - webcam still endpoint; empty disables snapshots
/// * `WEBCAM_FLIP_H` / `WEBCAM_FLIP_V` / `WEBCAM_ROTATE_90` - transforms
/// * `FFMPEG_PATH` - ffmpeg binary used for the transforms
/// * `UPLOAD_PROVIDER` - "none", "cloudinary", "http_post" or "aws_s3",
///   plus the provider-specific variables documented in [`Config`]
///
/// # Usage
///
/// ```bash
/// export TWILIO_ACCOUNT_SID="AC..."
/// export TWILIO_AUTH_TOKEN="..."
/// export SMS_FROM_NUMBER="+15550001111"
/// export SMS_RECIPIENT_NUMBERS="+15551234567,+15559876543"
/// export MOONRAKER_API_URL="http://printer.local:7125"
/// export SNAPSHOT_URL="http://printer.local/webcam/?action=snapshot"
/// ./print-pager
/// ```
fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().expect(
        "Failed to load configuration. Please ensure all required environment variables are set.",
    );

    info!("print-pager starting...");
    info!("Using Moonraker API URL: {}", config.moonraker_api_url);
    info!(
        "{} event rule(s) configured, notifying: {}",
        config.event_rules.len(),
        config.recipient_numbers
    );

    let printer_service = PrinterService::new(config.moonraker_api_url.clone());
    let notifier = Notifier::new(config);

    let mut last_state = String::new();
    info!("print-pager initialized successfully. Starting poll loop...");

    loop {
        match printer_service.get_print_status() {
            Ok(status) => {
                if let Some(event) = printer::state_event(&last_state, &status.state) {
                    info!(
                        "Printer state changed '{}' -> '{}', raising {}",
                        last_state, status.state, event
                    );
                    let payload = event_payload(&status);
                    if let Some(outcome) = notifier.route(event, &payload) {
                        info!(
                            "Notified {} recipient(s), {} delivered",
                            outcome.attempted(),
                            outcome.delivered()
                        );
                    }
                } else {
                    debug!("Printer state '{}', nothing to raise", status.state);
                }
                last_state = status.state;
            }
            Err(e) => {
                warn!("Failed to get print status: {}", e);
            }
        }

        thread::sleep(Duration::from_secs(constants::POLL_INTERVAL_SECONDS));
    }
}

/// Build the template payload for a status snapshot. Duration fields are
/// pre-formatted here; templates perform no formatting of their own.
fn event_payload(status: &PrintStatus) -> NotificationPayload {
    let file = status.filename.clone().unwrap_or_default();
    let name = Path::new(&file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    let mut payload = NotificationPayload::new();
    payload.insert("name".to_string(), name);
    payload.insert("path".to_string(), file);
    payload.insert(
        "time".to_string(),
        printer::format_duration(status.print_duration),
    );
    payload
}
