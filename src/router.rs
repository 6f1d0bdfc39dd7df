use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use log::{error, info, warn};

use crate::config::Config;
use crate::dispatch::{self, DispatchOutcome, MessageGateway, TwilioClient};
use crate::error::{SnapshotError, TransformError, UploadError};
use crate::message::{self, NotificationPayload};
use crate::snapshot;
use crate::upload::{self, SnapshotHost};

/// Event-to-notification router.
///
/// Holds the configuration, gateway client and hosting provider for the
/// lifetime of the process and is passed by reference wherever events are
/// produced; there is no global state. One `route` call processes one event
/// to completion, synchronously.
pub struct Notifier {
    config: Config,
    gateway: Box<dyn MessageGateway>,
    host: SnapshotHost,
}

impl Notifier {
    /// Build the production wiring: Twilio gateway plus the hosting
    /// provider selected by configuration.
    pub fn new(config: Config) -> Self {
        let gateway = Box::new(TwilioClient::new(
            config.account_sid.clone(),
            config.auth_token.clone(),
        ));
        let host = SnapshotHost::from_config(&config);
        Self {
            config,
            gateway,
            host,
        }
    }

    /// Wire an explicit gateway and host, e.g. fakes in tests.
    pub fn with_gateway(
        config: Config,
        gateway: Box<dyn MessageGateway>,
        host: SnapshotHost,
    ) -> Self {
        Self {
            config,
            gateway,
            host,
        }
    }

    /// Process one event: match it against the configured rules, capture
    /// and host a snapshot when the rule asks for one, render the message
    /// and send it to every recipient.
    ///
    /// Returns `None` when nothing was dispatched (feature disabled, no
    /// matching rule, or the message template failed to render) and the
    /// per-recipient outcome otherwise. Snapshot and hosting failures
    /// degrade to a text-only notification; this method never panics and
    /// never propagates an error to the caller.
    pub fn route(
        &self,
        event_name: &str,
        payload: &NotificationPayload,
    ) -> Option<DispatchOutcome> {
        if !self.config.enabled {
            info!("Notifications are disabled, ignoring event '{}'", event_name);
            return None;
        }

        let Some(rule) = self.config.rule_for(event_name) else {
            info!("No notification rule for event '{}'", event_name);
            return None;
        };

        let snapshot_path = if rule.with_snapshot {
            self.acquire_snapshot()
        } else {
            None
        };

        let media_url = snapshot_path.as_deref().and_then(|path| {
            let suggested = payload
                .get("name")
                .filter(|name| !name.is_empty())
                .map(|name| upload::suggested_filename(name, Utc::now()))
                .unwrap_or_default();
            match self.host.upload(path, &suggested) {
                Ok(url) => Some(url),
                Err(UploadError::NotConfigured) => {
                    info!("No image hosting provider configured, sending text-only");
                    None
                }
                Err(e) => {
                    warn!("Snapshot upload failed, sending text-only: {}", e);
                    None
                }
            }
        });

        // the snapshot is never retained across events
        if let Some(path) = &snapshot_path {
            let _ = fs::remove_file(path);
        }

        let mut payload = payload.clone();
        payload
            .entry("printer_name".to_string())
            .or_insert_with(|| self.config.printer_name.clone());

        let body = match message::render(&rule.message, &payload) {
            Ok(body) => body,
            Err(e) => {
                error!(
                    "Skipping notification for event '{}', template did not render: {}",
                    event_name, e
                );
                return None;
            }
        };

        Some(dispatch::dispatch(
            self.gateway.as_ref(),
            &self.config.recipient_numbers,
            &self.config.from_number,
            &self.config.default_country_code,
            &body,
            media_url.as_deref(),
        ))
    }

    /// Capture and post-process a snapshot; `None` on any failure so the
    /// notification continues without an image.
    fn acquire_snapshot(&self) -> Option<PathBuf> {
        let path = match snapshot::fetch_snapshot(&self.config.snapshot_url) {
            Ok(path) => path,
            Err(SnapshotError::Disabled) => {
                info!("Webcam snapshot URL not configured, sending text-only");
                return None;
            }
            Err(e) => {
                warn!("Could not capture snapshot, sending only a note: {}", e);
                return None;
            }
        };
        info!("Captured snapshot to {}", path.display());

        match snapshot::transform(
            &self.config.ffmpeg_path,
            &path,
            self.config.flip_h,
            self.config.flip_v,
            self.config.rotate_90,
        ) {
            Ok(()) => {}
            Err(e @ TransformError::ToolMissing { .. }) => {
                info!("Skipping snapshot transform: {}", e);
            }
            Err(e) => {
                warn!(
                    "Failed to rotate/flip snapshot, uploading it as captured: {}",
                    e
                );
            }
        }

        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_event_rules;
    use crate::error::GatewayError;
    use crate::upload::S3UrlMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    type CallLog = Rc<RefCell<Vec<(String, String, Option<String>)>>>;

    struct FakeGateway {
        calls: CallLog,
    }

    impl FakeGateway {
        fn new() -> (Self, CallLog) {
            let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    calls: Rc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl MessageGateway for FakeGateway {
        fn send_message(
            &self,
            to: &str,
            _from: &str,
            body: &str,
            media_url: Option<&str>,
        ) -> Result<(), GatewayError> {
            self.calls.borrow_mut().push((
                to.to_string(),
                body.to_string(),
                media_url.map(String::from),
            ));
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            enabled: true,
            recipient_numbers: "+15551234567,+15559876543".to_string(),
            from_number: "+15550001111".to_string(),
            default_country_code: "1".to_string(),
            account_sid: "AC_test".to_string(),
            auth_token: "token".to_string(),
            printer_name: "Shop Printer".to_string(),
            event_rules: parse_event_rules(
                r#"[{"event": "PrintDone",
                     "message": "{printer_name} job complete: {name} done printing after {time}",
                     "with_snapshot": true},
                    {"event": "PrintPaused",
                     "message": "{printer_name} paused {bogus_field}"}]"#,
            )
            .expect("rules"),
            snapshot_url: String::new(),
            flip_h: false,
            flip_v: false,
            rotate_90: false,
            ffmpeg_path: String::new(),
            upload_provider: "none".to_string(),
            cloudinary_cloud_name: String::new(),
            cloudinary_upload_preset: String::new(),
            imghost_upload_url: String::new(),
            s3_bucket: String::new(),
            s3_region: "us-east-1".to_string(),
            s3_key_prefix: String::new(),
            s3_base_url: String::new(),
            s3_url_mode: S3UrlMode::Public,
            s3_presign_expiry_secs: 3600,
            aws_access_key_id: String::new(),
            aws_secret_access_key: String::new(),
            moonraker_api_url: "http://localhost:7125".to_string(),
        }
    }

    fn payload() -> NotificationPayload {
        [
            ("name".to_string(), "part.gco".to_string()),
            ("time".to_string(), "1:02:03".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn notifier(config: Config) -> (Notifier, CallLog) {
        let (gateway, calls) = FakeGateway::new();
        (
            Notifier::with_gateway(config, Box::new(gateway), SnapshotHost::None),
            calls,
        )
    }

    #[test]
    fn unmatched_event_sends_nothing() {
        let (notifier, calls) = notifier(test_config());
        assert!(notifier.route("FilamentChange", &payload()).is_none());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn disabled_config_sends_nothing() {
        let mut config = test_config();
        config.enabled = false;
        let (notifier, calls) = notifier(config);
        assert!(notifier.route("PrintDone", &payload()).is_none());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn matched_event_reaches_every_recipient() {
        let (notifier, calls) = notifier(test_config());
        let outcome = notifier.route("PrintDone", &payload()).expect("outcome");
        assert_eq!(outcome.attempted(), 2);
        assert!(outcome.all_delivered());
        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "+15551234567");
        assert_eq!(calls[1].0, "+15559876543");
    }

    #[test]
    fn snapshot_failure_still_sends_text_only() {
        // rule wants a picture, but no webcam URL and no hosting provider
        // are configured: the text notification must still go out with no
        // media attached.
        let (notifier, calls) = notifier(test_config());
        let outcome = notifier.route("PrintDone", &payload()).expect("outcome");
        assert_eq!(outcome.attempted(), 2);
        assert!(outcome.all_delivered());
        assert!(calls.borrow().iter().all(|(_, _, media)| media.is_none()));
    }

    #[test]
    fn template_error_skips_the_event() {
        // PrintPaused's template references {bogus_field}
        let (notifier, calls) = notifier(test_config());
        assert!(notifier.route("PrintPaused", &payload()).is_none());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn printer_name_is_injected_from_config() {
        let (notifier, calls) = notifier(test_config());
        notifier.route("PrintDone", &payload()).expect("outcome");
        assert_eq!(
            calls.borrow()[0].1,
            "Shop Printer job complete: part.gco done printing after 1:02:03"
        );
    }

    #[test]
    fn payload_printer_name_wins_over_config() {
        let (notifier, calls) = notifier(test_config());
        let mut payload = payload();
        payload.insert("printer_name".to_string(), "Garage Printer".to_string());
        notifier.route("PrintDone", &payload).expect("outcome");
        assert!(calls.borrow()[0].1.starts_with("Garage Printer "));
    }
}
