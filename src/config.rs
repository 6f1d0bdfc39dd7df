use serde::Deserialize;

use crate::error::ConfigError;
use crate::upload::S3UrlMode;

/// One configured notification: an event name matched exactly against
/// incoming events, the message template to render, and whether a webcam
/// snapshot should be attached.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRule {
    /// Event name, e.g. "PrintDone". Matched exactly, case sensitive.
    pub event: String,

    /// Message template with `{field}` placeholders resolved against the
    /// event payload at dispatch time.
    pub message: String,

    /// Whether to capture, transform and upload a snapshot for this event.
    #[serde(default)]
    pub with_snapshot: bool,
}

/// Default notification rules, mirroring the stock "job complete" text.
const DEFAULT_EVENT_RULES: &str = r#"[
    {"event": "PrintDone",
     "message": "{printer_name} job complete: {name} done printing after {time}",
     "with_snapshot": true},
    {"event": "PrintFailed",
     "message": "{printer_name} job failed: {name} stopped after {time}",
     "with_snapshot": true}
]"#;

/// Configuration for the print-pager notification service loaded from
/// environment variables.
///
/// All values are loaded from environment variables to support containerized
/// deployments. Only the Twilio credentials, sender/recipient numbers and the
/// Moonraker URL are required; everything else has a default that leaves the
/// corresponding feature disabled.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master switch for outbound notifications.
    /// Environment variable: `SMS_ENABLED`
    pub enabled: bool,

    /// Comma-separated list of recipient phone numbers. Each entry is
    /// normalized to E.164 and messaged independently.
    /// Environment variable: `SMS_RECIPIENT_NUMBERS`
    pub recipient_numbers: String,

    /// Sender phone number registered with the SMS gateway.
    /// Environment variable: `SMS_FROM_NUMBER`
    pub from_number: String,

    /// Country calling code assumed for numbers given in national format.
    /// Environment variable: `SMS_DEFAULT_COUNTRY_CODE` (default "1")
    pub default_country_code: String,

    /// Twilio account SID.
    /// Environment variable: `TWILIO_ACCOUNT_SID`
    pub account_sid: String,

    /// Twilio auth token.
    /// Environment variable: `TWILIO_AUTH_TOKEN`
    pub auth_token: String,

    /// Display name of the printer, available to templates as
    /// `{printer_name}`.
    /// Environment variable: `PRINTER_NAME`
    pub printer_name: String,

    /// Notification rules as a JSON list of
    /// `{"event", "message", "with_snapshot"}` objects.
    /// Environment variable: `EVENT_RULES`
    pub event_rules: Vec<EventRule>,

    /// Webcam still-image endpoint. Empty disables snapshots entirely.
    /// Environment variable: `SNAPSHOT_URL`
    pub snapshot_url: String,

    /// Flip the snapshot horizontally before uploading.
    /// Environment variable: `WEBCAM_FLIP_H`
    pub flip_h: bool,

    /// Flip the snapshot vertically before uploading.
    /// Environment variable: `WEBCAM_FLIP_V`
    pub flip_v: bool,

    /// Rotate the snapshot 90 degrees counter-clockwise before uploading.
    /// Environment variable: `WEBCAM_ROTATE_90`
    pub rotate_90: bool,

    /// Path to the ffmpeg executable used for flips/rotation. Empty disables
    /// the transform step.
    /// Environment variable: `FFMPEG_PATH`
    pub ffmpeg_path: String,

    /// Image hosting provider: "none", "cloudinary", "http_post" or
    /// "aws_s3". Anything else falls back to "none".
    /// Environment variable: `UPLOAD_PROVIDER`
    pub upload_provider: String,

    /// Cloudinary cloud name for unsigned uploads.
    /// Environment variable: `CLOUDINARY_CLOUD_NAME`
    pub cloudinary_cloud_name: String,

    /// Cloudinary unsigned upload preset.
    /// Environment variable: `CLOUDINARY_UPLOAD_PRESET`
    pub cloudinary_upload_preset: String,

    /// Endpoint for the generic multipart image host.
    /// Environment variable: `IMGHOST_UPLOAD_URL`
    pub imghost_upload_url: String,

    /// S3 bucket receiving snapshots.
    /// Environment variable: `S3_BUCKET`
    pub s3_bucket: String,

    /// AWS region of the bucket.
    /// Environment variable: `S3_REGION` (default "us-east-1")
    pub s3_region: String,

    /// Prefix prepended to every object key, e.g. "snapshots/".
    /// Environment variable: `S3_KEY_PREFIX`
    pub s3_key_prefix: String,

    /// Base URL for public object links. Empty derives the bucket's
    /// virtual-hosted endpoint.
    /// Environment variable: `S3_BASE_URL`
    pub s3_base_url: String,

    /// URL policy for uploaded objects: "public" returns a static link,
    /// "presigned" returns a short-lived signed GET URL.
    /// Environment variable: `S3_URL_MODE` (default "public")
    pub s3_url_mode: S3UrlMode,

    /// Expiry in seconds for presigned URLs.
    /// Environment variable: `S3_PRESIGN_EXPIRY_SECS` (default 3600)
    pub s3_presign_expiry_secs: u64,

    /// AWS access key id for S3 uploads.
    /// Environment variable: `AWS_ACCESS_KEY_ID`
    pub aws_access_key_id: String,

    /// AWS secret access key for S3 uploads.
    /// Environment variable: `AWS_SECRET_ACCESS_KEY`
    pub aws_secret_access_key: String,

    /// Moonraker API endpoint polled for print state transitions.
    /// Environment variable: `MOONRAKER_API_URL`
    pub moonraker_api_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot
    /// be parsed:
    /// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`: gateway credentials (required)
    /// - `SMS_FROM_NUMBER`, `SMS_RECIPIENT_NUMBERS`: sender and recipients (required)
    /// - `MOONRAKER_API_URL`: printer API endpoint (required)
    /// - boolean variables must be "true" or "false"
    /// - `EVENT_RULES` must be a JSON list of rule objects
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use print_pager::config::Config;
    ///
    /// let config = Config::load().expect("Failed to load configuration");
    /// ```
    pub fn load() -> Result<Self, ConfigError> {
        let enabled = env_bool("SMS_ENABLED", true)?;
        let recipient_numbers = env_required("SMS_RECIPIENT_NUMBERS")?;
        let from_number = env_required("SMS_FROM_NUMBER")?;
        let default_country_code = env_or("SMS_DEFAULT_COUNTRY_CODE", "1");
        let account_sid = env_required("TWILIO_ACCOUNT_SID")?;
        let auth_token = env_required("TWILIO_AUTH_TOKEN")?;
        let printer_name = env_or("PRINTER_NAME", "3D printer");

        let rules_json = env_or("EVENT_RULES", DEFAULT_EVENT_RULES);
        let event_rules = parse_event_rules(&rules_json)?;

        let snapshot_url = env_or("SNAPSHOT_URL", "");
        let flip_h = env_bool("WEBCAM_FLIP_H", false)?;
        let flip_v = env_bool("WEBCAM_FLIP_V", false)?;
        let rotate_90 = env_bool("WEBCAM_ROTATE_90", false)?;
        let ffmpeg_path = env_or("FFMPEG_PATH", "");

        let upload_provider = env_or("UPLOAD_PROVIDER", "none");
        let cloudinary_cloud_name = env_or("CLOUDINARY_CLOUD_NAME", "");
        let cloudinary_upload_preset = env_or("CLOUDINARY_UPLOAD_PRESET", "snapshot");
        let imghost_upload_url = env_or("IMGHOST_UPLOAD_URL", "");
        let s3_bucket = env_or("S3_BUCKET", "");
        let s3_region = env_or("S3_REGION", "us-east-1");
        let s3_key_prefix = env_or("S3_KEY_PREFIX", "");
        let s3_base_url = env_or("S3_BASE_URL", "");
        let s3_url_mode = parse_url_mode(&env_or("S3_URL_MODE", "public"))?;
        let s3_presign_expiry_secs = env_u64("S3_PRESIGN_EXPIRY_SECS", 3600)?;
        let aws_access_key_id = env_or("AWS_ACCESS_KEY_ID", "");
        let aws_secret_access_key = env_or("AWS_SECRET_ACCESS_KEY", "");

        let moonraker_api_url = env_required("MOONRAKER_API_URL")?;

        Ok(Config {
            enabled,
            recipient_numbers,
            from_number,
            default_country_code,
            account_sid,
            auth_token,
            printer_name,
            event_rules,
            snapshot_url,
            flip_h,
            flip_v,
            rotate_90,
            ffmpeg_path,
            upload_provider,
            cloudinary_cloud_name,
            cloudinary_upload_preset,
            imghost_upload_url,
            s3_bucket,
            s3_region,
            s3_key_prefix,
            s3_base_url,
            s3_url_mode,
            s3_presign_expiry_secs,
            aws_access_key_id,
            aws_secret_access_key,
            moonraker_api_url,
        })
    }

    /// Find the rule configured for an event name, if any.
    pub fn rule_for(&self, event_name: &str) -> Option<&EventRule> {
        self.event_rules.iter().find(|rule| rule.event == event_name)
    }
}

/// Parse the `EVENT_RULES` JSON list.
pub fn parse_event_rules(json: &str) -> Result<Vec<EventRule>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::InvalidValue {
        field: "EVENT_RULES".to_string(),
        value: json.to_string(),
        reason: e.to_string(),
    })
}

fn parse_url_mode(value: &str) -> Result<S3UrlMode, ConfigError> {
    match value {
        "public" => Ok(S3UrlMode::Public),
        "presigned" => Ok(S3UrlMode::Presigned),
        other => Err(ConfigError::InvalidValue {
            field: "S3_URL_MODE".to_string(),
            value: other.to_string(),
            reason: "expected 'public' or 'presigned'".to_string(),
        }),
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar {
        var_name: name.to_string(),
    })
}

fn env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value,
            reason: "must be 'true' or 'false'".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
            field: name.to_string(),
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Application constants used throughout the system.
pub mod constants {
    /// Seconds between Moonraker status polls.
    pub const POLL_INTERVAL_SECONDS: u64 = 5;

    /// Request timeout applied to every outbound HTTP call.
    pub const HTTP_TIMEOUT_SECONDS: u64 = 15;

    /// Twilio REST API base URL.
    pub const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

    /// Cloudinary upload API base URL.
    pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_parse() {
        let rules = parse_event_rules(DEFAULT_EVENT_RULES).expect("default rules");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].event, "PrintDone");
        assert!(rules[0].with_snapshot);
        assert!(rules[0].message.contains("{printer_name}"));
    }

    #[test]
    fn rules_with_snapshot_defaults_to_false() {
        let rules =
            parse_event_rules(r#"[{"event": "PrintPaused", "message": "paused"}]"#).expect("rules");
        assert_eq!(rules.len(), 1);
        assert!(!rules[0].with_snapshot);
    }

    #[test]
    fn malformed_rules_are_rejected() {
        let err = parse_event_rules("not json").unwrap_err();
        match err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "EVENT_RULES"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn url_mode_parses() {
        assert_eq!(parse_url_mode("public").unwrap(), S3UrlMode::Public);
        assert_eq!(parse_url_mode("presigned").unwrap(), S3UrlMode::Presigned);
        assert!(parse_url_mode("signed").is_err());
    }
}
