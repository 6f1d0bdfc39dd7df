//! print-pager - SMS notifications for 3D print jobs, with webcam snapshots.
//!
//! This library turns print-job events into text messages: an event is
//! matched against configured rules, a webcam snapshot is optionally
//! captured, flipped/rotated and uploaded to an image host, and the rendered
//! message is sent to every configured phone number through Twilio.
//!
//! # Core Components
//!
//! * [`config`] - Configuration loaded from environment variables
//! * [`router`] - Event matching and pipeline orchestration
//! * [`snapshot`] - Webcam capture and ffmpeg flip/rotate
//! * [`upload`] - Image hosting providers (Cloudinary, generic HTTP, S3)
//! * [`message`] - Template rendering against event payloads
//! * [`dispatch`] - E.164 normalization and per-recipient Twilio sends
//! * [`printer`] - Moonraker status polling and event derivation
//! * [`error`] - Explicit error types for every external call
//!
//! # Quick Start
//!
//! ```no_run
//! use print_pager::config::Config;
//! use print_pager::message::NotificationPayload;
//! use print_pager::router::Notifier;
//!
//! let config = Config::load().expect("configuration");
//! let notifier = Notifier::new(config);
//!
//! let mut payload = NotificationPayload::new();
//! payload.insert("name".to_string(), "benchy.gco".to_string());
//! payload.insert("time".to_string(), "1h 2m 3s".to_string());
//! notifier.route("PrintDone", &payload);
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod printer;
pub mod router;
pub mod snapshot;
pub mod upload;

// Re-export commonly used types for convenience
pub use config::{Config, EventRule};
pub use dispatch::{DispatchOutcome, MessageGateway, TwilioClient};
pub use message::NotificationPayload;
pub use printer::PrinterService;
pub use router::Notifier;
pub use upload::SnapshotHost;
