use std::cell::RefCell;
use std::rc::Rc;

use print_pager::config::{Config, parse_event_rules};
use print_pager::dispatch::{self, MessageGateway};
use print_pager::error::GatewayError;
use print_pager::message::NotificationPayload;
use print_pager::printer::PrinterService;
use print_pager::router::Notifier;
use print_pager::upload::{S3UrlMode, SnapshotHost};

/// Gateway stand-in that records calls and fails scripted numbers.
struct ScriptedGateway {
    fail_numbers: Vec<String>,
    calls: Rc<RefCell<Vec<(String, Option<String>)>>>,
}

impl ScriptedGateway {
    fn new(fail_numbers: &[&str]) -> (Self, Rc<RefCell<Vec<(String, Option<String>)>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                fail_numbers: fail_numbers.iter().map(|n| n.to_string()).collect(),
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl MessageGateway for ScriptedGateway {
    fn send_message(
        &self,
        to: &str,
        _from: &str,
        _body: &str,
        media_url: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.calls
            .borrow_mut()
            .push((to.to_string(), media_url.map(String::from)));
        if self.fail_numbers.iter().any(|n| n == to) {
            return Err(GatewayError::Rejected {
                status: 400,
                detail: "scripted failure".to_string(),
            });
        }
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
                 "with_snapshot": true}]"#,
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

fn job_payload() -> NotificationPayload {
    [
        ("name".to_string(), "part.gco".to_string()),
        ("time".to_string(), "1:02:03".to_string()),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_printer_service_stores_url_and_errors_without_server() {
    // This test only checks struct creation and error behavior, not real HTTP
    let url = "http://localhost:1".to_string();
    let printer = PrinterService::new(url.clone());
    assert_eq!(printer.api_url, url);
    let status_result = printer.get_print_status();
    assert!(status_result.is_err());
}

#[test]
fn test_route_ignores_unknown_events() {
    let (gateway, calls) = ScriptedGateway::new(&[]);
    let notifier = Notifier::with_gateway(test_config(), Box::new(gateway), SnapshotHost::None);
    assert!(notifier.route("FilamentRunout", &job_payload()).is_none());
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_route_sends_text_only_when_nothing_is_hosted() {
    // The PrintDone rule asks for a snapshot, but no webcam URL or hosting
    // provider is configured; the text message must still reach everyone.
    let (gateway, calls) = ScriptedGateway::new(&[]);
    let notifier = Notifier::with_gateway(test_config(), Box::new(gateway), SnapshotHost::None);
    let outcome = notifier
        .route("PrintDone", &job_payload())
        .expect("dispatch outcome");
    assert_eq!(outcome.attempted(), 2);
    assert!(outcome.all_delivered());
    let calls = calls.borrow();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, media)| media.is_none()));
}

#[test]
fn test_partial_gateway_failure_still_attempts_everyone() {
    let (gateway, _calls) = ScriptedGateway::new(&["+15559876543"]);
    let outcome = dispatch::dispatch(
        &gateway,
        "+15551234567,+15559876543",
        "+15550001111",
        "1",
        "Shop Printer job complete: part.gco done printing after 1:02:03",
        None,
    );
    assert_eq!(outcome.attempted(), 2);
    assert!(outcome.attempts[0].succeeded());
    assert!(!outcome.attempts[1].succeeded());
    assert_eq!(outcome.delivered(), 1);
    assert!(!outcome.all_delivered());
}
