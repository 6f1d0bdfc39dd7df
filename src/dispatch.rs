use std::time::Duration;

use log::{error, info, warn};

use crate::config::constants;
use crate::error::{GatewayError, PhoneError};

/// E.164 allows at most 15 digits including the country code.
const E164_MAX_DIGITS: usize = 15;
const E164_MIN_DIGITS: usize = 7;

/// Seam to the SMS gateway: one "create message" call per recipient.
/// Production uses [`TwilioClient`]; tests substitute a recording fake.
pub trait MessageGateway {
    /// Submit one message. `media_url` attaches a hosted image when present.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport failure or when the gateway
    /// rejects the message.
    fn send_message(
        &self,
        to: &str,
        from: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<(), GatewayError>;
}

/// Twilio REST client: posts form-encoded message-create requests with HTTP
/// basic auth.
pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String) -> Self {
        Self {
            account_sid,
            auth_token,
        }
    }
}

impl MessageGateway for TwilioClient {
    fn send_message(
        &self,
        to: &str,
        from: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            constants::TWILIO_API_BASE,
            self.account_sid
        );

        let mut params: Vec<(&str, &str)> = vec![("To", to), ("From", from), ("Body", body)];
        if let Some(media) = media_url {
            params.push(("MediaUrl", media));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| GatewayError::RequestFailed {
                reason: e.to_string(),
            })?;

        let response = client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .map_err(|e| GatewayError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                detail: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Record of one recipient's send attempt.
#[derive(Debug)]
pub struct DispatchAttempt {
    /// Recipient as configured, before normalization.
    pub recipient: String,

    /// Whether the media send failed and the text-only fallback was used.
    pub fell_back: bool,

    /// Failure detail; `None` means the message was accepted.
    pub error: Option<String>,
}

impl DispatchAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcome of one dispatch: every configured recipient was
/// attempted exactly once, regardless of individual failures.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub attempts: Vec<DispatchAttempt>,
}

impl DispatchOutcome {
    /// Number of recipients attempted.
    pub fn attempted(&self) -> usize {
        self.attempts.len()
    }

    /// Number of messages the gateway accepted.
    pub fn delivered(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }

    pub fn all_delivered(&self) -> bool {
        self.attempts.iter().all(|a| a.succeeded())
    }
}

/// Send one message per configured recipient.
///
/// The recipient list is split on commas; empty entries are skipped. Every
/// number, including the sender, is normalized to E.164 first. A malformed
/// recipient or a gateway failure affects that recipient only — the loop
/// always runs to completion. When a send with media fails, one text-only
/// retry is made for that recipient before recording failure.
pub fn dispatch(
    gateway: &dyn MessageGateway,
    recipients: &str,
    from_number: &str,
    default_country_code: &str,
    body: &str,
    media_url: Option<&str>,
) -> DispatchOutcome {
    let media = media_url.filter(|m| !m.is_empty());

    let from = match normalize_e164(from_number, default_country_code) {
        Ok(number) => Some(number),
        Err(e) => {
            error!("Sender number is unusable: {}", e);
            None
        }
    };

    let mut outcome = DispatchOutcome::default();
    for entry in recipients.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let Some(from) = from.as_deref() else {
            outcome.attempts.push(DispatchAttempt {
                recipient: entry.to_string(),
                fell_back: false,
                error: Some(format!("sender number '{}' is invalid", from_number)),
            });
            continue;
        };

        let to = match normalize_e164(entry, default_country_code) {
            Ok(number) => number,
            Err(e) => {
                warn!("Skipping recipient '{}': {}", entry, e);
                outcome.attempts.push(DispatchAttempt {
                    recipient: entry.to_string(),
                    fell_back: false,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        let mut fell_back = false;
        let mut result = gateway.send_message(&to, from, body, media);
        if result.is_err() && media.is_some() {
            warn!(
                "Could not send text+image notification to {}, retrying without image",
                to
            );
            fell_back = true;
            result = gateway.send_message(&to, from, body, None);
        }

        match &result {
            Ok(()) => info!("Print notification sent to {}", to),
            Err(e) => error!("SMS notification error for {}: {}", to, e),
        }
        outcome.attempts.push(DispatchAttempt {
            recipient: entry.to_string(),
            fell_back,
            error: result.err().map(|e| e.to_string()),
        });
    }

    outcome
}

/// Normalize a phone number to E.164 (`+<country><national>`).
///
/// Separators (spaces, dashes, dots, parentheses, slashes) are stripped. A
/// leading `+` or `00` marks the number as already international; anything
/// else is prefixed with the configured default country code unless it
/// already starts with it and carries more digits than a national number.
///
/// # Errors
///
/// Returns `PhoneError` for empty input, unexpected characters, or a digit
/// count outside the E.164 range.
pub fn normalize_e164(raw: &str, default_country_code: &str) -> Result<String, PhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let mut digits = String::new();
    let mut international = false;
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '+' if i == 0 => international = true,
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' | '/' => {}
            _ => {
                return Err(PhoneError::InvalidCharacter {
                    number: raw.to_string(),
                    character: c,
                });
            }
        }
    }

    let full = if international {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if digits.len() > 10 && digits.starts_with(default_country_code) {
        digits
    } else {
        format!("{}{}", default_country_code, digits)
    };

    if full.len() < E164_MIN_DIGITS {
        return Err(PhoneError::TooShort {
            number: raw.to_string(),
        });
    }
    if full.len() > E164_MAX_DIGITS {
        return Err(PhoneError::TooLong {
            number: raw.to_string(),
        });
    }

    Ok(format!("+{}", full))
}
