use std::fmt;

/// Error types for the print-pager notification pipeline.
///
/// Every wrapper around an external call (webcam fetch, ffmpeg subprocess,
/// image host, SMS gateway) returns one of these explicitly, so the decision
/// to degrade or skip is made visibly at the call site instead of inside
/// the wrapper.

/// Errors raised while loading configuration from the environment.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Environment variable is set to a value that cannot be parsed.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors raised while fetching a webcam snapshot to a local file.
#[derive(Debug)]
pub enum SnapshotError {
    /// No snapshot URL is configured; the feature is off.
    Disabled,

    /// The HTTP request to the camera endpoint failed.
    FetchFailed { url: String, reason: String },

    /// The camera endpoint answered with a non-success status.
    BadStatus { url: String, status: u16 },

    /// The fetched image could not be written to the temp location.
    SaveFailed { path: String, reason: String },
}

/// Errors raised while flipping/rotating a snapshot with the external tool.
#[derive(Debug)]
pub enum TransformError {
    /// The configured tool path is unset, missing, or not executable.
    ToolMissing { path: String },

    /// The tool could not be spawned at all.
    SpawnFailed { tool: String, reason: String },

    /// The tool ran but exited non-zero.
    ToolFailed {
        status: i32,
        stdout: String,
        stderr: String,
    },
}

/// Errors raised while uploading a snapshot to an image host.
#[derive(Debug)]
pub enum UploadError {
    /// No hosting provider is configured; uploads are off.
    NotConfigured,

    /// The local snapshot file could not be read.
    ReadFailed { path: String, reason: String },

    /// The HTTP request to the provider failed.
    RequestFailed { reason: String },

    /// The provider answered with a non-success status.
    BadStatus { status: u16, body: String },

    /// The provider answered 2xx but the body had no usable URL.
    MalformedResponse { reason: String },
}

/// Errors raised while rendering a message template.
#[derive(Debug, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{field}` placeholder has no matching payload entry.
    MissingField { field: String },

    /// A `{` was opened but never closed.
    UnterminatedPlaceholder { field: String },
}

/// Errors raised while normalizing a phone number to E.164.
#[derive(Debug, PartialEq, Eq)]
pub enum PhoneError {
    /// The configured number is empty or whitespace.
    Empty,

    /// The number contains a character that is not a digit or separator.
    InvalidCharacter { number: String, character: char },

    /// Too few digits to be a dialable number.
    TooShort { number: String },

    /// More digits than E.164 allows.
    TooLong { number: String },
}

/// Errors raised while submitting a message to the SMS gateway.
#[derive(Debug)]
pub enum GatewayError {
    /// The HTTP request to the gateway failed.
    RequestFailed { reason: String },

    /// The gateway answered with a non-success status.
    Rejected { status: u16, detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Disabled => {
                write!(f, "Webcam snapshot URL is not configured")
            }
            SnapshotError::FetchFailed { url, reason } => {
                write!(f, "Failed to fetch snapshot from '{}': {}", url, reason)
            }
            SnapshotError::BadStatus { url, status } => {
                write!(f, "Snapshot request to '{}' returned HTTP {}", url, status)
            }
            SnapshotError::SaveFailed { path, reason } => {
                write!(f, "Failed to save snapshot to '{}': {}", path, reason)
            }
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::ToolMissing { path } => {
                write!(
                    f,
                    "Image processing tool '{}' is missing or not executable",
                    path
                )
            }
            TransformError::SpawnFailed { tool, reason } => {
                write!(f, "Failed to run image processing tool '{}': {}", tool, reason)
            }
            TransformError::ToolFailed {
                status,
                stdout,
                stderr,
            } => {
                write!(
                    f,
                    "Image processing tool exited with code {}: {}, {}",
                    status, stdout, stderr
                )
            }
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::NotConfigured => {
                write!(f, "No image hosting provider is configured")
            }
            UploadError::ReadFailed { path, reason } => {
                write!(f, "Failed to read snapshot file '{}': {}", path, reason)
            }
            UploadError::RequestFailed { reason } => {
                write!(f, "Upload request failed: {}", reason)
            }
            UploadError::BadStatus { status, body } => {
                write!(f, "Image host returned HTTP {}: {}", status, body)
            }
            UploadError::MalformedResponse { reason } => {
                write!(f, "Image host response was unusable: {}", reason)
            }
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::MissingField { field } => {
                write!(f, "Message template references unknown field '{}'", field)
            }
            TemplateError::UnterminatedPlaceholder { field } => {
                write!(f, "Message template has an unterminated placeholder '{{{}'", field)
            }
        }
    }
}

impl fmt::Display for PhoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoneError::Empty => write!(f, "Phone number is empty"),
            PhoneError::InvalidCharacter { number, character } => {
                write!(
                    f,
                    "Phone number '{}' contains invalid character '{}'",
                    number, character
                )
            }
            PhoneError::TooShort { number } => {
                write!(f, "Phone number '{}' has too few digits", number)
            }
            PhoneError::TooLong { number } => {
                write!(f, "Phone number '{}' exceeds the E.164 digit limit", number)
            }
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::RequestFailed { reason } => {
                write!(f, "SMS gateway request failed: {}", reason)
            }
            GatewayError::Rejected { status, detail } => {
                write!(f, "SMS gateway rejected the message (HTTP {}): {}", status, detail)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for SnapshotError {}
impl std::error::Error for TransformError {}
impl std::error::Error for UploadError {}
impl std::error::Error for TemplateError {}
impl std::error::Error for PhoneError {}
impl std::error::Error for GatewayError {}
