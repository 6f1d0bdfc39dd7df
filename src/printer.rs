use std::time::Duration;

use anyhow::Result;

use crate::config::constants;

/// Parsed subset of Moonraker's `print_stats` object.
#[derive(Debug, Clone)]
pub struct PrintStatus {
    /// Current print state: "standby", "printing", "paused", "complete",
    /// "error" or "cancelled".
    pub state: String,

    /// File being printed, when one is loaded.
    pub filename: Option<String>,

    /// Elapsed print time in seconds.
    pub print_duration: f64,
}

/// Printer status client for the Moonraker API.
///
/// Polled by the binary to turn print-state transitions into notification
/// events.
pub struct PrinterService {
    pub api_url: String,
}

impl PrinterService {
    /// Create a new PrinterService with the provided Moonraker API URL.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL for the Moonraker API (e.g., "http://printer.local:7125")
    pub fn new(api_url: String) -> Self {
        Self { api_url }
    }

    /// Get the current print status.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP request fails
    /// - The Moonraker API returns an error status
    /// - JSON parsing fails
    pub fn get_print_status(&self) -> Result<PrintStatus> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECONDS))
            .build()?;
        let response = client
            .get(format!(
                "{}/printer/objects/query?print_stats",
                self.api_url
            ))
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to get print status: HTTP {}",
                response.status()
            ));
        }

        let status: serde_json::Value = response.json()?;
        let stats = &status["result"]["status"]["print_stats"];

        Ok(PrintStatus {
            state: stats["state"].as_str().unwrap_or("unknown").to_string(),
            filename: stats["filename"]
                .as_str()
                .filter(|name| !name.is_empty())
                .map(String::from),
            print_duration: stats["print_duration"].as_f64().unwrap_or(0.0),
        })
    }
}

/// Map a print-state transition to a notification event name.
///
/// Returns `None` when the state did not change or the transition carries
/// no meaning worth notifying about.
pub fn state_event(previous: &str, current: &str) -> Option<&'static str> {
    if previous == current {
        return None;
    }
    match current {
        "printing" if previous == "paused" => Some("PrintResumed"),
        "printing" => Some("PrintStarted"),
        "complete" => Some("PrintDone"),
        "error" => Some("PrintFailed"),
        "paused" => Some("PrintPaused"),
        "standby" | "cancelled" if previous == "printing" || previous == "paused" => {
            Some("PrintCancelled")
        }
        _ => None,
    }
}

/// Render an elapsed duration as human-readable text, e.g. "1h 2m 3s".
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}h {}m {}s", total / 3600, total % 3600 / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_map_to_events() {
        assert_eq!(state_event("standby", "printing"), Some("PrintStarted"));
        assert_eq!(state_event("paused", "printing"), Some("PrintResumed"));
        assert_eq!(state_event("printing", "complete"), Some("PrintDone"));
        assert_eq!(state_event("printing", "error"), Some("PrintFailed"));
        assert_eq!(state_event("printing", "paused"), Some("PrintPaused"));
        assert_eq!(state_event("printing", "cancelled"), Some("PrintCancelled"));
        assert_eq!(state_event("paused", "standby"), Some("PrintCancelled"));
    }

    #[test]
    fn uneventful_transitions_are_ignored() {
        assert_eq!(state_event("printing", "printing"), None);
        assert_eq!(state_event("", "standby"), None);
        assert_eq!(state_event("complete", "standby"), None);
    }

    #[test]
    fn durations_format_as_hours_minutes_seconds() {
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
        assert_eq!(format_duration(59.9), "0h 0m 59s");
        assert_eq!(format_duration(0.0), "0h 0m 0s");
        assert_eq!(format_duration(-5.0), "0h 0m 0s");
    }
}
