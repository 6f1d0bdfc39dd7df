use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::info;
use uuid::Uuid;

use crate::config::constants;
use crate::error::{SnapshotError, TransformError};

/// Pixel format forced ahead of every filter chain; works around color
/// corruption in ffmpeg's default format selection when rewriting JPEGs.
const PIXEL_FORMAT: &str = "yuv420p";

/// Fetch a still image from the webcam endpoint into a local temp file.
///
/// The file is written with a `.jpg` suffix so that downstream tooling
/// recognizes it as an image; the camera endpoint itself guarantees no
/// extension.
///
/// # Errors
///
/// Returns `SnapshotError::Disabled` when no URL is configured, and a fetch,
/// status or save error otherwise. The caller decides how to degrade; this
/// function never panics.
pub fn fetch_snapshot(source_url: &str) -> Result<PathBuf, SnapshotError> {
    if source_url.trim().is_empty() {
        return Err(SnapshotError::Disabled);
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECONDS))
        .build()
        .map_err(|e| SnapshotError::FetchFailed {
            url: source_url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(source_url)
        .send()
        .map_err(|e| SnapshotError::FetchFailed {
            url: source_url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(SnapshotError::BadStatus {
            url: source_url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let data = response.bytes().map_err(|e| SnapshotError::FetchFailed {
        url: source_url.to_string(),
        reason: e.to_string(),
    })?;

    let path = std::env::temp_dir().join(format!("print-pager-{}.jpg", Uuid::new_v4()));
    fs::write(&path, &data).map_err(|e| SnapshotError::SaveFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(path)
}

/// Build the ffmpeg `-vf` filter chain for the requested transforms.
///
/// The order is fixed: pixel-format normalization, then 90 degree
/// counter-clockwise rotation, then horizontal flip, then vertical flip.
/// Reordering changes the visual output.
pub fn build_filter_chain(hflip: bool, vflip: bool, rotate_90: bool) -> String {
    let mut filters = vec![format!("format={}", PIXEL_FORMAT)];
    if rotate_90 {
        filters.push("transpose=2".to_string());
    }
    if hflip {
        filters.push("hflip".to_string());
    }
    if vflip {
        filters.push("vflip".to_string());
    }
    filters.join(",")
}

/// Flip/rotate a snapshot in place by running the external ffmpeg binary.
///
/// With no transform flag set this is a fast no-op that never spawns a
/// process. The tool overwrites the file it read (`-y`); no backup copy is
/// kept.
///
/// # Errors
///
/// Returns `TransformError::ToolMissing` when the tool path is unset,
/// absent or not executable, `SpawnFailed` when the process cannot start,
/// and `ToolFailed` with captured stdout/stderr on a non-zero exit. Callers
/// treat all of these as soft failures and keep the untransformed image.
pub fn transform(
    ffmpeg: &str,
    snapshot_path: &Path,
    hflip: bool,
    vflip: bool,
    rotate_90: bool,
) -> Result<(), TransformError> {
    if !hflip && !vflip && !rotate_90 {
        return Ok(());
    }

    if ffmpeg.is_empty() || !is_executable(Path::new(ffmpeg)) {
        return Err(TransformError::ToolMissing {
            path: ffmpeg.to_string(),
        });
    }

    let chain = build_filter_chain(hflip, vflip, rotate_90);
    info!(
        "Running: {} -y -i {} -vf {} {}",
        ffmpeg,
        snapshot_path.display(),
        chain,
        snapshot_path.display()
    );

    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(snapshot_path)
        .arg("-vf")
        .arg(&chain)
        .arg(snapshot_path)
        .output()
        .map_err(|e| TransformError::SpawnFailed {
            tool: ffmpeg.to_string(),
            reason: e.to_string(),
        })?;

    if output.status.success() {
        info!("Rotated/flipped snapshot with ffmpeg");
        Ok(())
    } else {
        Err(TransformError::ToolFailed {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
