//! Thin wrappers around the ffmpeg/ffprobe command-line tools.

use crate::error::{RepcutError, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Probe result for a media file.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    /// Container duration in seconds.
    pub duration: f64,
    /// Whether a decodable video stream is present.
    pub has_video: bool,
    /// Source frame rate, if reported.
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    avg_frame_rate: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a media file with ffprobe.
pub async fn probe(path: &Path) -> Result<MediaProbe> {
    let output = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| map_tool_error("ffprobe", e))?;

    if !output.status.success() {
        return Err(RepcutError::Decode(format!(
            "ffprobe rejected {}",
            path.display()
        )));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|_| RepcutError::Decode("Invalid ffprobe output".into()))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.and_then(|v| v.duration.as_deref()))
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| RepcutError::Decode("Media has no readable duration".into()))?;

    let fps = video
        .and_then(|v| v.avg_frame_rate.as_deref())
        .and_then(parse_frame_rate);

    Ok(MediaProbe {
        duration,
        has_video: video.is_some(),
        fps,
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
    })
}

/// Run ffmpeg with the given arguments, failing on nonzero exit.
pub async fn run(args: &[&str]) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| map_tool_error("ffmpeg", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RepcutError::ToolFailed(format!(
            "ffmpeg exited nonzero: {}",
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }

    Ok(())
}

/// Run ffmpeg and capture stdout bytes (rawvideo pipes).
pub async fn run_capture(args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| map_tool_error("ffmpeg", e))?;

    if !output.status.success() {
        return Err(RepcutError::ToolFailed("ffmpeg rawvideo decode failed".into()));
    }

    Ok(output.stdout)
}

fn map_tool_error(tool: &str, e: std::io::Error) -> RepcutError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RepcutError::ToolNotFound(tool.to_string())
    } else {
        RepcutError::ToolFailed(format!("{} execution failed: {}", tool, e))
    }
}

/// Parse ffprobe's `avg_frame_rate` fraction ("30000/1001").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let mut parts = s.splitn(2, '/');
    let num: f64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some(den) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => Some(num),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
    }
}
