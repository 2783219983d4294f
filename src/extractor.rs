use crate::config::FetchConfig;
use crate::http::redact_url_for_log;
use crate::{EngineError, Result};
use serde::Deserialize;
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const EXTRACTOR_TOOL: &str = "yt-dlp";
const SOCKET_TIMEOUT_SECS: u64 = 30;
const POLL_INTERVAL_MS: u64 = 200;

/// Subset of the extractor's metadata dump the resolver consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Runs the extractor in metadata-only mode against one URL.
///
/// No media is downloaded; the best-format selection and the fixed browser
/// identity are passed so the reported direct-stream URL matches what the
/// buffer step will fetch.
pub fn probe_stream(url: &str, config: &FetchConfig) -> Result<StreamMetadata> {
    let args = vec![
        "--dump-single-json".to_string(),
        "--no-playlist".to_string(),
        "--quiet".to_string(),
        "--no-warnings".to_string(),
        "--socket-timeout".to_string(),
        SOCKET_TIMEOUT_SECS.to_string(),
        "-f".to_string(),
        "best".to_string(),
        "--user-agent".to_string(),
        config.user_agent.clone(),
        url.to_string(),
    ];

    let output = run_extractor(&args, config.extractor_timeout_secs)?;
    parse_stream_metadata(url, &String::from_utf8_lossy(&output.stdout))
}

pub(crate) fn parse_stream_metadata(url: &str, raw: &str) -> Result<StreamMetadata> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EngineError::ExtractorOutput {
            url: redact_url_for_log(url),
            detail: "empty metadata dump".to_string(),
        });
    }

    let parsed: StreamMetadata = serde_json::from_str(trimmed)?;
    let has_stream_url = parsed
        .url
        .as_deref()
        .map(str::trim)
        .is_some_and(|v| !v.is_empty());
    if !has_stream_url {
        return Err(EngineError::ExtractorOutput {
            url: redact_url_for_log(url),
            detail: "metadata dump has no direct stream url".to_string(),
        });
    }

    Ok(parsed)
}

enum CommandRunError {
    Spawn(std::io::Error),
    Wait(std::io::Error),
    TimedOut(u64),
}

fn run_extractor(args: &[String], timeout_secs: u64) -> Result<std::process::Output> {
    // The tool may be on PATH directly or only importable as a Python module.
    let candidates: [(&str, &[&str]); 3] = [
        ("yt-dlp", &[]),
        ("python", &["-m", "yt_dlp"]),
        ("python3", &["-m", "yt_dlp"]),
    ];

    let mut failures: Vec<String> = Vec::new();
    for (program, prefix) in candidates {
        let mut cmd = background_command(program);
        cmd.args(prefix);
        cmd.args(args);

        match run_with_timeout(&mut cmd, timeout_secs) {
            Ok(output) => {
                if output.status.success() {
                    return Ok(output);
                }
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                failures.push(format!(
                    "{program} failed (code={:?}): {}",
                    output.status.code(),
                    if stderr.is_empty() {
                        "unknown error".to_string()
                    } else {
                        stderr
                    }
                ));
            }
            Err(CommandRunError::Spawn(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                continue;
            }
            Err(CommandRunError::Spawn(e)) => {
                failures.push(format!("{program} could not start: {e}"));
            }
            Err(CommandRunError::Wait(e)) => {
                failures.push(format!("{program} failed while running: {e}"));
            }
            Err(CommandRunError::TimedOut(limit)) => {
                // The executable exists but hung; retrying via another
                // interpreter would just double the wait.
                tracing::warn!("{program} timed out after {limit}s");
                return Err(EngineError::ExternalToolTimedOut {
                    tool: EXTRACTOR_TOOL.to_string(),
                    seconds: limit,
                });
            }
        }
    }

    if failures.is_empty() {
        return Err(EngineError::ExternalToolMissing {
            tool: EXTRACTOR_TOOL.to_string(),
        });
    }

    Err(EngineError::ExternalToolFailed {
        tool: EXTRACTOR_TOOL.to_string(),
        code: None,
        stderr: failures.join(" | "),
    })
}

fn run_with_timeout(
    cmd: &mut Command,
    timeout_secs: u64,
) -> std::result::Result<std::process::Output, CommandRunError> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(CommandRunError::Spawn)?;
    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_handle.join().unwrap_or_default();
                let stderr = stderr_handle.join().unwrap_or_default();
                return Ok(std::process::Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {
                if timeout_secs > 0 && started.elapsed() >= Duration::from_secs(timeout_secs) {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(CommandRunError::TimedOut(timeout_secs));
                }
                thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(CommandRunError::Wait(err));
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = source {
            let _ = reader.read_to_end(&mut buf);
        }
        buf
    })
}

fn background_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    configure_for_background(&mut cmd);
    cmd
}

#[cfg(windows)]
fn configure_for_background(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;

    // Prevent console windows from stealing focus on Windows.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn configure_for_background(_cmd: &mut Command) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_full_metadata() {
        let raw = r#"{
            "title": "A Clip",
            "thumbnail": "https://cdn.example.com/t.jpg",
            "url": "https://cdn.example.com/stream.mp4",
            "extractor": "generic"
        }"#;
        let meta = parse_stream_metadata("https://example.com/watch?v=1", raw).expect("metadata");
        assert_eq!(meta.title.as_deref(), Some("A Clip"));
        assert_eq!(meta.thumbnail.as_deref(), Some("https://cdn.example.com/t.jpg"));
        assert_eq!(meta.url.as_deref(), Some("https://cdn.example.com/stream.mp4"));
    }

    #[test]
    fn parse_tolerates_null_thumbnail() {
        let raw = r#"{"title": "A Clip", "thumbnail": null, "url": "https://cdn.example.com/s.mp4"}"#;
        let meta = parse_stream_metadata("https://example.com/v", raw).expect("metadata");
        assert!(meta.thumbnail.is_none());
    }

    #[test]
    fn parse_rejects_missing_stream_url() {
        let raw = r#"{"title": "A Clip", "thumbnail": "https://cdn.example.com/t.jpg"}"#;
        let err = parse_stream_metadata("https://example.com/v", raw).expect_err("must fail");
        assert!(matches!(err, EngineError::ExtractorOutput { .. }));
    }

    #[test]
    fn parse_rejects_blank_stream_url() {
        let raw = r#"{"url": "  "}"#;
        let err = parse_stream_metadata("https://example.com/v", raw).expect_err("must fail");
        assert!(matches!(err, EngineError::ExtractorOutput { .. }));
    }

    #[test]
    fn parse_rejects_empty_and_malformed_dumps() {
        assert!(matches!(
            parse_stream_metadata("https://example.com/v", "   "),
            Err(EngineError::ExtractorOutput { .. })
        ));
        assert!(matches!(
            parse_stream_metadata("https://example.com/v", "ERROR: not json"),
            Err(EngineError::Json(_))
        ));
    }
}
