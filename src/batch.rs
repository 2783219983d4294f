use crate::config::FetchConfig;
use crate::http;
use crate::resolver::{self, MediaKind, ResolvedItem};
use crate::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub const UNSUPPORTED_MESSAGE: &str = "Unsupported URL or Access Denied";
pub const BUFFER_FAILED_MESSAGE: &str = "Failed to buffer file for download";

pub const MIME_VIDEO_MP4: &str = "video/mp4";
pub const MIME_IMAGE_JPEG: &str = "image/jpeg";

/// What became of one input line. Failures are scoped to the line; the
/// batch always runs to completion.
#[derive(Debug)]
pub enum ItemOutcome {
    Ready {
        item: ResolvedItem,
        file_name: String,
        mime: &'static str,
        bytes: Vec<u8>,
    },
    BufferFailed {
        item: ResolvedItem,
    },
    Unsupported,
}

impl ItemOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ItemOutcome::Ready { .. })
    }

    pub fn failure_message(&self) -> Option<&'static str> {
        match self {
            ItemOutcome::Ready { .. } => None,
            ItemOutcome::BufferFailed { .. } => Some(BUFFER_FAILED_MESSAGE),
            ItemOutcome::Unsupported => Some(UNSUPPORTED_MESSAGE),
        }
    }
}

#[derive(Debug)]
pub struct ItemReport {
    /// Loop index; the only identity an item has.
    pub index: usize,
    pub source_url: String,
    pub outcome: ItemOutcome,
}

pub fn parse_input_urls(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn file_extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "jpg",
        MediaKind::Video => "mp4",
    }
}

pub fn mime_for(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => MIME_IMAGE_JPEG,
        MediaKind::Video => MIME_VIDEO_MP4,
    }
}

pub fn synthesize_file_name(prefix: &str, epoch_secs: u64, index: usize, kind: MediaKind) -> String {
    format!("{prefix}_{epoch_secs}_{index}.{}", file_extension(kind))
}

fn epoch_secs_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Resolves and buffers every non-blank input line, strictly sequentially
/// and in input order.
pub fn run_batch(raw: &str, config: &FetchConfig) -> Vec<ItemReport> {
    let buffer_agent = http::build_http_agent(config.buffer_timeout_secs, &config.user_agent);
    run_batch_with(
        raw,
        config,
        |url| resolver::resolve(url, config),
        |url| http::fetch_binary(&buffer_agent, url),
    )
}

/// Batch driver with the resolver and the buffer fetch injected.
pub fn run_batch_with<FResolve, FFetch>(
    raw: &str,
    config: &FetchConfig,
    mut resolve: FResolve,
    mut fetch: FFetch,
) -> Vec<ItemReport>
where
    FResolve: FnMut(&str) -> Option<ResolvedItem>,
    FFetch: FnMut(&str) -> Result<Vec<u8>>,
{
    let urls = parse_input_urls(raw);
    let mut reports: Vec<ItemReport> = Vec::with_capacity(urls.len());

    for (index, url) in urls.into_iter().enumerate() {
        let outcome = match resolve(&url) {
            None => {
                tracing::warn!(
                    "unsupported url at index {index}: {}",
                    http::redact_url_for_log(&url)
                );
                ItemOutcome::Unsupported
            }
            Some(item) => match fetch(&item.download_url) {
                Err(err) => {
                    tracing::warn!("buffer fetch failed at index {index}: {err}");
                    ItemOutcome::BufferFailed { item }
                }
                Ok(bytes) => {
                    let file_name =
                        synthesize_file_name(&config.filename_prefix, epoch_secs_now(), index, item.kind);
                    let mime = mime_for(item.kind);
                    tracing::debug!("buffered {} bytes as {file_name}", bytes.len());
                    ItemOutcome::Ready {
                        item,
                        file_name,
                        mime,
                        bytes,
                    }
                }
            },
        };
        reports.push(ItemReport {
            index,
            source_url: url,
            outcome,
        });
    }

    let ready = reports.iter().filter(|r| r.outcome.is_ready()).count();
    tracing::info!("batch finished: {} items, {ready} buffered", reports.len());
    reports
}
