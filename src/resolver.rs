use crate::config::FetchConfig;
use crate::extractor::{self, StreamMetadata};
use crate::http::{self, redact_url_for_log};
use crate::Result;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

const COMMUNITY_POST_MARKERS: &[&str] = &["youtube.com/post/", "/community"];
const DIRECT_VIDEO_EXTS: &[&str] = &[".mp4"];
const DIRECT_SITE_MARKERS: &[&str] = &["po-kaki-to"];

const COMMUNITY_IMAGE_TITLE: &str = "YT Community Image";
const FALLBACK_VIDEO_TITLE: &str = "Untitled Video";
const DIRECT_VIDEO_TITLE: &str = "Direct MP4 File";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Normalized description of one fetchable media item.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedItem {
    pub kind: MediaKind,
    pub preview_url: Option<String>,
    pub download_url: String,
    pub title: String,
    pub is_direct: bool,
}

/// Turns one arbitrary URL into a typed media descriptor, or None.
///
/// Never propagates an error past this boundary: every failure (network,
/// parse, extractor) collapses to None after being logged, so one bad URL
/// cannot abort a batch.
pub fn resolve(url: &str, config: &FetchConfig) -> Option<ResolvedItem> {
    if is_community_post_url(url) {
        return resolve_community_image(url, config);
    }
    resolve_stream_with(url, |target| extractor::probe_stream(target, config))
}

pub fn is_community_post_url(url: &str) -> bool {
    COMMUNITY_POST_MARKERS.iter().any(|marker| url.contains(marker))
}

fn resolve_community_image(url: &str, config: &FetchConfig) -> Option<ResolvedItem> {
    let agent = http::build_http_agent(config.page_timeout_secs, &config.user_agent);
    let html = match http::fetch_html(&agent, url) {
        Ok(html) => html,
        Err(err) => {
            tracing::debug!("community page fetch failed for {}: {err}", redact_url_for_log(url));
            return None;
        }
    };

    let Some(image_url) = community_image_from_html(&html) else {
        tracing::debug!("no og:image meta tag at {}", redact_url_for_log(url));
        return None;
    };

    Some(ResolvedItem {
        kind: MediaKind::Image,
        preview_url: Some(image_url.clone()),
        download_url: image_url,
        title: COMMUNITY_IMAGE_TITLE.to_string(),
        is_direct: false,
    })
}

/// First `og:image` preview in the markup, with any trailing size suffix
/// (e.g. `=s680-rw`) removed so the full-resolution asset is addressed.
pub(crate) fn community_image_from_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[property="og:image"]"#).expect("og:image selector");
    let content = document
        .select(&selector)
        .find_map(|tag| tag.value().attr("content"))?;

    let stripped = strip_size_suffix(content.trim());
    if stripped.is_empty() {
        return None;
    }
    Some(stripped)
}

pub(crate) fn strip_size_suffix(url: &str) -> String {
    let re = Regex::new(r"=s\d+.*$").expect("size suffix regex");
    re.replace(url, "").into_owned()
}

/// Video/stream resolution with the extractor call injected, so the
/// fallback path is exercisable without a live tool.
pub fn resolve_stream_with<F>(url: &str, probe: F) -> Option<ResolvedItem>
where
    F: FnOnce(&str) -> Result<StreamMetadata>,
{
    match probe(url) {
        Ok(meta) => {
            let Some(download_url) = meta
                .url
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
            else {
                // A dump without a stream URL is as good as a failed call.
                return direct_fallback_item(url);
            };

            let title = meta
                .title
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| FALLBACK_VIDEO_TITLE.to_string());
            let preview_url = meta
                .thumbnail
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());

            Some(ResolvedItem {
                kind: MediaKind::Video,
                preview_url,
                download_url,
                title,
                is_direct: is_direct_video_url(url) || has_direct_site_marker(url),
            })
        }
        Err(err) => {
            tracing::debug!("extractor failed for {}: {err}", redact_url_for_log(url));
            direct_fallback_item(url)
        }
    }
}

fn direct_fallback_item(url: &str) -> Option<ResolvedItem> {
    if !is_direct_video_url(url) {
        return None;
    }
    Some(ResolvedItem {
        kind: MediaKind::Video,
        preview_url: None,
        download_url: url.to_string(),
        title: DIRECT_VIDEO_TITLE.to_string(),
        is_direct: true,
    })
}

/// True when the URL path, query string ignored, ends in a known
/// direct-video extension.
pub(crate) fn is_direct_video_url(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase(),
    };
    DIRECT_VIDEO_EXTS.iter().any(|ext| path.ends_with(ext))
}

fn has_direct_site_marker(url: &str) -> bool {
    DIRECT_SITE_MARKERS.iter().any(|marker| url.contains(marker))
}
