use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use neonbatch_engine::batch::{self, ItemOutcome, ItemReport};
use neonbatch_engine::config::{load_fetch_config, FetchConfig};
use neonbatch_engine::resolver::MediaKind;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const ADDR_ENV_VAR: &str = "NEONBATCH_ADDR";
const CONFIG_ENV_VAR: &str = "NEONBATCH_CONFIG";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

const MAX_BATCH_URLS: usize = 100;
const TITLE_DISPLAY_CHARS: usize = 50;
const SOURCE_CAPTION_CHARS: usize = 60;

type ServeResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

struct AppState {
    config: FetchConfig,
    /// The one retained analysis; a new submission replaces it and frees
    /// the previous run's buffered bytes.
    latest: Mutex<Option<AnalysisRun>>,
}

struct AnalysisRun {
    id: String,
    items: Vec<ItemReport>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    urls: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    run_id: String,
    version: &'static str,
    items: Vec<ItemView>,
}

#[derive(Debug, Serialize)]
struct ItemView {
    index: usize,
    status: &'static str,
    kind: Option<&'static str>,
    preview_url: Option<String>,
    title: Option<String>,
    source_url: String,
    source_caption: String,
    file_name: Option<String>,
    mime: Option<&'static str>,
    download_href: Option<String>,
    error: Option<&'static str>,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(err) = run().await {
        tracing::error!("server failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> ServeResult<()> {
    let config = match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => {
            let path = PathBuf::from(path.trim());
            tracing::info!("loading fetch config from {}", path.display());
            load_fetch_config(&path)?
        }
        _ => FetchConfig::default(),
    };

    let state = Arc::new(AppState {
        config,
        latest: Mutex::new(None),
    });

    let app = Router::new()
        .route("/", get(index_page))
        .route("/api/analyze", post(analyze))
        .route("/api/download/{run_id}/{index}", get(download))
        .with_state(state);

    let addr: SocketAddr = std::env::var(ADDR_ENV_VAR)
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let url_count = batch::parse_input_urls(&request.urls).len();
    if url_count > MAX_BATCH_URLS {
        return Err(ApiError::bad_request(format!(
            "batch limit exceeded: max {MAX_BATCH_URLS} URLs per submission"
        )));
    }
    tracing::info!("analysis requested for {url_count} urls");

    let config = state.config.clone();
    let raw = request.urls;
    let reports = tokio::task::spawn_blocking(move || batch::run_batch(&raw, &config))
        .await
        .map_err(|err| ApiError::internal(format!("analysis worker failed: {err}")))?;

    let run_id = Uuid::new_v4().to_string();
    let items: Vec<ItemView> = reports
        .iter()
        .map(|report| item_view(&run_id, report))
        .collect();

    let mut latest = state
        .latest
        .lock()
        .map_err(|_| ApiError::internal("run state lock poisoned".to_string()))?;
    *latest = Some(AnalysisRun {
        id: run_id.clone(),
        items: reports,
    });
    drop(latest);

    Ok(Json(AnalyzeResponse {
        run_id,
        version: env!("CARGO_PKG_VERSION"),
        items,
    }))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path((run_id, index)): Path<(String, usize)>,
) -> Result<Response, ApiError> {
    let latest = state
        .latest
        .lock()
        .map_err(|_| ApiError::internal("run state lock poisoned".to_string()))?;

    let run = latest
        .as_ref()
        .filter(|run| run.id == run_id)
        .ok_or_else(|| ApiError::not_found("analysis run not found; re-run the analysis"))?;
    let report = run
        .items
        .get(index)
        .ok_or_else(|| ApiError::not_found("item index out of range"))?;

    let ItemOutcome::Ready {
        file_name,
        mime,
        bytes,
        ..
    } = &report.outcome
    else {
        return Err(ApiError::not_found("item has no buffered file"));
    };

    let headers = [
        (header::CONTENT_TYPE, (*mime).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ),
    ];
    Ok((headers, bytes.clone()).into_response())
}

fn item_view(run_id: &str, report: &ItemReport) -> ItemView {
    let source_caption = truncate_display(&report.source_url, SOURCE_CAPTION_CHARS);
    match &report.outcome {
        ItemOutcome::Ready {
            item,
            file_name,
            mime,
            ..
        } => ItemView {
            index: report.index,
            status: "ready",
            kind: Some(kind_label(item.kind)),
            preview_url: item.preview_url.clone(),
            title: Some(truncate_display(&item.title, TITLE_DISPLAY_CHARS)),
            source_url: report.source_url.clone(),
            source_caption,
            file_name: Some(file_name.clone()),
            mime: Some(*mime),
            download_href: Some(format!("/api/download/{run_id}/{}", report.index)),
            error: None,
        },
        ItemOutcome::BufferFailed { item } => ItemView {
            index: report.index,
            status: "buffer_failed",
            kind: Some(kind_label(item.kind)),
            preview_url: item.preview_url.clone(),
            title: Some(truncate_display(&item.title, TITLE_DISPLAY_CHARS)),
            source_url: report.source_url.clone(),
            source_caption,
            file_name: None,
            mime: None,
            download_href: None,
            error: report.outcome.failure_message(),
        },
        ItemOutcome::Unsupported => ItemView {
            index: report.index,
            status: "unsupported",
            kind: None,
            preview_url: None,
            title: None,
            source_url: report.source_url.clone(),
            source_caption,
            file_name: None,
            mime: None,
            download_href: None,
            error: report.outcome.failure_message(),
        },
    }
}

fn kind_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    }
}

fn truncate_display(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let cut: String = value.chars().take(max_chars).collect();
    format!("{cut}...")
}

const INDEX_HTML: &str = r##"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>NEON MULTI-DOWNLOADER</title>
<style>
  body { background: #000; color: #e0e0e0; font-family: 'Courier New', monospace; margin: 0; }
  .wrap { max-width: 960px; margin: 0 auto; padding: 24px; }
  h1 {
    color: #fff; text-align: center; text-transform: uppercase;
    text-shadow: 0 0 10px #0000ff, 0 0 20px #8a2be2;
    border-bottom: 2px solid #8a2be2; padding-bottom: 10px;
  }
  textarea {
    width: 100%; height: 120px; box-sizing: border-box;
    background: #0a0a0a; color: #00f2ff; border: 2px solid #8a2be2; border-radius: 8px;
    font-family: inherit; padding: 8px;
  }
  button {
    width: 100%; margin-top: 12px; padding: 10px; border: none; font-weight: bold;
    color: #fff; background: linear-gradient(90deg, #0000ff, #8a2be2);
    box-shadow: 0 0 15px #0000ff; cursor: pointer;
  }
  .card {
    border: 1px solid #00f2ff; border-left: 8px solid #8a2be2; border-radius: 10px;
    background: rgba(10, 10, 30, 0.9); padding: 20px; margin: 20px 0;
  }
  .card img, .card video { max-width: 100%; border-radius: 6px; }
  .caption { color: #888; font-size: 0.8rem; }
  .error { color: #ff5577; }
  .dl {
    display: inline-block; margin-top: 10px; padding: 8px 16px; color: #fff;
    background: linear-gradient(90deg, #0000ff, #8a2be2); text-decoration: none;
  }
  footer { text-align: center; color: #555; margin: 30px 0 10px; }
</style>
</head>
<body>
<div class="wrap">
  <h1>Neon Multi System</h1>
  <textarea id="urls" placeholder="One URL per line (video pages, .mp4 links, community posts)"></textarea>
  <button id="go">&#9889; Analyze Targets</button>
  <div id="results"></div>
  <footer id="foot">NEON BATCH CORE</footer>
</div>
<script>
const btn = document.getElementById('go');
const results = document.getElementById('results');

btn.addEventListener('click', async () => {
  btn.disabled = true;
  results.textContent = 'Analyzing...';
  try {
    const res = await fetch('/api/analyze', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ urls: document.getElementById('urls').value })
    });
    const data = await res.json();
    if (!res.ok) {
      results.innerHTML = '<p class="error"></p>';
      results.firstChild.textContent = data.error || 'analysis failed';
      return;
    }
    document.getElementById('foot').textContent = 'NEON BATCH CORE v' + data.version;
    results.innerHTML = '';
    for (const item of data.items) {
      results.appendChild(renderCard(item));
    }
  } catch (err) {
    results.textContent = 'analysis failed: ' + err;
  } finally {
    btn.disabled = false;
  }
});

function renderCard(item) {
  const card = document.createElement('div');
  card.className = 'card';

  if (item.status === 'unsupported') {
    const p = document.createElement('p');
    p.className = 'error';
    p.textContent = item.error + ': ' + item.source_caption;
    card.appendChild(p);
    return card;
  }

  if (item.preview_url) {
    const img = document.createElement('img');
    img.src = item.preview_url;
    card.appendChild(img);
  }
  const h = document.createElement('h3');
  h.textContent = item.title;
  card.appendChild(h);
  const cap = document.createElement('p');
  cap.className = 'caption';
  cap.textContent = 'SOURCE: ' + item.source_caption;
  card.appendChild(cap);

  if (item.kind === 'video') {
    const player = document.createElement('video');
    player.controls = true;
    player.src = item.source_url;
    card.appendChild(player);
  }

  if (item.status === 'ready') {
    const a = document.createElement('a');
    a.className = 'dl';
    a.href = item.download_href;
    a.download = item.file_name;
    a.textContent = item.kind === 'video' ? 'Download Video' : 'Download Image';
    card.appendChild(a);
  } else {
    const p = document.createElement('p');
    p.className = 'error';
    p.textContent = item.error;
    card.appendChild(p);
  }
  return card;
}
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use neonbatch_engine::resolver::ResolvedItem;

    #[test]
    fn truncate_appends_marker_only_when_cut() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("0123456789", 10), "0123456789");
        assert_eq!(truncate_display("0123456789x", 10), "0123456789...");
    }

    #[test]
    fn truncate_is_char_safe() {
        let value = "héllo wörld, this is a lông títle";
        let cut = truncate_display(value, 12);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 15);
    }

    #[test]
    fn views_carry_fixed_failure_messages() {
        let unsupported = ItemReport {
            index: 0,
            source_url: "https://a.example/x".to_string(),
            outcome: ItemOutcome::Unsupported,
        };
        let view = item_view("run", &unsupported);
        assert_eq!(view.status, "unsupported");
        assert_eq!(view.error, Some(batch::UNSUPPORTED_MESSAGE));
        assert!(view.download_href.is_none());

        let buffer_failed = ItemReport {
            index: 1,
            source_url: "https://a.example/clip.mp4".to_string(),
            outcome: ItemOutcome::BufferFailed {
                item: ResolvedItem {
                    kind: MediaKind::Video,
                    preview_url: None,
                    download_url: "https://a.example/clip.mp4".to_string(),
                    title: "clip".to_string(),
                    is_direct: true,
                },
            },
        };
        let view = item_view("run", &buffer_failed);
        assert_eq!(view.status, "buffer_failed");
        assert_eq!(view.error, Some(batch::BUFFER_FAILED_MESSAGE));
        assert_eq!(view.kind, Some("video"));
    }

    #[test]
    fn ready_view_links_the_run_scoped_download() {
        let report = ItemReport {
            index: 2,
            source_url: "https://a.example/clip.mp4".to_string(),
            outcome: ItemOutcome::Ready {
                item: ResolvedItem {
                    kind: MediaKind::Video,
                    preview_url: Some("https://a.example/t.jpg".to_string()),
                    download_url: "https://a.example/clip.mp4".to_string(),
                    title: "clip".to_string(),
                    is_direct: true,
                },
                file_name: "neon_10_2.mp4".to_string(),
                mime: batch::MIME_VIDEO_MP4,
                bytes: vec![0; 4],
            },
        };
        let view = item_view("abc123", &report);
        assert_eq!(view.download_href.as_deref(), Some("/api/download/abc123/2"));
        assert_eq!(view.mime, Some(batch::MIME_VIDEO_MP4));
        assert_eq!(view.file_name.as_deref(), Some("neon_10_2.mp4"));
    }
}
