use neonbatch_engine::batch::{self, ItemOutcome};
use neonbatch_engine::config::FetchConfig;
use neonbatch_engine::resolver::{MediaKind, ResolvedItem};
use neonbatch_engine::EngineError;

fn image_item(download_url: &str) -> ResolvedItem {
    ResolvedItem {
        kind: MediaKind::Image,
        preview_url: Some(download_url.to_string()),
        download_url: download_url.to_string(),
        title: "YT Community Image".to_string(),
        is_direct: false,
    }
}

fn video_item(download_url: &str) -> ResolvedItem {
    ResolvedItem {
        kind: MediaKind::Video,
        preview_url: None,
        download_url: download_url.to_string(),
        title: "clip".to_string(),
        is_direct: true,
    }
}

#[test]
fn mixed_batch_keeps_input_order_and_isolates_failures() {
    let cfg = FetchConfig::default();
    let raw = "\
https://cdn.example.com/ok.mp4

https://www.youtube.com/post/UgkxMissing
   https://yt3.ggpht.com/pic
https://cdn.example.com/times-out.mp4
";

    let reports = batch::run_batch_with(
        raw,
        &cfg,
        |url| {
            if url.contains("/post/") {
                None
            } else if url.contains("ggpht") {
                Some(image_item(url))
            } else {
                Some(video_item(url))
            }
        },
        |url| {
            if url.contains("times-out") {
                Err(EngineError::Request {
                    url: url.to_string(),
                    detail: "timeout".to_string(),
                })
            } else {
                Ok(url.as_bytes().to_vec())
            }
        },
    );

    assert_eq!(reports.len(), 4);
    assert_eq!(
        reports.iter().map(|r| r.index).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );

    assert!(reports[0].outcome.is_ready());
    assert_eq!(
        reports[1].outcome.failure_message(),
        Some(batch::UNSUPPORTED_MESSAGE)
    );
    assert!(reports[2].outcome.is_ready());
    assert_eq!(
        reports[3].outcome.failure_message(),
        Some(batch::BUFFER_FAILED_MESSAGE)
    );

    // Leading/trailing whitespace is trimmed before resolution.
    assert_eq!(reports[2].source_url, "https://yt3.ggpht.com/pic");
}

#[test]
fn extensions_follow_resolved_kind_not_source_url() {
    let cfg = FetchConfig::default();
    let raw = "https://a.example/video-page\nhttps://yt3.ggpht.com/pic";

    let reports = batch::run_batch_with(
        raw,
        &cfg,
        |url| {
            if url.contains("ggpht") {
                Some(image_item(url))
            } else {
                Some(video_item("https://cdn.example.com/stream"))
            }
        },
        |_| Ok(vec![1]),
    );

    let names: Vec<&str> = reports
        .iter()
        .map(|r| match &r.outcome {
            ItemOutcome::Ready { file_name, .. } => file_name.as_str(),
            _ => panic!("expected ready outcomes"),
        })
        .collect();

    assert!(names[0].ends_with("_0.mp4"), "names={names:?}");
    assert!(names[1].ends_with("_1.jpg"), "names={names:?}");
    assert_ne!(names[0], names[1]);
}

#[test]
fn duplicate_urls_are_not_merged() {
    let cfg = FetchConfig::default();
    let raw = "https://cdn.example.com/same.mp4\nhttps://cdn.example.com/same.mp4";

    let mut fetch_calls = 0usize;
    let reports = batch::run_batch_with(
        raw,
        &cfg,
        |url| Some(video_item(url)),
        |url| {
            fetch_calls += 1;
            Ok(url.as_bytes().to_vec())
        },
    );

    assert_eq!(reports.len(), 2);
    assert_eq!(fetch_calls, 2);
    assert!(reports.iter().all(|r| r.outcome.is_ready()));
}
