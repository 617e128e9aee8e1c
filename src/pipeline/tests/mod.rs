use crate::config::RetryConfig;
use crate::db::Database;
use crate::pipeline::DownloadPipeline;
use crate::types::{ContentType, DownloadJob, Event, File, ModuleKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Retry config with delays short enough for tests
fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn job(url: &str, destination: &Path, token: &str) -> DownloadJob {
    let filename = destination
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();
    DownloadJob {
        file: File {
            module_id: 1,
            section_name: "Week 1".into(),
            module_name: "Materials".into(),
            module_kind: ModuleKind::Resource,
            content_filepath: "/".into(),
            content_filename: filename,
            content_fileurl: url.into(),
            content_filesize: 0,
            content_timemodified: 10,
            content_type: ContentType::File,
            modified: false,
            deleted: false,
            notified: false,
            saved_to: None,
            time_stamp: 0,
        },
        course_id: 1,
        course_fullname: "Bio".into(),
        destination: destination.to_path_buf(),
        token: token.into(),
        attempts: 0,
    }
}

struct Harness {
    _db_file: NamedTempFile,
    db: Arc<Database>,
    storage: TempDir,
    event_tx: broadcast::Sender<Event>,
    drain: CancellationToken,
}

impl Harness {
    async fn new() -> Self {
        let db_file = NamedTempFile::new().unwrap();
        let db = Arc::new(Database::new(db_file.path()).await.unwrap());
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            _db_file: db_file,
            db,
            storage: TempDir::new().unwrap(),
            event_tx,
            drain: CancellationToken::new(),
        }
    }

    fn pipeline(&self, retry: RetryConfig) -> DownloadPipeline {
        DownloadPipeline::new(
            self.db.clone(),
            reqwest::Client::new(),
            retry,
            self.event_tx.clone(),
            self.drain.clone(),
        )
    }
}

#[tokio::test]
async fn downloads_a_single_file_and_records_it() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"course material".to_vec()))
        .mount(&server)
        .await;

    let dest = harness.storage.path().join("a.pdf");
    let jobs = vec![job(&format!("{}/files/a.pdf", server.uri()), &dest, "")];

    let report = harness.pipeline(fast_retry(3)).run(jobs, 2).await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(std::fs::read(&dest).unwrap(), b"course material");

    // Success is recorded in the store with the real path
    let job = &report.succeeded[0];
    assert_eq!(job.file.saved_to.as_deref(), Some(dest.as_path()));
    assert!(job.file.time_stamp > 0);

    let stored = harness.db.load_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].files[0].saved_to.as_deref(), Some(dest.as_path()));
}

#[tokio::test]
async fn auth_token_is_sent_as_query_parameter() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/secret.pdf"))
        .and(query_param("token", "sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dest = harness.storage.path().join("secret.pdf");
    let jobs = vec![job(
        &format!("{}/files/secret.pdf", server.uri()),
        &dest,
        "sekrit",
    )];

    let report = harness.pipeline(fast_retry(1)).run(jobs, 1).await.unwrap();
    assert_eq!(report.succeeded.len(), 1);
}

#[tokio::test]
async fn always_failing_job_is_attempted_exactly_max_attempts_times() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/flaky.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dest = harness.storage.path().join("flaky.pdf");
    let jobs = vec![job(&format!("{}/files/flaky.pdf", server.uri()), &dest, "")];

    let report = harness.pipeline(fast_retry(3)).run(jobs, 2).await.unwrap();

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].attempts, 3);

    // The outcome was never recorded, so the next diff sees the file again
    assert!(harness.db.load_all().await.unwrap().is_empty());

    server.verify().await;
}

#[tokio::test]
async fn permanent_status_fails_without_burning_retries() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dest = harness.storage.path().join("gone.pdf");
    let jobs = vec![job(&format!("{}/files/gone.pdf", server.uri()), &dest, "")];

    let report = harness.pipeline(fast_retry(5)).run(jobs, 1).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].attempts, 1, "404 must not be retried");
    // Zero bytes were streamed, so the placeholder is cleaned up
    assert!(!dest.exists());

    server.verify().await;
}

#[tokio::test]
async fn transient_failures_recover_within_the_bound() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    // First two attempts see a 503, the third succeeds
    Mock::given(method("GET"))
        .and(path("/files/later.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/later.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"finally".to_vec()))
        .mount(&server)
        .await;

    let dest = harness.storage.path().join("later.pdf");
    let jobs = vec![job(&format!("{}/files/later.pdf", server.uri()), &dest, "")];

    let report = harness.pipeline(fast_retry(3)).run(jobs, 1).await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(std::fs::read(&dest).unwrap(), b"finally");
}

#[tokio::test]
async fn colliding_destinations_produce_distinct_files() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/m1/notes.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"module one".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m2/notes.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"module two".to_vec()))
        .mount(&server)
        .await;

    // Two different remote files sanitize to the same destination
    let dest = harness.storage.path().join("notes.pdf");
    let mut first = job(&format!("{}/m1/notes.pdf", server.uri()), &dest, "");
    let mut second = job(&format!("{}/m2/notes.pdf", server.uri()), &dest, "");
    first.file.module_id = 1;
    second.file.module_id = 2;

    let report = harness
        .pipeline(fast_retry(3))
        .run(vec![first, second], 2)
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 2);

    let plain = harness.storage.path().join("notes.pdf");
    let suffixed = harness.storage.path().join("notes (1).pdf");
    assert!(plain.exists());
    assert!(suffixed.exists(), "second download must not overwrite the first");

    let mut bodies = vec![
        std::fs::read(&plain).unwrap(),
        std::fs::read(&suffixed).unwrap(),
    ];
    bodies.sort();
    assert_eq!(bodies, vec![b"module one".to_vec(), b"module two".to_vec()]);
}

#[tokio::test]
async fn link_modules_become_shortcut_files_without_any_request() {
    let harness = Harness::new().await;

    let dest = harness.storage.path().join("Course site");
    let mut link = job("https://campus.example.com/course/view.php?id=7", &dest, "");
    link.file.module_kind = ModuleKind::Url;
    link.file.content_type = ContentType::Url;

    let report = harness.pipeline(fast_retry(3)).run(vec![link], 1).await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    let saved = report.succeeded[0].file.saved_to.clone().unwrap();
    assert_eq!(
        saved.extension().and_then(|e| e.to_str()),
        Some(super::shortcut::SHORTCUT_EXTENSION)
    );

    let body = std::fs::read_to_string(&saved).unwrap();
    assert!(body.contains("URL=https://campus.example.com/course/view.php?id=7"));
}

#[tokio::test]
async fn drained_pipeline_does_not_retry() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/busy.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    // Drain before the run: queued first attempts still execute, retries don't
    harness.drain.cancel();

    let dest = harness.storage.path().join("busy.pdf");
    let jobs = vec![job(&format!("{}/files/busy.pdf", server.uri()), &dest, "")];

    let report = harness.pipeline(fast_retry(5)).run(jobs, 1).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].attempts, 1);

    server.verify().await;
}

#[tokio::test]
async fn one_bad_job_does_not_poison_the_batch() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/good.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fine".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/bad.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let good_dest = harness.storage.path().join("good.pdf");
    let bad_dest = harness.storage.path().join("bad.pdf");
    let jobs = vec![
        job(&format!("{}/files/good.pdf", server.uri()), &good_dest, ""),
        job(&format!("{}/files/bad.pdf", server.uri()), &bad_dest, ""),
    ];

    let report = harness.pipeline(fast_retry(2)).run(jobs, 2).await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.succeeded[0].file.content_filename, "good.pdf");
    assert_eq!(report.failed[0].file.content_filename, "bad.pdf");
    assert_eq!(std::fs::read(&good_dest).unwrap(), b"fine");
}

#[tokio::test]
async fn empty_job_list_returns_immediately() {
    let harness = Harness::new().await;
    let report = harness.pipeline(fast_retry(3)).run(Vec::new(), 4).await.unwrap();
    assert!(report.succeeded.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn lifecycle_events_are_emitted_in_order() {
    let harness = Harness::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&server)
        .await;

    let mut events = harness.event_tx.subscribe();
    let dest = harness.storage.path().join("a.pdf");
    let jobs = vec![job(&format!("{}/files/a.pdf", server.uri()), &dest, "")];
    harness.pipeline(fast_retry(3)).run(jobs, 1).await.unwrap();

    let mut saw_started = false;
    let mut saw_progress = false;
    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::FileStarted { .. } => saw_started = true,
            Event::FileProgress { worker, bytes, .. } => {
                assert_eq!(worker, 0);
                assert!(bytes > 0);
                saw_progress = true;
            }
            Event::FileCompleted { saved_to, .. } => {
                assert!(saw_started, "FileStarted must precede FileCompleted");
                assert_eq!(saved_to, dest);
                saw_completed = true;
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_progress && saw_completed);
}
