//! Shared fixtures: config, courses, and mock-origin helpers.

use course_dl::{Config, ContentType, Course, File, ModuleKind, RetryConfig};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path as url_path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointed at a temp storage root, with test-friendly retry delays
pub fn test_config(storage_dir: &Path) -> Config {
    Config {
        storage_dir: storage_dir.to_path_buf(),
        max_concurrent_downloads: 4,
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

/// Build a plain resource file
pub fn file(module_id: i64, section: &str, name: &str, url: &str) -> File {
    File {
        module_id,
        section_name: section.into(),
        module_name: format!("Module {module_id}"),
        module_kind: ModuleKind::Resource,
        content_filepath: "/".into(),
        content_filename: name.into(),
        content_fileurl: url.into(),
        content_filesize: 100,
        content_timemodified: 10,
        content_type: ContentType::File,
        modified: false,
        deleted: false,
        notified: false,
        saved_to: None,
        time_stamp: 0,
    }
}

/// Build a course from files
pub fn course(id: i64, fullname: &str, files: Vec<File>) -> Course {
    Course {
        id,
        fullname: fullname.into(),
        files,
    }
}

/// Mount a GET route answering 200 with the given body
pub async fn serve(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(url_path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mount a GET route that fails `n` times with 503, then serves the body
pub async fn serve_after_failures(server: &MockServer, route: &str, n: u64, body: &[u8]) {
    Mock::given(method("GET"))
        .and(url_path(route))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(n)
        .mount(server)
        .await;
    serve(server, route, body).await;
}
