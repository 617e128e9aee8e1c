//! Graceful drain example
//!
//! Runs a sync under `sync_with_shutdown`: pressing Ctrl+C while transfers
//! are in flight stops retries and lets the queue drain, and the report is
//! still returned.

use course_dl::{Config, Course, CourseDownloader, sync_with_shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        storage_dir: "courses".into(),
        token: "your-api-token".to_string(),
        ..Default::default()
    };

    let downloader = CourseDownloader::new(config).await?;

    // Your API client would produce this.
    let remote: Vec<Course> = Vec::new();

    let report = sync_with_shutdown(&downloader, remote).await?;
    println!(
        "done: {} downloaded, {} failed, {} deleted",
        report.downloaded.len(),
        report.failed.len(),
        report.deleted
    );

    downloader.shutdown().await?;
    Ok(())
}
