//! Basic sync example
//!
//! This example demonstrates the core functionality of course-dl:
//! - Building a configuration
//! - Creating a downloader instance
//! - Subscribing to events
//! - Running one sync against a remote inventory
//! - Inspecting the report

use course_dl::{Config, ContentType, Course, CourseDownloader, Event, File, ModuleKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    // Build configuration
    let config = Config {
        storage_dir: "courses".into(),
        token: "your-api-token".to_string(),
        max_concurrent_downloads: 4,
        ..Default::default()
    };

    // Create downloader instance (takes the storage-root lock)
    let downloader = CourseDownloader::new(config).await?;

    // Subscribe to events
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::FileStarted { filename, .. } => {
                    println!("→ {filename}");
                }
                Event::FileProgress { filename, bytes, total, .. } => {
                    match total {
                        Some(total) => println!("  {filename}: {bytes}/{total} bytes"),
                        None => println!("  {filename}: {bytes} bytes"),
                    }
                }
                Event::FileCompleted { filename, saved_to, .. } => {
                    println!("✓ {filename} -> {}", saved_to.display());
                }
                Event::FileFailed { filename, error, .. } => {
                    println!("✗ {filename}: {error}");
                }
                _ => {}
            }
        }
    });

    // In real use, your API client materializes this listing from the
    // platform. Here we fake a single course with one file.
    let remote = vec![Course {
        id: 101,
        fullname: "Biology 101".into(),
        files: vec![File {
            module_id: 1,
            section_name: "Week 1".into(),
            module_name: "Lecture slides".into(),
            module_kind: ModuleKind::Resource,
            content_filepath: "/".into(),
            content_filename: "slides.pdf".into(),
            content_fileurl: "https://campus.example.com/pluginfile.php/1/slides.pdf".into(),
            content_filesize: 1_048_576,
            content_timemodified: 1_700_000_000,
            content_type: ContentType::File,
            modified: false,
            deleted: false,
            notified: false,
            saved_to: None,
            time_stamp: 0,
        }],
    }];

    let report = downloader.sync(remote).await?;
    println!(
        "done: {} downloaded, {} failed, {} deleted",
        report.downloaded.len(),
        report.failed.len(),
        report.deleted
    );

    downloader.shutdown().await?;
    Ok(())
}
