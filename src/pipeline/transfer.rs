//! Streaming HTTP transfer to disk.

use crate::error::TransferError;
use crate::types::{DownloadJob, Event};
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use super::progress::ProgressTracker;

/// A failed attempt together with how many bytes it wrote first
///
/// The worker needs the byte count to decide between removing an empty
/// placeholder and keeping a partial file, and to roll the aggregate
/// progress counters back.
#[derive(Debug)]
pub(crate) struct TransferFailure {
    /// What went wrong
    pub error: TransferError,
    /// Bytes already written to the destination when it did
    pub bytes_written: u64,
}

impl TransferFailure {
    fn at(error: impl Into<TransferError>, bytes_written: u64) -> Self {
        Self {
            error: error.into(),
            bytes_written,
        }
    }
}

/// Stream the job's remote bytes into `dest`
///
/// Progress is credited chunk by chunk to the worker's slot and broadcast as
/// [`Event::FileProgress`]. On failure the bytes written so far are reported
/// back; rolling them out of the aggregate is the caller's job.
pub(crate) async fn stream_to_file(
    client: &reqwest::Client,
    job: &DownloadJob,
    dest: &Path,
    progress: &ProgressTracker,
    slot: usize,
    event_tx: &broadcast::Sender<Event>,
) -> Result<u64, TransferFailure> {
    let url = authorized_url(&job.file.content_fileurl, &job.token);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TransferFailure::at(e, 0))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransferFailure::at(
            TransferError::Status {
                code: status.as_u16(),
                url: response.url().to_string(),
            },
            0,
        ));
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| TransferFailure::at(e, 0))?;

    let mut stream = response.bytes_stream();
    let mut bytes_written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransferFailure::at(e, bytes_written))?;

        file.write_all(&chunk)
            .await
            .map_err(|e| TransferFailure::at(e, bytes_written))?;
        bytes_written += chunk.len() as u64;
        progress.add(slot, chunk.len() as u64);

        let _ = event_tx.send(Event::FileProgress {
            worker: slot,
            filename: job.file.content_filename.clone(),
            bytes: bytes_written,
            total,
        });
    }

    file.flush()
        .await
        .map_err(|e| TransferFailure::at(e, bytes_written))?;

    Ok(bytes_written)
}

/// Append the auth token as a query parameter
///
/// An empty token leaves the URL untouched; an unparseable URL is passed
/// through verbatim and will fail the request instead.
fn authorized_url(raw: &str, token: &str) -> String {
    if token.is_empty() {
        return raw.to_string();
    }
    match url::Url::parse(raw) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("token", token);
            url.into()
        }
        Err(_) => raw.to_string(),
    }
}
