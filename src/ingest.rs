//! Directory-backed update source and status sink.
//!
//! The web-side watcher drops request files into the inbox; reports land in the outbox for the
//! uploader to pick up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use cardbridge_core_types::{RawCardRequest, RequestId, RequestStatus};
use cardbridge_dispatcher::{DispatchError, StatusSink, UpdateSource};

const REJECTED_SUFFIX: &str = "rejected";

/// Reads one request out of a file. An element that does not fit the request shape keeps only
/// its id, so validation fails and it is still reported; without an id it is dropped.
fn read_request(file: &Path, value: Value) -> Option<RawCardRequest> {
    let id = value.get("id").and_then(|id| match id {
        Value::String(text) => Some(text.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    });
    match serde_json::from_value::<RawCardRequest>(value) {
        Ok(request) => Some(request),
        Err(err) => match id {
            Some(id) => {
                warn!(
                    file = %file.display(),
                    request_id = %id,
                    error = %err,
                    "unreadable request"
                );
                Some(RawCardRequest {
                    id: Some(id),
                    ..RawCardRequest::default()
                })
            }
            None => {
                warn!(
                    file = %file.display(),
                    error = %err,
                    "unreadable request without an id dropped"
                );
                None
            }
        },
    }
}

/// Reads `*.json` request files in file-name order, removing each one once read.
#[derive(Clone, Debug)]
pub struct IngestDirSource {
    inbox: PathBuf,
}

impl IngestDirSource {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
        }
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    async fn pending_files(&self) -> std::io::Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.inbox).await?;
        let mut entries = fs::read_dir(&self.inbox).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            if is_json && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    async fn reject(&self, path: &Path, reason: &str) {
        let mut target: OsString = path.as_os_str().to_owned();
        target.push(".");
        target.push(REJECTED_SUFFIX);
        match fs::rename(path, &target).await {
            Ok(()) => warn!(file = %path.display(), reason, "request file rejected"),
            Err(err) => warn!(
                file = %path.display(),
                reason,
                error = %err,
                "request file rejected but could not be moved aside"
            ),
        }
    }
}

#[async_trait]
impl UpdateSource for IngestDirSource {
    async fn poll(&self) -> Result<Vec<RawCardRequest>, DispatchError> {
        let files = self
            .pending_files()
            .await
            .map_err(|err| DispatchError::Source(format!("{}: {err}", self.inbox.display())))?;

        let mut requests = Vec::new();
        for path in files {
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    self.reject(&path, &err.to_string()).await;
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&content) {
                Ok(parsed) => {
                    if let Err(err) = fs::remove_file(&path).await {
                        warn!(file = %path.display(), error = %err, "could not remove request file");
                    }
                    let before = requests.len();
                    let elements = match parsed {
                        Value::Array(batch) => batch,
                        single => vec![single],
                    };
                    requests.extend(
                        elements
                            .into_iter()
                            .filter_map(|element| read_request(&path, element)),
                    );
                    debug!(
                        file = %path.display(),
                        requests = requests.len() - before,
                        "request file ingested"
                    );
                }
                Err(err) => self.reject(&path, &err.to_string()).await,
            }
        }
        if !requests.is_empty() {
            info!(count = requests.len(), "requests ingested");
        }
        Ok(requests)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    pub id: RequestId,
    pub status: RequestStatus,
    pub reported_at: DateTime<Utc>,
}

/// Writes one `<id>.status.json` per reported request.
#[derive(Clone, Debug)]
pub struct OutboxStatusSink {
    outbox: PathBuf,
}

impl OutboxStatusSink {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    pub fn report_path(&self, id: &RequestId) -> PathBuf {
        let safe: String = id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.outbox.join(format!("{safe}.status.json"))
    }
}

#[async_trait]
impl StatusSink for OutboxStatusSink {
    async fn report(&self, id: &RequestId, status: RequestStatus) -> Result<(), DispatchError> {
        let report = StatusReport {
            id: id.clone(),
            status,
            reported_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&report)
            .map_err(|err| DispatchError::Sink(err.to_string()))?;
        let path = self.report_path(id);
        let staging = path.with_extension("tmp");

        fs::create_dir_all(&self.outbox)
            .await
            .map_err(|err| DispatchError::Sink(format!("{}: {err}", self.outbox.display())))?;
        fs::write(&staging, body)
            .await
            .map_err(|err| DispatchError::Sink(format!("{}: {err}", staging.display())))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|err| DispatchError::Sink(format!("{}: {err}", path.display())))?;
        debug!(request_id = %id, status = %status, file = %path.display(), "status written");
        Ok(())
    }
}
