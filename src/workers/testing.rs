//! In-process fakes for the transcoder and content store.

use super::encode_daemon::EncodeDaemon;
use super::upload_daemon::UploadDaemon;
use crate::common::temp_file::TempFileManager;
use crate::infrastructure::storage::{ContentStore, StoreError};
use crate::infrastructure::transcode::{TranscodeError, Transcoder};
use crate::modules::video::model::{VideoJob, VideoSize};
use crate::modules::video::registry::JobRegistry;
use crate::state::AppState;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Full application state over fakes. Daemons are built but not started.
pub async fn test_state(dir: &Path, store: FakeStore, transcoder: FakeTranscoder) -> AppState {
    let temp_files = TempFileManager::new(dir.join("scratch")).await.unwrap();
    let registry = JobRegistry::new();
    let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();

    let upload_daemon = Arc::new(UploadDaemon::new(registry.clone(), Arc::new(store)));
    let encode_daemon = Arc::new(EncodeDaemon::new(
        registry.clone(),
        Arc::new(transcoder),
        handoff_tx,
    ));
    upload_daemon.spawn_handoff(handoff_rx);

    AppState::new(registry, upload_daemon, encode_daemon, temp_files)
}

pub async fn start_daemons(state: &AppState) {
    state.upload_daemon.start().await;
    state.encode_daemon.start().await;
}

/// Waits until every record of the video reached a final state in both stages it will see.
pub async fn wait_for_video(state: &AppState, video: &VideoJob) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let source = state.registry.snapshot(video.source).await.unwrap();
        let mut done = source.upload.is_terminal();
        for id in &video.variants {
            let record = state.registry.snapshot(*id).await.unwrap();
            done &= record.encode.is_failed() || record.upload.is_terminal();
        }
        if done {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "video never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Default)]
pub struct FakeTranscoder {
    failing: HashSet<VideoSize>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeTranscoder {
    /// Every job waits for a permit on `gate()` before finishing.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn failing(mut self, size: VideoSize) -> Self {
        self.failing.insert(size);
        self
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone().unwrap_or_else(|| Arc::new(Semaphore::new(0)))
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        size: VideoSize,
        progress: mpsc::Sender<u8>,
    ) -> Result<(), TranscodeError> {
        let _ = progress.send(50).await;
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.failing.contains(&size) {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: format!("cannot encode {}", size),
            });
        }
        tokio::fs::write(output, b"encoded").await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    hashes: HashMap<PathBuf, String>,
    failing: HashSet<PathBuf>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeStore {
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn with_hash(mut self, path: impl Into<PathBuf>, hash: &str) -> Self {
        self.hashes.insert(path.into(), hash.to_string());
        self
    }

    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone().unwrap_or_else(|| Arc::new(Semaphore::new(0)))
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn add(&self, path: &Path, progress: mpsc::Sender<u64>) -> Result<String, StoreError> {
        let _ = progress.send(1).await;
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.failing.contains(path) {
            return Err(StoreError::Api {
                status: 500,
                message: "store unavailable".to_string(),
            });
        }
        let hash = self.hashes.get(path).cloned().unwrap_or_else(|| {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
            format!("Qm{}", stem)
        });
        Ok(hash)
    }
}
