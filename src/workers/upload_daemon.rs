use super::progress::{percent_of, run_with_progress};
use super::queue::{QueueError, Stage, Ticket, WorkQueue, WorkerSlot};
use crate::infrastructure::storage::{ContentStore, StoreError};
use crate::modules::video::events::EncodeCompleted;
use crate::modules::video::model::{RecordId, VideoJob};
use crate::modules::video::registry::{JobRegistry, SharedRecord};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Single worker that pushes files to the content store one at a time, in ticket order.
pub struct UploadDaemon {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ContentStore>,
    queue: WorkQueue,
    worker: WorkerSlot,
}

impl UploadDaemon {
    pub fn new(registry: Arc<JobRegistry>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            registry,
            store,
            queue: WorkQueue::new("upload", Stage::Upload),
            worker: WorkerSlot::default(),
        }
    }

    /// Starts the worker. Calling it again while it runs does nothing.
    pub async fn start(self: &Arc<Self>) {
        let daemon = self.clone();
        if self.worker.start(move |cancel| daemon.run(cancel)).await {
            info!("⬆️ Upload daemon started");
        }
    }

    pub async fn stop(&self) {
        self.worker.stop().await;
        info!("⬆️ Upload daemon stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker.is_running().await
    }

    pub async fn enqueue(&self, record_id: RecordId) -> Result<u64, QueueError> {
        let record = self
            .registry
            .record(record_id)
            .await
            .ok_or(QueueError::UnknownRecord(record_id))?;
        let ticket = self.queue.push(&record).await?;
        info!(
            "📦 Queued {} for upload at position {} ({} waiting)",
            record_id,
            ticket.number,
            self.queue.len()
        );
        Ok(ticket.number)
    }

    /// Forwards encoded variants into the upload queue until every sender is gone.
    pub fn spawn_handoff(
        self: &Arc<Self>,
        mut completed: mpsc::UnboundedReceiver<EncodeCompleted>,
    ) -> JoinHandle<()> {
        let daemon = self.clone();
        tokio::spawn(async move {
            while let Some(event) = completed.recv().await {
                info!(
                    "🔁 Encoded {} of video {} handed to upload",
                    event.record_id, event.video_token
                );
                if let Err(e) = daemon.enqueue(event.record_id).await {
                    error!("❌ Could not queue encoded {} for upload: {}", event.record_id, e);
                    if let Some(record) = daemon.registry.record(event.record_id).await {
                        record.write().await.upload.fail(e.to_string());
                    }
                }
            }
        })
    }

    pub fn current_position(&self) -> u64 {
        self.queue.current_position()
    }

    pub async fn lookup_by_token(&self, token: &Uuid) -> Option<Arc<VideoJob>> {
        self.registry.lookup_by_token(token).await
    }

    pub async fn lookup_by_hash(&self, hash: &str) -> Option<Arc<VideoJob>> {
        self.registry.lookup_by_hash(hash).await
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let ticket = tokio::select! {
                _ = cancel.cancelled() => break,
                ticket = self.queue.pop() => match ticket {
                    Some(ticket) => ticket,
                    None => break,
                },
            };
            self.process(ticket).await;
        }
    }

    async fn process(&self, ticket: Ticket) {
        let Some(record) = self.registry.record(ticket.record_id).await else {
            warn!("Upload ticket {} points to a missing record", ticket.number);
            return;
        };

        let (path, video_token) = {
            let guard = record.read().await;
            (guard.upload_path().to_path_buf(), guard.video_token)
        };
        info!("⬆️ Uploading {} (ticket {})", path.display(), ticket.number);

        match self.upload_file(&record, &path).await {
            Ok(hash) => {
                {
                    let mut guard = record.write().await;
                    guard.upload.succeed();
                    guard.set_content_hash(hash.clone());
                }
                self.registry.index_hash(&hash, video_token).await;
                info!("✅ Uploaded {} as {}", path.display(), hash);
            }
            Err(e) => {
                error!("❌ Failed to upload {}: {}", path.display(), e);
                record.write().await.upload.fail(e.to_string());
            }
        }
    }

    async fn upload_file(&self, record: &SharedRecord, path: &Path) -> Result<String, StoreError> {
        let total = tokio::fs::metadata(path).await?.len();
        let (tx, rx) = mpsc::channel(32);
        let operation = self.store.add(path, tx);
        run_with_progress(record, Stage::Upload, operation, rx, |bytes| {
            percent_of(bytes, total)
        })
        .await
    }
}
