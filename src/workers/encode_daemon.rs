use super::progress::run_with_progress;
use super::queue::{QueueError, Stage, Ticket, WorkQueue, WorkerSlot};
use crate::common::temp_file::TempFileManager;
use crate::infrastructure::transcode::Transcoder;
use crate::modules::video::events::EncodeCompleted;
use crate::modules::video::model::RecordId;
use crate::modules::video::registry::JobRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Single worker that transcodes variants one at a time, in ticket order.
pub struct EncodeDaemon {
    registry: Arc<JobRegistry>,
    transcoder: Arc<dyn Transcoder>,
    completed: mpsc::UnboundedSender<EncodeCompleted>,
    queue: WorkQueue,
    worker: WorkerSlot,
}

impl EncodeDaemon {
    pub fn new(
        registry: Arc<JobRegistry>,
        transcoder: Arc<dyn Transcoder>,
        completed: mpsc::UnboundedSender<EncodeCompleted>,
    ) -> Self {
        Self {
            registry,
            transcoder,
            completed,
            queue: WorkQueue::new("encode", Stage::Encode),
            worker: WorkerSlot::default(),
        }
    }

    /// Starts the worker. Calling it again while it runs does nothing.
    pub async fn start(self: &Arc<Self>) {
        let daemon = self.clone();
        if self.worker.start(move |cancel| daemon.run(cancel)).await {
            info!("🎥 Encode daemon started");
        }
    }

    pub async fn stop(&self) {
        self.worker.stop().await;
        info!("🎥 Encode daemon stopped");
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
            "📦 Queued {} for encoding at position {} ({} waiting)",
            record_id,
            ticket.number,
            self.queue.len()
        );
        Ok(ticket.number)
    }

    pub fn current_position(&self) -> u64 {
        self.queue.current_position()
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
            warn!("Encode ticket {} points to a missing record", ticket.number);
            return;
        };

        let (input, output, size, video_token) = {
            let guard = record.read().await;
            (
                guard.source_path.clone(),
                guard.output_path.clone(),
                guard.video_size,
                guard.video_token,
            )
        };
        let (Some(output), Some(size)) = (output, size) else {
            record
                .write()
                .await
                .encode
                .fail("source record has no encode target");
            return;
        };

        info!(
            "🎥 Encoding {} to {} (ticket {})",
            input.display(),
            size,
            ticket.number
        );

        let (tx, rx) = mpsc::channel(32);
        let operation = self.transcoder.transcode(&input, &output, size, tx);
        let result = run_with_progress(&record, Stage::Encode, operation, rx, |p| p).await;

        match result {
            Ok(()) => {
                record.write().await.encode.succeed();
                info!("✅ Encoded {} to {}", input.display(), size);

                let event = EncodeCompleted {
                    record_id: ticket.record_id,
                    video_token,
                };
                if self.completed.send(event).is_err() {
                    error!("❌ Upload handoff is gone, {} will not be uploaded", ticket.record_id);
                    record
                        .write()
                        .await
                        .upload
                        .fail("upload stage is not running");
                }
            }
            Err(e) => {
                error!("❌ Failed to encode {} to {}: {}", input.display(), size, e);
                record.write().await.encode.fail(e.to_string());
                TempFileManager::safe_delete(&output).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::video::model::VideoSize;
    use crate::workers::testing::{wait_until, FakeTranscoder};

    async fn daemon_with(
        transcoder: FakeTranscoder,
    ) -> (
        Arc<JobRegistry>,
        Arc<EncodeDaemon>,
        mpsc::UnboundedReceiver<EncodeCompleted>,
    ) {
        let registry = JobRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let daemon = Arc::new(EncodeDaemon::new(registry.clone(), Arc::new(transcoder), tx));
        (registry, daemon, rx)
    }

    #[tokio::test]
    async fn test_success_emits_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, daemon, mut rx) = daemon_with(FakeTranscoder::default()).await;
        let video = registry
            .create_video(
                dir.path().join("source.mkv"),
                vec![(VideoSize::F720p, dir.path().join("out-720.mp4"))],
            )
            .await;

        assert_eq!(daemon.enqueue(video.variants[0]).await.unwrap(), 1);
        daemon.start().await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.record_id, video.variants[0]);
        assert_eq!(event.video_token, video.progress_token);

        let record = registry.snapshot(video.variants[0]).await.unwrap();
        assert_eq!(record.encode.progress, 100);
        assert!(record.encode.error.is_none());
        assert_eq!(record.upload.queue_position, 0);
        assert_eq!(daemon.current_position(), 1);

        daemon.stop().await;
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_not_forwarded() {
        let transcoder = FakeTranscoder::default().failing(VideoSize::F480p);
        let dir = tempfile::tempdir().unwrap();
        let (registry, daemon, mut rx) = daemon_with(transcoder).await;
        let video = registry
            .create_video(
                dir.path().join("source.mkv"),
                vec![
                    (VideoSize::F480p, dir.path().join("out-480.mp4")),
                    (VideoSize::F720p, dir.path().join("out-720.mp4")),
                ],
            )
            .await;

        for id in &video.variants {
            daemon.enqueue(*id).await.unwrap();
        }
        daemon.start().await;

        // Only the healthy sibling reaches the handoff.
        let event = rx.recv().await.unwrap();
        assert_eq!(event.record_id, video.variants[1]);

        let failed = registry.snapshot(video.variants[0]).await.unwrap();
        assert!(failed.encode.error.is_some());
        assert!(failed.encode.progress < 100);
        assert_eq!(failed.upload.queue_position, 0);

        daemon.stop().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_worker() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, daemon, mut rx) = daemon_with(FakeTranscoder::default()).await;
        daemon.start().await;
        daemon.start().await;
        assert!(daemon.is_running().await);

        let video = registry
            .create_video(
                dir.path().join("source.mkv"),
                vec![
                    (VideoSize::F720p, dir.path().join("a.mp4")),
                    (VideoSize::F480p, dir.path().join("b.mp4")),
                ],
            )
            .await;
        for id in &video.variants {
            daemon.enqueue(*id).await.unwrap();
        }

        assert_eq!(rx.recv().await.unwrap().record_id, video.variants[0]);
        assert_eq!(rx.recv().await.unwrap().record_id, video.variants[1]);

        daemon.stop().await;
        assert!(!daemon.is_running().await);
    }

    #[tokio::test]
    async fn test_item_in_progress_reports_zero_left() {
        let transcoder = FakeTranscoder::gated();
        let gate = transcoder.gate();
        let dir = tempfile::tempdir().unwrap();
        let (registry, daemon, mut rx) = daemon_with(transcoder).await;
        let video = registry
            .create_video(
                dir.path().join("source.mkv"),
                vec![
                    (VideoSize::F720p, dir.path().join("a.mp4")),
                    (VideoSize::F480p, dir.path().join("b.mp4")),
                ],
            )
            .await;
        for id in &video.variants {
            daemon.enqueue(*id).await.unwrap();
        }
        daemon.start().await;

        wait_until(|| daemon.current_position() == 1).await;
        let first = registry.snapshot(video.variants[0]).await.unwrap();
        let second = registry.snapshot(video.variants[1]).await.unwrap();
        assert_eq!(first.encode.position_left(daemon.current_position()), 0);
        assert_eq!(second.encode.position_left(daemon.current_position()), 1);

        gate.add_permits(2);
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        daemon.stop().await;
    }
}
