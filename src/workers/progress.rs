use super::queue::Stage;
use crate::modules::video::registry::SharedRecord;
use std::future::Future;
use tokio::sync::mpsc;

/// Runs a long operation while applying its progress reports to one stage of a record.
pub async fn run_with_progress<T, R>(
    record: &SharedRecord,
    stage: Stage,
    operation: impl Future<Output = R>,
    mut updates: mpsc::Receiver<T>,
    to_percent: impl Fn(T) -> u8,
) -> R {
    tokio::pin!(operation);

    let result = loop {
        tokio::select! {
            result = &mut operation => break result,
            Some(update) = updates.recv() => {
                let percent = to_percent(update);
                stage.state_mut(&mut *record.write().await).report_progress(percent);
            }
        }
    };

    // Reports sent right before the operation finished.
    while let Ok(update) = updates.try_recv() {
        let percent = to_percent(update);
        stage.state_mut(&mut *record.write().await).report_progress(percent);
    }

    result
}

/// Share of `total` covered by `done`, as a whole percentage.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (done.min(total).saturating_mul(100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::video::registry::JobRegistry;
    use std::path::PathBuf;

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(300, 200), 100);
    }

    #[tokio::test]
    async fn test_progress_applied_while_running() {
        let registry = JobRegistry::new();
        let video = registry
            .create_video(PathBuf::from("/tmp/source"), Vec::new())
            .await;
        let record = registry.record(video.source).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let operation = async move {
            tx.send(10u8).await.unwrap();
            tx.send(60u8).await.unwrap();
            "done"
        };

        let result = run_with_progress(&record, Stage::Upload, operation, rx, |p| p).await;

        assert_eq!(result, "done");
        let snapshot = record.read().await.clone();
        assert_eq!(snapshot.upload.progress, 60);
        assert!(snapshot.upload.last_progress_at.is_some());
        assert_eq!(snapshot.encode.progress, 0);
    }
}
