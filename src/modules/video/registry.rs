use super::model::{JobRecord, RecordId, VideoJob, VideoSize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub type SharedRecord = Arc<RwLock<JobRecord>>;

/// Arena of job records plus the token and content-hash indexes pollers use.
///
/// Each record has its own lock, so a worker writing progress never contends
/// with lookups on the indexes.
#[derive(Default)]
pub struct JobRegistry {
    records: RwLock<Vec<SharedRecord>>,
    by_token: RwLock<HashMap<Uuid, Arc<VideoJob>>>,
    by_hash: RwLock<HashMap<String, Uuid>>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocates the source and variant records and registers the job under a fresh token.
    pub async fn create_video(
        &self,
        source_path: PathBuf,
        variants: Vec<(VideoSize, PathBuf)>,
    ) -> Arc<VideoJob> {
        let mut by_token = self.by_token.write().await;
        let mut progress_token = Uuid::new_v4();
        while by_token.contains_key(&progress_token) {
            progress_token = Uuid::new_v4();
        }

        let (source, variant_ids) = {
            let mut records = self.records.write().await;

            let source = RecordId(records.len());
            records.push(Arc::new(RwLock::new(JobRecord::source(
                source,
                progress_token,
                source_path.clone(),
            ))));

            let mut variant_ids = Vec::with_capacity(variants.len());
            for (size, output_path) in variants {
                let id = RecordId(records.len());
                records.push(Arc::new(RwLock::new(JobRecord::variant(
                    id,
                    progress_token,
                    source_path.clone(),
                    output_path,
                    size,
                ))));
                variant_ids.push(id);
            }
            (source, variant_ids)
        };

        let video = Arc::new(VideoJob {
            progress_token,
            source,
            variants: variant_ids,
        });
        by_token.insert(progress_token, video.clone());
        debug!("Registered video job {}", progress_token);
        video
    }

    pub async fn record(&self, id: RecordId) -> Option<SharedRecord> {
        self.records.read().await.get(id.0).cloned()
    }

    /// Consistent copy of a record for readers.
    pub async fn snapshot(&self, id: RecordId) -> Option<JobRecord> {
        let record = self.record(id).await?;
        let guard = record.read().await;
        Some(guard.clone())
    }

    pub async fn lookup_by_token(&self, token: &Uuid) -> Option<Arc<VideoJob>> {
        self.by_token.read().await.get(token).cloned()
    }

    pub async fn lookup_by_hash(&self, hash: &str) -> Option<Arc<VideoJob>> {
        let token = *self.by_hash.read().await.get(hash)?;
        self.lookup_by_token(&token).await
    }

    /// Indexes a video job under a content hash. The first job to produce a hash keeps it.
    pub async fn index_hash(&self, hash: &str, token: Uuid) {
        self.by_hash
            .write()
            .await
            .entry(hash.to_string())
            .or_insert(token);
    }
}
