use super::dto::{EncodedVideoProgress, ProgressResponse};
use super::model::{VideoJob, VideoSize};
use crate::state::AppState;
use crate::workers::queue::QueueError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("token not exist")]
    TokenNotFound,

    #[error("hash not exist")]
    HashNotFound,

    #[error("Failed to queue job: {0}")]
    Queue(#[from] QueueError),

    #[error("Job record {0} is missing")]
    MissingRecord(String),
}

pub struct VideoService;

impl VideoService {
    /// Registers a submission and queues its work. Returns without waiting for any of it.
    pub async fn submit(
        state: &AppState,
        source_path: PathBuf,
        formats: &[VideoSize],
    ) -> Result<Arc<VideoJob>, VideoError> {
        let variants = formats
            .iter()
            .map(|size| (*size, state.temp_files.new_temp_path(Some("mp4"))))
            .collect();

        let video = state.registry.create_video(source_path, variants).await;

        // The original goes out right away, in parallel with the encodes.
        state.upload_daemon.enqueue(video.source).await?;
        for id in &video.variants {
            state.encode_daemon.enqueue(*id).await?;
        }

        info!(
            "🎬 Video {} submitted with {} variant(s)",
            video.progress_token,
            video.variants.len()
        );
        Ok(video)
    }

    pub async fn progress_by_token(
        state: &AppState,
        token: &str,
    ) -> Result<ProgressResponse, VideoError> {
        let token = Uuid::parse_str(token).map_err(|_| VideoError::TokenNotFound)?;
        let video = state
            .upload_daemon
            .lookup_by_token(&token)
            .await
            .ok_or(VideoError::TokenNotFound)?;
        Self::snapshot(state, &video).await
    }

    pub async fn progress_by_hash(
        state: &AppState,
        hash: &str,
    ) -> Result<ProgressResponse, VideoError> {
        let video = state
            .upload_daemon
            .lookup_by_hash(hash)
            .await
            .ok_or(VideoError::HashNotFound)?;
        Self::snapshot(state, &video).await
    }

    pub async fn snapshot(state: &AppState, video: &VideoJob) -> Result<ProgressResponse, VideoError> {
        let upload_position = state.upload_daemon.current_position();
        let encode_position = state.encode_daemon.current_position();

        let source = state
            .registry
            .snapshot(video.source)
            .await
            .ok_or_else(|| VideoError::MissingRecord(video.source.to_string()))?;

        let mut encoded_videos = Vec::with_capacity(video.variants.len());
        for id in &video.variants {
            let record = state
                .registry
                .snapshot(*id)
                .await
                .ok_or_else(|| VideoError::MissingRecord(id.to_string()))?;
            encoded_videos.push(EncodedVideoProgress::from_record(
                &record,
                encode_position,
                upload_position,
            ));
        }

        Ok(ProgressResponse::new(&source, upload_position, encoded_videos))
    }
}
