use crate::modules::video::model::VideoSize;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod ffmpeg;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while transcoding: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Transcodes `input` into `output` at the given size, reporting whole-percent progress.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        size: VideoSize,
        progress: mpsc::Sender<u8>,
    ) -> Result<(), TranscodeError>;
}
