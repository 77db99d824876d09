use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

pub const FORMATS_FIELD: &str = "videoEncodingFormats";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Stream interrupted: {0}")]
    Stream(#[from] MultipartError),

    #[error("Failed to write upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("No file found in multipart request")]
    MissingFile,
}

/// What a multipart upload carried besides the file bytes.
#[derive(Debug, Default)]
pub struct ReceivedUpload {
    pub bytes: u64,
    pub formats: Option<String>,
}

/// Streams one multipart field into `path`, returning the number of bytes written.
pub async fn stream_to_file(mut field: Field<'_>, path: &Path) -> Result<u64, UploadError> {
    let mut writer = BufWriter::new(File::create(path).await?);
    let mut written = 0u64;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                error!("Stream error: {}", e);
                return Err(UploadError::Stream(e));
            }
        };
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

/// Reads the multipart body: the first file part goes to `path`, and a
/// `videoEncodingFormats` text part is picked up if present.
pub async fn receive_upload(
    multipart: &mut Multipart,
    path: &Path,
) -> Result<ReceivedUpload, UploadError> {
    let mut received = ReceivedUpload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        if name == FORMATS_FIELD {
            received.formats = Some(field.text().await?);
        } else if !has_file && (field.file_name().is_some() || name == "file") {
            let file_name = field.file_name().unwrap_or("video").to_string();
            info!("Receiving upload {} into {}", file_name, path.display());
            received.bytes = stream_to_file(field, path).await?;
            has_file = true;
        }
    }

    if !has_file {
        return Err(UploadError::MissingFile);
    }
    Ok(received)
}
