use super::model::{JobRecord, VideoSize};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    /// Comma separated resolutions, e.g. `720p,480p`.
    #[serde(rename = "videoEncodingFormats")]
    pub video_encoding_formats: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub token: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncodedVideoProgress {
    pub encode_progress: u8,
    pub encode_size: Option<VideoSize>,
    #[serde(with = "time::serde::iso8601::option")]
    #[schema(value_type = Option<String>)]
    pub encode_last_time_progress: Option<OffsetDateTime>,
    pub encode_error_message: Option<String>,
    pub encode_position_left: i64,

    pub ipfs_progress: u8,
    pub ipfs_hash: Option<String>,
    #[serde(with = "time::serde::iso8601::option")]
    #[schema(value_type = Option<String>)]
    pub ipfs_last_time_progress: Option<OffsetDateTime>,
    pub ipfs_error_message: Option<String>,
    pub ipfs_position_left: i64,
}

impl EncodedVideoProgress {
    pub fn from_record(record: &JobRecord, encode_position: u64, upload_position: u64) -> Self {
        Self {
            encode_progress: record.encode.progress,
            encode_size: record.video_size,
            encode_last_time_progress: record.encode.last_progress_at,
            encode_error_message: record.encode.error.clone(),
            encode_position_left: record.encode.position_left(encode_position),
            ipfs_progress: record.upload.progress,
            ipfs_hash: record.content_hash.clone(),
            ipfs_last_time_progress: record.upload.last_progress_at,
            ipfs_error_message: record.upload.error.clone(),
            ipfs_position_left: record.upload.position_left(upload_position),
        }
    }
}

/// Progress of a whole submission, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub ipfs_progress: u8,
    pub ipfs_hash: Option<String>,
    #[serde(with = "time::serde::iso8601::option")]
    #[schema(value_type = Option<String>)]
    pub ipfs_last_time_progress: Option<OffsetDateTime>,
    pub ipfs_error_message: Option<String>,
    pub ipfs_position_left: i64,
    pub encoded_videos: Vec<EncodedVideoProgress>,
}

impl ProgressResponse {
    pub fn new(
        source: &JobRecord,
        upload_position: u64,
        encoded_videos: Vec<EncodedVideoProgress>,
    ) -> Self {
        Self {
            ipfs_progress: source.upload.progress,
            ipfs_hash: source.content_hash.clone(),
            ipfs_last_time_progress: source.upload.last_progress_at,
            ipfs_error_message: source.upload.error.clone(),
            ipfs_position_left: source.upload.position_left(upload_position),
            encoded_videos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::video::model::RecordId;
    use std::path::PathBuf;

    #[test]
    fn test_progress_json_field_names() {
        let source = JobRecord::source(RecordId(0), Uuid::new_v4(), PathBuf::from("/tmp/s"));
        let mut variant = JobRecord::variant(
            RecordId(1),
            source.video_token,
            PathBuf::from("/tmp/s"),
            PathBuf::from("/tmp/v.mp4"),
            VideoSize::F480p,
        );
        variant.encode.enqueued(4);

        let response = ProgressResponse::new(
            &source,
            0,
            vec![EncodedVideoProgress::from_record(&variant, 1, 0)],
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["ipfsProgress"], 0);
        assert!(json["ipfsHash"].is_null());
        assert!(json["ipfsLastTimeProgress"].is_null());
        assert_eq!(json["ipfsPositionLeft"], 999);

        let encoded = &json["encodedVideos"][0];
        assert_eq!(encoded["encodeSize"], "480p");
        assert_eq!(encoded["encodePositionLeft"], 3);
        assert_eq!(encoded["ipfsPositionLeft"], 999);
        assert!(encoded["encodeErrorMessage"].is_null());
    }
}
