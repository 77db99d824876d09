use super::dto::{ProgressResponse, UploadParams, UploadResponse};
use super::model::VideoSize;
use super::service::VideoService;
use crate::common::response::{ApiError, ApiSuccess, ErrorResponse};
use crate::common::temp_file::TempFileManager;
use crate::common::upload::receive_upload;
use crate::state::AppState;
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};

/// Upload a video
/// Streams the file to disk, queues the IPFS upload of the original and one
/// encode per requested format.
#[utoipa::path(
    post,
    path = "/upload",
    params(UploadParams),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video queued", body = UploadResponse),
        (status = 400, description = "Upload failed", body = ErrorResponse)
    ),
    tag = "Video"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    params: Result<Query<UploadParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let Query(params) = match params {
        Ok(q) => q,
        Err(e) => return ApiError(e.body_text(), StatusCode::BAD_REQUEST).into_response(),
    };
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => return ApiError(e.body_text(), StatusCode::BAD_REQUEST).into_response(),
    };

    let source_path = state.temp_files.new_temp_path(None);

    let received = match receive_upload(&mut multipart, &source_path).await {
        Ok(received) => received,
        Err(e) => {
            error!("❌ Upload failed: {}", e);
            TempFileManager::safe_delete(&source_path).await;
            return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
        }
    };
    info!("Received {} bytes into {}", received.bytes, source_path.display());

    let formats = params
        .video_encoding_formats
        .or(received.formats)
        .map(|f| VideoSize::parse_list(&f))
        .unwrap_or_default();

    match VideoService::submit(&state, source_path.clone(), &formats).await {
        Ok(video) => ApiSuccess(
            UploadResponse {
                success: true,
                token: video.progress_token,
            },
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => {
            error!("❌ Failed to queue upload: {}", e);
            TempFileManager::safe_delete(&source_path).await;
            ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
    }
}

/// Get progress by token
#[utoipa::path(
    get,
    path = "/getProgressByToken/{token}",
    params(
        ("token" = String, Path, description = "Progress token returned by /upload")
    ),
    responses(
        (status = 200, description = "Progress snapshot", body = ProgressResponse),
        (status = 400, description = "Unknown token", body = ErrorResponse)
    ),
    tag = "Video"
)]
pub async fn get_progress_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match VideoService::progress_by_token(&state, &token).await {
        Ok(res) => ApiSuccess(res, StatusCode::OK).into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

/// Get progress by source hash
#[utoipa::path(
    get,
    path = "/getProgressByHash/{sourceHash}",
    params(
        ("sourceHash" = String, Path, description = "Content hash of the uploaded original")
    ),
    responses(
        (status = 200, description = "Progress snapshot", body = ProgressResponse),
        (status = 400, description = "Unknown hash", body = ErrorResponse)
    ),
    tag = "Video"
)]
pub async fn get_progress_by_hash(
    State(state): State<AppState>,
    Path(source_hash): Path<String>,
) -> impl IntoResponse {
    match VideoService::progress_by_hash(&state, &source_hash).await {
        Ok(res) => ApiSuccess(res, StatusCode::OK).into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}
