use utoipa::OpenApi;
use crate::common::response::ErrorResponse;
use crate::modules::video::dto::*;
use crate::modules::video::model::VideoSize;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::get_progress_by_token,
        crate::modules::video::handler::get_progress_by_hash,
    ),
    components(
        schemas(
            UploadResponse, ProgressResponse, EncodedVideoProgress, VideoSize, ErrorResponse,
        )
    ),
    tags(
        (name = "Video", description = "Video upload, encoding and IPFS progress")
    )
)]
pub struct ApiDoc;
