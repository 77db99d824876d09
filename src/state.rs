use crate::common::temp_file::TempFileManager;
use crate::modules::video::registry::JobRegistry;
use crate::workers::encode_daemon::EncodeDaemon;
use crate::workers::upload_daemon::UploadDaemon;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub upload_daemon: Arc<UploadDaemon>,
    pub encode_daemon: Arc<EncodeDaemon>,
    pub temp_files: TempFileManager,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        upload_daemon: Arc<UploadDaemon>,
        encode_daemon: Arc<EncodeDaemon>,
        temp_files: TempFileManager,
    ) -> Self {
        Self {
            registry,
            upload_daemon,
            encode_daemon,
            temp_files,
        }
    }
}
