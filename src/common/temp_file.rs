use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Hands out unique paths inside the service's scratch directory.
#[derive(Clone, Debug)]
pub struct TempFileManager {
    dir: PathBuf,
}

impl TempFileManager {
    pub async fn new(dir: PathBuf) -> io::Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn new_temp_path(&self, extension: Option<&str>) -> PathBuf {
        let name = Uuid::new_v4().simple().to_string();
        match extension {
            Some(ext) => self.dir.join(format!("{}.{}", name, ext)),
            None => self.dir.join(name),
        }
    }

    /// Removes a file, ignoring one that does not exist.
    pub async fn safe_delete(path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Deleted temp file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete temp file {}: {}", path.display(), e),
        }
    }
}
