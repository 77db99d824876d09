use serde::Deserialize;
use std::path::PathBuf;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub temp_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub encode_preset: String,
    pub ipfs_api_url: String,
}

impl AppConfig {
    /// Every key has a default, so this only fails on a temp dir that is not valid unicode.
    pub fn new() -> Result<Self, std::env::VarError> {
        let temp_dir = match env::get(EnvKey::TempDir) {
            Ok(dir) => PathBuf::from(dir),
            Err(std::env::VarError::NotPresent) => std::env::temp_dir().join("ipfs-video"),
            Err(e) => return Err(e),
        };

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            temp_dir,
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe"),
            encode_preset: env::get_or(EnvKey::EncodePreset, "fast"),
            ipfs_api_url: env::get_or(EnvKey::IpfsApiUrl, "http://127.0.0.1:5001"),
        })
    }
}
