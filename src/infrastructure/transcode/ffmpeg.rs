use super::{TranscodeError, Transcoder};
use crate::modules::video::model::VideoSize;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const STDERR_TAIL_LINES: usize = 8;

#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
    preset: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: &str, ffprobe_path: &str, preset: &str) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            ffprobe_path: ffprobe_path.to_string(),
            preset: preset.to_string(),
        }
    }

    fn build_args(&self, input: &Path, output: &Path, size: VideoSize) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vf".to_string(),
            format!("scale=-2:{}", size.height()),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.preset.clone(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Duration of the input in microseconds, if ffprobe can tell.
    async fn probe_duration_us(&self, input: &Path) -> Result<Option<u64>, TranscodeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(input)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_duration_us(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses ffprobe's `format=duration` output (seconds) into microseconds.
pub fn parse_duration_us(stdout: &str) -> Option<u64> {
    let seconds: f64 = stdout.trim().parse().ok()?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some((seconds * 1_000_000.0) as u64)
}

/// Reads the encoded position from a `-progress` line. `out_time_ms` is in microseconds too.
pub fn parse_out_time_us(line: &str) -> Option<u64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse().ok(),
        _ => None,
    }
}

pub fn progress_percent(out_time_us: u64, duration_us: u64) -> u8 {
    if duration_us == 0 {
        return 0;
    }
    (out_time_us.min(duration_us) * 100 / duration_us) as u8
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        size: VideoSize,
        progress: mpsc::Sender<u8>,
    ) -> Result<(), TranscodeError> {
        let duration_us = match self.probe_duration_us(input).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!("Could not probe {}: {}", input.display(), e);
                None
            }
        };
        if duration_us.is_none() {
            debug!("Unknown duration for {}, progress will stay at 0", input.display());
        }

        let mut child = Command::new(&self.ffmpeg_path)
            .args(self.build_args(input, output, size))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        // Keep the tail of stderr for the error message.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let (Some(out_time), Some(duration)) = (parse_out_time_us(&line), duration_us) {
                    let _ = progress.try_send(progress_percent(out_time, duration));
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(TranscodeError::Failed {
                status: status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_scales_to_height() {
        let transcoder = FfmpegTranscoder::new("ffmpeg", "ffprobe", "fast");
        let args = transcoder.build_args(
            &PathBuf::from("/tmp/in"),
            &PathBuf::from("/tmp/out.mp4"),
            VideoSize::F480p,
        );

        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=-2:480");
        let progress = args.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(args[progress + 1], "pipe:1");
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[test]
    fn test_parse_out_time() {
        assert_eq!(parse_out_time_us("out_time_us=1500000"), Some(1_500_000));
        assert_eq!(parse_out_time_us("out_time_ms=2000000\n"), Some(2_000_000));
        assert_eq!(parse_out_time_us("out_time=00:00:01.500000"), None);
        assert_eq!(parse_out_time_us("out_time_us=N/A"), None);
        assert_eq!(parse_out_time_us("progress=end"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_us("12.5\n"), Some(12_500_000));
        assert_eq!(parse_duration_us("N/A"), None);
        assert_eq!(parse_duration_us("0"), None);
    }

    #[test]
    fn test_progress_percent_is_clamped() {
        assert_eq!(progress_percent(5_000_000, 10_000_000), 50);
        assert_eq!(progress_percent(11_000_000, 10_000_000), 100);
        assert_eq!(progress_percent(1, 0), 0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let transcoder = FfmpegTranscoder::new(
            "/nonexistent/ffmpeg-binary",
            "/nonexistent/ffprobe-binary",
            "fast",
        );
        let (tx, _rx) = mpsc::channel(4);
        let err = transcoder
            .transcode(
                &PathBuf::from("/tmp/in"),
                &PathBuf::from("/tmp/out.mp4"),
                VideoSize::F720p,
                tx,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Spawn { .. }));
    }
}
