use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Position-left value reported for a record that has not been queued yet.
pub const POSITION_UNKNOWN: i64 = 999;

/// Output resolution of an encoded variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum VideoSize {
    #[serde(rename = "720p")]
    F720p,
    #[serde(rename = "480p")]
    F480p,
}

impl VideoSize {
    /// Lenient parse: anything not recognized becomes 720p.
    pub fn parse_lenient(tag: &str) -> Self {
        match tag {
            "480p" => VideoSize::F480p,
            _ => VideoSize::F720p,
        }
    }

    /// Parses a comma separated format list. Duplicates and order are kept,
    /// and an empty entry counts as 720p like any other unknown tag.
    pub fn parse_list(formats: &str) -> Vec<Self> {
        formats.split(',').map(Self::parse_lenient).collect()
    }

    pub fn height(&self) -> u32 {
        match self {
            VideoSize::F720p => 720,
            VideoSize::F480p => 480,
        }
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSize::F720p => write!(f, "720p"),
            VideoSize::F480p => write!(f, "480p"),
        }
    }
}

/// Stable handle of a record inside the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(pub(crate) usize);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of one record through one daemon (encode or upload).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageState {
    pub progress: u8,
    pub last_progress_at: Option<OffsetDateTime>,
    pub error: Option<String>,
    /// 0 until the record is enqueued, then the ticket handed out by the daemon.
    pub queue_position: u64,
}

impl StageState {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_succeeded(&self) -> bool {
        self.error.is_none() && self.progress == 100
    }

    pub fn is_terminal(&self) -> bool {
        self.is_failed() || self.is_succeeded()
    }

    pub fn enqueued(&mut self, ticket: u64) {
        self.queue_position = ticket;
        self.progress = 0;
    }

    /// Progress never goes backwards and stays below 100 until `succeed`.
    pub fn report_progress(&mut self, percent: u8) {
        if self.is_terminal() {
            return;
        }
        let percent = percent.min(99);
        if percent >= self.progress {
            self.progress = percent;
            self.last_progress_at = Some(OffsetDateTime::now_utc());
        }
    }

    pub fn succeed(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.progress = 100;
        self.last_progress_at = Some(OffsetDateTime::now_utc());
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.error = Some(reason.into());
        self.last_progress_at = Some(OffsetDateTime::now_utc());
    }

    /// Distance to the head of the queue, or the 999 sentinel when not queued.
    pub fn position_left(&self, current_position: u64) -> i64 {
        if self.queue_position == 0 {
            POSITION_UNKNOWN
        } else {
            self.queue_position as i64 - current_position as i64
        }
    }
}

/// State for one physical file: the uploaded source or one encoded variant.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: RecordId,
    pub video_token: Uuid,
    /// `None` for the source record.
    pub video_size: Option<VideoSize>,
    pub source_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub encode: StageState,
    pub upload: StageState,
    pub content_hash: Option<String>,
}

impl JobRecord {
    pub fn source(id: RecordId, video_token: Uuid, source_path: PathBuf) -> Self {
        Self {
            id,
            video_token,
            video_size: None,
            source_path,
            output_path: None,
            encode: StageState::default(),
            upload: StageState::default(),
            content_hash: None,
        }
    }

    pub fn variant(
        id: RecordId,
        video_token: Uuid,
        source_path: PathBuf,
        output_path: PathBuf,
        size: VideoSize,
    ) -> Self {
        Self {
            id,
            video_token,
            video_size: Some(size),
            source_path,
            output_path: Some(output_path),
            encode: StageState::default(),
            upload: StageState::default(),
            content_hash: None,
        }
    }

    /// File handed to the content store: the encoded output for variants.
    pub fn upload_path(&self) -> &Path {
        self.output_path.as_deref().unwrap_or(&self.source_path)
    }

    /// Records the content hash once; later calls are ignored.
    pub fn set_content_hash(&mut self, hash: String) -> bool {
        if self.content_hash.is_some() {
            return false;
        }
        self.content_hash = Some(hash);
        true
    }
}

/// One submission: the source record plus its variants in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoJob {
    pub progress_token: Uuid,
    pub source: RecordId,
    pub variants: Vec<RecordId>,
}
