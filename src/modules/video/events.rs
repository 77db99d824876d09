use super::model::RecordId;
use uuid::Uuid;

/// Emitted by the encode daemon when a variant finished encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeCompleted {
    pub record_id: RecordId,
    pub video_token: Uuid,
}
