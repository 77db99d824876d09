use super::{ContentStore, StoreError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// One line of the newline-delimited JSON returned by `/api/v0/add`.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct AddEvent {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Hash", default)]
    pub hash: Option<String>,
    #[serde(rename = "Bytes", default)]
    pub bytes: Option<u64>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// Client for the IPFS daemon's HTTP RPC API.
#[derive(Clone)]
pub struct IpfsClient {
    client: reqwest::Client,
    api_url: String,
}

impl IpfsClient {
    pub fn new(api_url: &str) -> Self {
        info!("✅ Using IPFS API at {}", api_url);
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn add_url(&self) -> String {
        format!("{}/api/v0/add?progress=true&pin=true", self.api_url)
    }
}

/// Parses one response line. Blank lines yield `None`.
pub fn parse_add_line(line: &[u8]) -> Result<Option<AddEvent>, StoreError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    let event: AddEvent = serde_json::from_slice(line)?;
    Ok(Some(event))
}

fn apply_event(
    event: AddEvent,
    progress: &mpsc::Sender<u64>,
    hash: &mut Option<String>,
) -> Result<(), StoreError> {
    if let Some(message) = event.message {
        return Err(StoreError::Api {
            status: 200,
            message,
        });
    }
    if let Some(found) = event.hash {
        *hash = Some(found);
    } else if let Some(bytes) = event.bytes {
        // Dropped reports are fine, the next one supersedes them.
        let _ = progress.try_send(bytes);
    }
    Ok(())
}

#[async_trait]
impl ContentStore for IpfsClient {
    async fn add(&self, path: &Path, progress: mpsc::Sender<u64>) -> Result<String, StoreError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, len).file_name(file_name);
        let form = Form::new().part("file", part);

        let response = self.client.post(self.add_url()).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut hash = None;

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(event) = parse_add_line(&line)? {
                    apply_event(event, &progress, &mut hash)?;
                }
            }
        }
        if let Some(event) = parse_add_line(&buffer)? {
            apply_event(event, &progress, &mut hash)?;
        }

        let hash = hash.ok_or(StoreError::MissingHash)?;
        debug!("IPFS add {} -> {}", path.display(), hash);
        Ok(hash)
    }
}
