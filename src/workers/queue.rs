//! FIFO work queue shared by the encode and upload daemons.
//!
//! Tickets are handed out under a single lock together with the channel push,
//! so ticket order always equals processing order.

use crate::modules::video::model::{JobRecord, RecordId, StageState};
use crate::modules::video::registry::SharedRecord;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("record {0} does not exist")]
    UnknownRecord(RecordId),

    #[error("{0} queue is closed")]
    Closed(&'static str),
}

/// Which half of a record a daemon owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    Upload,
}

impl Stage {
    pub fn state_mut<'a>(&self, record: &'a mut JobRecord) -> &'a mut StageState {
        match self {
            Stage::Encode => &mut record.encode,
            Stage::Upload => &mut record.upload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub number: u64,
    pub record_id: RecordId,
}

pub struct WorkQueue {
    name: &'static str,
    stage: Stage,
    last_ticket: Mutex<u64>,
    current: AtomicU64,
    tx: async_channel::Sender<Ticket>,
    rx: async_channel::Receiver<Ticket>,
}

impl WorkQueue {
    pub fn new(name: &'static str, stage: Stage) -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            name,
            stage,
            last_ticket: Mutex::new(0),
            current: AtomicU64::new(0),
            tx,
            rx,
        }
    }

    /// Assigns the next ticket to the record and appends it to the queue.
    pub async fn push(&self, record: &SharedRecord) -> Result<Ticket, QueueError> {
        let mut last_ticket = self.last_ticket.lock().await;
        let mut guard = record.write().await;

        let ticket = Ticket {
            number: *last_ticket + 1,
            record_id: guard.id,
        };
        self.tx
            .try_send(ticket)
            .map_err(|_| QueueError::Closed(self.name))?;

        self.stage.state_mut(&mut guard).enqueued(ticket.number);
        *last_ticket = ticket.number;
        Ok(ticket)
    }

    /// Waits for the next ticket. The current position moves as soon as it is popped.
    pub async fn pop(&self) -> Option<Ticket> {
        let ticket = self.rx.recv().await.ok()?;
        self.current.store(ticket.number, Ordering::SeqCst);
        Some(ticket)
    }

    pub fn current_position(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

/// Holds the single worker task of a daemon.
#[derive(Default)]
pub struct WorkerSlot {
    inner: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl WorkerSlot {
    /// Spawns the worker unless one is already running. Returns whether it spawned.
    pub async fn start<F, Fut>(&self, spawn: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.inner.lock().await;
        if let Some((_, handle)) = slot.as_ref() {
            if !handle.is_finished() {
                return false;
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(spawn(cancel.clone()));
        *slot = Some((cancel, handle));
        true
    }

    /// Cancels the worker between items and waits for it to exit.
    pub async fn stop(&self) {
        let Some((cancel, handle)) = self.inner.lock().await.take() else {
            return;
        };
        cancel.cancel();
        if let Err(e) = handle.await {
            error!("Worker task ended abnormally: {}", e);
        }
    }

    pub async fn is_running(&self) -> bool {
        match self.inner.lock().await.as_ref() {
            Some((_, handle)) => !handle.is_finished(),
            None => false,
        }
    }
}
