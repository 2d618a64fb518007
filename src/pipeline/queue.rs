//! Bounded FIFO hand-off of block numbers from tracker to enricher.
//!
//! `push` suspends while the queue is full, which is the only backpressure
//! between discovery and enrichment.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::types::BlockNumber;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("block queue closed, block {0} was not handed off")]
pub struct QueueClosed(pub BlockNumber);

pub struct BlockQueueSender {
    tx: mpsc::Sender<BlockNumber>,
}

pub struct BlockQueueReceiver {
    rx: mpsc::Receiver<BlockNumber>,
}

/// Create a queue holding at most `capacity` block numbers (minimum 1).
pub fn block_queue(capacity: usize) -> (BlockQueueSender, BlockQueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BlockQueueSender { tx }, BlockQueueReceiver { rx })
}

impl BlockQueueSender {
    pub async fn push(&self, block_number: BlockNumber) -> Result<(), QueueClosed> {
        self.tx
            .send(block_number)
            .await
            .map_err(|e| QueueClosed(e.0))
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl BlockQueueReceiver {
    /// Next block number, or `None` once the sender is gone and the queue is drained.
    pub async fn pop(&mut self) -> Option<BlockNumber> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
