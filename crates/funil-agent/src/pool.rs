// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool draining the inbound webhook queue.
//!
//! The gateway enqueues and acks immediately; a fixed set of workers drains
//! the queue. The bound is the backpressure: when the queue is full the
//! event is dropped with a warning and the upstream channel's redelivery
//! brings it back.

use std::sync::Arc;

use funil_core::types::InboundEvent;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::processor::MessageProcessor;

/// Producer side of the inbound queue, held by the gateway.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<InboundEvent>,
}

impl QueueHandle {
    /// Enqueue an event without waiting. Returns `false` when the queue is
    /// full and the event was dropped.
    pub fn enqueue(&self, event: InboundEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    phone = event.phone.as_str(),
                    "inbound queue full, dropping event (upstream will redeliver)"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                error!(phone = event.phone.as_str(), "inbound queue closed, dropping event");
                false
            }
        }
    }
}

/// A fixed pool of workers processing inbound events.
pub struct WorkerPool {
    tx: mpsc::Sender<InboundEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks draining a queue of `capacity` events.
    pub fn spawn(
        processor: Arc<MessageProcessor>,
        workers: usize,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<InboundEvent>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let processor = processor.clone();
            let rx = rx.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only while waiting; processing
                    // runs unlocked so workers stay concurrent.
                    let event = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            event = rx.recv() => event,
                            _ = cancel.cancelled() => None,
                        }
                    };
                    let Some(event) = event else { break };

                    match processor.process(event).await {
                        Ok(disposition) => {
                            tracing::debug!(worker_id, ?disposition, "event processed")
                        }
                        Err(e) => error!(worker_id, error = %e, "event processing failed"),
                    }
                }
                info!(worker_id, "worker stopped");
            }));
        }

        info!(workers, capacity, "worker pool started");
        Self { tx, handles }
    }

    /// Producer handle for the gateway.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Close the queue and wait for the workers to drain what they hold.
    pub async fn join(self) {
        drop(self.tx);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked");
            }
        }
    }
}
