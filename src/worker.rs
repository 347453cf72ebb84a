//! Single-consumer publishing worker.
//!
//! Callers send raw JSON messages through a [`PublisherHandle`]; one task
//! handles them strictly in arrival order and answers each over a oneshot
//! channel. A caller that stops waiting does not cancel its message.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::messages::{Request, Response};
use crate::service::Publisher;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("publisher worker has stopped")]
    Closed,
    #[error("publisher worker dropped the reply")]
    NoReply,
}

struct Job {
    message: Value,
    reply: oneshot::Sender<Response>,
}

/// Cloneable sender side of the worker queue.
#[derive(Clone)]
pub struct PublisherHandle {
    tx: mpsc::Sender<Job>,
}

impl PublisherHandle {
    /// Queue a raw message and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task is gone.
    pub async fn send(&self, message: Value) -> Result<Response, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { message, reply })
            .await
            .map_err(|_| WorkerError::Closed)?;
        rx.await.map_err(|_| WorkerError::NoReply)
    }

    /// Queue a typed request.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task is gone.
    pub async fn request(&self, request: &Request) -> Result<Response, WorkerError> {
        self.send(request.to_message()).await
    }
}

/// Start the worker. It runs until every handle is dropped.
pub fn spawn(publisher: Publisher, capacity: usize) -> (PublisherHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
    let publisher = Arc::new(publisher);

    let task = tokio::spawn(async move {
        info!("Publisher worker started");
        while let Some(job) = rx.recv().await {
            let response = publisher.handle_value(job.message).await;
            if job.reply.send(response).is_err() {
                debug!("Caller went away before the response was ready");
            }
        }
        info!("Publisher worker stopped");
    });

    (PublisherHandle { tx }, task)
}
