//! FIFO command connection.
//!
//! A [`Connection`] is a request queue drained by one worker task. Requests
//! are executed strictly in submission order, and each request owns its
//! command (and therefore its payload) until the backplane has answered;
//! the worker then drops it.
//!
//! Submitting never blocks. Callers either await the returned
//! [`PendingReply`] or drop it to fire and forget.

use crate::backplane::Backplane;
use crate::command::{Command, Reply, Transaction};
use crate::error::{BackplaneError, BackplaneResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum Operation {
    Single(Command),
    Atomic(Transaction),
}

struct Request {
    operation: Operation,
    reply: oneshot::Sender<BackplaneResult<Reply>>,
}

/// Handle to a backplane command queue. Cheap to clone; all clones feed the
/// same queue.
#[derive(Debug, Clone)]
pub struct Connection {
    sender: mpsc::UnboundedSender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match &self.operation {
            Operation::Single(command) => command.name(),
            Operation::Atomic(_) => "MULTI/EXEC",
        };
        f.debug_struct("Request").field("operation", &name).finish()
    }
}

impl Connection {
    /// Opens a connection and spawns its worker on the current tokio runtime.
    ///
    /// The worker exits once every clone of the connection is dropped and
    /// the queue has drained.
    pub fn open(backplane: Arc<dyn Backplane>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(backplane, receiver));
        Self { sender }
    }

    /// Queues a single command.
    pub fn submit(&self, command: Command) -> BackplaneResult<PendingReply> {
        self.enqueue(Operation::Single(command))
    }

    /// Queues a transaction to be applied atomically.
    pub fn submit_atomic(&self, transaction: Transaction) -> BackplaneResult<PendingReply> {
        self.enqueue(Operation::Atomic(transaction))
    }

    /// Whether the worker has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn enqueue(&self, operation: Operation) -> BackplaneResult<PendingReply> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Request { operation, reply })
            .map_err(|_| BackplaneError::ConnectionClosed)?;
        Ok(PendingReply { receiver })
    }
}

/// The eventual reply to a queued request.
///
/// Dropping it does not cancel the request.
#[derive(Debug)]
pub struct PendingReply {
    receiver: oneshot::Receiver<BackplaneResult<Reply>>,
}

impl Future for PendingReply {
    type Output = BackplaneResult<Reply>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BackplaneError::ConnectionClosed)))
    }
}

async fn run_worker(backplane: Arc<dyn Backplane>, mut receiver: mpsc::UnboundedReceiver<Request>) {
    debug!("backplane connection worker started");
    while let Some(request) = receiver.recv().await {
        let Request { operation, reply } = request;
        let result = match operation {
            Operation::Single(command) => {
                let name = command.name();
                let result = backplane.execute(command).await;
                if let Err(e) = &result {
                    warn!("{} failed: {}", name, e);
                }
                result
            }
            Operation::Atomic(transaction) => {
                let result = backplane.execute_atomic(transaction).await;
                if let Err(e) = &result {
                    warn!("transaction failed: {}", e);
                }
                result
            }
        };
        // The caller may have dropped its PendingReply.
        let _ = reply.send(result);
    }
    debug!("backplane connection worker stopped");
}
