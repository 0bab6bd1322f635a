//! ChannelTransport - in-process duplex transport over tokio channels.
//!
//! The task side holds a [`ChannelTransport`]; the supervisor side drains the
//! paired receiver and answers each [`PendingRequest`] through its oneshot.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::errors::CommsError;
use crate::domain::messages::{RequestFrame, ResponseFrame, ToTask};
use crate::ports::SupervisorTransport;

/// A request waiting for the supervisor's answer.
#[derive(Debug)]
pub struct PendingRequest {
    pub frame: RequestFrame,
    reply: oneshot::Sender<ResponseFrame>,
}

impl PendingRequest {
    /// Sends `body` back, stamped with this request's id.
    pub fn respond(self, body: ToTask) -> Result<(), CommsError> {
        let frame = ResponseFrame {
            id: self.frame.id,
            body,
        };
        self.reply.send(frame).map_err(|_| CommsError::Disconnected)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    requests: mpsc::Sender<PendingRequest>,
}

/// Creates a transport and the receiver the supervisor side serves.
pub fn channel(capacity: usize) -> (ChannelTransport, mpsc::Receiver<PendingRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelTransport { requests: tx }, rx)
}

#[async_trait]
impl SupervisorTransport for ChannelTransport {
    async fn round_trip(&self, frame: RequestFrame) -> Result<ResponseFrame, CommsError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(PendingRequest { frame, reply })
            .await
            .map_err(|_| CommsError::Disconnected)?;
        response.await.map_err(|_| CommsError::Disconnected)
    }
}
