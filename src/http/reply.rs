//! Deferred reply trigger.
//!
//! Workers never touch sockets. A reply is buffered into a [`Reply`] and sent
//! through a one-shot channel whose receiving end is awaited by the
//! connection's service future on the reactor thread. The reactor wakes on its
//! next poll, turns the record into a response and transmits it.

use bytes::Bytes;
use hyper::StatusCode;
use tokio::sync::oneshot;

/// A completed reply on its way back to the reactor.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Worker-side half: fires at most once.
#[derive(Debug)]
pub struct ReplyTrigger {
    tx: oneshot::Sender<Reply>,
}

impl ReplyTrigger {
    /// Hand the reply over to the reactor.
    ///
    /// Returns the reply back if the connection has already gone away.
    pub fn fire(self, reply: Reply) -> Result<(), Reply> {
        self.tx.send(reply)
    }
}

/// Reactor-side half, owned by the connection's service future.
#[derive(Debug)]
pub struct PendingReply {
    rx: Option<oneshot::Receiver<Reply>>,
}

impl PendingReply {
    /// Wait for the reply. A trigger dropped without firing yields a bare 500.
    pub async fn wait(mut self) -> Reply {
        match self.rx.take() {
            Some(rx) => rx.await.unwrap_or_else(|_| internal_error()),
            None => internal_error(),
        }
    }

    /// Take the reply if it has already been fired.
    pub fn try_take(&mut self) -> Option<Reply> {
        let reply = self.rx.as_mut()?.try_recv().ok()?;
        self.rx = None;
        Some(reply)
    }
}

/// Create a connected trigger/pending pair for one request.
pub fn reply_channel() -> (ReplyTrigger, PendingReply) {
    let (tx, rx) = oneshot::channel();
    (ReplyTrigger { tx }, PendingReply { rx: Some(rx) })
}

fn internal_error() -> Reply {
    Reply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        headers: Vec::new(),
        body: Bytes::new(),
    }
}
