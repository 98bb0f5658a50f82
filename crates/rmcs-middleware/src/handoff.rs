//! Ownership handoff channel.
//!
//! Every connection holds a [`HandoffSender`]; the arbitration loop owns the
//! single [`HandoffReceiver`]. Requests are delivered in FIFO order and
//! never coalesced: two requests for the same channel are both processed,
//! the later one wins.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use rmcs_types::{HandoffRequest, RmcsError};
use tracing::trace;

use crate::shutdown::Shutdown;

/// Create a connected sender/receiver pair.
pub fn handoff_channel() -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = channel::unbounded();
    (HandoffSender { tx }, HandoffReceiver { rx })
}

/// Producer side. Clone it once per connection.
#[derive(Clone, Debug)]
pub struct HandoffSender {
    tx: Sender<HandoffRequest>,
}

impl HandoffSender {
    /// Enqueue a request. Fails only when the arbitration loop is gone.
    pub fn send(&self, request: HandoffRequest) -> Result<(), RmcsError> {
        trace!(?request, "handoff enqueued");
        self.tx
            .send(request)
            .map_err(|_| RmcsError::ChannelClosed("handoff queue".to_string()))
    }
}

/// Consumer side, owned by the arbitration loop.
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: Receiver<HandoffRequest>,
}

impl HandoffReceiver {
    /// Block until a request arrives or `shutdown` fires.
    pub fn take(&self, shutdown: &Shutdown) -> Result<HandoffRequest, RmcsError> {
        if shutdown.is_triggered() {
            return Err(RmcsError::Interrupted);
        }
        crossbeam::select! {
            recv(self.rx) -> msg => {
                msg.map_err(|_| RmcsError::ChannelClosed("handoff queue".to_string()))
            }
            recv(shutdown.signal()) -> _ => Err(RmcsError::Interrupted),
        }
    }

    pub fn try_take(&self) -> Option<HandoffRequest> {
        match self.rx.try_recv() {
            Ok(request) => Some(request),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcs_types::{Channel, ConnectionId, HandoffTarget};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn requests_are_fifo_and_not_coalesced() {
        let (tx, rx) = handoff_channel();
        let shutdown = Shutdown::new();
        let two = ConnectionId::new(2).unwrap();
        let three = ConnectionId::new(3).unwrap();

        tx.send(HandoffRequest::new(two, Channel::Drive)).unwrap();
        tx.send(HandoffRequest::new(three, Channel::Drive)).unwrap();

        assert_eq!(rx.len(), 2);
        assert_eq!(rx.take(&shutdown).unwrap().target, HandoffTarget::Connection(two));
        assert_eq!(rx.take(&shutdown).unwrap().target, HandoffTarget::Connection(three));
        assert!(rx.is_empty());
    }

    #[test]
    fn take_is_interrupted_by_shutdown() {
        let (_tx, rx) = handoff_channel();
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        assert_eq!(rx.take(&shutdown), Err(RmcsError::Interrupted));
        handle.join().unwrap();
    }

    #[test]
    fn send_fails_once_receiver_is_dropped() {
        let (tx, rx) = handoff_channel();
        drop(rx);
        let err = tx
            .send(HandoffRequest::new(HandoffTarget::Fallback, Channel::Light))
            .unwrap_err();
        assert!(matches!(err, RmcsError::ChannelClosed(_)));
    }
}
