//! Client-close notification.
//!
//! A writer that can tell when the client has gone away hands out a
//! [`CloseNotify`]. The host keeps the matching [`CloseSignal`] and fires it
//! once, when it notices the connection is gone.

use tokio::sync::watch;

/// Creates a connected signal/notify pair.
pub fn channel() -> (CloseSignal, CloseNotify) {
    let (tx, rx) = watch::channel(false);
    (CloseSignal { tx }, CloseNotify { rx })
}

/// The sending half. Held by whoever observes the connection.
#[derive(Debug)]
pub struct CloseSignal {
    tx: watch::Sender<bool>,
}

impl CloseSignal {
    /// Marks the client as gone. Idempotent.
    ///
    /// The value is stored even if no [`CloseNotify`] is currently alive, so a
    /// receiver subscribed later still sees it.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Returns a new receiver for this signal.
    pub fn subscribe(&self) -> CloseNotify {
        CloseNotify { rx: self.tx.subscribe() }
    }
}

/// The receiving half. Cheap to clone; every clone observes the same signal.
#[derive(Clone, Debug)]
pub struct CloseNotify {
    rx: watch::Receiver<bool>,
}

impl CloseNotify {
    /// Non-blocking check, usable from synchronous handlers.
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the client has gone away.
    ///
    /// Also resolves if the [`CloseSignal`] is dropped without firing: the
    /// response is finished at that point and nobody will ever signal.
    pub async fn closed(&mut self) {
        let _ = self.rx.wait_for(|closed| *closed).await;
    }
}
