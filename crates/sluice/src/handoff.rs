//! Unbuffered rendezvous channels between stages.
//!
//! Tokio's bounded [`mpsc`] channel needs a capacity of at least one, so a
//! plain `send` returns as soon as the item is queued. Stages need the
//! stronger guarantee that a send only completes once the consumer has taken
//! the item. Each item therefore travels with a [`oneshot`] acknowledgement
//! that the receiver fires when it takes it; [`Sender::send`] waits for that
//! acknowledgement.
//!
//! A receiver can also take an item with a deferred [`Ack`], which keeps the
//! sender blocked until the receiver decides it is done with the item. The
//! fan-in uses this to hold an error's origin until the error reached the
//! orchestrator.
//!
//! The channel closes when every [`Sender`] is dropped. Dropping the
//! [`Receiver`] makes pending and future sends fail.

use core::fmt;
use tokio::sync::{mpsc, oneshot};

type Envelope<T> = (T, oneshot::Sender<()>);

/// Creates a rendezvous channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (Sender { inner: tx }, Receiver { inner: rx })
}

/// Sending half of a rendezvous channel.
pub struct Sender<T> {
    inner: mpsc::Sender<Envelope<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl<T> Sender<T> {
    /// Hands `item` to the receiver and waits until it has been taken.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the receiver is gone. The item is handed back
    /// when it never left this side; if the receiver took it but dropped the
    /// acknowledgement, the item is lost and the error carries `None`.
    ///
    /// # Cancel safety
    ///
    /// Dropping the future after the item was queued leaves it queued: the
    /// receiver may still take it, its acknowledgement just goes nowhere.
    pub async fn send(&self, item: T) -> Result<(), SendError<T>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.inner
            .send((item, ack_tx))
            .await
            .map_err(|mpsc::error::SendError((item, _))| SendError(Some(item)))?;
        ack_rx.await.map_err(|_| SendError(None))
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Receiving half of a rendezvous channel.
pub struct Receiver<T> {
    inner: mpsc::Receiver<Envelope<T>>,
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

impl<T> Receiver<T> {
    /// Takes the next item and releases its sender immediately.
    ///
    /// Returns `None` once every sender is dropped and nothing is queued.
    /// Cancel safe: if the future is dropped before it resolves, no item was
    /// taken.
    pub async fn recv(&mut self) -> Option<T> {
        let (item, ack) = self.recv_deferred().await?;
        ack.ack();
        Some(item)
    }

    /// Takes the next item but leaves its sender blocked until the returned
    /// [`Ack`] is fired.
    pub async fn recv_deferred(&mut self) -> Option<(T, Ack)> {
        self.inner
            .recv()
            .await
            .map(|(item, ack_tx)| (item, Ack(ack_tx)))
    }
}

/// Pending acknowledgement for an item taken with
/// [`Receiver::recv_deferred`].
///
/// Dropping it without calling [`Ack::ack`] makes the sender's `send` fail.
#[must_use = "the sender stays blocked until the ack is fired"]
pub struct Ack(oneshot::Sender<()>);

impl Ack {
    /// Releases the sender.
    pub fn ack(self) {
        // The sender may have given up already.
        let _ = self.0.send(());
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ack").finish()
    }
}

/// Error returned by [`Sender::send`] when the receiver is gone.
pub struct SendError<T>(pub Option<T>);

impl<T> SendError<T> {
    /// Returns the item if it never reached the receiver.
    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError")
            .field("returned", &self.0.is_some())
            .finish()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl<T> core::error::Error for SendError<T> {}
