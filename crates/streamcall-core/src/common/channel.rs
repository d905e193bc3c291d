//! Ordered, single-direction message channels.
//!
//! A [`channel`] connects one sending side to one receiving side of a call.
//! Messages are delivered exactly once and in send order. The sender signals
//! end-of-stream with [`MessageSender::close_send`], or terminates the
//! direction with an error via [`MessageSender::abort`]. A bidirectional call
//! is composed of two independent channels, one per direction.
//!
//! The channel is bounded: `send` waits while `capacity` messages are still
//! unread, so a slow receiver applies backpressure to the producer.
//!
//! The receiving half can be consumed directly with [`Inbound::receive`],
//! turned into a tonic response body with [`MessageReceiver::into_stream`],
//! or into a request body with [`MessageReceiver::into_outbound`].

use crate::{Error, Result};
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::Status;

/// Boxed response body for server-streaming and bidirectional methods.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = core::result::Result<T, Status>> + Send>>;

/// Creates a bounded channel holding at most `capacity` unread messages.
///
/// A capacity of zero is treated as one.
pub fn channel<T>(capacity: usize) -> (MessageSender<T>, MessageReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        MessageSender { tx: Some(tx) },
        MessageReceiver { rx, done: false },
    )
}

/// The sending half of a [`channel`].
///
/// Clones share the direction: the receiver observes end-of-stream once every
/// clone has been closed or dropped.
#[derive(Debug)]
pub struct MessageSender<T> {
    tx: Option<mpsc::Sender<core::result::Result<T, Status>>>,
}

impl<T> Clone for MessageSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> MessageSender<T> {
    /// Enqueues `message` for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if this half was already closed or the
    /// receiver is gone.
    pub async fn send(&self, message: T) -> Result<()> {
        let tx = self.open_half()?;
        tx.send(Ok(message))
            .await
            .map_err(|_| Error::channel("peer is no longer receiving"))
    }

    /// Signals that no further messages will be sent. Idempotent.
    pub fn close_send(&mut self) {
        self.tx = None;
    }

    /// Ends the direction with `err` instead of a clean end-of-stream.
    ///
    /// The receiver gets the error after any messages already queued.
    pub async fn abort(&mut self, err: Error) -> Result<()> {
        let tx = self.open_half()?.clone();
        self.tx = None;
        tx.send(Err(err.into()))
            .await
            .map_err(|_| Error::channel("peer is no longer receiving"))
    }

    /// Returns `true` once this half was closed or the receiver went away.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    fn open_half(&self) -> Result<&mpsc::Sender<core::result::Result<T, Status>>> {
        self.tx
            .as_ref()
            .ok_or_else(|| Error::channel("send half already closed"))
    }
}

/// The receiving half of a [`channel`].
#[derive(Debug)]
pub struct MessageReceiver<T> {
    rx: mpsc::Receiver<core::result::Result<T, Status>>,
    done: bool,
}

impl<T> MessageReceiver<T> {
    /// Converts into a tonic response body. An aborted direction surfaces as
    /// the final `Err` item.
    pub fn into_stream(self) -> ReceiverStream<core::result::Result<T, Status>> {
        ReceiverStream::new(self.rx)
    }

    /// Converts into a tonic request body, which carries bare messages.
    ///
    /// An aborted direction ends the body at the point of failure.
    pub fn into_outbound(self) -> Outbound<T> {
        Outbound {
            inner: ReceiverStream::new(self.rx),
            done: self.done,
        }
    }
}

/// Anything that yields the inbound half of a call one message at a time.
///
/// `receive` resolves to `Ok(Some(_))` for the next message, `Ok(None)` on
/// end-of-stream and `Err(_)` when the call failed. Implemented for
/// [`MessageReceiver`] and for `tonic::Streaming`, so handlers are agnostic
/// of whether they sit behind the transport.
pub trait Inbound<T>: Send {
    fn receive(&mut self) -> impl Future<Output = Result<Option<T>>> + Send;
}

impl<T: Send> Inbound<T> for MessageReceiver<T> {
    async fn receive(&mut self) -> Result<Option<T>> {
        if self.done {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(status)) => {
                self.done = true;
                Err(status.into())
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl<T: Send + 'static> Inbound<T> for tonic::Streaming<T> {
    async fn receive(&mut self) -> Result<Option<T>> {
        self.message().await.map_err(Error::from)
    }
}

/// Request body produced by [`MessageReceiver::into_outbound`].
#[derive(Debug)]
pub struct Outbound<T> {
    inner: ReceiverStream<core::result::Result<T, Status>>,
    done: bool,
}

impl<T> Stream for Outbound<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(message))) => Poll::Ready(Some(message)),
            Poll::Ready(Some(Err(_)) | None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn delivers_in_order_then_end_of_stream() {
        let (mut tx, mut rx) = channel(4);
        for i in 0..3 {
            tx.send(i).await.unwrap();
        }
        tx.close_send();

        assert_eq!(rx.receive().await.unwrap(), Some(0));
        assert_eq!(rx.receive().await.unwrap(), Some(1));
        assert_eq!(rx.receive().await.unwrap(), Some(2));
        assert_eq!(rx.receive().await.unwrap(), None);
        assert_eq!(rx.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_after_close_fails_and_close_is_idempotent() {
        let (mut tx, _rx) = channel::<u8>(1);
        tx.close_send();
        tx.close_send();
        assert!(tx.is_closed());
        assert!(matches!(tx.send(1).await, Err(Error::ChannelError { .. })));
    }

    #[tokio::test]
    async fn end_of_stream_waits_for_every_clone() {
        let (mut tx, mut rx) = channel(4);
        let other = tx.clone();
        tx.close_send();

        other.send("late").await.unwrap();
        drop(other);

        assert_eq!(rx.receive().await.unwrap(), Some("late"));
        assert_eq!(rx.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn abort_surfaces_error_after_queued_messages() {
        let (mut tx, mut rx) = channel(4);
        tx.send(7).await.unwrap();
        tx.abort(Error::invalid_argument("bad input")).await.unwrap();

        assert_eq!(rx.receive().await.unwrap(), Some(7));
        assert!(matches!(
            rx.receive().await,
            Err(Error::InvalidArgument { .. })
        ));
        assert_eq!(rx.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_fails_once_receiver_departs() {
        let (tx, rx) = channel(1);
        drop(rx);
        assert!(tx.is_closed());
        assert!(tx.send(1).await.is_err());
    }

    #[tokio::test]
    async fn bounded_capacity_applies_backpressure() {
        let (tx, mut rx) = channel(1);
        tx.send(1).await.unwrap();

        let blocked =
            tokio::time::timeout(core::time::Duration::from_millis(20), tx.send(2)).await;
        assert!(blocked.is_err(), "second send should wait for the reader");

        assert_eq!(rx.receive().await.unwrap(), Some(1));
        tx.send(3).await.unwrap();
        assert_eq!(rx.receive().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn outbound_stops_at_abort() {
        let (mut tx, rx) = channel(4);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        tx.abort(Error::RequestCancelled).await.unwrap();

        let collected: Vec<i32> = rx.into_outbound().collect().await;
        assert_eq!(collected, vec![1, 2]);
    }

    #[tokio::test]
    async fn response_stream_yields_terminal_error() {
        let (mut tx, rx) = channel(4);
        tx.send(1).await.unwrap();
        tx.abort(Error::ServiceShutdown).await.unwrap();

        let items: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &1);
        assert_eq!(items[1].as_ref().unwrap_err().code(), tonic::Code::Unavailable);
    }
}
