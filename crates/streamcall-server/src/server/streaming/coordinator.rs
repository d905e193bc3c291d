use super::gate::ShutdownGate;
use crate::server::telemetry::{increment_call_errors, increment_messages_streamed};
use futures::TryStreamExt;
use streamcall_core::{Error, MessageSender, ResponseStream, channel};
use tonic::Status;
use tracing::Instrument;

/// Runs a streaming handler in its own task and returns the response body it
/// feeds.
///
/// The call is admitted through `gate` before anything is spawned, so a
/// server that is shutting down refuses the call with `Unavailable` instead
/// of opening a stream. The handler receives the sending half of a channel
/// bounded by `buffer`; tonic drains the receiving half as the client reads.
///
/// # Behavior
///
/// - A handler returning `Ok` ends the stream cleanly once its sender is
///   closed or dropped.
/// - A handler returning `Err` ends the stream with the matching status after
///   every message already sent. The error is logged and only this call is
///   affected.
/// - If shutdown cancels in-flight work, the stream ends with `Unavailable`.
/// - A client that disconnects makes the handler's next send fail, which
///   stops it.
pub fn spawn_outbound<T, F, Fut>(
    gate: &ShutdownGate,
    method: &'static str,
    buffer: usize,
    handler: F,
) -> Result<ResponseStream<T>, Status>
where
    T: Send + 'static,
    F: FnOnce(MessageSender<T>) -> Fut,
    Fut: Future<Output = streamcall_core::Result<()>> + Send + 'static,
{
    let guard = gate.enter(method)?;
    let shutdown = gate.shutdown_token();
    let (tx, rx) = channel(buffer);
    let mut terminal_tx = tx.clone();
    let work = handler(tx);

    let task = async move {
        let _guard = guard;
        let result = tokio::select! {
            res = work => res,
            () = shutdown.cancelled() => Err(Error::ServiceShutdown),
        };

        let Err(e) = result else {
            tracing::debug!("stream completed");
            return;
        };
        increment_call_errors(method);
        if terminal_tx.is_closed() {
            tracing::debug!(error = %e, "client went away");
            return;
        }
        tracing::warn!(error = %e, "stream failed");
        if let Err(send_err) = terminal_tx.abort(e).await {
            tracing::debug!(error = %send_err, "could not deliver terminal status");
        }
    };
    tokio::spawn(task.instrument(tracing::info_span!("call", method)));

    let stream = rx
        .into_stream()
        .inspect_ok(move |_| increment_messages_streamed(method));
    Ok(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tokio_stream::StreamExt;

    fn gate() -> ShutdownGate {
        ShutdownGate::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn streams_handler_output_then_ends() {
        let gate = gate();
        let stream = spawn_outbound(&gate, "PrimeNumberDecomposition", 2, |tx| async move {
            for n in [2, 2, 3] {
                tx.send(n).await?;
            }
            Ok::<(), Error>(())
        })
        .unwrap();

        let items: Vec<i64> = stream.map(Result::unwrap).collect().await;
        assert_eq!(items, vec![2, 2, 3]);
    }

    #[tokio::test]
    async fn handler_error_becomes_terminal_status() {
        let gate = gate();
        let stream = spawn_outbound(&gate, "FindMaximum", 4, |tx| async move {
            tx.send(4).await?;
            Err::<(), Error>(Error::invalid_argument("bad"))
        })
        .unwrap();

        let items: Vec<Result<i32, Status>> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &4);
        assert_eq!(
            items[1].as_ref().unwrap_err().code(),
            tonic::Code::InvalidArgument
        );
    }

    #[tokio::test]
    async fn refused_once_shutdown_started() {
        let gate = gate();
        gate.shutdown().await;
        let res = spawn_outbound::<i32, _, _>(&gate, "GreetManyTimes", 1, |_tx| async {
            Ok::<(), Error>(())
        });
        let status = res.err().unwrap();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_running_stream() {
        let gate = gate();
        let mut stream = spawn_outbound(&gate, "GreetManyTimes", 1, |tx| async move {
            tx.send("first").await?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            tx.send("never").await?;
            Ok::<(), Error>(())
        })
        .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        gate.shutdown().await;

        let last = stream.next().await.unwrap().unwrap_err();
        assert_eq!(last.code(), tonic::Code::Unavailable);
        assert!(stream.next().await.is_none());
    }
}
