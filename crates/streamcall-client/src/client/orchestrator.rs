//! Client-side drivers for the four call patterns.
//!
//! Each driver owns one [`Call`] and moves it through its lifecycle as the
//! transport reports progress. The transport itself is passed in as an
//! `invoke` closure, typically a clone of a generated tonic client calling
//! the matching method.
//!
//! Streaming sends always run on a spawned send path that feeds a bounded
//! [`channel`]. For [`bidi`] calls the receive path is spawned as well, and
//! the driver returns only after both paths have finished.
//!
//! Streaming drivers accept an `on_message` hook that sees each response as
//! it arrives, before it is collected into the [`StreamResult`].

use core::time::Duration;
use streamcall_core::{
    Call, CallPattern, CallState, Deadline, Error, Inbound, MessageSender, Outbound, Result,
    channel,
};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::Instrument;

type RpcResult<T> = core::result::Result<Response<T>, Status>;

/// How a client-side stream is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause between two consecutive messages.
    pub interval: Duration,
    /// Capacity of the channel between the send path and the transport.
    pub buffer: usize,
}

impl Pacing {
    pub const fn new(interval: Duration, buffer: usize) -> Self {
        Self { interval, buffer }
    }
}

/// Everything a server-side stream delivered, and how it ended.
///
/// Messages received before a failure are kept. `state` is the call state
/// when the driver returned, which is always [`CallState::Closed`].
#[derive(Debug)]
pub struct StreamResult<T> {
    pub messages: Vec<T>,
    pub outcome: Result<()>,
    pub state: CallState,
}

impl<T> StreamResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> StreamResult<U> {
        StreamResult {
            messages: self.messages.into_iter().map(f).collect(),
            outcome: self.outcome,
            state: self.state,
        }
    }

    /// The messages when the stream ended cleanly, the failure otherwise.
    pub fn into_result(self) -> Result<Vec<T>> {
        self.outcome.map(|()| self.messages)
    }
}

/// One request, one response.
///
/// With a deadline, the remaining budget travels as `grpc-timeout` and the
/// local wait is bounded by it. Any failure observed after the deadline has
/// passed is reported as [`Error::DeadlineExceeded`].
pub async fn unary<Req, Resp, F, Fut>(
    method: &'static str,
    request: Req,
    deadline: Option<Deadline>,
    invoke: F,
) -> Result<Resp>
where
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = RpcResult<Resp>>,
{
    let mut call = Call::new(method, CallPattern::Unary);
    let mut request = Request::new(request);
    if let Some(deadline) = deadline {
        deadline.apply(&mut request);
        call = call.with_deadline(deadline);
    }
    call.close_client();

    let response = match call.deadline() {
        Some(deadline) => deadline
            .run(invoke(request))
            .await
            .and_then(|res| res.map_err(Error::from)),
        None => invoke(request).await.map_err(Error::from),
    };

    match response {
        Ok(response) => {
            call.close_server();
            tracing::debug!(
                method = call.method(),
                pattern = call.pattern().as_str(),
                "unary call completed"
            );
            Ok(response.into_inner())
        }
        Err(e) => Err(call.fail(e)),
    }
}

/// One request, then responses until the server ends the stream.
pub async fn server_stream<Req, Resp, S, F, Fut, M>(
    method: &'static str,
    request: Req,
    invoke: F,
    on_message: M,
) -> StreamResult<Resp>
where
    S: Inbound<Resp>,
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = RpcResult<S>>,
    M: FnMut(&Resp),
{
    let mut call = Call::new(method, CallPattern::ServerStream);
    call.close_client();

    let response = invoke(Request::new(request));
    let (messages, received) = receive_all::<Resp, S, Fut, M>(response, on_message)
        .instrument(call_span("receive", &call))
        .await;
    let outcome = match received {
        Ok(()) => {
            call.close_server();
            Ok(())
        }
        Err(e) => Err(call.fail(e)),
    };
    tracing::debug!(
        method = call.method(),
        pattern = call.pattern().as_str(),
        received = messages.len(),
        "server stream ended"
    );
    StreamResult {
        messages,
        outcome,
        state: call.state(),
    }
}

/// Streams `messages`, then waits for the single response.
///
/// The response is authoritative: once it arrives, a send path that is still
/// running is stopped.
pub async fn client_stream<Req, Resp, F, Fut>(
    method: &'static str,
    messages: Vec<Req>,
    pacing: Pacing,
    invoke: F,
) -> Result<Resp>
where
    Req: Send + 'static,
    F: FnOnce(Request<Outbound<Req>>) -> Fut,
    Fut: Future<Output = RpcResult<Resp>>,
{
    let mut call = Call::new(method, CallPattern::ClientStream);
    let (tx, rx) = channel(pacing.buffer);
    let cancel = CancellationToken::new();
    let send = spawn_send_path(&call, messages, pacing.interval, tx, cancel.clone());

    let response = invoke(Request::new(rx.into_outbound())).await;
    cancel.cancel();
    log_send_outcome(&call, joined(send.await, "send"));
    call.close_client();

    match response {
        Ok(response) => {
            call.close_server();
            Ok(response.into_inner())
        }
        Err(status) => Err(call.fail(status.into())),
    }
}

/// Streams `messages` while concurrently collecting every response.
///
/// The send and receive paths run as independent tasks, so responses are
/// observed while requests are still being sent. The call completes only
/// after both paths have finished; the receive path decides the outcome.
/// When the server ends the call first, the send path is stopped.
pub async fn bidi<Req, Resp, S, F, Fut, M>(
    method: &'static str,
    messages: Vec<Req>,
    pacing: Pacing,
    invoke: F,
    on_message: M,
) -> StreamResult<Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    S: Inbound<Resp> + 'static,
    F: FnOnce(Request<Outbound<Req>>) -> Fut,
    Fut: Future<Output = RpcResult<S>> + Send + 'static,
    M: FnMut(&Resp) + Send + 'static,
{
    let mut call = Call::new(method, CallPattern::BidiStream);
    let (tx, rx) = channel(pacing.buffer);
    let cancel = CancellationToken::new();

    let mut send = spawn_send_path(&call, messages, pacing.interval, tx, cancel.clone());
    let response = invoke(Request::new(rx.into_outbound()));
    let mut recv = tokio::spawn(
        receive_all::<Resp, S, Fut, M>(response, on_message)
            .instrument(call_span("receive", &call)),
    );

    let mut messages = Vec::new();
    let (mut send_done, mut recv_done) = (false, false);
    while !(send_done && recv_done) {
        tokio::select! {
            res = &mut send, if !send_done => {
                send_done = true;
                log_send_outcome(&call, joined(res, "send"));
                call.close_client();
            }
            res = &mut recv, if !recv_done => {
                recv_done = true;
                let (received, outcome) = res.unwrap_or_else(|e| {
                    (Vec::new(), Err(Error::channel(format!("receive path did not complete: {e}"))))
                });
                messages = received;
                match outcome {
                    Ok(()) => {
                        call.close_server();
                    }
                    Err(e) => {
                        call.fail(e);
                    }
                }
                cancel.cancel();
            }
        }
    }

    let outcome = call.failure().cloned().map_or(Ok(()), Err);
    tracing::debug!(
        method = call.method(),
        pattern = call.pattern().as_str(),
        received = messages.len(),
        state = ?call.state(),
        "bidirectional call joined"
    );
    StreamResult {
        messages,
        outcome,
        state: call.state(),
    }
}

async fn send_paced<T>(
    messages: Vec<T>,
    interval: Duration,
    mut tx: MessageSender<T>,
) -> Result<usize> {
    let mut sent = 0;
    for message in messages {
        if sent > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        tx.send(message).await?;
        sent += 1;
    }
    tx.close_send();
    Ok(sent)
}

fn spawn_send_path<T: Send + 'static>(
    call: &Call,
    messages: Vec<T>,
    interval: Duration,
    tx: MessageSender<T>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<Result<usize>> {
    let task = async move {
        cancel
            .run_until_cancelled(send_paced(messages, interval, tx))
            .await
            .unwrap_or(Err(Error::RequestCancelled))
    };
    tokio::spawn(task.instrument(call_span("send", call)))
}

fn call_span(path: &'static str, call: &Call) -> tracing::Span {
    tracing::info_span!(
        "call",
        path,
        method = call.method(),
        pattern = call.pattern().as_str()
    )
}

async fn receive_all<Resp, S, Fut, M>(
    response: Fut,
    mut on_message: M,
) -> (Vec<Resp>, Result<()>)
where
    S: Inbound<Resp>,
    Fut: Future<Output = RpcResult<S>>,
    M: FnMut(&Resp),
{
    let mut messages = Vec::new();
    let received = async {
        let mut inbound = response.await?.into_inner();
        while let Some(message) = inbound.receive().await? {
            on_message(&message);
            messages.push(message);
        }
        Ok::<(), Error>(())
    }
    .await;
    (messages, received)
}

fn joined<T>(res: core::result::Result<Result<T>, JoinError>, path: &str) -> Result<T> {
    res.map_err(|e| Error::channel(format!("{path} path did not complete: {e}")))?
}

fn log_send_outcome(call: &Call, outcome: Result<usize>) {
    let method = call.method();
    match outcome {
        Ok(sent) => tracing::debug!(method, sent, "send path finished"),
        Err(e) => tracing::debug!(method, error = %e, "send path stopped early"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use streamcall_core::MessageReceiver;
    use tokio::sync::mpsc;
    use tokio_stream::StreamExt;

    const PACING: Pacing = Pacing::new(Duration::from_millis(1), 2);

    #[tokio::test]
    async fn unary_maps_status_to_error() {
        let ok = unary("Sum", (1, 2), None, |req: Request<(i32, i32)>| async move {
            let (a, b) = req.into_inner();
            Ok::<_, Status>(Response::new(a + b))
        })
        .await;
        assert_eq!(ok.unwrap(), 3);

        let err = unary("SquareRoot", -2, None, |_req: Request<i32>| async {
            Err::<Response<f64>, _>(Status::invalid_argument("Received a negative number: -2"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unary_propagates_and_enforces_deadline() {
        let deadline = Deadline::after(Duration::from_millis(100));
        let err = unary("GreetWithDeadline", (), Some(deadline), |req: Request<()>| async move {
            assert!(req.metadata().get("grpc-timeout").is_some());
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, Status>(Response::new("late"))
        })
        .await
        .unwrap_err();
        assert_eq!(err, Error::DeadlineExceeded);

        let deadline = Deadline::after(Duration::from_secs(5));
        let ok = unary("GreetWithDeadline", (), Some(deadline), |_req: Request<()>| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, Status>(Response::new("on time"))
        })
        .await;
        assert_eq!(ok.unwrap(), "on time");
    }

    #[tokio::test]
    async fn server_stream_keeps_messages_before_failure() {
        let result: StreamResult<i64> = server_stream(
            "PrimeNumberDecomposition",
            12,
            |_req| async {
                let (mut tx, rx) = channel(4);
                tx.send(2).await.unwrap();
                tx.send(2).await.unwrap();
                tx.abort(Error::ServiceShutdown).await.unwrap();
                Ok::<_, Status>(Response::new(rx))
            },
            |_: &i64| {},
        )
        .await;
        assert_eq!(result.messages, vec![2, 2]);
        assert_eq!(result.state, CallState::Closed);
        assert!(matches!(result.outcome, Err(Error::Rpc { .. })));
        assert!(result.into_result().is_err());
    }

    #[tokio::test]
    async fn on_message_sees_each_response_before_the_stream_ends() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let call = server_stream(
            "GreetManyTimes",
            3,
            move |req: Request<i32>| async move {
                let count = req.into_inner();
                let (tx, rx) = channel(4);
                tokio::spawn(async move {
                    // The next response waits until the previous one was observed.
                    for n in 0..count {
                        if tx.send(n).await.is_err() || seen_rx.recv().await != Some(n) {
                            return;
                        }
                    }
                });
                Ok::<_, Status>(Response::new(rx))
            },
            move |n: &i32| {
                let _ = seen_tx.send(*n);
            },
        );
        let result: StreamResult<i32> = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap();
        assert_eq!(result.into_result().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn client_stream_sends_everything_before_the_response() {
        let sum = client_stream(
            "ComputeAverage",
            vec![3, 5, 9, 54, 23],
            PACING,
            |req: Request<Outbound<i32>>| async move {
                let all: Vec<i32> = req.into_inner().collect().await;
                Ok::<_, Status>(Response::new(all.iter().sum::<i32>()))
            },
        )
        .await;
        assert_eq!(sum.unwrap(), 94);
    }

    #[tokio::test]
    async fn client_stream_early_failure_stops_sending() {
        let err = client_stream(
            "LongGreet",
            (0..1000).collect::<Vec<i32>>(),
            PACING,
            |_req: Request<Outbound<i32>>| async {
                Err::<Response<String>, _>(Status::invalid_argument("greeting is required"))
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    fn doubling_server(
        req: Request<Outbound<i32>>,
        fail_after: Option<usize>,
    ) -> impl Future<Output = RpcResult<MessageReceiver<i32>>> + Send + 'static {
        async move {
            let mut inbound = req.into_inner();
            let (mut tx, rx) = channel(4);
            tokio::spawn(async move {
                let mut seen = 0;
                while let Some(n) = inbound.next().await {
                    if fail_after == Some(seen) {
                        let _ = tx.abort(Error::invalid_argument("rejected")).await;
                        return;
                    }
                    if tx.send(n * 2).await.is_err() {
                        return;
                    }
                    seen += 1;
                }
            });
            Ok(Response::new(rx))
        }
    }

    #[tokio::test]
    async fn bidi_joins_both_paths() {
        let result: StreamResult<i32> = bidi(
            "FindMaximum",
            vec![1, 2, 3, 4],
            PACING,
            |req| doubling_server(req, None),
            |_: &i32| {},
        )
        .await;
        assert_eq!(result.messages, vec![2, 4, 6, 8]);
        assert_eq!(result.state, CallState::Closed);
        assert!(result.outcome.is_ok());
    }

    #[tokio::test]
    async fn bidi_failure_is_reported_with_partial_messages() {
        let result: StreamResult<i32> = bidi(
            "GreetEveryone",
            (1..=100).collect(),
            PACING,
            |req| doubling_server(req, Some(2)),
            |_: &i32| {},
        )
        .await;
        assert_eq!(result.messages, vec![2, 4]);
        assert_eq!(result.state, CallState::Closed);
        assert!(matches!(result.outcome, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn bidi_returns_after_the_server_saw_end_of_stream() {
        let saw_end = Arc::new(AtomicBool::new(false));
        let flag = saw_end.clone();
        let result: StreamResult<i32> = bidi(
            "FindMaximum",
            vec![1, 2, 3],
            PACING,
            move |req: Request<Outbound<i32>>| async move {
                let mut inbound = req.into_inner();
                let (tx, rx) = channel(4);
                tokio::spawn(async move {
                    while let Some(n) = inbound.next().await {
                        if tx.send(n).await.is_err() {
                            return;
                        }
                    }
                    flag.store(true, Ordering::SeqCst);
                });
                Ok::<_, Status>(Response::new(rx))
            },
            |_: &i32| {},
        )
        .await;
        assert!(saw_end.load(Ordering::SeqCst));
        assert_eq!(result.state, CallState::Closed);
        assert_eq!(result.into_result().unwrap(), vec![1, 2, 3]);
    }

    /// Acknowledges every response it hands out.
    struct AckingInbound {
        rx: MessageReceiver<i32>,
        ack: mpsc::UnboundedSender<()>,
    }

    impl Inbound<i32> for AckingInbound {
        async fn receive(&mut self) -> Result<Option<i32>> {
            let message = self.rx.receive().await?;
            if message.is_some() {
                let _ = self.ack.send(());
            }
            Ok(message)
        }
    }

    #[tokio::test]
    async fn bidi_receives_while_sending() {
        let inputs: Vec<i32> = (1..=5).collect();
        let call = bidi(
            "FindMaximum",
            inputs.clone(),
            Pacing::new(Duration::from_millis(1), 1),
            |req: Request<Outbound<i32>>| async move {
                let mut inbound = req.into_inner();
                let (tx, rx) = channel(1);
                let (ack, mut acked) = mpsc::unbounded_channel();
                tokio::spawn(async move {
                    // Request n + 1 is read only after response n was received.
                    while let Some(n) = inbound.next().await {
                        if tx.send(n).await.is_err() || acked.recv().await.is_none() {
                            return;
                        }
                    }
                });
                Ok::<_, Status>(Response::new(AckingInbound { rx, ack }))
            },
            |_: &i32| {},
        );
        let result: StreamResult<i32> = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap();
        assert_eq!(result.into_result().unwrap(), inputs);
    }
}
