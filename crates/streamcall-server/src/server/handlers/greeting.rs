//! Greeting handlers for the four call patterns, plus the deadline-bound
//! unary variant.

use core::time::Duration;
use streamcall_core::{
    Deadline, Error, Inbound, MessageSender, Result,
    proto::greet::{
        GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesResponse, Greeting,
        LongGreetRequest,
    },
};

/// Unwraps the `greeting` field every greet request carries.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the field is absent.
pub fn require_greeting(greeting: Option<Greeting>) -> Result<Greeting> {
    greeting.ok_or_else(|| Error::invalid_argument("greeting is required"))
}

pub fn greet(greeting: &Greeting) -> String {
    format!("Hello {} {}", greeting.first_name, greeting.last_name)
}

/// Bounded producer of `count` ordinal greetings for one name.
#[derive(Debug, Clone)]
pub struct GreetingRepeater {
    first_name: String,
    next: u32,
    count: u32,
}

impl GreetingRepeater {
    pub const fn new(first_name: String, count: u32) -> Self {
        Self {
            first_name,
            next: 0,
            count,
        }
    }
}

impl Iterator for GreetingRepeater {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.count {
            return None;
        }
        let ordinal = self.next;
        self.next += 1;
        Some(format!("Hello {} for the {ordinal} time", self.first_name))
    }
}

/// Sends every greeting of `repeater`, pausing `interval` between two of
/// them, then closes the stream.
pub async fn stream_repeated(
    repeater: GreetingRepeater,
    interval: Duration,
    mut tx: MessageSender<GreetManyTimesResponse>,
) -> Result<()> {
    for (i, result) in repeater.enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        tx.send(GreetManyTimesResponse { result }).await?;
    }
    tx.close_send();
    Ok(())
}

/// Concatenated greeting for one `LongGreet` call.
#[derive(Debug, Default, Clone)]
pub struct LongGreeting {
    result: String,
    names: usize,
}

impl LongGreeting {
    pub fn push(&mut self, first_name: &str) {
        self.result.push_str("Hello ");
        self.result.push_str(first_name);
        self.result.push_str("! ");
        self.names += 1;
    }

    pub const fn names(&self) -> usize {
        self.names
    }

    pub fn finish(self) -> String {
        self.result
    }
}

/// Accumulates one fragment per inbound name and yields the whole greeting
/// once the client closes its stream.
pub async fn long_greet(mut inbound: impl Inbound<LongGreetRequest>) -> Result<String> {
    let mut long = LongGreeting::default();
    while let Some(req) = inbound.receive().await? {
        let greeting = require_greeting(req.greeting)?;
        long.push(&greeting.first_name);
    }
    tracing::debug!(names = long.names(), "client stream ended");
    Ok(long.finish())
}

/// Answers every inbound name right away.
pub async fn greet_everyone(
    mut inbound: impl Inbound<GreetEveryoneRequest>,
    mut tx: MessageSender<GreetEveryoneResponse>,
) -> Result<()> {
    while let Some(req) = inbound.receive().await? {
        let greeting = require_greeting(req.greeting)?;
        let result = format!("Hello {}!", greeting.first_name);
        tx.send(GreetEveryoneResponse { result }).await?;
    }
    tx.close_send();
    Ok(())
}

/// Performs `steps` pauses of `step` before greeting. With a deadline the
/// work is abandoned as soon as it elapses.
pub async fn slow_greet(
    greeting: Greeting,
    steps: u32,
    step: Duration,
    deadline: Option<Deadline>,
) -> Result<String> {
    let work = async {
        for i in 0..steps {
            tracing::trace!(step = i, "working");
            tokio::time::sleep(step).await;
        }
        greet(&greeting)
    };
    match deadline {
        Some(deadline) => deadline.run(work).await,
        None => Ok(work.await),
    }
}
