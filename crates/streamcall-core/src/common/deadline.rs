//! Caller time budgets.
//!
//! A [`Deadline`] is created once, from a budget, when a call starts. The
//! client attaches it to the request as the standard `grpc-timeout` header
//! and bounds its own wait with it; the server reads the header back with
//! [`Deadline::from_metadata`] and runs slow work under [`Deadline::run`].

use crate::{Error, Result};
use core::time::Duration;
use tokio::time::Instant;
use tonic::{Request, metadata::MetadataMap};

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";
const MAX_TIMEOUT_DIGITS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Propagates the remaining budget to the peer as `grpc-timeout`.
    pub fn apply<T>(&self, request: &mut Request<T>) {
        request.set_timeout(self.remaining());
    }

    /// Drives `fut` to completion unless the deadline passes first, in which
    /// case `fut` is dropped and [`Error::DeadlineExceeded`] is returned.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| Error::DeadlineExceeded)
    }

    /// Reads the `grpc-timeout` header, if the caller sent one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the header is present but
    /// malformed.
    pub fn from_metadata(metadata: &MetadataMap) -> Result<Option<Self>> {
        let Some(value) = metadata.get(GRPC_TIMEOUT_HEADER) else {
            return Ok(None);
        };
        let raw = value
            .to_str()
            .map_err(|_| Error::invalid_argument("grpc-timeout is not valid ASCII"))?;
        parse_grpc_timeout(raw).map(|budget| Some(Self::after(budget)))
    }
}

/// Parses `TimeoutValue TimeoutUnit`: at most eight ASCII digits followed by
/// one of `H`, `M`, `S`, `m`, `u`, `n`.
fn parse_grpc_timeout(raw: &str) -> Result<Duration> {
    let invalid = || Error::invalid_argument(format!("malformed grpc-timeout `{raw}`"));

    let (digits, unit) = raw.split_at_checked(raw.len().saturating_sub(1)).ok_or_else(invalid)?;
    if digits.is_empty()
        || digits.len() > MAX_TIMEOUT_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let budget = match unit {
        "H" => Duration::from_secs(value * 60 * 60),
        "M" => Duration::from_secs(value * 60),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return Err(invalid()),
    };
    Ok(budget)
}
