//! Call patterns and the per-call lifecycle.
//!
//! Every call follows one of four [`CallPattern`]s, which fix how many
//! messages each side may send. A [`Call`] tracks the two send directions
//! independently:
//!
//! ```text
//! Open ── client closes ──> ClientDone ── server closes ──> Closed
//! Open ── server closes ──> ServerDone ── client closes ──> Closed
//! any  ── failure ────────────────────────────────────────> Closed
//! ```
//!
//! `Closed` is terminal. Once a call is closed, later transitions are ignored
//! and the first terminal error, if any, is kept.

use crate::{Deadline, Error};

/// The four remote-call shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallPattern {
    Unary,
    ServerStream,
    ClientStream,
    BidiStream,
}

impl CallPattern {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ServerStream => "server_stream",
            Self::ClientStream => "client_stream",
            Self::BidiStream => "bidi_stream",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Open,
    ClientDone,
    ServerDone,
    Closed,
}

/// One RPC invocation as seen by the side that drives it.
#[derive(Debug)]
pub struct Call {
    method: &'static str,
    pattern: CallPattern,
    deadline: Option<Deadline>,
    client_done: bool,
    server_done: bool,
    failure: Option<Error>,
}

impl Call {
    pub const fn new(method: &'static str, pattern: CallPattern) -> Self {
        Self {
            method,
            pattern,
            deadline: None,
            client_done: false,
            server_done: false,
            failure: None,
        }
    }

    /// Attaches a deadline. Deadlines are fixed at creation.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub const fn method(&self) -> &'static str {
        self.method
    }

    pub const fn pattern(&self) -> CallPattern {
        self.pattern
    }

    pub const fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    pub const fn state(&self) -> CallState {
        if self.failure.is_some() {
            return CallState::Closed;
        }
        match (self.client_done, self.server_done) {
            (false, false) => CallState::Open,
            (true, false) => CallState::ClientDone,
            (false, true) => CallState::ServerDone,
            (true, true) => CallState::Closed,
        }
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self.state(), CallState::Closed)
    }

    /// The client closed its send direction.
    pub fn close_client(&mut self) -> CallState {
        self.client_done = true;
        self.state()
    }

    /// The server closed its send direction (end-of-stream or final
    /// response).
    pub fn close_server(&mut self) -> CallState {
        self.server_done = true;
        self.state()
    }

    /// Terminates the call with `err` and returns the classified error that
    /// the caller should see.
    ///
    /// When the deadline has already elapsed the call resolves as
    /// [`Error::DeadlineExceeded`], whatever the transport reported. A call
    /// that already failed keeps its first error.
    pub fn fail(&mut self, err: Error) -> Error {
        if let Some(first) = &self.failure {
            return first.clone();
        }
        let err = match self.deadline {
            Some(deadline) if deadline.is_expired() => Error::DeadlineExceeded,
            _ => err,
        };
        self.failure = Some(err.clone());
        err
    }

    pub const fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }
}
