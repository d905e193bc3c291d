//! Error types shared by the streamcall client and server.
//!
//! This module defines the central `Error` enum, which captures every terminal
//! outcome of a call other than success. It converts into `tonic::Status` so
//! server handlers can return it directly, and back from `tonic::Status` so
//! the client can branch on a classified error instead of raw status codes.
//!
//! ## Error Cases
//! - `ChannelError`: A send on a closed half, or a peer that stopped
//!   receiving.
//! - `InvalidArgument`: The request violated a precondition.
//! - `DeadlineExceeded`: The caller's time budget elapsed.
//! - `RequestCancelled`: The call was cancelled mid-flight.
//! - `ServiceShutdown`: The server is draining and refuses the call.
//! - `ConnectionFailed`: The client could not reach the server.
//! - `Rpc`: Any other status reported by the transport.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for a single call.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Internal channel send/receive failure (closed half or departed peer).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The request was malformed or violated a precondition.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The caller's deadline elapsed before the call completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The call was cancelled by the peer.
    #[error("Request cancelled")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// The client could not establish a connection.
    #[error("Connection failed: {context}")]
    ConnectionFailed { context: String },

    /// Any other status carried by the transport.
    #[error("RPC failed with {code:?}: {message}")]
    Rpc { code: Code, message: String },
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn channel(context: impl Into<String>) -> Self {
        Self::ChannelError {
            context: context.into(),
        }
    }

    /// Returns `true` when the call ran out of time, which callers usually
    /// treat as recoverable.
    pub const fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    /// The status code this error is reported with.
    pub const fn code(&self) -> Code {
        match self {
            Self::ChannelError { .. } => Code::Internal,
            Self::InvalidArgument { .. } => Code::InvalidArgument,
            Self::DeadlineExceeded => Code::DeadlineExceeded,
            Self::RequestCancelled => Code::Cancelled,
            Self::ServiceShutdown | Self::ConnectionFailed { .. } => Code::Unavailable,
            Self::Rpc { code, .. } => *code,
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::DeadlineExceeded => Status::deadline_exceeded("Deadline exceeded"),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::ConnectionFailed { context } => Status::unavailable(context),
            Error::Rpc { code, message } => Status::new(code, message),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::InvalidArgument => Self::InvalidArgument {
                reason: status.message().to_string(),
            },
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::Cancelled => Self::RequestCancelled,
            code => Self::Rpc {
                code,
                message: status.message().to_string(),
            },
        }
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Self::ConnectionFailed {
            context: err.to_string(),
        }
    }
}
