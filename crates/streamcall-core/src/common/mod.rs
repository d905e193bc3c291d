//! Shared contract for the streamcall client and server.
//!
//! ## Submodules
//!
//! - [`error`] - Unified error type and its mapping to/from `tonic::Status`.
//! - [`channel`] - Ordered, single-direction message channels.
//! - [`call`] - Call patterns and the per-call lifecycle state machine.
//! - [`deadline`] - Caller time budgets and `grpc-timeout` propagation.
//! - [`proto`] - Generated protobuf messages and service bindings.

pub mod call;
pub mod channel;
pub mod deadline;
pub mod error;

pub use call::{Call, CallPattern, CallState};
pub use channel::{Inbound, MessageReceiver, MessageSender, Outbound, ResponseStream, channel};
pub use deadline::Deadline;
pub use error::{Error, Result};

/// gRPC service and message definitions generated from `proto/`.
///
/// - [`calculator`](proto::calculator) - `Sum`, `PrimeNumberDecomposition`,
///   `ComputeAverage`, `FindMaximum` and `SquareRoot`.
/// - [`greet`](proto::greet) - `Greet`, `GreetManyTimes`, `LongGreet`,
///   `GreetEveryone` and `GreetWithDeadline`.
pub mod proto {
    pub mod calculator {
        tonic::include_proto!("calculator");
    }

    pub mod greet {
        tonic::include_proto!("greet");
    }

    /// Encoded descriptor set covering both services, for reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("streamcall_descriptor");
}
