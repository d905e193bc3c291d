//! Call execution plumbing shared by both services.
//!
//! - [`gate`] - Admission, in-flight accounting and graceful shutdown.
//! - [`coordinator`] - Spawns a streaming handler behind an outbound channel
//!   and hands tonic the receiving half as the response body.

pub mod coordinator;
pub mod gate;
