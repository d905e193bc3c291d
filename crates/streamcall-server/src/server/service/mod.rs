//! tonic service implementations.
//!
//! Both services share one [`ShutdownGate`](crate::server::streaming::gate::ShutdownGate)
//! so that draining covers every in-flight call regardless of the service it
//! belongs to.

pub mod calculator;
pub mod greet;
