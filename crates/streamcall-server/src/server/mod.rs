//! Server-side components of the streamcall services.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration and its validation.
//! - [`handlers`] - Per-call accumulation state machines (factorization,
//!   averaging, running maximum, greetings).
//! - [`service`] - tonic service implementations for `CalculatorService`
//!   and `GreetService`.
//! - [`streaming`] - Spawning of outbound streams and the shutdown gate every
//!   call passes through.
//! - [`router`] - Assembly of the tonic server (health, reflection,
//!   gRPC-Web, compression, graceful shutdown).
//! - [`telemetry`] - Logging initialization and optional OpenTelemetry export.

pub mod config;
pub mod handlers;
pub mod router;
pub mod service;
pub mod streaming;
pub mod telemetry;
