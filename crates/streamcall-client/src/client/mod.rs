//! Client-side components.
//!
//! - [`config`] - CLI/environment configuration and channel setup.
//! - [`orchestrator`] - Drives one call of each pattern and tracks its
//!   lifecycle.
//! - [`calculator`] / [`greet`] - Typed callers for the two services.

pub mod calculator;
pub mod config;
pub mod greet;
pub mod orchestrator;
