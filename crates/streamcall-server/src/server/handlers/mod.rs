//! Per-call accumulation handlers.
//!
//! Each handler owns the state of exactly one call. The state is built only
//! from the inbound messages consumed so far and is dropped with the call.
//! Every module pairs a synchronous state machine (unit-testable on its own)
//! with an async driver that pumps it between an [`Inbound`] source and a
//! [`MessageSender`].
//!
//! [`Inbound`]: streamcall_core::Inbound
//! [`MessageSender`]: streamcall_core::MessageSender

pub mod average;
pub mod factorize;
pub mod greeting;
pub mod maximum;
