//! Admission control and graceful shutdown for in-flight calls.
//!
//! Every call enters the [`ShutdownGate`] before any work starts and holds a
//! [`CallGuard`] until its handler returns. Shutdown happens in phases:
//!
//! 1. refuse new calls with [`Error::ServiceShutdown`],
//! 2. wait up to the configured timeout for in-flight calls to drain,
//! 3. cancel whatever is still running through a shared
//!    [`CancellationToken`].

use crate::server::telemetry::{
    decrement_calls_inflight, increment_call_errors, increment_calls, increment_calls_inflight,
    record_call_duration,
};
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{sync::Arc, time::Instant};
use streamcall_core::{Error, Result};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct Inner {
    refusing: AtomicBool,
    inflight: AtomicUsize,
    shutdown_token: CancellationToken,
    drain_timeout: Duration,
}

/// Cheaply cloneable handle shared by every service instance.
#[derive(Debug, Clone)]
pub struct ShutdownGate {
    inner: Arc<Inner>,
}

impl ShutdownGate {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                refusing: AtomicBool::new(false),
                inflight: AtomicUsize::new(0),
                shutdown_token: CancellationToken::new(),
                drain_timeout,
            }),
        }
    }

    /// Admits one call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn enter(&self, method: &'static str) -> Result<CallGuard> {
        if self.inner.refusing.load(Ordering::Acquire) {
            increment_call_errors(method);
            return Err(Error::ServiceShutdown);
        }
        self.inner.inflight.fetch_add(1, Ordering::AcqRel);
        increment_calls(method);
        increment_calls_inflight(method);
        Ok(CallGuard {
            gate: self.clone(),
            method,
            start: Instant::now(),
        })
    }

    /// Runs `fut` as one admitted call, aborting it with
    /// [`Error::ServiceShutdown`] if shutdown cancels in-flight work.
    pub async fn guard<T, F>(&self, method: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _guard = self.enter(method)?;
        let result = tokio::select! {
            res = fut => res,
            () = self.inner.shutdown_token.cancelled() => Err(Error::ServiceShutdown),
        };
        if let Err(e) = &result {
            increment_call_errors(method);
            tracing::warn!(method, error = %e, "call failed");
        }
        result
    }

    /// Token cancelled when in-flight calls must stop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown_token.clone()
    }

    pub fn inflight(&self) -> usize {
        self.inner.inflight.load(Ordering::Acquire)
    }

    pub fn is_refusing(&self) -> bool {
        self.inner.refusing.load(Ordering::Acquire)
    }

    /// Stops admitting calls, drains, then cancels the rest.
    pub async fn shutdown(&self) {
        tracing::info!("Refusing new calls");
        self.inner.refusing.store(true, Ordering::Release);

        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drained = timeout(self.inner.drain_timeout, async {
            while self.inflight() > 0 {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight calls drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} calls still active)",
                self.inflight()
            ),
        }

        tracing::debug!("Cancelling remaining calls via shutdown token");
        self.inner.shutdown_token.cancel();
    }
}

/// Held for the lifetime of one admitted call.
#[derive(Debug)]
pub struct CallGuard {
    gate: ShutdownGate,
    method: &'static str,
    start: Instant,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.gate.inner.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_calls_inflight(self.method);
        record_call_duration(self.method, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
