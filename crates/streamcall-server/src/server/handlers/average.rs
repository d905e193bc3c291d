use streamcall_core::{Error, Inbound, Result, proto::calculator::ComputeAverageRequest};

/// Running `(sum, count)` for one `ComputeAverage` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Average {
    sum: i64,
    count: u64,
}

impl Average {
    pub fn push(&mut self, number: i32) {
        self.sum += i64::from(number);
        self.count += 1;
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Consumes the accumulator and yields `sum / count`.
    ///
    /// # Errors
    ///
    /// An empty stream has no mean and is rejected with
    /// [`Error::InvalidArgument`].
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(self) -> Result<f64> {
        if self.count == 0 {
            return Err(Error::invalid_argument(
                "ComputeAverage requires at least one number",
            ));
        }
        Ok(self.sum as f64 / self.count as f64)
    }
}

/// Reads until the client's end-of-stream, then computes the mean.
///
/// A transport error discards the partial sum.
pub async fn compute_average(mut inbound: impl Inbound<ComputeAverageRequest>) -> Result<f64> {
    let mut average = Average::default();
    while let Some(req) = inbound.receive().await? {
        average.push(req.number);
    }
    tracing::debug!(count = average.count(), "client stream ended");
    average.finish()
}
