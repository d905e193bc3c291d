use streamcall_core::{
    Error, MessageSender, Result, proto::calculator::PrimeNumberDecompositionResponse,
};

/// Upper bound on trial divisions per [`PrimeFactors::step`] call.
const DIVISIONS_PER_STEP: u32 = 4096;

/// Outcome of one bounded unit of factorization work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The next factor in non-decreasing order.
    Factor(i64),
    /// No factor found within this step's budget; call again.
    Pending,
    /// `remaining` reached 1, every factor has been produced.
    Done,
}

/// Trial-division state for one `PrimeNumberDecomposition` call.
///
/// The smallest divisor `d >= 2` of the remaining value is found and divided
/// out repeatedly until the remaining value is 1. Once `d * d` exceeds the
/// remaining value, that value is itself prime and is produced last.
#[derive(Debug, Clone)]
pub struct PrimeFactors {
    remaining: i64,
    divisor: i64,
}

impl PrimeFactors {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for `number < 1`.
    pub fn new(number: i64) -> Result<Self> {
        if number < 1 {
            return Err(Error::invalid_argument(format!(
                "number must be at least 1, got {number}"
            )));
        }
        Ok(Self {
            remaining: number,
            divisor: 2,
        })
    }

    /// Advances the search by at most a fixed number of trial divisions.
    pub fn step(&mut self) -> Step {
        for _ in 0..DIVISIONS_PER_STEP {
            if self.remaining == 1 {
                return Step::Done;
            }
            if self.divisor > self.remaining / self.divisor {
                let prime = self.remaining;
                self.remaining = 1;
                return Step::Factor(prime);
            }
            if self.remaining % self.divisor == 0 {
                self.remaining /= self.divisor;
                return Step::Factor(self.divisor);
            }
            self.divisor += 1;
        }
        Step::Pending
    }
}

impl Iterator for PrimeFactors {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        loop {
            match self.step() {
                Step::Factor(factor) => return Some(factor),
                Step::Pending => continue,
                Step::Done => return None,
            }
        }
    }
}

/// Streams every factor to the client, then closes the direction.
///
/// Stops early when the client is gone. Yields to the scheduler between
/// bounded steps so a large prime does not starve other calls.
pub async fn stream_factors(
    mut factors: PrimeFactors,
    mut tx: MessageSender<PrimeNumberDecompositionResponse>,
) -> Result<()> {
    loop {
        match factors.step() {
            Step::Factor(prime_factor) => {
                tx.send(PrimeNumberDecompositionResponse { prime_factor })
                    .await?;
            }
            Step::Pending => {
                if tx.is_closed() {
                    tracing::debug!("client left during factorization");
                    return Err(Error::RequestCancelled);
                }
                tokio::task::yield_now().await;
            }
            Step::Done => break,
        }
    }
    tx.close_send();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamcall_core::{Inbound, channel};

    fn factors(n: i64) -> Vec<i64> {
        PrimeFactors::new(n).unwrap().collect()
    }

    #[test]
    fn factors_twelve() {
        assert_eq!(factors(12), vec![2, 2, 3]);
    }

    #[test]
    fn one_has_no_factors() {
        assert!(factors(1).is_empty());
    }

    #[test]
    fn product_matches_and_order_is_non_decreasing() {
        for n in 2..=5_000_i64 {
            let fs = factors(n);
            assert_eq!(fs.iter().product::<i64>(), n, "product for {n}");
            assert!(fs.windows(2).all(|w| w[0] <= w[1]), "order for {n}");
            assert!(fs.iter().all(|&f| f >= 2));
        }
    }

    #[test]
    fn large_prime_and_large_composite() {
        assert_eq!(factors(2_147_483_647), vec![2_147_483_647]);
        assert_eq!(factors(1 << 40), vec![2; 40]);
        assert_eq!(factors(600_851_475_143), vec![71, 839, 1471, 6857]);
    }

    #[test]
    fn large_prime_needs_several_steps() {
        let mut pf = PrimeFactors::new(1_000_000_007).unwrap();
        let mut pending = 0;
        loop {
            match pf.step() {
                Step::Pending => pending += 1,
                Step::Factor(f) => {
                    assert_eq!(f, 1_000_000_007);
                    break;
                }
                Step::Done => panic!("prime was never produced"),
            }
        }
        assert!(pending > 0);
        assert_eq!(pf.step(), Step::Done);
    }

    #[test]
    fn rejects_non_positive_input() {
        assert!(matches!(
            PrimeFactors::new(0),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(PrimeFactors::new(-12).is_err());
    }

    #[tokio::test]
    async fn streams_factors_then_end_of_stream() {
        let (tx, mut rx) = channel(16);
        stream_factors(PrimeFactors::new(360).unwrap(), tx)
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(msg) = rx.receive().await.unwrap() {
            received.push(msg.prime_factor);
        }
        assert_eq!(received, vec![2, 2, 2, 3, 3, 5]);
    }

    #[tokio::test]
    async fn stops_when_client_departs() {
        let (tx, rx) = channel(1);
        drop(rx);
        let result = stream_factors(PrimeFactors::new(12).unwrap(), tx).await;
        assert!(matches!(result, Err(Error::ChannelError { .. })));
    }
}
