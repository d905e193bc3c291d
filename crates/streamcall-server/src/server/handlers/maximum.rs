use streamcall_core::{
    Inbound, MessageSender, Result,
    proto::calculator::{FindMaximumRequest, FindMaximumResponse},
};

/// Maximum seen so far in one `FindMaximum` call.
///
/// Starts uninitialized, so the first number always becomes the maximum and
/// is reported, whatever its sign.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunningMax {
    maximum: Option<i32>,
}

impl RunningMax {
    /// Records `number`; returns the new maximum only when it strictly
    /// improves on every earlier input.
    pub fn observe(&mut self, number: i32) -> Option<i32> {
        match self.maximum {
            Some(current) if number <= current => None,
            _ => {
                self.maximum = Some(number);
                self.maximum
            }
        }
    }

    pub const fn current(&self) -> Option<i32> {
        self.maximum
    }
}

/// Emits every new maximum as soon as it is observed, and closes the
/// outbound direction once the client has closed its own.
pub async fn track_maximum(
    mut inbound: impl Inbound<FindMaximumRequest>,
    mut tx: MessageSender<FindMaximumResponse>,
) -> Result<()> {
    let mut running = RunningMax::default();
    while let Some(req) = inbound.receive().await? {
        if let Some(maximum) = running.observe(req.number) {
            tx.send(FindMaximumResponse { maximum }).await?;
        }
    }
    tracing::debug!(maximum = ?running.current(), "client stream ended");
    tx.close_send();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamcall_core::{Error, channel};

    fn emitted(inputs: &[i32]) -> Vec<i32> {
        let mut running = RunningMax::default();
        inputs.iter().filter_map(|&n| running.observe(n)).collect()
    }

    #[test]
    fn reference_sequence() {
        assert_eq!(emitted(&[4, 7, 2, 19, 4, 6, 32]), vec![4, 7, 19, 32]);
    }

    #[test]
    fn first_input_is_always_emitted() {
        assert_eq!(emitted(&[-5, -9, -1]), vec![-5, -1]);
        assert_eq!(emitted(&[0, 0, 0]), vec![0]);
    }

    #[test]
    fn emits_iff_strictly_greater_than_all_previous() {
        let inputs = [5, 3, 5, 8, 8, 1, 9, -2, 10, 10, 7];
        let mut running = RunningMax::default();
        let mut seen: Vec<i32> = Vec::new();
        let mut out = Vec::new();
        for &n in &inputs {
            let expect = seen.iter().all(|&s| n > s);
            let got = running.observe(n);
            assert_eq!(got.is_some(), expect, "input {n}");
            if let Some(m) = got {
                out.push(m);
            }
            seen.push(n);
        }
        assert!(out.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(out, vec![5, 8, 9, 10]);
    }

    #[tokio::test]
    async fn responds_before_client_finishes_sending() {
        let (mut in_tx, in_rx) = channel(8);
        let (out_tx, mut out_rx) = channel(8);
        let task = tokio::spawn(track_maximum(in_rx, out_tx));

        in_tx.send(FindMaximumRequest { number: 4 }).await.unwrap();
        let first = out_rx.receive().await.unwrap().unwrap();
        assert_eq!(first.maximum, 4);

        in_tx.send(FindMaximumRequest { number: 2 }).await.unwrap();
        in_tx.send(FindMaximumRequest { number: 9 }).await.unwrap();
        assert_eq!(out_rx.receive().await.unwrap().unwrap().maximum, 9);

        in_tx.close_send();
        task.await.unwrap().unwrap();
        assert_eq!(out_rx.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn inbound_failure_aborts_the_call() {
        let (mut in_tx, in_rx) = channel(8);
        let (out_tx, _out_rx) = channel(8);
        in_tx.abort(Error::RequestCancelled).await.unwrap();
        let result = track_maximum(in_rx, out_tx).await;
        assert_eq!(result, Err(Error::RequestCancelled));
    }
}
