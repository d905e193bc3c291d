use super::{
    config::ClientConfig,
    orchestrator::{Pacing, StreamResult, bidi, client_stream, server_stream, unary},
};
use streamcall_core::{
    Result,
    proto::calculator::{
        ComputeAverageRequest, FindMaximumRequest, FindMaximumResponse,
        PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
        SumRequest, calculator_service_client::CalculatorServiceClient,
    },
};
use tonic::{codec::CompressionEncoding, transport::Channel};

/// Typed access to `calculator.CalculatorService`.
#[derive(Debug, Clone)]
pub struct CalculatorCaller {
    client: CalculatorServiceClient<Channel>,
    pacing: Pacing,
}

impl CalculatorCaller {
    pub fn new(channel: Channel, config: &ClientConfig) -> Self {
        let client = CalculatorServiceClient::new(channel)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip);
        Self {
            client,
            pacing: Pacing::new(config.send_interval, config.stream_buffer_size),
        }
    }

    pub async fn sum(&self, first_number: i32, second_number: i32) -> Result<i32> {
        let mut client = self.client.clone();
        let request = SumRequest {
            first_number,
            second_number,
        };
        let response = unary("Sum", request, None, move |req| async move {
            client.sum(req).await
        })
        .await?;
        Ok(response.sum_result)
    }

    pub async fn prime_factors(&self, number: i64) -> StreamResult<i64> {
        let mut client = self.client.clone();
        let request = PrimeNumberDecompositionRequest { number };
        let result: StreamResult<PrimeNumberDecompositionResponse> =
            server_stream(
                "PrimeNumberDecomposition",
                request,
                move |req| async move { client.prime_number_decomposition(req).await },
                |_: &PrimeNumberDecompositionResponse| {},
            )
            .await;
        result.map(|resp| resp.prime_factor)
    }

    pub async fn compute_average(&self, numbers: Vec<i32>) -> Result<f64> {
        let mut client = self.client.clone();
        let requests = numbers
            .into_iter()
            .map(|number| ComputeAverageRequest { number })
            .collect();
        let response = client_stream("ComputeAverage", requests, self.pacing, move |req| {
            async move { client.compute_average(req).await }
        })
        .await?;
        Ok(response.average)
    }

    /// Every running maximum the server reported while `numbers` were sent.
    pub async fn find_maximum(&self, numbers: Vec<i32>) -> StreamResult<i32> {
        let mut client = self.client.clone();
        let requests = numbers
            .into_iter()
            .map(|number| FindMaximumRequest { number })
            .collect();
        let result: StreamResult<FindMaximumResponse> =
            bidi(
                "FindMaximum",
                requests,
                self.pacing,
                move |req| async move { client.find_maximum(req).await },
                |_: &FindMaximumResponse| {},
            )
            .await;
        result.map(|resp| resp.maximum)
    }

    pub async fn square_root(&self, number: i32) -> Result<f64> {
        let mut client = self.client.clone();
        let response = unary(
            "SquareRoot",
            SquareRootRequest { number },
            None,
            move |req| async move { client.square_root(req).await },
        )
        .await?;
        Ok(response.number_root)
    }
}
