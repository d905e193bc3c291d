//! `calculator.CalculatorService`.

use crate::server::{
    config::ServerConfig,
    handlers::{
        average::compute_average,
        factorize::{PrimeFactors, stream_factors},
        maximum::track_maximum,
    },
    streaming::{coordinator::spawn_outbound, gate::ShutdownGate},
};
use streamcall_core::{
    Error, ResponseStream,
    proto::calculator::{
        ComputeAverageRequest, ComputeAverageResponse, FindMaximumRequest, FindMaximumResponse,
        PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
        SquareRootResponse, SumRequest, SumResponse,
        calculator_service_server::{CalculatorService, CalculatorServiceServer},
    },
};
use tonic::{Request, Response, Status, Streaming, codec::CompressionEncoding};

#[derive(Debug, Clone)]
pub struct CalculatorHandler {
    config: ServerConfig,
    gate: ShutdownGate,
}

impl CalculatorHandler {
    pub const fn new(config: ServerConfig, gate: ShutdownGate) -> Self {
        Self { config, gate }
    }

    /// Wraps the handler in a tonic server accepting and emitting every
    /// supported compression.
    pub fn into_server(self) -> CalculatorServiceServer<Self> {
        CalculatorServiceServer::new(self)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }
}

pub fn sum(first: i32, second: i32) -> streamcall_core::Result<i32> {
    first.checked_add(second).ok_or_else(|| {
        Error::invalid_argument(format!("{first} + {second} overflows a 32-bit integer"))
    })
}

pub fn square_root(number: i32) -> streamcall_core::Result<f64> {
    if number < 0 {
        return Err(Error::invalid_argument(format!(
            "Received a negative number: {number}"
        )));
    }
    Ok(f64::from(number).sqrt())
}

#[tonic::async_trait]
impl CalculatorService for CalculatorHandler {
    type PrimeNumberDecompositionStream = ResponseStream<PrimeNumberDecompositionResponse>;
    type FindMaximumStream = ResponseStream<FindMaximumResponse>;

    #[tracing::instrument(skip_all, fields(first = req.get_ref().first_number, second = req.get_ref().second_number))]
    async fn sum(&self, req: Request<SumRequest>) -> Result<Response<SumResponse>, Status> {
        let SumRequest {
            first_number,
            second_number,
        } = req.into_inner();
        let sum_result = self
            .gate
            .guard("Sum", async { sum(first_number, second_number) })
            .await?;
        Ok(Response::new(SumResponse { sum_result }))
    }

    #[tracing::instrument(skip_all, fields(number = req.get_ref().number))]
    async fn prime_number_decomposition(
        &self,
        req: Request<PrimeNumberDecompositionRequest>,
    ) -> Result<Response<Self::PrimeNumberDecompositionStream>, Status> {
        let factors = PrimeFactors::new(req.into_inner().number)?;
        let stream = spawn_outbound(
            &self.gate,
            "PrimeNumberDecomposition",
            self.config.stream_buffer_size,
            |tx| stream_factors(factors, tx),
        )?;
        Ok(Response::new(stream))
    }

    #[tracing::instrument(skip_all)]
    async fn compute_average(
        &self,
        req: Request<Streaming<ComputeAverageRequest>>,
    ) -> Result<Response<ComputeAverageResponse>, Status> {
        let average = self
            .gate
            .guard("ComputeAverage", compute_average(req.into_inner()))
            .await?;
        Ok(Response::new(ComputeAverageResponse { average }))
    }

    #[tracing::instrument(skip_all)]
    async fn find_maximum(
        &self,
        req: Request<Streaming<FindMaximumRequest>>,
    ) -> Result<Response<Self::FindMaximumStream>, Status> {
        let inbound = req.into_inner();
        let stream = spawn_outbound(
            &self.gate,
            "FindMaximum",
            self.config.stream_buffer_size,
            |tx| track_maximum(inbound, tx),
        )?;
        Ok(Response::new(stream))
    }

    #[tracing::instrument(skip_all, fields(number = req.get_ref().number))]
    async fn square_root(
        &self,
        req: Request<SquareRootRequest>,
    ) -> Result<Response<SquareRootResponse>, Status> {
        let number = req.into_inner().number;
        let number_root = self
            .gate
            .guard("SquareRoot", async { square_root(number) })
            .await?;
        Ok(Response::new(SquareRootResponse { number_root }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_adds_and_rejects_overflow() {
        assert_eq!(sum(1, 2).unwrap(), 3);
        assert_eq!(sum(-10, 4).unwrap(), -6);
        assert!(matches!(
            sum(i32::MAX, 1),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn square_root_of_non_negative() {
        assert!((square_root(10).unwrap() - 10f64.sqrt()).abs() < f64::EPSILON);
        assert_eq!(square_root(0).unwrap(), 0.0);
    }

    #[test]
    fn square_root_rejects_negative() {
        let err = square_root(-2).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument {
                reason: "Received a negative number: -2".into()
            }
        );
        assert_eq!(Status::from(err).code(), tonic::Code::InvalidArgument);
    }
}
