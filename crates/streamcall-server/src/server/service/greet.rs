//! `greet.GreetService`.

use crate::server::{
    config::ServerConfig,
    handlers::greeting::{
        GreetingRepeater, greet, greet_everyone, long_greet, require_greeting, slow_greet,
        stream_repeated,
    },
    streaming::{coordinator::spawn_outbound, gate::ShutdownGate},
};
use streamcall_core::{
    Deadline, ResponseStream,
    proto::greet::{
        GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest,
        GreetManyTimesResponse, GreetRequest, GreetResponse, GreetWithDeadlineRequest,
        GreetWithDeadlineResponse, LongGreetRequest, LongGreetResponse,
        greet_service_server::{GreetService, GreetServiceServer},
    },
};
use tonic::{Request, Response, Status, Streaming, codec::CompressionEncoding};

#[derive(Debug, Clone)]
pub struct GreetHandler {
    config: ServerConfig,
    gate: ShutdownGate,
}

impl GreetHandler {
    pub const fn new(config: ServerConfig, gate: ShutdownGate) -> Self {
        Self { config, gate }
    }

    pub fn into_server(self) -> GreetServiceServer<Self> {
        GreetServiceServer::new(self)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }
}

#[tonic::async_trait]
impl GreetService for GreetHandler {
    type GreetManyTimesStream = ResponseStream<GreetManyTimesResponse>;
    type GreetEveryoneStream = ResponseStream<GreetEveryoneResponse>;

    #[tracing::instrument(skip_all)]
    async fn greet(&self, req: Request<GreetRequest>) -> Result<Response<GreetResponse>, Status> {
        let greeting = req.into_inner().greeting;
        let result = self
            .gate
            .guard("Greet", async {
                require_greeting(greeting).map(|greeting| greet(&greeting))
            })
            .await?;
        Ok(Response::new(GreetResponse { result }))
    }

    /// Streams `greet_repeat_count` greetings, `greet_interval` apart.
    #[tracing::instrument(skip_all)]
    async fn greet_many_times(
        &self,
        req: Request<GreetManyTimesRequest>,
    ) -> Result<Response<Self::GreetManyTimesStream>, Status> {
        let greeting = require_greeting(req.into_inner().greeting)?;
        let repeater = GreetingRepeater::new(greeting.first_name, self.config.greet_repeat_count);
        let interval = self.config.greet_interval;
        let stream = spawn_outbound(
            &self.gate,
            "GreetManyTimes",
            self.config.stream_buffer_size,
            |tx| stream_repeated(repeater, interval, tx),
        )?;
        Ok(Response::new(stream))
    }

    #[tracing::instrument(skip_all)]
    async fn long_greet(
        &self,
        req: Request<Streaming<LongGreetRequest>>,
    ) -> Result<Response<LongGreetResponse>, Status> {
        let result = self
            .gate
            .guard("LongGreet", long_greet(req.into_inner()))
            .await?;
        Ok(Response::new(LongGreetResponse { result }))
    }

    #[tracing::instrument(skip_all)]
    async fn greet_everyone(
        &self,
        req: Request<Streaming<GreetEveryoneRequest>>,
    ) -> Result<Response<Self::GreetEveryoneStream>, Status> {
        let inbound = req.into_inner();
        let stream = spawn_outbound(
            &self.gate,
            "GreetEveryone",
            self.config.stream_buffer_size,
            |tx| greet_everyone(inbound, tx),
        )?;
        Ok(Response::new(stream))
    }

    /// Answers after `deadline_work_steps` pauses, giving up as soon as the
    /// caller's `grpc-timeout` elapses.
    #[tracing::instrument(skip_all)]
    async fn greet_with_deadline(
        &self,
        req: Request<GreetWithDeadlineRequest>,
    ) -> Result<Response<GreetWithDeadlineResponse>, Status> {
        let deadline = Deadline::from_metadata(req.metadata())?;
        if deadline.is_none() {
            tracing::debug!("no deadline propagated, running unbounded");
        }
        let greeting = require_greeting(req.into_inner().greeting)?;
        let result = self
            .gate
            .guard(
                "GreetWithDeadline",
                slow_greet(
                    greeting,
                    self.config.deadline_work_steps,
                    self.config.deadline_step,
                    deadline,
                ),
            )
            .await?;
        Ok(Response::new(GreetWithDeadlineResponse { result }))
    }
}
