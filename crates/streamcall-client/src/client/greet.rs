use super::{
    config::ClientConfig,
    orchestrator::{Pacing, StreamResult, bidi, client_stream, server_stream, unary},
};
use core::time::Duration;
use streamcall_core::{
    Deadline, Result,
    proto::greet::{
        GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest,
        GreetManyTimesResponse, GreetRequest, GreetWithDeadlineRequest, Greeting,
        LongGreetRequest, greet_service_client::GreetServiceClient,
    },
};
use tonic::{codec::CompressionEncoding, transport::Channel};

pub fn greeting(first_name: &str, last_name: &str) -> Greeting {
    Greeting {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    }
}

/// Typed access to `greet.GreetService`.
#[derive(Debug, Clone)]
pub struct GreetCaller {
    client: GreetServiceClient<Channel>,
    pacing: Pacing,
}

impl GreetCaller {
    pub fn new(channel: Channel, config: &ClientConfig) -> Self {
        let client = GreetServiceClient::new(channel)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip);
        Self {
            client,
            pacing: Pacing::new(config.send_interval, config.stream_buffer_size),
        }
    }

    pub async fn greet(&self, greeting: Greeting) -> Result<String> {
        let mut client = self.client.clone();
        let request = GreetRequest {
            greeting: Some(greeting),
        };
        let response = unary("Greet", request, None, move |req| async move {
            client.greet(req).await
        })
        .await?;
        Ok(response.result)
    }

    /// Collects every greeting, handing each one to `on_message` as it arrives.
    pub async fn greet_many_times<M>(
        &self,
        greeting: Greeting,
        mut on_message: M,
    ) -> StreamResult<String>
    where
        M: FnMut(&str),
    {
        let mut client = self.client.clone();
        let request = GreetManyTimesRequest {
            greeting: Some(greeting),
        };
        let result: StreamResult<GreetManyTimesResponse> = server_stream(
            "GreetManyTimes",
            request,
            move |req| async move { client.greet_many_times(req).await },
            |resp: &GreetManyTimesResponse| on_message(resp.result.as_str()),
        )
        .await;
        result.map(|resp| resp.result)
    }

    pub async fn long_greet(&self, greetings: Vec<Greeting>) -> Result<String> {
        let mut client = self.client.clone();
        let requests = greetings
            .into_iter()
            .map(|greeting| LongGreetRequest {
                greeting: Some(greeting),
            })
            .collect();
        let response = client_stream("LongGreet", requests, self.pacing, move |req| {
            async move { client.long_greet(req).await }
        })
        .await?;
        Ok(response.result)
    }

    /// Like [`Self::greet_many_times`], `on_message` sees each reply as it arrives.
    pub async fn greet_everyone<M>(
        &self,
        greetings: Vec<Greeting>,
        mut on_message: M,
    ) -> StreamResult<String>
    where
        M: FnMut(&str) + Send + 'static,
    {
        let mut client = self.client.clone();
        let requests = greetings
            .into_iter()
            .map(|greeting| GreetEveryoneRequest {
                greeting: Some(greeting),
            })
            .collect();
        let result: StreamResult<GreetEveryoneResponse> =
            bidi(
                "GreetEveryone",
                requests,
                self.pacing,
                move |req| async move { client.greet_everyone(req).await },
                move |resp: &GreetEveryoneResponse| on_message(resp.result.as_str()),
            )
            .await;
        result.map(|resp| resp.result)
    }

    /// Calls `GreetWithDeadline` with `budget` to spare.
    pub async fn greet_with_deadline(&self, greeting: Greeting, budget: Duration) -> Result<String> {
        let mut client = self.client.clone();
        let request = GreetWithDeadlineRequest {
            greeting: Some(greeting),
        };
        let deadline = Deadline::after(budget);
        let response = unary(
            "GreetWithDeadline",
            request,
            Some(deadline),
            move |req| async move { client.greet_with_deadline(req).await },
        )
        .await?;
        Ok(response.result)
    }
}
