//! Assembly of the tonic server.

use crate::server::{
    config::ServerConfig,
    service::{calculator::CalculatorHandler, greet::GreetHandler},
    streaming::gate::ShutdownGate,
};
use futures::Stream;
use streamcall_core::proto::{
    FILE_DESCRIPTOR_SET, calculator::calculator_service_server::CalculatorServiceServer,
    greet::greet_service_server::GreetServiceServer,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::transport::{Server, server::Connected};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Serves both services on `incoming` until `signal` resolves, then shuts
/// down gracefully.
///
/// Besides `CalculatorService` and `GreetService` the server carries the
/// standard health and reflection services, and accepts gRPC-Web over
/// HTTP/1 with permissive CORS.
///
/// Once `signal` fires, health reports `NOT_SERVING`, new calls are refused
/// with `Unavailable`, in-flight calls get `shutdown_timeout` to finish and
/// whatever is left is cancelled.
pub async fn serve_with_incoming<I, IO, IE, F>(
    incoming: I,
    config: ServerConfig,
    signal: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<CalculatorServiceServer<CalculatorHandler>>()
        .await;
    health_reporter
        .set_serving::<GreetServiceServer<GreetHandler>>()
        .await;

    let gate = ShutdownGate::new(config.shutdown_timeout);
    let calculator = CalculatorHandler::new(config.clone(), gate.clone());
    let greet = GreetHandler::new(config, gate.clone());

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(calculator.into_server())
        .add_service(greet.into_server())
        .serve_with_incoming_shutdown(incoming, drain_on(signal, gate, health_reporter))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

async fn drain_on<F>(signal: F, gate: ShutdownGate, health_reporter: HealthReporter)
where
    F: Future<Output = ()>,
{
    signal.await;
    tracing::info!("Shutdown signal received, terminating gracefully...");

    health_reporter
        .set_not_serving::<CalculatorServiceServer<CalculatorHandler>>()
        .await;
    health_reporter
        .set_not_serving::<GreetServiceServer<GreetHandler>>()
        .await;

    gate.shutdown().await;
}
