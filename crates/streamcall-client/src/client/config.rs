use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Runtime configuration for the `streamcall-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "streamcall-client",
    version,
    about = "Runs every streamcall RPC once against a server"
)]
pub struct ClientArgs {
    /// URL of the server to call.
    ///
    /// Environment variable: `SERVER_URL`
    #[arg(long, env = "SERVER_URL", default_value_t = String::from("http://127.0.0.1:50051"))]
    pub server_url: String,

    /// Pause between two messages of a client-side stream, in milliseconds.
    ///
    /// Environment variable: `SEND_INTERVAL_MS`
    #[arg(long, env = "SEND_INTERVAL_MS", default_value_t = 100)]
    pub send_interval_ms: u64,

    /// Connection timeout, in milliseconds.
    ///
    /// Environment variable: `CONNECT_TIMEOUT_MS`
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Budget for the `GreetWithDeadline` call expected to time out.
    ///
    /// Environment variable: `SHORT_DEADLINE_MS`
    #[arg(long, env = "SHORT_DEADLINE_MS", default_value_t = 1000)]
    pub short_deadline_ms: u64,

    /// Budget for the `GreetWithDeadline` call expected to succeed.
    ///
    /// Environment variable: `LONG_DEADLINE_MS`
    #[arg(long, env = "LONG_DEADLINE_MS", default_value_t = 5000)]
    pub long_deadline_ms: u64,

    /// Capacity of the channel feeding a client-side stream.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub send_interval: Duration,
    pub connect_timeout: Duration,
    pub short_deadline: Duration,
    pub long_deadline: Duration,
    pub stream_buffer_size: usize,
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if !(args.server_url.starts_with("http://") || args.server_url.starts_with("https://")) {
            bail!("SERVER_URL must be an http:// or https:// URL");
        }

        Ok(Self {
            server_url: args.server_url,
            send_interval: Duration::from_millis(args.send_interval_ms),
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            short_deadline: Duration::from_millis(args.short_deadline_ms),
            long_deadline: Duration::from_millis(args.long_deadline_ms),
            stream_buffer_size: args.stream_buffer_size,
        })
    }
}

impl ClientConfig {
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_from(ClientArgs::try_parse_from(args)?)
    }

    /// Opens the channel shared by every caller.
    ///
    /// # Errors
    ///
    /// Returns [`streamcall_core::Error::ConnectionFailed`] if the URL is
    /// invalid or the server cannot be reached in time.
    pub async fn connect(&self) -> streamcall_core::Result<Channel> {
        let channel = Endpoint::from_shared(self.server_url.clone())?
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(true)
            .connect()
            .await?;
        Ok(channel)
    }
}
