use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `streamcall-server` binary.
///
/// All values are parsed from CLI arguments or environment variables. The
/// defaults reproduce the reference pacing of the demo services: ten
/// greetings one second apart, and a deadline-bound greeting that needs three
/// seconds of work.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "streamcall-server",
    version,
    about = "A gRPC service demonstrating unary, server, client and bidirectional streaming"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/streamcall.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Capacity of the outbound buffer between a streaming handler and the
    /// gRPC response body.
    ///
    /// A handler that gets this far ahead of its client waits before sending
    /// more.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Number of messages emitted by `GreetManyTimes`.
    ///
    /// Environment variable: `GREET_REPEAT_COUNT`
    #[arg(long, env = "GREET_REPEAT_COUNT", default_value_t = 10)]
    pub greet_repeat_count: u32,

    /// Pause between two `GreetManyTimes` messages, in milliseconds.
    ///
    /// Environment variable: `GREET_INTERVAL_MS`
    #[arg(long, env = "GREET_INTERVAL_MS", default_value_t = 1000)]
    pub greet_interval_ms: u64,

    /// Number of work steps `GreetWithDeadline` performs before answering.
    ///
    /// Environment variable: `DEADLINE_WORK_STEPS`
    #[arg(long, env = "DEADLINE_WORK_STEPS", default_value_t = 3)]
    pub deadline_work_steps: u32,

    /// Duration of one `GreetWithDeadline` work step, in milliseconds.
    ///
    /// Environment variable: `DEADLINE_STEP_MS`
    #[arg(long, env = "DEADLINE_STEP_MS", default_value_t = 1000)]
    pub deadline_step_ms: u64,

    /// Seconds to wait for in-flight calls to finish on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub stream_buffer_size: usize,
    pub greet_repeat_count: u32,
    pub greet_interval: Duration,
    pub deadline_work_steps: u32,
    pub deadline_step: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.greet_repeat_count == 0 {
            bail!("GREET_REPEAT_COUNT must be greater than 0");
        }

        if args.server_addr.trim().is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            stream_buffer_size: args.stream_buffer_size,
            greet_repeat_count: args.greet_repeat_count,
            greet_interval: Duration::from_millis(args.greet_interval_ms),
            deadline_work_steps: args.deadline_work_steps,
            deadline_step: Duration::from_millis(args.deadline_step_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

impl ServerConfig {
    /// Parses configuration from an explicit argument list, as if passed on
    /// the command line.
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_from(CliArgs::try_parse_from(args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_pacing() {
        let config = ServerConfig::from_args(["streamcall-server"]).unwrap();
        assert_eq!(config.stream_buffer_size, 8);
        assert_eq!(config.greet_repeat_count, 10);
        assert_eq!(config.greet_interval, Duration::from_secs(1));
        assert_eq!(config.deadline_work_steps, 3);
        assert_eq!(config.deadline_step, Duration::from_secs(1));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
        assert!(!config.uds);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::from_args([
            "streamcall-server",
            "--greet-repeat-count",
            "4",
            "--greet-interval-ms",
            "5",
            "--deadline-step-ms",
            "20",
        ])
        .unwrap();
        assert_eq!(config.greet_repeat_count, 4);
        assert_eq!(config.greet_interval, Duration::from_millis(5));
        assert_eq!(config.deadline_step, Duration::from_millis(20));
    }

    #[test]
    fn rejects_zero_sized_buffers_and_counts() {
        let err = ServerConfig::from_args(["streamcall-server", "--stream-buffer-size", "0"])
            .unwrap_err();
        assert!(err.to_string().contains("STREAM_BUFFER_SIZE"));

        let err = ServerConfig::from_args(["streamcall-server", "--greet-repeat-count", "0"])
            .unwrap_err();
        assert!(err.to_string().contains("GREET_REPEAT_COUNT"));
    }
}
