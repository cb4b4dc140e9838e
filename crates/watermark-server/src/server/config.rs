use crate::server::telemetry::LogFormat;
use anyhow::{Context, bail};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Runtime configuration for the `watermark-server` binary.
///
/// Every flag falls back to an environment variable, and a `.env` file in the
/// working directory is loaded before parsing.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "watermark-server",
    version,
    about = "Document watermarking workflow over JSON/HTTP and gRPC"
)]
pub struct CliArgs {
    /// Interface both listeners bind to.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Port of the JSON/HTTP listener.
    ///
    /// Environment variable: `HTTP_PORT`
    #[arg(long, env = "HTTP_PORT", default_value_t = 8081)]
    pub http_port: u16,

    /// Port of the gRPC listener.
    ///
    /// Environment variable: `GRPC_PORT`
    #[arg(long, env = "GRPC_PORT", default_value_t = 8082)]
    pub grpc_port: u16,

    /// Per-call endpoint deadline in milliseconds. `0` disables it.
    ///
    /// Environment variable: `ENDPOINT_TIMEOUT_MS`
    #[arg(long, env = "ENDPOINT_TIMEOUT_MS", default_value_t = 0)]
    pub endpoint_timeout_ms: u64,

    /// Console log format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub endpoint_timeout: Option<Duration>,
    pub log_format: LogFormat,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let ip: IpAddr = args
            .host
            .parse()
            .with_context(|| format!("HOST ({}) is not an IP address", args.host))?;

        let http_addr = SocketAddr::new(ip, args.http_port);
        let grpc_addr = SocketAddr::new(ip, args.grpc_port);
        if http_addr == grpc_addr {
            bail!("HTTP_PORT and GRPC_PORT must differ (both {})", args.http_port);
        }

        let endpoint_timeout =
            (args.endpoint_timeout_ms > 0).then(|| Duration::from_millis(args.endpoint_timeout_ms));

        Ok(Self {
            http_addr,
            grpc_addr,
            endpoint_timeout,
            log_format: args.log_format,
        })
    }
}
