use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use watermark_server::server::{
    config::{CliArgs, ServerConfig},
    endpoint::{EndpointOptions, Endpoints},
    lifecycle::{
        Group,
        actors::{grpc_actor, http_actor, signal_actor},
        interrupt,
    },
    service::WorkflowService,
    store::InMemoryStore,
    telemetry::init_telemetry,
    transport::http,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.log_format)?;
    let logger = tracing::info_span!("watermark", version = env!("CARGO_PKG_VERSION"));

    if cfg!(debug_assertions) {
        tracing::info!(parent: &logger, ?config, "starting");
    } else {
        tracing::info!(
            parent: &logger,
            http = %config.http_addr,
            grpc = %config.grpc_addr,
            "starting"
        );
    }

    let store = Arc::new(InMemoryStore::new());
    let service = Arc::new(WorkflowService::new(
        store,
        tracing::info_span!(parent: &logger, "workflow"),
    ));
    let endpoints = Endpoints::new(
        service,
        &EndpointOptions {
            timeout: config.endpoint_timeout,
            logger: tracing::info_span!(parent: &logger, "endpoint"),
            metrics: providers.endpoint_metrics(),
        },
    );

    let shutdown = CancellationToken::new();
    let mut group = Group::new(tracing::info_span!(parent: &logger, "lifecycle"));

    let stop = CancellationToken::new();
    group.add(
        "http",
        http_actor(
            config.http_addr,
            http::router(endpoints.clone(), shutdown.clone()),
            stop.clone(),
            tracing::info_span!(parent: &logger, "http"),
        ),
        interrupt(&stop, &shutdown),
    );

    let stop = CancellationToken::new();
    group.add(
        "grpc",
        grpc_actor(
            config.grpc_addr,
            endpoints,
            shutdown.clone(),
            stop.clone(),
            tracing::info_span!(parent: &logger, "grpc"),
        ),
        interrupt(&stop, &shutdown),
    );

    let stop = CancellationToken::new();
    group.add(
        "signal",
        signal_actor(stop.clone(), tracing::info_span!(parent: &logger, "signal")),
        interrupt(&stop, &shutdown),
    );

    let result = group.run().await;
    providers.shutdown();

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_signal() => {
            tracing::info!(parent: &logger, cause = %err, "shut down gracefully");
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                parent: &logger,
                transport = err.transport(),
                error = %err,
                "shut down after failure"
            );
            Err(err.into())
        }
    }
}
