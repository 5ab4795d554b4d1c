use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use avs_cli::Args;
use avs_config::AggregatorConfig;
use avs_dispatcher::{AggregatorIdentity, Dispatcher};
use avs_handler::Handler;
use avs_registry::CachedRegistryView;
use avs_rpc::FixedLatestBlock;
use avs_submitter::LoggingSubmitter;
use avs_test_utils::FixedRegistryView;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Wires config, the dispatcher, the handler surface and all three RPC
/// bindings together, then serves until SIGINT/SIGTERM, exiting 0 on a
/// graceful shutdown and non-zero on initialization failure.
///
/// The chain-backed `RegistryView` and on-chain `Submitter` are external
/// collaborators the core only consumes through a trait; this binary runs
/// with the reference fixtures from `avs-test-utils` and the logging
/// `Submitter` so the wiring itself is exercised end-to-end.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match AggregatorConfig::load(&PathBuf::from(&args.config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load aggregator config");
            return ExitCode::FAILURE;
        }
    };

    let identity = AggregatorIdentity {
        operator_state_retriever_addr: config.operator_state_retriever_address.clone(),
        registry_coordinator_addr: config.registry_coordinator_address.clone(),
        layer1_chain_id: config.layer1_chain_id,
    };

    let registry = Arc::new(CachedRegistryView::new(FixedRegistryView::default()));
    let submitter = Arc::new(LoggingSubmitter::default());
    let dispatcher = Dispatcher::spawn(registry, submitter, config.quorum_nums.clone(), identity);
    let handler = Handler::new(dispatcher);
    let latest_block: Arc<dyn avs_rpc::LatestBlock> = Arc::new(FixedLatestBlock(0));

    let shutdown = CancellationToken::new();

    let http_router = avs_rpc::legacy_http_router(handler.clone(), latest_block.clone());
    let http_addr: std::net::SocketAddr = match config.aggregator_server_ip_port_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.aggregator_server_ip_port_address, "invalid legacy HTTP listen address");
            return ExitCode::FAILURE;
        }
    };
    let grpc_addr: std::net::SocketAddr = match config.aggregator_grpc_server_ip_port_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.aggregator_grpc_server_ip_port_address, "invalid gRPC listen address");
            return ExitCode::FAILURE;
        }
    };
    let jsonrpc_addr: std::net::SocketAddr = match config.aggregator_jsonrpc_server_ip_port_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.aggregator_jsonrpc_server_ip_port_address, "invalid JSON-RPC listen address");
            return ExitCode::FAILURE;
        }
    };

    let http_shutdown = shutdown.clone();
    let http_task = tokio::spawn(async move {
        axum::Server::bind(&http_addr)
            .serve(http_router.into_make_service())
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await
    });

    let grpc_shutdown = shutdown.clone();
    let grpc_service = avs_rpc::AggregatorGrpcService::new(handler.clone(), latest_block.clone());
    let grpc_task = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(avs_rpc::proto::aggregator_server::AggregatorServer::new(grpc_service))
            .serve_with_shutdown(grpc_addr, async move { grpc_shutdown.cancelled().await })
            .await
    });

    let jsonrpc_shutdown = shutdown.clone();
    let jsonrpc_impl = avs_rpc::AggregatorRpcImpl::new(handler.clone(), latest_block.clone());
    let jsonrpc_task = tokio::spawn(async move {
        let server = match jsonrpsee::server::ServerBuilder::default().build(jsonrpc_addr).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(error = %e, "failed to bind JSON-RPC listener");
                return;
            }
        };
        let handle = server.start(jsonrpc_impl.into_rpc());
        jsonrpc_shutdown.cancelled().await;
        let _ = handle.stop();
        handle.stopped().await;
    });

    tracing::info!(
        http = %config.aggregator_server_ip_port_address,
        grpc = %config.aggregator_grpc_server_ip_port_address,
        jsonrpc = %config.aggregator_jsonrpc_server_ip_port_address,
        "aggregator listening"
    );

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining in-flight requests");
    shutdown.cancel();

    if let Err(e) = http_task.await {
        tracing::error!(error = %e, "legacy HTTP server task panicked");
    }
    if let Err(e) = grpc_task.await {
        tracing::error!(error = %e, "gRPC server task panicked");
    }
    if let Err(e) = jsonrpc_task.await {
        tracing::error!(error = %e, "JSON-RPC server task panicked");
    }

    ExitCode::SUCCESS
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
