//! Shell Cache - versioned offline cache for the TurboSign viewer shell

use anyhow::{Context, Result, bail};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

mod config;

use config::Config;
use shell_api::{AppState, create_router};
use shell_core::{
    CacheManager, LifecycleController, Manifest, MatchOptions, Namespace, RequestInterceptor,
    VersionTag,
};
use shell_proxy::{OriginClient, OriginClientConfig};
use shell_storage::{CacheStore, LocalStorage, MemoryStorage};

/// Shell Cache - offline cache for the viewer shell
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "SHELL_CACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "SHELL_CACHE_PORT")]
    port: Option<u16>,

    /// Version tag of the deployed asset set
    #[arg(long, env = "SHELL_CACHE_VERSION")]
    version_tag: Option<String>,

    /// Exit with an error when the install fails instead of serving
    #[arg(long)]
    require_install: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Shell Cache v{}", env!("CARGO_PKG_VERSION"));

    // Validate everything before touching storage or the network
    let namespace = Namespace::new(config.cache.namespace.clone())?;
    let version = VersionTag::new(
        args.version_tag
            .clone()
            .unwrap_or_else(|| config.cache.version.clone()),
    )?;
    let manifest = Arc::new(Manifest::new(config.manifest.clone())?);
    let options = MatchOptions {
        ignore_query: config.cache.ignore_query,
    };

    let bind_addr = args.bind.unwrap_or_else(|| config.server.bind_address.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;
    let scope = Url::parse(&config.public_origin(port)).context("Invalid public origin")?;

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install metrics recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let storage: Arc<dyn CacheStore> = match config.storage.backend.as_str() {
        "local" => {
            tokio::fs::create_dir_all(&config.storage.local.path).await?;
            Arc::new(
                LocalStorage::new(&config.storage.local.path)
                    .await?
                    .with_quota(config.storage.quota_bytes),
            )
        }
        "memory" => Arc::new(MemoryStorage::new().with_quota(config.storage.quota_bytes)),
        other => bail!("Unknown storage backend: {}", other),
    };

    let origin = Arc::new(OriginClient::new(OriginClientConfig {
        url: config.upstream.url.clone(),
        scope: scope.to_string(),
        username: config.upstream.username.clone(),
        password: config.upstream.password.clone(),
        skip_tls_verify: config.upstream.skip_tls_verify,
        timeout: config.upstream.timeout(),
    })?);

    match origin.ping().await {
        Ok(true) => info!("Origin {} is reachable", config.upstream.url),
        Ok(false) => warn!("Origin {} reports a server error", config.upstream.url),
        Err(e) => warn!("Origin {} is unreachable: {}", config.upstream.url, e),
    }

    let cache = Arc::new(CacheManager::new(storage, namespace));

    let lifecycle = Arc::new(LifecycleController::new(
        cache.clone(),
        manifest.clone(),
        origin.clone(),
        scope.clone(),
        version,
        options,
    ));

    // Install and activate before accepting traffic
    if let Err(e) = lifecycle.run().await {
        if args.require_install {
            return Err(e).context("Install failed");
        }
        match lifecycle.active_handle() {
            Some(handle) => warn!("Install failed, serving previous store {}: {}", handle, e),
            None => error!("Install failed, passing all requests through: {}", e),
        }
    }

    let interceptor = Arc::new(RequestInterceptor::new(
        cache.clone(),
        manifest,
        lifecycle.clone(),
        origin.clone(),
        scope.clone(),
        options,
    ));

    let state = AppState::new(cache, lifecycle, interceptor.clone(), origin);
    let app = create_router(state, metrics_handle);

    info!("Listening on {}", addr);
    info!("Scope: {}, origin: {}", scope, config.upstream.url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight store writes land
    interceptor.flush().await;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
