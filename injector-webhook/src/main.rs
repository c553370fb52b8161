use anyhow::Context as _;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use dns_mesh_injector::{InjectorConfig, KubeServiceResolver, MutationEngine};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

/// Mutating admission webhook injecting the DNS mesh sidecar into Deployments
#[derive(Parser, Debug)]
#[clap(name = "injector-webhook", version)]
struct Args {
    /// Webhook server port
    #[clap(long, env = "PORT", default_value_t = 8443)]
    port: u16,
    /// TLS certificate file
    #[clap(long, default_value = "/etc/webhook/certs/tls.crt")]
    cert_file: PathBuf,
    /// TLS key file
    #[clap(long, default_value = "/etc/webhook/certs/tls.key")]
    key_file: PathBuf,
    /// Deadline for a single admission call, DNS service lookup included
    #[clap(long, default_value_t = 10)]
    request_timeout_secs: u64,
    /// How long in-flight requests may finish after a shutdown signal
    #[clap(long, default_value_t = 5)]
    shutdown_grace_secs: u64,
    #[clap(flatten)]
    injector: InjectorConfig,
}

struct AppState {
    engine: MutationEngine<KubeServiceResolver>,
    request_timeout: Duration,
}

async fn mutate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let reply = tokio::time::timeout(
        state.request_timeout,
        state.engine.handle(content_type, &body),
    )
    .await;
    match reply {
        Ok(reply) => (
            reply.status,
            [(header::CONTENT_TYPE, reply.content_type)],
            reply.body,
        )
            .into_response(),
        Err(_) => {
            tracing::error!(
                timeout = ?state.request_timeout,
                "Admission call exceeded its deadline"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Admission decision timed out",
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::warn!("failed to install SIGTERM handler: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

async fn shutdown_on_signal(handle: Handle, grace: Duration) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                tracing::warn!("failed to listen for ctrl-c: {}", err);
                return;
            }
        }
        _ = terminate_signal() => (),
    }
    tracing::info!("Shutting down server...");
    handle.graceful_shutdown(Some(grace));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    tracing::info!(args = ?args, "parsed command-line arguments");

    tracing::info!("Connecting to kube");
    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let engine = MutationEngine::from_config(&args.injector, KubeServiceResolver::new(client))
        .context("invalid injector configuration")?;
    let state = Arc::new(AppState {
        engine,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
    });

    let app = Router::new()
        .route("/mutate", post(mutate))
        .route("/health", get(health))
        .with_state(state);

    let tls = RustlsConfig::from_pem_file(&args.cert_file, &args.key_file)
        .await
        .with_context(|| {
            format!(
                "failed to load TLS certificates from {} and {}",
                args.cert_file.display(),
                args.key_file.display()
            )
        })?;

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(
        handle.clone(),
        Duration::from_secs(args.shutdown_grace_secs),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!(addr = %addr, "Listening");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("webhook server failed")?;

    tracing::info!("Server exited");
    Ok(())
}
