//! Listener setup and process lifecycle.

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::router::{router, AppState};
use crate::domain::models::Config;
use crate::domain::ports::SessionSource;
use crate::infrastructure::emby::{EmbyClient, EmbyClientConfig};
use crate::infrastructure::proxy::{Forwarder, ForwarderConfig};
use crate::services::{AuthorizationCache, AuthorizationGate, RequestClassifier};

/// Wire the gate and forwarder for `config` around the given session source
pub fn build_state(config: &Config, sessions: Arc<dyn SessionSource>) -> Result<AppState> {
    let classifier = RequestClassifier::new(&config.backend.route_prefix)
        .with_context(|| format!("Invalid route prefix: {}", config.backend.route_prefix))?;
    let cache = Arc::new(AuthorizationCache::new(config.cache.max_entries));
    info!(
        pattern = classifier.pattern(),
        ttl = %config.cache.ttl,
        max_entries = cache.max_entries(),
        "gating primary image requests"
    );
    let gate = AuthorizationGate::new(
        classifier,
        cache,
        sessions,
        config.cache.ttl.as_duration(),
    );
    let forwarder = Forwarder::new(ForwarderConfig::from(config))?;

    Ok(AppState {
        gate,
        forwarder,
        trust_forwarded_headers: config.server.trust_forwarded_headers,
    })
}

/// A configured gate ready to accept connections
pub struct GateServer {
    state: AppState,
    host: String,
    port: u16,
    tls: Option<(PathBuf, PathBuf)>,
    sweep_interval: Duration,
}

impl GateServer {
    /// Build a server that queries the configured Emby backend
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = EmbyClient::new(EmbyClientConfig::from(&config.backend))?;
        info!(url = %client.sessions_url(), "confirming sessions against backend");
        Self::with_session_source(config, Arc::new(client))
    }

    /// Build a server around an explicit session source
    pub fn with_session_source(config: &Config, sessions: Arc<dyn SessionSource>) -> Result<Self> {
        let tls = config.server.tls.as_ref().and_then(|tls| {
            tls.cert_path
                .clone()
                .zip(tls.key_path.clone())
        });

        Ok(Self {
            state: build_state(config, sessions)?,
            host: config.server.host.clone(),
            port: config.server.port,
            tls,
            sweep_interval: config.cache.sweep_interval.as_duration(),
        })
    }

    /// Accept connections until `handle` requests shutdown
    ///
    /// The cache sweeper runs for as long as the listener does.
    pub async fn run(self, handle: Handle) -> Result<()> {
        let addr = resolve_bind_addr(&self.host, self.port).await?;
        let sweeper = self.state.gate.cache().spawn_sweeper(self.sweep_interval);
        let app = router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        let result = match self.tls {
            Some((cert_path, key_path)) => {
                // Both ring and aws-lc-rs are compiled in; pick one explicitly
                let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
                let tls = RustlsConfig::from_pem_file(&cert_path, &key_path)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to load TLS material from {} and {}",
                            cert_path.display(),
                            key_path.display()
                        )
                    })?;
                info!(%addr, "starting HTTPS listener");
                axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await
            }
            None => {
                info!(%addr, "starting HTTP listener");
                axum_server::bind(addr).handle(handle).serve(app).await
            }
        };

        sweeper.abort();
        result.with_context(|| format!("Listener on {addr} failed"))?;
        info!("server stopped");
        Ok(())
    }
}

/// Run the gate for `config` until SIGINT or SIGTERM
pub async fn serve(config: &Config) -> Result<()> {
    let server = GateServer::from_config(config)?;
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        config.server.shutdown_grace.as_duration(),
    ));
    server.run(handle).await
}

async fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve listen address {host}:{port}"))?
        .next()
        .with_context(|| format!("No address found for {host}:{port}"))
}

/// Wait for a termination signal, then drain connections for up to `grace`
pub async fn shutdown_signal(handle: Handle, grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(?grace, "shutdown requested, draining connections");
    handle.graceful_shutdown(Some(grace));
}
