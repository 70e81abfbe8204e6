//! HTTP listener handed to the startup sequencer once the stores are ready.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use keystone_infra::RequestServer;

enum Listen {
    Address(String),
    Bound(TcpListener),
}

pub struct HttpServer {
    listen: Listen,
    router: Router,
}

impl HttpServer {
    /// Binds `address` only when serving starts.
    pub fn new(address: impl Into<String>, router: Router) -> Self {
        Self {
            listen: Listen::Address(address.into()),
            router,
        }
    }

    /// Serve on an already bound listener (ephemeral ports in tests).
    pub fn from_listener(listener: TcpListener, router: Router) -> Self {
        Self {
            listen: Listen::Bound(listener),
            router,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listen {
            Listen::Bound(listener) => listener.local_addr().ok(),
            Listen::Address(_) => None,
        }
    }
}

#[async_trait]
impl RequestServer for HttpServer {
    async fn serve(self) -> io::Result<()> {
        let listener = match self.listen {
            Listen::Address(address) => TcpListener::bind(&address).await?,
            Listen::Bound(listener) => listener,
        };

        tracing::info!(address = %listener.local_addr()?, "listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
