//! Mock listener: serves registered endpoints over HTTP.
//!
//! ## Module Structure
//!
//! - `handler`: per-request flow (normalize, match, intercept, write)

mod handler;

pub use handler::{build_mock_response, handle_mock_request, RESOLUTION_HEADER};

use crate::live::InterceptionCoordinator;
use crate::registry::EndpointRegistry;
use crate::request::NormalizeOptions;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Everything a mock request needs, shared across connections.
pub struct MockContext {
    pub registry: Arc<EndpointRegistry>,
    pub coordinator: Arc<InterceptionCoordinator>,
    pub options: NormalizeOptions,
}

impl MockContext {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        coordinator: Arc<InterceptionCoordinator>,
        options: NormalizeOptions,
    ) -> Self {
        Self {
            registry,
            coordinator,
            options,
        }
    }
}

pub struct MockServer {
    listener: TcpListener,
    context: Arc<MockContext>,
}

impl MockServer {
    /// Bind the listener. Use port 0 to let the OS choose.
    pub async fn bind(addr: SocketAddr, context: Arc<MockContext>) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, context })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!("Mock server listening on http://{}", self.listener.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let context = Arc::clone(&context);
                            async move { handle_mock_request(req, context).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Mock connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Mock accept error: {}", e);
                }
            }
        }
    }
}
