//! Live session server.
//!
//! Each TCP connection is one session speaking newline-delimited JSON. A reader loop
//! feeds lines to the hub; a writer task drains the session's outbound queue.

use super::channel::{LiveHub, SessionId};
use super::protocol::ServerMessage;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

/// Longest line accepted from a session.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

pub struct LiveServer {
    listener: TcpListener,
    hub: Arc<LiveHub>,
}

impl LiveServer {
    /// Bind the listener. Use port 0 to let the OS choose.
    pub async fn bind(addr: SocketAddr, hub: Arc<LiveHub>) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, hub })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept sessions until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!("Live session server listening on {}", self.listener.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let hub = Arc::clone(&self.hub);
                    tokio::spawn(async move {
                        serve_session(stream, peer, hub).await;
                    });
                }
                Err(e) => {
                    error!("Live accept error: {}", e);
                }
            }
        }
    }
}

async fn serve_session(stream: TcpStream, peer: SocketAddr, hub: Arc<LiveHub>) {
    let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let (sink, mut lines) = framed.split();
    let (session, outbound) = hub.connect();
    debug!(session, %peer, "Live session opened");

    let writer = tokio::spawn(write_outbound(session, sink, outbound));

    while let Some(next) = lines.next().await {
        match next {
            Ok(line) => hub.handle_line(session, &line),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(session, "Ignoring live message over {} bytes", MAX_LINE_LENGTH);
            }
            Err(LinesCodecError::Io(e)) => {
                debug!(session, error = %e, "Live session read failed");
                break;
            }
        }
    }

    hub.disconnect(session);
    writer.abort();
    debug!(session, %peer, "Live session closed");
}

async fn write_outbound<S>(
    session: SessionId,
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) where
    S: futures::Sink<String, Error = LinesCodecError> + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                error!(session, error = %e, "Failed to encode live message");
                continue;
            }
        };
        if let Err(e) = sink.send(line).await {
            debug!(session, error = %e, "Live session write failed");
            break;
        }
    }
}
