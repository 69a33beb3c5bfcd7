//! Device transport: OSC datagrams over UDP.
//!
//! A [`Connector`] opens a [`Transport`] for an endpoint. The transport sends
//! outbound messages directly and bridges inbound datagrams into a channel
//! of [`TransportEvent`]s consumed by the session actor. Closing the
//! transport stops the receive loop and drops the channel, so nothing from a
//! torn-down session can reach the actor afterwards.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ggo_protocol::{Message, ProtocolError};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EndpointConfig;

/// Largest datagram the receive loop accepts.
const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve device address {host}:{port}")]
    Resolve { host: String, port: u16 },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transport is closed")]
    Closed,
}

/// What a transport reports to its session.
#[derive(Debug)]
pub enum TransportEvent {
    Message(Message),
    Error(TransportError),
}

/// An open link to the device.
#[async_trait]
pub trait Transport: Send {
    async fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Stop receiving and release the socket. Idempotent.
    async fn close(&mut self);

    /// Human-readable remote endpoint, for logs.
    fn remote(&self) -> String;
}

/// Opens transports. One call per session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        endpoint: &EndpointConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

// ============================================================================
// UDP
// ============================================================================

/// Opens [`UdpTransport`]s.
#[derive(Debug, Default, Clone)]
pub struct UdpConnector;

#[async_trait]
impl Connector for UdpConnector {
    async fn open(
        &self,
        endpoint: &EndpointConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let remote = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
            .await?
            .next()
            .ok_or_else(|| TransportError::Resolve {
                host: endpoint.host.clone(),
                port: endpoint.port,
            })?;

        let bind_addr = SocketAddr::new(endpoint.bind_address, endpoint.local_port());
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: bind_addr,
                source,
            })?;
        let socket = Arc::new(socket);
        debug!(local = %bind_addr, %remote, "Opened UDP transport");

        let receiver = tokio::spawn(receive_loop(socket.clone(), events));

        Ok(Box::new(UdpTransport {
            socket: Some(socket),
            remote,
            receiver: Some(receiver),
        }))
    }
}

/// OSC over a bound UDP socket, addressed to one device.
pub struct UdpTransport {
    socket: Option<Arc<UdpSocket>>,
    remote: SocketAddr,
    receiver: Option<JoinHandle<()>>,
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        let datagram = ggo_protocol::encode(message)?;
        socket.send_to(&datagram, self.remote).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
            // Wait for the abort so the socket is released before returning.
            let _ = receiver.await;
        }
        self.socket = None;
    }

    fn remote(&self) -> String {
        self.remote.to_string()
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, events: mpsc::Sender<TransportEvent>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    'recv: loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                if events.send(TransportEvent::Error(e.into())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let messages = match ggo_protocol::decode(&buf[..len]) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(%from, error = %e, "Dropping undecodable datagram");
                continue;
            }
        };

        for message in messages {
            if events.send(TransportEvent::Message(message)).await.is_err() {
                break 'recv;
            }
        }
    }

    debug!("UDP receive loop stopped");
}
