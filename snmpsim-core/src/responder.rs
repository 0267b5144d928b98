//! The request-serving loop.

use crate::{shutdown::Shutdown, snmp::Agent};
use std::{io, net::SocketAddr, time::Duration};
use thiserror::Error as ThisError;
use tokio::{net::UdpSocket, time::timeout};

/// Size of the receive buffer. Longer datagrams are truncated and will fail
/// to decode.
pub const RECV_BUFFER_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Waiting for the next datagram.
    Listening,
    /// Decoding, dispatching and answering one request.
    Processing,
    /// Terminal: the shutdown signal was seen and the socket released.
    ShuttingDown,
}

/// Owns the agent's UDP socket and answers one request at a time until the
/// shutdown signal fires.
pub struct Responder {
    socket: UdpSocket,
    agent: Agent,
    recv_timeout: Duration,
    shutdown: Shutdown,
    state: ResponderState,
}

impl Responder {
    pub async fn bind(
        address: SocketAddr,
        agent: Agent,
        recv_timeout: Duration,
        shutdown: Shutdown,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(address).await?;
        tracing::info!("Listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            agent,
            recv_timeout,
            shutdown,
            state: ResponderState::Listening,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    /// Serves requests until shutdown. The socket is closed when this returns.
    ///
    /// A receive timeout only re-checks the shutdown signal. A request the
    /// agent rejects is logged and dropped. Any other socket error ends the
    /// loop with a [`TransportError`], which the caller must treat as fatal.
    pub async fn run(mut self) -> Result<(), TransportError> {
        let mut buffer = vec![0u8; RECV_BUFFER_LEN];
        loop {
            if self.shutdown.is_shut_down() {
                self.transition(ResponderState::ShuttingDown);
                tracing::info!("Responder shutting down");
                return Ok(());
            }

            let (len, source) =
                match timeout(self.recv_timeout, self.socket.recv_from(&mut buffer)).await {
                    Err(_elapsed) => continue,
                    Ok(Err(err)) => {
                        tracing::error!("Failed to read buffer: {err}");
                        return Err(TransportError::Receive(err));
                    }
                    Ok(Ok(received)) => received,
                };

            self.transition(ResponderState::Processing);
            match self.agent.process_datagram(&buffer[..len]) {
                Ok(response) => {
                    if let Err(err) = self.socket.send_to(&response, source).await {
                        tracing::error!("Failed to write buffer: {err}");
                        return Err(TransportError::Send(err));
                    }
                }
                Err(err) => tracing::warn!("Dropped request from {source}: {err}"),
            }
            self.transition(ResponderState::Listening);
        }
    }

    fn transition(&mut self, next: ResponderState) {
        tracing::trace!("Responder {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Socket failures other than a receive timeout.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Failed to receive a datagram: {0}")]
    Receive(#[source] io::Error),
    #[error("Failed to send a response: {0}")]
    Send(#[source] io::Error),
}
