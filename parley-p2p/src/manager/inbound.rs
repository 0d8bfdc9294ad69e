//! Inbound connection listener and key-frame handshake.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parley_registry::validate_peer_id;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::error::{P2pError, P2pResult};
use crate::node::NodeShared;
use crate::peer::connection::establish;
use crate::peer::{ConnectionDirection, ConnectionInfo};
use crate::protocol::{Frame, FrameCodec, Hello};

/// Wait for the key frame that must open every accepted connection.
///
/// Anything other than a hello as the first frame is a protocol error. When
/// `require_key` is set, a hello without a key is refused.
pub async fn read_hello<S>(
    framed: &mut Framed<S, FrameCodec>,
    wait: Duration,
    require_key: bool,
) -> P2pResult<Hello>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let hello = match timeout(wait, framed.next()).await {
        Err(_) => {
            return Err(P2pError::Protocol(format!("no key frame within {:?}", wait)));
        }
        Ok(None) => {
            return Err(P2pError::Protocol("connection closed before key frame".to_string()));
        }
        Ok(Some(Err(e))) => return Err(e),
        Ok(Some(Ok(Frame::Message(_)))) => {
            return Err(P2pError::Protocol("message frame before key frame".to_string()));
        }
        Ok(Some(Ok(Frame::Hello(hello)))) => hello,
    };

    validate_peer_id("sender", &hello.sender)
        .map_err(|e| P2pError::InvalidPeerId(e.to_string()))?;

    if require_key && hello.key.is_none() {
        return Err(P2pError::Protocol(format!(
            "{} offered no key but encryption is required",
            hello.sender
        )));
    }

    Ok(hello)
}

/// Accept connections until shutdown, one handshake task per connection.
pub(crate) async fn run_listener(
    shared: Arc<NodeShared>,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Inbound listener shutting down");
                break;
            }

            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
                        }
                        tracing::debug!(addr = %addr, "Accepted inbound connection");
                        shared.tasks.spawn(handle_inbound(shared.clone(), stream, addr));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

async fn handle_inbound(shared: Arc<NodeShared>, stream: TcpStream, addr: SocketAddr) {
    let mut shutdown_rx = shared.shutdown.subscribe();
    let mut framed = Framed::new(stream, FrameCodec::new());

    let handshake = read_hello(
        &mut framed,
        shared.config.handshake_timeout,
        shared.config.encryption_enabled,
    );
    let hello = tokio::select! {
        _ = shutdown_rx.recv() => return,
        result = handshake => match result {
            Ok(hello) => hello,
            Err(e) => {
                tracing::warn!(addr = %addr, error = %e, "Inbound handshake failed, closing");
                return;
            }
        },
    };

    if hello.sender == shared.config.user_id {
        tracing::warn!(addr = %addr, "Peer claimed our own id, closing");
        return;
    }

    let info = ConnectionInfo::new(
        shared.next_connection_id(),
        hello.sender,
        addr,
        ConnectionDirection::Inbound,
        hello.key.is_some(),
    );
    establish(&shared, info, hello.key, framed).await;
}
