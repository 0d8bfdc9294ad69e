//! Outbound connections.

use std::sync::Arc;

use futures::SinkExt;
use parley_registry::PeerAddress;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::crypto::SymmetricKey;
use crate::error::{P2pError, P2pResult};
use crate::node::NodeShared;
use crate::peer::connection::establish;
use crate::peer::{ConnectionDirection, ConnectionId, ConnectionInfo};
use crate::protocol::{Frame, FrameCodec, Hello};

/// Result of an outbound connection attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    /// Connection is ready.
    Connected(ConnectionId),
    /// A ready connection or a dial to this peer already existed.
    AlreadyConnected,
    /// The socket opened but the table kept another connection.
    Superseded,
}

/// Dial `remote_id` at `address`, send the key frame, and start the
/// connection task.
///
/// The outbound side considers the connection ready as soon as the key frame
/// has been written.
pub(crate) async fn connect_to_peer(
    shared: &Arc<NodeShared>,
    remote_id: &str,
    address: &PeerAddress,
) -> P2pResult<ConnectResult> {
    if !shared.table.write().await.start_connecting(remote_id) {
        return Ok(ConnectResult::AlreadyConnected);
    }

    let result = dial(shared, remote_id, address).await;
    shared.table.write().await.stop_connecting(remote_id);

    if let Err(e) = &result {
        tracing::warn!(peer = %remote_id, addr = %address, error = %e, "Connect failed");
    }
    result
}

async fn dial(
    shared: &Arc<NodeShared>,
    remote_id: &str,
    address: &PeerAddress,
) -> P2pResult<ConnectResult> {
    tracing::debug!(peer = %remote_id, addr = %address, "Connecting to peer");

    let connect = TcpStream::connect((address.ip.as_str(), address.port));
    let stream = match timeout(shared.config.connect_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(P2pError::Io(e)),
        Err(_) => {
            return Err(P2pError::ConnectionTimeout {
                addr: address.to_string(),
            })
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(addr = %address, error = %e, "Failed to set TCP_NODELAY");
    }
    let peer_addr = stream.peer_addr()?;

    shared.table.write().await.mark_key_pending(remote_id);

    let key = shared.config.encryption_enabled.then(SymmetricKey::generate);
    let mut framed = Framed::new(stream, FrameCodec::new());
    framed
        .send(Frame::Hello(Hello {
            sender: shared.config.user_id.clone(),
            key: key.clone(),
        }))
        .await?;

    let info = ConnectionInfo::new(
        shared.next_connection_id(),
        remote_id,
        peer_addr,
        ConnectionDirection::Outbound,
        key.is_some(),
    );
    let id = info.id;

    if establish(shared, info, key, framed).await {
        Ok(ConnectResult::Connected(id))
    } else {
        Ok(ConnectResult::Superseded)
    }
}

// Dialing needs a live node; covered in acceptance tests.
