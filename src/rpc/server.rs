use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::rpc::wire::{read_frame, write_frame, KvReply, Reply, Request};
use crate::storage::ShardedStore;

/// Request/reply RPC service over the local store. One task per connection;
/// a connection carries any number of sequential calls.
pub struct RpcServer {
    listener: TcpListener,
    store: Arc<ShardedStore>,
}

impl RpcServer {
    pub async fn bind(addr: SocketAddr, store: Arc<ShardedStore>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "rpc connection accepted");
                    let store = self.store.clone();
                    tokio::spawn(handle_connection(stream, store));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rpc accept failed");
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, store: Arc<ShardedStore>) {
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(request) => request,
            Err(e) => {
                tracing::trace!(error = %e, "rpc connection closed");
                break;
            }
        };

        let reply = dispatch(&store, request).await;

        if let Err(e) = write_frame(&mut stream, &reply).await {
            tracing::debug!(error = %e, "rpc reply write failed");
            break;
        }
    }
}

async fn dispatch(store: &ShardedStore, request: Request) -> Reply {
    match request {
        Request::Set { key, value, ttl } => {
            store.set(&key, &value, ttl).await;
            Reply::Kv(KvReply::ok(""))
        }
        Request::Get { key } => match store.get(&key).await {
            Some(value) => Reply::Kv(KvReply::ok(value)),
            None => Reply::Kv(KvReply::err("Key not found or expired")),
        },
        Request::Delete { key } => {
            store.delete(&key).await;
            Reply::Kv(KvReply::ok(""))
        }
        Request::Ping => Reply::Pong(true),
    }
}
