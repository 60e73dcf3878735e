use std::time::Duration;

use tokio::net::TcpStream;

use crate::rpc::error::RpcError;
use crate::rpc::wire::{read_frame, write_frame, KvReply, Reply, Request};

const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// One connection to a peer's RPC service. Callers open a client per
/// fan-out call and drop it afterwards; there is no pooling.
pub struct RpcClient {
    stream: TcpStream,
}

impl RpcClient {
    pub async fn connect(address: &str) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self { stream })
    }

    async fn call(&mut self, request: &Request) -> Result<Reply, RpcError> {
        write_frame(&mut self.stream, request).await?;
        read_frame(&mut self.stream).await
    }

    async fn call_kv(&mut self, request: Request) -> Result<KvReply, RpcError> {
        match self.call(&request).await? {
            Reply::Kv(reply) => Ok(reply),
            Reply::Pong(_) => Err(RpcError::UnexpectedReply),
        }
    }

    pub async fn set(&mut self, key: &str, value: &str, ttl: i64) -> Result<KvReply, RpcError> {
        self.call_kv(Request::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        })
        .await
    }

    pub async fn get(&mut self, key: &str) -> Result<KvReply, RpcError> {
        self.call_kv(Request::Get {
            key: key.to_string(),
        })
        .await
    }

    pub async fn delete(&mut self, key: &str) -> Result<KvReply, RpcError> {
        self.call_kv(Request::Delete {
            key: key.to_string(),
        })
        .await
    }

    /// Liveness probe with a short deadline of its own.
    pub async fn ping(&mut self) -> Result<bool, RpcError> {
        let reply = tokio::time::timeout(PING_TIMEOUT, self.call(&Request::Ping))
            .await
            .map_err(|_| RpcError::Timeout)??;
        match reply {
            Reply::Pong(alive) => Ok(alive),
            Reply::Kv(_) => Err(RpcError::UnexpectedReply),
        }
    }
}
