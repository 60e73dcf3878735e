pub mod client;
pub mod error;
pub mod server;
pub mod wire;

pub use client::RpcClient;
pub use error::RpcError;
pub use server::RpcServer;
pub use wire::{KvReply, Reply, Request};
