pub mod cleanup;
pub mod heap;
pub mod shard;
pub mod store;
pub mod types;

pub use cleanup::CleanupWorker;
pub use heap::ExpiryHeap;
pub use shard::Shard;
pub use store::ShardedStore;
pub use types::{now_unix_secs, Entry};
