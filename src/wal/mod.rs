pub mod error;
pub mod manager;
pub mod record;

pub use error::WalError;
pub use manager::{recover_from_wal, WalConfig, WalManager};
pub use record::{WalAction, WalRecord};

/// The store's durability handle. The disabled arm is the no-op log used
/// when durability is turned off: logging always succeeds and close is
/// trivial.
#[derive(Debug)]
pub enum Wal {
    Durable(WalManager),
    Disabled,
}

impl Wal {
    pub async fn log(&self, record: WalRecord) {
        match self {
            Wal::Durable(manager) => manager.log(record).await,
            Wal::Disabled => {}
        }
    }

    pub async fn close(&self) {
        match self {
            Wal::Durable(manager) => manager.close().await,
            Wal::Disabled => {}
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Wal::Durable(_))
    }
}
