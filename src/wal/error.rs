use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("truncated record at offset {offset}")]
    Truncated { offset: u64 },

    #[error("invalid record at offset {offset}: {reason}")]
    Invalid { offset: u64, reason: String },

    #[error("checksum mismatch at offset {offset}: computed {computed:#010x}, stored {stored:#010x}")]
    ChecksumMismatch {
        offset: u64,
        computed: u32,
        stored: u32,
    },
}

impl WalError {
    /// Stamp a decode-time error with the file offset the record started at.
    pub(crate) fn at_offset(self, offset: u64) -> Self {
        match self {
            WalError::Truncated { .. } => WalError::Truncated { offset },
            WalError::Invalid { reason, .. } => WalError::Invalid { offset, reason },
            WalError::ChecksumMismatch {
                computed, stored, ..
            } => WalError::ChecksumMismatch {
                offset,
                computed,
                stored,
            },
            other => other,
        }
    }
}
