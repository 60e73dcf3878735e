use bytes::{BufMut, BytesMut};
use crc32fast::Hasher;

use crate::wal::error::WalError;

const MAX_FIELD_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalAction {
    Set,
    Delete,
}

impl WalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalAction::Set => "set",
            WalAction::Delete => "delete",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "set" => Some(WalAction::Set),
            "delete" => Some(WalAction::Delete),
            _ => None,
        }
    }
}

/// One durable operation. On disk, little-endian:
///
/// ```text
/// i32 action_len | action_bytes
/// i32 key_len    | key_bytes
/// i32 value_len  | value_bytes
/// i64 ttl
/// i64 timestamp
/// u32 checksum       CRC32-IEEE over key_bytes || value_bytes
/// ```
///
/// Delete records carry an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub action: WalAction,
    pub key: String,
    pub value: String,
    pub ttl: i64,
    pub timestamp: i64,
}

impl WalRecord {
    pub fn set(key: &str, value: &str, ttl: i64, timestamp: i64) -> Self {
        Self {
            action: WalAction::Set,
            key: key.to_string(),
            value: value.to_string(),
            ttl,
            timestamp,
        }
    }

    pub fn delete(key: &str, timestamp: i64) -> Self {
        Self {
            action: WalAction::Delete,
            key: key.to_string(),
            value: String::new(),
            ttl: 0,
            timestamp,
        }
    }

    pub fn checksum(&self) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(self.key.as_bytes());
        hasher.update(self.value.as_bytes());
        hasher.finalize()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let action = self.action.as_str().as_bytes();
        buf.put_i32_le(action.len() as i32);
        buf.put_slice(action);
        buf.put_i32_le(self.key.len() as i32);
        buf.put_slice(self.key.as_bytes());
        buf.put_i32_le(self.value.len() as i32);
        buf.put_slice(self.value.as_bytes());
        buf.put_i64_le(self.ttl);
        buf.put_i64_le(self.timestamp);
        buf.put_u32_le(self.checksum());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Decode one record from the front of `data`, verifying the checksum.
    /// Returns the record and the number of bytes consumed. Errors carry
    /// offset 0; the replay loop stamps the real file offset.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), WalError> {
        let mut pos = 0usize;

        let action = read_string(data, &mut pos)?;
        let key = read_string(data, &mut pos)?;
        let value = read_string(data, &mut pos)?;
        let ttl = read_i64(data, &mut pos)?;
        let timestamp = read_i64(data, &mut pos)?;
        let stored = read_u32(data, &mut pos)?;

        let action = WalAction::parse(&action).ok_or_else(|| WalError::Invalid {
            offset: 0,
            reason: format!("unknown action {:?}", action),
        })?;

        let record = WalRecord {
            action,
            key,
            value,
            ttl,
            timestamp,
        };

        let computed = record.checksum();
        if computed != stored {
            return Err(WalError::ChecksumMismatch {
                offset: 0,
                computed,
                stored,
            });
        }

        Ok((record, pos))
    }
}

fn read_string(data: &[u8], pos: &mut usize) -> Result<String, WalError> {
    let len = read_i32(data, pos)?;
    if len < 0 || len as usize > MAX_FIELD_LEN {
        return Err(WalError::Invalid {
            offset: 0,
            reason: format!("field length {} out of range", len),
        });
    }
    let len = len as usize;
    if *pos + len > data.len() {
        return Err(WalError::Truncated { offset: 0 });
    }
    let s = std::str::from_utf8(&data[*pos..*pos + len])
        .map_err(|_| WalError::Invalid {
            offset: 0,
            reason: "field is not valid UTF-8".to_string(),
        })?
        .to_string();
    *pos += len;
    Ok(s)
}

fn read_i32(data: &[u8], pos: &mut usize) -> Result<i32, WalError> {
    if *pos + 4 > data.len() {
        return Err(WalError::Truncated { offset: 0 });
    }
    let bytes: [u8; 4] = data[*pos..*pos + 4]
        .try_into()
        .map_err(|_| WalError::Truncated { offset: 0 })?;
    *pos += 4;
    Ok(i32::from_le_bytes(bytes))
}

fn read_i64(data: &[u8], pos: &mut usize) -> Result<i64, WalError> {
    if *pos + 8 > data.len() {
        return Err(WalError::Truncated { offset: 0 });
    }
    let bytes: [u8; 8] = data[*pos..*pos + 8]
        .try_into()
        .map_err(|_| WalError::Truncated { offset: 0 })?;
    *pos += 8;
    Ok(i64::from_le_bytes(bytes))
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32, WalError> {
    if *pos + 4 > data.len() {
        return Err(WalError::Truncated { offset: 0 });
    }
    let bytes: [u8; 4] = data[*pos..*pos + 4]
        .try_into()
        .map_err(|_| WalError::Truncated { offset: 0 })?;
    *pos += 4;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let record = WalRecord::set("key1", "value1", 30, 1700000000);
        let bytes = record.to_bytes();

        let (decoded, consumed) = WalRecord::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, record);
    }

    #[test]
    fn delete_record_has_empty_value() {
        let record = WalRecord::delete("key1", 1700000000);
        let bytes = record.to_bytes();

        let (decoded, _) = WalRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.action, WalAction::Delete);
        assert_eq!(decoded.value, "");
        assert_eq!(decoded.ttl, 0);
    }

    #[test]
    fn two_records_decode_sequentially() {
        let a = WalRecord::set("x", "1", 0, 100);
        let b = WalRecord::delete("x", 101);
        let mut bytes = a.to_bytes();
        bytes.extend_from_slice(&b.to_bytes());

        let (first, consumed) = WalRecord::decode(&bytes).unwrap();
        assert_eq!(first, a);
        let (second, _) = WalRecord::decode(&bytes[consumed..]).unwrap();
        assert_eq!(second, b);
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let record = WalRecord::set("key1", "value1", 0, 1700000000);
        let mut bytes = record.to_bytes();

        // Flip a byte inside the value payload.
        let value_start = bytes.len() - 4 - 8 - 8 - "value1".len();
        bytes[value_start] ^= 0xFF;

        let err = WalRecord::decode(&bytes).unwrap_err();
        assert!(matches!(err, WalError::ChecksumMismatch { .. }));
    }

    #[test]
    fn truncated_record_fails_decode() {
        let record = WalRecord::set("key1", "value1", 0, 1700000000);
        let bytes = record.to_bytes();

        let err = WalRecord::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, WalError::Truncated { .. }));
    }

    #[test]
    fn unknown_action_is_invalid() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(4);
        buf.put_slice(b"incr");
        buf.put_i32_le(1);
        buf.put_slice(b"k");
        buf.put_i32_le(0);
        buf.put_i64_le(0);
        buf.put_i64_le(0);
        buf.put_u32_le(0);

        let err = WalRecord::decode(&buf).unwrap_err();
        assert!(matches!(err, WalError::Invalid { .. }));
    }
}
