//! Entry Codec Module
//!
//! Serializes cached responses into the on-disk entry format and back.
//!
//! # Layout
//! ```text
//! "UDCE" | version: u8 | header_len: u32 BE | header JSON | body_len: u64 BE | body
//! ```
//! The body is stored raw so it round-trips bit-for-bit without JSON escaping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::models::{CachedResponse, StoragePolicy};

const MAGIC: &[u8; 4] = b"UDCE";
const VERSION: u8 = 1;

/// Response metadata stored ahead of the body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    expires_at: DateTime<Utc>,
    storage_policy: StoragePolicy,
}

// == Encode ==
/// Encodes a response into its on-disk byte representation.
pub fn encode(response: &CachedResponse) -> Result<Vec<u8>> {
    let header = EntryHeader {
        url: response.url.clone(),
        status: response.status,
        headers: response.headers.clone(),
        expires_at: response.expires_at,
        storage_policy: response.storage_policy,
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| CacheError::Internal(format!("failed to encode entry header: {}", e)))?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| CacheError::Internal("entry header too large".to_string()))?;

    let mut out = Vec::with_capacity(4 + 1 + 4 + header_bytes.len() + 8 + response.body.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&header_len.to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(response.body.len() as u64).to_be_bytes());
    out.extend_from_slice(&response.body);
    Ok(out)
}

// == Decode ==
/// Decodes bytes produced by [`encode`].
///
/// Truncated, foreign or trailing-garbage input fails with `CorruptEntry`.
pub fn decode(bytes: &[u8]) -> Result<CachedResponse> {
    let mut reader = Reader::new(bytes);

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = reader.take(1)?[0];
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }

    let header_len = u32::from_be_bytes(reader.array()?) as usize;
    let header: EntryHeader = serde_json::from_slice(reader.take(header_len)?)
        .map_err(|e| corrupt(format!("malformed header: {}", e)))?;

    let body_len = usize::try_from(u64::from_be_bytes(reader.array()?))
        .map_err(|_| corrupt("body length overflow"))?;
    let body = reader.take(body_len)?.to_vec();

    if !reader.is_empty() {
        return Err(corrupt("trailing bytes after body"));
    }

    Ok(CachedResponse {
        url: header.url,
        status: header.status,
        headers: header.headers,
        body,
        expires_at: header.expires_at,
        storage_policy: header.storage_policy,
    })
}

fn corrupt(msg: impl Into<String>) -> CacheError {
    CacheError::CorruptEntry(msg.into())
}

/// Bounds-checked cursor over the encoded bytes.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(corrupt("truncated entry"));
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> CachedResponse {
        CachedResponse::new(
            "https://example.com/image.png",
            200,
            vec![0u8, 159, 146, 150, 255],
            Utc::now() + Duration::hours(1),
        )
        .with_header("Content-Type", "image/png")
        .with_header("ETag", "\"abc\"")
    }

    #[test]
    fn test_roundtrip() {
        let resp = sample();
        let bytes = encode(&resp).unwrap();
        assert_eq!(decode(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_roundtrip_empty_body() {
        let resp = CachedResponse::new("https://example.com/", 204, Vec::new(), Utc::now());
        let bytes = encode(&resp).unwrap();
        assert_eq!(decode(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode(&sample()).unwrap();
        for cut in [0, 3, 5, 9, bytes.len() - 1] {
            let result = decode(&bytes[..cut]);
            assert!(
                matches!(result, Err(CacheError::CorruptEntry(_))),
                "cut at {} should be corrupt",
                cut
            );
        }
    }

    #[test]
    fn test_decode_foreign_bytes() {
        let result = decode(b"<html>not a cache entry</html>");
        assert!(matches!(result, Err(CacheError::CorruptEntry(_))));
    }

    #[test]
    fn test_decode_unknown_version() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[4] = 99;
        assert!(matches!(decode(&bytes), Err(CacheError::CorruptEntry(_))));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CacheError::CorruptEntry(_))));
    }

    #[test]
    fn test_decode_huge_length_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(CacheError::CorruptEntry(_))));
    }
}
