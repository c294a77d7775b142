//! Cache records and their on-disk encoding

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Magic prefix of an encoded record
const RECORD_MAGIC: &[u8; 4] = b"SHC1";

/// Key of a cached response: request method plus normalized URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    /// Build a key from a request method and URL.
    ///
    /// The fragment is always dropped. When `ignore_query` is set the query
    /// string is dropped too, so `/a.js?x=1` and `/a.js?x=2` share one key.
    pub fn new(method: &str, url: &str, ignore_query: bool) -> Self {
        let url = url.split('#').next().unwrap_or_default();
        let url = if ignore_query {
            url.split('?').next().unwrap_or_default()
        } else {
            url
        };

        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stable hex digest of the key, used as a file name by disk backends
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A stored HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Look up the first header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Metadata section of an encoded record
#[derive(Serialize, Deserialize)]
struct RecordMeta {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
}

/// Encode a record as `magic | meta length (u32 BE) | meta JSON | body`
pub fn encode(key: &CacheKey, response: &CachedResponse) -> Result<Bytes, StorageError> {
    let meta = serde_json::to_vec(&RecordMeta {
        method: key.method.clone(),
        url: key.url.clone(),
        status: response.status,
        headers: response.headers.clone(),
    })
    .map_err(|e| StorageError::Backend(format!("Failed to encode record: {}", e)))?;

    let meta_len = u32::try_from(meta.len())
        .map_err(|_| StorageError::Backend("Record metadata too large".to_string()))?;

    let mut buf = BytesMut::with_capacity(8 + meta.len() + response.body.len());
    buf.put_slice(RECORD_MAGIC);
    buf.put_u32(meta_len);
    buf.put_slice(&meta);
    buf.put_slice(&response.body);
    Ok(buf.freeze())
}

/// Decode a record produced by [`encode`]
pub fn decode(data: Bytes) -> Result<(CacheKey, CachedResponse), StorageError> {
    let (meta, meta_end) = decode_meta(&data)?;
    let body = data.slice(meta_end..);

    Ok((
        CacheKey {
            method: meta.method,
            url: meta.url,
        },
        CachedResponse {
            status: meta.status,
            headers: meta.headers,
            body,
        },
    ))
}

/// Decode only the key of an encoded record
pub fn decode_key(data: &[u8]) -> Result<CacheKey, StorageError> {
    let (meta, _) = decode_meta(data)?;
    Ok(CacheKey {
        method: meta.method,
        url: meta.url,
    })
}

/// Size of the encoded form of a record
pub fn encoded_len(key: &CacheKey, response: &CachedResponse) -> u64 {
    encode(key, response)
        .map(|b| b.len() as u64)
        .unwrap_or(response.body.len() as u64)
}

fn decode_meta(data: &[u8]) -> Result<(RecordMeta, usize), StorageError> {
    if data.len() < 8 || &data[..4] != RECORD_MAGIC {
        return Err(StorageError::Corrupt("Missing record header".to_string()));
    }

    let meta_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let meta_end = 8 + meta_len;
    if data.len() < meta_end {
        return Err(StorageError::Corrupt(format!(
            "Truncated record metadata ({} of {} bytes)",
            data.len() - 8,
            meta_len
        )));
    }

    let meta: RecordMeta = serde_json::from_slice(&data[8..meta_end])
        .map_err(|e| StorageError::Corrupt(format!("Invalid record metadata: {}", e)))?;

    Ok((meta, meta_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_query_and_fragment() {
        let a = CacheKey::new("GET", "/build/pdf.mjs?x=1", true);
        let b = CacheKey::new("get", "/build/pdf.mjs?x=2#page=3", true);
        assert_eq!(a, b);
        assert_eq!(a.url(), "/build/pdf.mjs");
        assert_eq!(a.method(), "GET");
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_key_keeps_query_when_asked() {
        let a = CacheKey::new("GET", "/build/pdf.mjs?x=1", false);
        let b = CacheKey::new("GET", "/build/pdf.mjs?x=2", false);
        assert_ne!(a, b);
        assert_eq!(a.url(), "/build/pdf.mjs?x=1");
    }

    #[test]
    fn test_method_is_part_of_key() {
        let get = CacheKey::new("GET", "/web/viewer.css", true);
        let head = CacheKey::new("HEAD", "/web/viewer.css", true);
        assert_ne!(get.digest(), head.digest());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(Bytes::from_static(b"nope")),
            Err(StorageError::Corrupt(_))
        ));

        let key = CacheKey::new("GET", "/index.html", true);
        let response = CachedResponse::new(200, vec![], Bytes::from_static(b"<html>"));
        let encoded = encode(&key, &response).unwrap();
        let truncated = encoded.slice(..10);
        assert!(matches!(decode(truncated), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = CachedResponse::new(
            200,
            vec![("Content-Type".to_string(), "text/css".to_string())],
            Bytes::new(),
        );
        assert_eq!(response.header("content-type"), Some("text/css"));
        assert_eq!(response.header("etag"), None);
    }
}
