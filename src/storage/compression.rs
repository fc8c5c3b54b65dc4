//! Gzip compression for captured payloads.
//!
//! Blobs are small JSON export requests, so the default flate2 level is a
//! good balance between ratio and capture latency.

use crate::core::{RecorderError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Suffix for gzip-compressed blobs
pub const GZIP_EXTENSION: &str = ".gz";

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Gzip-compress `data`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| RecorderError::storage(format!("Gzip compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| RecorderError::storage(format!("Gzip compression failed: {}", e)))
}

/// Decompress a gzip stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if !is_gzip(data) {
        return Err(RecorderError::DecompressionFailure(
            "payload is not a gzip stream".to_string(),
        ));
    }

    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RecorderError::DecompressionFailure(e.to_string()))?;
    Ok(out)
}

/// True when `data` starts with the gzip magic bytes.
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= GZIP_MAGIC.len() && data[..2] == GZIP_MAGIC
}

/// Compress on a blocking thread so large payloads don't stall the runtime.
pub async fn compress_async(data: Vec<u8>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || compress(&data)).await?
}

/// Decompress on a blocking thread.
pub async fn decompress_async(data: bytes::Bytes) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || decompress(&data)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let payload = br#"{"resourceSpans":[{"scopeSpans":[{"spans":[]}]}]}"#.repeat(20);
        let compressed = compress(&payload).unwrap();

        assert!(is_gzip(&compressed));
        assert!(compressed.len() < payload.len());
        assert_eq!(decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn test_empty_payload() {
        let compressed = compress(b"").unwrap();
        assert!(decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_plain_data() {
        let err = decompress(b"{\"not\":\"gzip\"}").unwrap_err();
        assert!(matches!(err, RecorderError::DecompressionFailure(_)));
    }

    #[test]
    fn test_rejects_truncated_stream() {
        let compressed = compress(&b"x".repeat(4096)).unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        assert!(matches!(decompress(truncated), Err(RecorderError::DecompressionFailure(_))));
    }

    #[tokio::test]
    async fn test_async_helpers() {
        let compressed = compress_async(b"hello otlp".to_vec()).await.unwrap();
        let restored = decompress_async(bytes::Bytes::from(compressed)).await.unwrap();
        assert_eq!(restored, b"hello otlp");
    }
}
