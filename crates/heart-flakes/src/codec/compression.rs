//! Compression boundary for flake payloads.
//!
//! A non-empty payload is framed as:
//!
//! ```text
//! [algorithm: u8][decompressed size: varint][body]
//! ```
//!
//! An empty raw buffer compresses to an empty payload, which in turn
//! decompresses to an empty buffer.

use std::io::Read;

use tracing::debug;

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_PAYLOAD_SIZE;

/// Compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compressor {
    /// Body is the raw buffer.
    Stored = 0,
    #[default]
    Zstd = 1,
}

impl Compressor {
    /// Creates a Compressor from its wire representation.
    pub fn from_u8(v: u8) -> Option<Compressor> {
        match v {
            0 => Some(Compressor::Stored),
            1 => Some(Compressor::Zstd),
            _ => None,
        }
    }
}

/// Speed/ratio trade-off. Ignored by [`Compressor::Stored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub enum CompressionLevel {
    #[default]
    Fastest,
    Fast,
    Normal,
    Optimal,
    Max,
}

impl CompressionLevel {
    /// The zstd level this maps onto.
    pub fn zstd_level(self) -> i32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Normal => 6,
            CompressionLevel::Optimal => 12,
            CompressionLevel::Max => 19,
        }
    }
}

/// Options for compressing a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionOptions {
    pub algorithm: Compressor,
    pub level: CompressionLevel,
}

impl CompressionOptions {
    /// No compression; the body is the raw payload.
    pub fn stored() -> Self {
        Self {
            algorithm: Compressor::Stored,
            level: CompressionLevel::Fastest,
        }
    }

    /// Zstd at the given level.
    pub fn zstd(level: CompressionLevel) -> Self {
        Self {
            algorithm: Compressor::Zstd,
            level,
        }
    }
}

/// Compresses `raw` into a framed payload.
pub fn compress(raw: &[u8], options: CompressionOptions) -> Result<Vec<u8>, EncodeError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if raw.len() > MAX_PAYLOAD_SIZE {
        return Err(EncodeError::LengthExceedsLimit {
            field: "payload".to_string(),
            len: raw.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let body = match options.algorithm {
        Compressor::Stored => None,
        Compressor::Zstd => Some(
            zstd::encode_all(raw, options.level.zstd_level())
                .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?,
        ),
    };
    let body = body.as_deref().unwrap_or(raw);

    let mut writer = Writer::with_capacity(1 + 10 + body.len());
    writer.write_byte(options.algorithm as u8);
    writer.write_varint(raw.len() as u64);
    writer.write_bytes(body);
    Ok(writer.into_bytes())
}

/// Decompresses a framed payload produced by [`compress`].
pub fn decompress(payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::new(payload);
    let id = reader.read_byte("compressor")?;
    let algorithm = Compressor::from_u8(id).ok_or(DecodeError::UnknownCompressor { id })?;
    let declared_size = reader.read_len(MAX_PAYLOAD_SIZE, "decompressed_size")?;
    let body = reader.remaining();

    let decompressed = match algorithm {
        Compressor::Stored => body.to_vec(),
        Compressor::Zstd => {
            let decoder = zstd::Decoder::new(body)
                .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

            // One byte past the declared size is enough to detect a lie.
            let mut decompressed = Vec::with_capacity(declared_size);
            decoder
                .take(declared_size as u64 + 1)
                .read_to_end(&mut decompressed)
                .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
            decompressed
        }
    };

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}

/// Logs before/after sizes of one compression.
pub(crate) fn log_statistics(operation: &str, raw_len: usize, payload_len: usize, options: CompressionOptions) {
    let ratio = if raw_len == 0 {
        1.0
    } else {
        payload_len as f64 / raw_len as f64
    };
    debug!(
        operation,
        algorithm = ?options.algorithm,
        level = ?options.level,
        raw_len,
        payload_len,
        ratio,
        "flake payload compressed"
    );
}
