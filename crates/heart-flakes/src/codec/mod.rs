//! Binary encoding/decoding for flake payloads.
//!
//! A payload is the flat sequence of an object's (or struct's) field
//! encodings in descriptor order. Object-like fields are preceded by a
//! one-byte [`ObjectMarker`]:
//!
//! - `Null`: nothing follows.
//! - `Owned`: class path, optional block length, then the nested fields.
//! - `Reference`: object path; resolved by lookup, never reconstructed.

pub mod compression;
pub mod primitives;
pub mod reader;
pub mod writer;

pub use compression::{CompressionLevel, CompressionOptions, Compressor, compress, decompress};
pub use primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
pub use reader::{Diagnostic, ReadReport, decode_object, decode_struct};
pub use writer::{encode_object, encode_struct};

/// Discriminator preceding every object, soft and weak reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectMarker {
    Null = 0,
    /// Inlined by value; the object is owned by the one being processed.
    Owned = 1,
    /// Stored as a path token.
    Reference = 2,
}

impl ObjectMarker {
    /// Creates an ObjectMarker from its wire representation.
    pub fn from_u8(v: u8) -> Option<ObjectMarker> {
        match v {
            0 => Some(ObjectMarker::Null),
            1 => Some(ObjectMarker::Owned),
            2 => Some(ObjectMarker::Reference),
            _ => None,
        }
    }
}

/// Layout switches shared by the writer and the reader.
///
/// Both sides of a payload must use the same options; they are fixed per
/// provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Prefix every owned block with its byte length so the reader can step
    /// over a block whose class no longer resolves.
    pub skippable_objects: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            skippable_objects: true,
        }
    }
}

impl CodecOptions {
    /// Compact layout without block lengths.
    pub fn compact() -> Self {
        Self {
            skippable_objects: false,
        }
    }
}
