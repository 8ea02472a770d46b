//! Security limits and wire constants.
//!
//! The reader treats every payload as untrusted input: lengths, counts and
//! nesting depth are all bounded before anything is allocated.

/// Magic bytes at the start of a serialized save file.
pub const SAVE_MAGIC: &[u8; 4] = b"HFLK";

/// Current save file format version.
pub const SAVE_FORMAT_VERSION: u8 = 1;

/// Oldest save file format version the reader still accepts.
pub const MIN_SAVE_FORMAT_VERSION: u8 = 1;

/// Maximum bytes in a varint (10 bytes for a 64-bit value).
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum length of any string (type paths, object paths, field text).
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum length of a byte field.
pub const MAX_BYTES_LEN: usize = 64 * 1024 * 1024;

/// Maximum number of elements in an array field.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

/// Maximum decompressed payload size.
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

/// Maximum nesting of owned objects and structs below the flake root.
///
/// Enforced on capture as well as on read, so anything that can be captured
/// can be read back: an owned chain deeper than this is not supported and
/// fails to encode with `EncodeError::DepthExceeded`.
pub const MAX_DEPTH: usize = 128;

/// Maximum nesting of JSON containers in a JSON payload, root included.
///
/// `serde_json` refuses deeper documents, so the JSON writer stops here.
pub const MAX_JSON_NESTING: usize = 127;

/// Length of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;
