//! Error types for flake creation, reconstruction and the reflection layer.

use thiserror::Error;

use crate::object::ObjectId;
use crate::reflect::TypePath;

/// Stable error codes for [`FlakeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// F001: Source object or struct is null or invalid
    InvalidSource,
    /// F002: Stored type is incompatible with the expected type
    TypeMismatch,
    /// F003: No provider is registered under the requested name
    ProviderNotFound,
    /// F004: Payload failed structural or integrity checks
    CorruptPayload,
    /// F005: A type path no longer resolves
    TypeNotFound,
    /// F006: Encoding failed
    EncodeFailed,
    /// F007: Reflection misuse (unknown field, kind mismatch, ...)
    Reflection,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "F001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidSource => "F001",
            ErrorCode::TypeMismatch => "F002",
            ErrorCode::ProviderNotFound => "F003",
            ErrorCode::CorruptPayload => "F004",
            ErrorCode::TypeNotFound => "F005",
            ErrorCode::EncodeFailed => "F006",
            ErrorCode::Reflection => "F007",
        }
    }
}

/// Operation-level failure of a flake call.
///
/// A failed call has written nothing: callers treat any `Err` as a no-op.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlakeError {
    #[error("[F001] invalid source: {reason}")]
    InvalidSource { reason: String },

    #[error("[F002] type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("[F003] serialization provider {name:?} is not registered")]
    ProviderNotFound { name: String },

    #[error("[F004] corrupt payload: {0}")]
    CorruptPayload(#[from] DecodeError),

    #[error("[F005] type {path} could not be resolved")]
    TypeNotFound { path: TypePath },

    #[error("[F006] {0}")]
    Encode(#[from] EncodeError),

    #[error("[F007] {0}")]
    Reflect(#[from] ReflectError),
}

impl FlakeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            FlakeError::InvalidSource { .. } => ErrorCode::InvalidSource,
            FlakeError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            FlakeError::ProviderNotFound { .. } => ErrorCode::ProviderNotFound,
            FlakeError::CorruptPayload(_) => ErrorCode::CorruptPayload,
            FlakeError::TypeNotFound { .. } => ErrorCode::TypeNotFound,
            FlakeError::Encode(_) => ErrorCode::EncodeFailed,
            FlakeError::Reflect(_) => ErrorCode::Reflection,
        }
    }

    pub(crate) fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        FlakeError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("invalid object marker {marker} for {field}")]
    InvalidMarker { field: String, marker: u8 },

    #[error("owned object in {field} has no owner to attach to")]
    MissingOwner { field: String },

    #[error("owned object block for {field} declares {declared} bytes but {consumed} were read")]
    BlockLengthMismatch {
        field: String,
        declared: usize,
        consumed: usize,
    },

    #[error("owned class {path} for {field} is not registered")]
    UnresolvedOwnedClass { field: String, path: String },

    #[error("struct type {path} is not registered")]
    UnknownStruct { path: String },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    #[error("{remaining} trailing bytes after the last field")]
    TrailingBytes { remaining: usize },

    #[error("invalid magic bytes: expected HFLK, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("unsupported version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("integrity digest mismatch")]
    DigestMismatch,

    #[error("unknown compressor id: {id}")]
    UnknownCompressor { id: u8 },

    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("expected {expected} for {field} in JSON payload")]
    UnexpectedJson { field: String, expected: &'static str },
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: String,
        len: usize,
        max: usize,
    },

    #[error("owned nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    #[error("value of {field} does not match its declared kind {expected}")]
    KindMismatch { field: String, expected: String },

    #[error("struct type {path} is not registered")]
    UnknownStruct { path: TypePath },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("{field} holds a non-finite float, which JSON cannot represent")]
    NonFiniteFloat { field: String },

    #[error("JSON encoding failed: {0}")]
    Json(String),
}

/// Misuse of the reflection layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReflectError {
    #[error("type {path} is already registered")]
    DuplicateType { path: TypePath },

    #[error("type {path} declares field {field} twice")]
    DuplicateField { path: TypePath, field: String },

    #[error("parent type {parent} of {path} is not registered")]
    UnknownParent { path: TypePath, parent: TypePath },

    #[error("type {path} is not registered")]
    UnknownType { path: TypePath },

    #[error("type {path} has no field {field}")]
    UnknownField { path: TypePath, field: String },

    #[error("field {field} expects {expected}, got {found}")]
    KindMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("default value of {field} does not match its kind")]
    InvalidDefault { field: String },

    #[error("object {id} does not exist")]
    DanglingObject { id: ObjectId },

    #[error("an object named {path} already exists")]
    DuplicatePath { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FlakeError::ProviderNotFound {
            name: "Unknown".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::ProviderNotFound);
        assert_eq!(err.code().code(), "F003");

        let err: FlakeError = DecodeError::VarintTooLong.into();
        assert_eq!(err.code(), ErrorCode::CorruptPayload);
        assert!(err.to_string().starts_with("[F004]"));
    }
}
