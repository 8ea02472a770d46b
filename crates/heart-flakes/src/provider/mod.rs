//! Serialization providers.
//!
//! A provider turns an object or struct into raw (uncompressed) payload
//! bytes and back. Flakes record only the payload, not the provider, so a
//! flake must be read back with the provider that wrote it.

mod binary;
mod json;
mod registry;

pub use binary::{BinaryProvider, NetBinaryProvider};
pub use json::{CLASS_NAME_KEY, JsonProvider};
pub use registry::ProviderRegistry;

use crate::codec::ReadReport;
use crate::error::{EncodeError, FlakeError};
use crate::object::{ObjectId, ObjectStore};
use crate::reflect::{ClassDesc, StructValue};

/// Name of the provider every registry starts with.
pub const DEFAULT_PROVIDER: &str = "Binary";

/// A named payload format.
pub trait SerializationProvider: Send + Sync {
    /// Registry key of this provider.
    fn name(&self) -> &str;

    fn serialize_struct(&self, store: &ObjectStore, value: &StructValue) -> Result<Vec<u8>, EncodeError>;

    fn serialize_object(&self, store: &ObjectStore, object: ObjectId) -> Result<Vec<u8>, EncodeError>;

    fn deserialize_struct(
        &self,
        store: &ObjectStore,
        dest: &mut StructValue,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError>;

    /// Reads `data` into `dest`, which is of `class` or derives from it.
    fn deserialize_object(
        &self,
        store: &mut ObjectStore,
        dest: ObjectId,
        class: &ClassDesc,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError>;
}
