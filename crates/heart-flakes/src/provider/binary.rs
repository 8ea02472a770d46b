use crate::codec::{self, CodecOptions, ReadReport};
use crate::error::{EncodeError, FlakeError};
use crate::object::{ObjectId, ObjectStore};
use crate::provider::{DEFAULT_PROVIDER, SerializationProvider};
use crate::reflect::{ClassDesc, StructValue};

/// Default provider. Owned blocks carry a length prefix, so a sub-object
/// whose class no longer resolves is skipped and reported instead of
/// failing the whole read.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryProvider;

/// Compact provider for peers that share an identical schema.
///
/// Owned blocks have no length prefix; a sub-object whose class does not
/// resolve makes the payload unreadable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetBinaryProvider;

impl NetBinaryProvider {
    pub const NAME: &'static str = "NetBinary";
}

impl SerializationProvider for BinaryProvider {
    fn name(&self) -> &str {
        DEFAULT_PROVIDER
    }

    fn serialize_struct(&self, store: &ObjectStore, value: &StructValue) -> Result<Vec<u8>, EncodeError> {
        codec::encode_struct(store, value, CodecOptions::default())
    }

    fn serialize_object(&self, store: &ObjectStore, object: ObjectId) -> Result<Vec<u8>, EncodeError> {
        codec::encode_object(store, object, CodecOptions::default())
    }

    fn deserialize_struct(
        &self,
        store: &ObjectStore,
        dest: &mut StructValue,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError> {
        codec::decode_struct(store, dest, data, CodecOptions::default())
    }

    fn deserialize_object(
        &self,
        store: &mut ObjectStore,
        dest: ObjectId,
        class: &ClassDesc,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError> {
        codec::decode_object(store, dest, class, data, CodecOptions::default())
    }
}

impl SerializationProvider for NetBinaryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn serialize_struct(&self, store: &ObjectStore, value: &StructValue) -> Result<Vec<u8>, EncodeError> {
        codec::encode_struct(store, value, CodecOptions::compact())
    }

    fn serialize_object(&self, store: &ObjectStore, object: ObjectId) -> Result<Vec<u8>, EncodeError> {
        codec::encode_object(store, object, CodecOptions::compact())
    }

    fn deserialize_struct(
        &self,
        store: &ObjectStore,
        dest: &mut StructValue,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError> {
        codec::decode_struct(store, dest, data, CodecOptions::compact())
    }

    fn deserialize_object(
        &self,
        store: &mut ObjectStore,
        dest: ObjectId,
        class: &ClassDesc,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError> {
        codec::decode_object(store, dest, class, data, CodecOptions::compact())
    }
}
