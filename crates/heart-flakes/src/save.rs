//! Save-file container for a single flake.
//!
//! ```text
//! magic "HFLK" | version: u8 | flake record | sha256(all preceding bytes)
//! ```

use sha2::{Digest, Sha256};

use crate::api::{self, ReadOptions};
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, FlakeError};
use crate::limits::{DIGEST_LEN, MIN_SAVE_FORMAT_VERSION, SAVE_FORMAT_VERSION, SAVE_MAGIC};
use crate::model::Flake;
use crate::object::{ObjectId, ObjectStore};
use crate::provider::SerializationProvider;
use crate::reflect::{OBJECT_CLASS, StructValue};

/// A flake persisted verbatim, with an integrity digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlakeSaveFile {
    pub flake: Flake,
}

impl FlakeSaveFile {
    pub fn new(flake: Flake) -> Self {
        Self { flake }
    }

    pub fn from_object(
        provider: &dyn SerializationProvider,
        store: &ObjectStore,
        object: ObjectId,
        options: &ReadOptions,
    ) -> Result<Self, FlakeError> {
        api::create_flake(provider, store, object, options).map(Self::new)
    }

    pub fn from_struct(
        provider: &dyn SerializationProvider,
        store: &ObjectStore,
        value: &StructValue,
        options: &ReadOptions,
    ) -> Result<Self, FlakeError> {
        api::create_struct_flake(provider, store, value, options).map(Self::new)
    }

    /// Recreates the saved object under `outer`, whatever its class.
    pub fn load_object(
        &self,
        provider: &dyn SerializationProvider,
        store: &mut ObjectStore,
        outer: Option<ObjectId>,
    ) -> Result<ObjectId, FlakeError> {
        self.load_object_checked(provider, store, outer, OBJECT_CLASS)
    }

    /// Recreates the saved object, requiring it to derive from `expected`.
    pub fn load_object_checked(
        &self,
        provider: &dyn SerializationProvider,
        store: &mut ObjectStore,
        outer: Option<ObjectId>,
        expected: &str,
    ) -> Result<ObjectId, FlakeError> {
        api::create_object(provider, store, &self.flake, outer, expected)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.flake.num_bytes() + 64);
        writer.write_bytes(SAVE_MAGIC);
        writer.write_byte(SAVE_FORMAT_VERSION);
        self.flake.encode_into(&mut writer);
        let digest = Sha256::digest(writer.as_bytes());
        writer.write_bytes(&digest);
        writer.into_bytes()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let magic = reader.read_bytes(4, "magic")?;
        if magic != SAVE_MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(DecodeError::InvalidMagic { found });
        }
        let version = reader.read_byte("version")?;
        if !(MIN_SAVE_FORMAT_VERSION..=SAVE_FORMAT_VERSION).contains(&version) {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        let flake = Flake::decode_from(&mut reader)?;
        let body_len = reader.position();
        let digest = reader.read_bytes(DIGEST_LEN, "digest")?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: reader.remaining_len(),
            });
        }
        if Sha256::digest(&data[..body_len]).as_slice() != digest {
            return Err(DecodeError::DigestMismatch);
        }
        Ok(Self { flake })
    }
}
