//! Flake containers and their record encoding.
//!
//! Record layout (all lengths are varints):
//!
//! ```text
//! Flake:      type_path: string | payload: bytes
//! ActorFlake: Flake record | translation: 3×f64 | rotation: 4×f64 | scale: 3×f64
//! ```

use crate::codec::primitives::{Reader, Writer};
use crate::error::DecodeError;
use crate::limits::{MAX_PAYLOAD_SIZE, MAX_STRING_LEN};
use crate::reflect::{Quat, Transform, TypePath, Vec3};

/// Serialized snapshot of one object or struct value.
///
/// `payload` is the compressed provider output; `type_path` names the class
/// or struct it was taken from and must resolve before the payload is read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Flake {
    type_path: TypePath,
    payload: Vec<u8>,
}

impl Flake {
    pub fn new(type_path: impl Into<TypePath>, payload: Vec<u8>) -> Self {
        Self {
            type_path: type_path.into(),
            payload,
        }
    }

    pub fn type_path(&self) -> &TypePath {
        &self.type_path
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the compressed payload in bytes.
    pub fn num_bytes(&self) -> usize {
        self.payload.len()
    }

    pub(crate) fn encode_into(&self, writer: &mut Writer) {
        writer.write_string(self.type_path.as_str());
        writer.write_bytes_prefixed(&self.payload);
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let type_path = reader.read_string(MAX_STRING_LEN, "type_path")?;
        let payload = reader.read_bytes_prefixed(MAX_PAYLOAD_SIZE, "payload")?;
        Ok(Self::new(type_path, payload))
    }

    /// Encodes the flake as a standalone record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.type_path.as_str().len() + self.payload.len() + 8);
        self.encode_into(&mut writer);
        writer.into_bytes()
    }

    /// Decodes a record produced by [`Flake::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let flake = Self::decode_from(&mut reader)?;
        expect_end(&reader)?;
        Ok(flake)
    }
}

/// A flake of an actor plus its placement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorFlake {
    flake: Flake,
    transform: Transform,
}

impl ActorFlake {
    pub fn new(flake: Flake, transform: Transform) -> Self {
        Self { flake, transform }
    }

    pub fn flake(&self) -> &Flake {
        &self.flake
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn num_bytes(&self) -> usize {
        self.flake.num_bytes()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.flake.payload.len() + 128);
        self.flake.encode_into(&mut writer);
        let t = &self.transform;
        for v in [t.translation.x, t.translation.y, t.translation.z] {
            writer.write_f64(v);
        }
        for v in [t.rotation.x, t.rotation.y, t.rotation.z, t.rotation.w] {
            writer.write_f64(v);
        }
        for v in [t.scale.x, t.scale.y, t.scale.z] {
            writer.write_f64(v);
        }
        writer.into_bytes()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let flake = Flake::decode_from(&mut reader)?;
        let mut f = || reader.read_f64("transform");
        let translation = Vec3::new(f()?, f()?, f()?);
        let rotation = Quat::new(f()?, f()?, f()?, f()?);
        let scale = Vec3::new(f()?, f()?, f()?);
        expect_end(&reader)?;
        Ok(Self {
            flake,
            transform: Transform {
                translation,
                rotation,
                scale,
            },
        })
    }
}

impl From<ActorFlake> for Flake {
    fn from(actor: ActorFlake) -> Self {
        actor.flake
    }
}

fn expect_end(reader: &Reader<'_>) -> Result<(), DecodeError> {
    if reader.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::TrailingBytes {
            remaining: reader.remaining_len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flake_record_layout() {
        let flake = Flake::new("/Script/Heart.Node", vec![1, 2, 3]);
        let bytes = flake.to_bytes();
        assert_eq!(bytes[0] as usize, "/Script/Heart.Node".len());
        assert_eq!(&bytes[bytes.len() - 4..], &[3, 1, 2, 3]);
        assert_eq!(Flake::from_bytes(&bytes).unwrap(), flake);
        assert_eq!(flake.num_bytes(), 3);
    }

    #[test]
    fn test_actor_flake_keeps_transform() {
        let transform = Transform {
            translation: Vec3::new(1.0, -2.0, 3.5),
            rotation: Quat::new(0.0, 0.0, 0.7071, 0.7071),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let actor = ActorFlake::new(Flake::new("/Script/Heart.Marker", vec![9]), transform);
        let bytes = actor.to_bytes();
        assert_eq!(bytes.len(), actor.flake().to_bytes().len() + 80);

        let decoded = ActorFlake::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.transform(), &transform);
        assert_eq!(decoded.flake(), actor.flake());
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = Flake::new("/Script/Heart.Node", vec![1, 2, 3]).to_bytes();
        assert!(matches!(
            Flake::from_bytes(&bytes[..bytes.len() - 1]),
            Err(DecodeError::UnexpectedEof { .. })
        ));

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(matches!(
            Flake::from_bytes(&padded),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        ));
    }
}
