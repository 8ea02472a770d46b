//! Flake construction protocol.
//!
//! Every operation takes the provider explicitly; [`ProviderRegistry`]
//! offers the same operations keyed by provider name.
//!
//! [`ProviderRegistry`]: crate::provider::ProviderRegistry

use std::sync::Arc;

use tracing::debug;

use crate::codec::{CompressionOptions, ReadReport, compress, compression, decompress};
use crate::error::FlakeError;
use crate::model::{ActorFlake, Flake};
use crate::object::{Object, ObjectId, ObjectStore};
use crate::provider::SerializationProvider;
use crate::reflect::{ClassDesc, StructValue};

/// Options for taking a flake of a live object or struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    pub compression: CompressionOptions,
    /// Log payload sizes before and after compression at debug level.
    pub log_compression: bool,
}

impl ReadOptions {
    pub fn with_compression(mut self, compression: CompressionOptions) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.log_compression = true;
        self
    }
}

/// Options for restoring a flake into an existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Run post-load hooks once all fields are restored: on the destination
    /// first, then on every object it owns.
    pub exec_post_load: bool,
}

impl WriteOptions {
    pub fn post_load() -> Self {
        Self {
            exec_post_load: true,
        }
    }
}

/// Takes a flake of `object` and the sub-objects it owns.
///
/// Actors carry a placement and go through [`create_actor_flake`] instead.
pub fn create_flake(
    provider: &dyn SerializationProvider,
    store: &ObjectStore,
    object: ObjectId,
    options: &ReadOptions,
) -> Result<Flake, FlakeError> {
    let source = source_object(store, object)?;
    if source.class().is_actor() {
        return Err(FlakeError::InvalidSource {
            reason: format!("{} is an actor; use create_actor_flake", source.path()),
        });
    }
    snapshot_object(provider, store, source, options)
}

/// Takes a flake of a struct value. References inside it are always
/// recorded as paths.
pub fn create_struct_flake(
    provider: &dyn SerializationProvider,
    store: &ObjectStore,
    value: &StructValue,
    options: &ReadOptions,
) -> Result<Flake, FlakeError> {
    let path = value.type_path();
    if store.types().struct_desc(path.as_str()).is_none() {
        return Err(FlakeError::InvalidSource {
            reason: format!("struct type {path} is not registered"),
        });
    }
    let raw = provider.serialize_struct(store, value)?;
    let payload = compress_payload("create_struct_flake", &raw, options)?;
    debug!(type_path = %path, bytes = payload.len(), "struct flake created");
    Ok(Flake::new(path.clone(), payload))
}

/// Takes a flake of an actor together with its transform.
pub fn create_actor_flake(
    provider: &dyn SerializationProvider,
    store: &ObjectStore,
    actor: ObjectId,
    options: &ReadOptions,
) -> Result<ActorFlake, FlakeError> {
    let source = source_object(store, actor)?;
    if !source.class().is_actor() {
        return Err(FlakeError::InvalidSource {
            reason: format!("{} is not an actor", source.path()),
        });
    }
    let transform = source.transform().copied().unwrap_or_default();
    let flake = snapshot_object(provider, store, source, options)?;
    Ok(ActorFlake::new(flake, transform))
}

fn source_object(store: &ObjectStore, id: ObjectId) -> Result<&Object, FlakeError> {
    store.get(id).ok_or_else(|| FlakeError::InvalidSource {
        reason: format!("object {id} does not exist"),
    })
}

fn snapshot_object(
    provider: &dyn SerializationProvider,
    store: &ObjectStore,
    source: &Object,
    options: &ReadOptions,
) -> Result<Flake, FlakeError> {
    let raw = provider.serialize_object(store, source.id())?;
    let payload = compress_payload("create_flake", &raw, options)?;
    debug!(
        object = source.path(),
        provider = provider.name(),
        bytes = payload.len(),
        "flake created"
    );
    Ok(Flake::new(source.class().path().clone(), payload))
}

fn compress_payload(operation: &str, raw: &[u8], options: &ReadOptions) -> Result<Vec<u8>, FlakeError> {
    let payload = compress(raw, options.compression)?;
    if options.log_compression {
        compression::log_statistics(operation, raw.len(), payload.len(), options.compression);
    }
    Ok(payload)
}

/// Restores `flake` into an existing object.
///
/// The destination's class must be the flake's class or derive from it.
/// Sub-objects recorded as owned are created anew under the destination.
pub fn write_object(
    provider: &dyn SerializationProvider,
    store: &mut ObjectStore,
    dest: ObjectId,
    flake: &Flake,
    options: &WriteOptions,
) -> Result<ReadReport, FlakeError> {
    let class = store.types().resolve_class(flake.type_path())?;
    let found = source_object(store, dest)?.class();
    if !found.is_child_of(class.path().as_str()) {
        return Err(FlakeError::type_mismatch(class.path(), found.path()));
    }

    restore_object(provider, store, dest, &class, flake, options)
}

fn restore_object(
    provider: &dyn SerializationProvider,
    store: &mut ObjectStore,
    dest: ObjectId,
    class: &ClassDesc,
    flake: &Flake,
    options: &WriteOptions,
) -> Result<ReadReport, FlakeError> {
    let raw = decompress(flake.payload())?;
    let report = provider.deserialize_object(store, dest, class, &raw)?;
    if options.exec_post_load {
        store.run_post_load(dest);
    }
    debug!(
        type_path = %flake.type_path(),
        provider = provider.name(),
        created = report.created.len(),
        diagnostics = report.diagnostics.len(),
        "flake restored"
    );
    Ok(report)
}

/// Restores `flake` into a struct value of exactly the flake's type.
pub fn write_struct(
    provider: &dyn SerializationProvider,
    store: &ObjectStore,
    dest: &mut StructValue,
    flake: &Flake,
    options: &WriteOptions,
) -> Result<ReadReport, FlakeError> {
    let desc = store.types().resolve_struct(flake.type_path())?;
    if dest.type_path() != desc.path() {
        return Err(FlakeError::type_mismatch(desc.path(), dest.type_path()));
    }

    let raw = decompress(flake.payload())?;
    let report = provider.deserialize_struct(store, dest, &raw)?;
    if options.exec_post_load {
        if let Some(hook) = desc.post_construct() {
            hook(dest);
        }
    }
    Ok(report)
}

/// Creates a new object of the flake's class under `outer` and restores the
/// flake into it, post-load included.
///
/// `expected` is the class the caller wants back: it must be a registered,
/// non-actor class the stored class derives from. The new object is
/// destroyed if restoring fails.
pub fn create_object(
    provider: &dyn SerializationProvider,
    store: &mut ObjectStore,
    flake: &Flake,
    outer: Option<ObjectId>,
    expected: &str,
) -> Result<ObjectId, FlakeError> {
    let expected_class = expected_class(store, flake, expected)?;
    if expected_class.is_actor() {
        return Err(FlakeError::type_mismatch(
            format!("non-actor class {expected}"),
            flake.type_path(),
        ));
    }
    let class = stored_class(store, flake, expected)?;
    if class.is_actor() {
        return Err(FlakeError::type_mismatch(
            format!("non-actor class {expected}"),
            class.path(),
        ));
    }

    let id = store.instantiate(&class, outer)?;
    finish(provider, store, id, &class, flake)
}

/// Creates a new struct value from `flake`, post-construct included.
///
/// The value has the stored struct type, which must be `expected` or
/// derive from it.
pub fn create_struct(
    provider: &dyn SerializationProvider,
    store: &ObjectStore,
    flake: &Flake,
    expected: &str,
) -> Result<StructValue, FlakeError> {
    if store.types().struct_desc(expected).is_none() {
        return Err(FlakeError::type_mismatch(expected, flake.type_path()));
    }
    let stored = store.types().resolve_struct(flake.type_path())?;
    if !stored.is_child_of(expected) {
        return Err(FlakeError::type_mismatch(expected, flake.type_path()));
    }

    let mut value = StructValue::new(stored);
    write_struct(provider, store, &mut value, flake, &WriteOptions::post_load())?;
    Ok(value)
}

/// Spawns an actor of the flake's class in `world` at the flake's
/// transform, restores its fields and runs post-load.
pub fn construct_actor(
    provider: &dyn SerializationProvider,
    store: &mut ObjectStore,
    flake: &ActorFlake,
    world: ObjectId,
    expected: &str,
) -> Result<ObjectId, FlakeError> {
    let inner = flake.flake();
    let expected_class = expected_class(store, inner, expected)?;
    if !expected_class.is_actor() {
        return Err(FlakeError::type_mismatch(format!("actor class {expected}"), inner.type_path()));
    }
    let class = stored_class(store, inner, expected)?;
    if !store.contains(world) {
        return Err(FlakeError::InvalidSource {
            reason: format!("world {world} does not exist"),
        });
    }

    let id = store.spawn_actor(&class, world, *flake.transform())?;
    finish(provider, store, id, &class, inner)
}

fn expected_class(store: &ObjectStore, flake: &Flake, expected: &str) -> Result<Arc<ClassDesc>, FlakeError> {
    store
        .types()
        .class(expected)
        .cloned()
        .ok_or_else(|| FlakeError::type_mismatch(expected, flake.type_path()))
}

fn stored_class(store: &ObjectStore, flake: &Flake, expected: &str) -> Result<Arc<ClassDesc>, FlakeError> {
    let class = store.types().resolve_class(flake.type_path())?;
    if !class.is_child_of(expected) {
        return Err(FlakeError::type_mismatch(expected, class.path()));
    }
    Ok(class)
}

fn finish(
    provider: &dyn SerializationProvider,
    store: &mut ObjectStore,
    id: ObjectId,
    class: &ClassDesc,
    flake: &Flake,
) -> Result<ObjectId, FlakeError> {
    match restore_object(provider, store, id, class, flake, &WriteOptions::post_load()) {
        Ok(_) => Ok(id),
        Err(err) => {
            store.destroy(id);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, ErrorCode};
    use crate::provider::BinaryProvider;
    use crate::reflect::{
        ACTOR_CLASS, ClassBuilder, FieldKind, OBJECT_CLASS, StructBuilder, Transform, TypeRegistry, Value, Vec3,
    };

    const WIDGET: &str = "/Script/Test.Widget";
    const FANCY: &str = "/Script/Test.FancyWidget";
    const PROP: &str = "/Script/Test.Prop";
    const SETTINGS: &str = "/Script/Test.Settings";
    const AUDIO: &str = "/Script/Test.AudioSettings";

    fn bump_loads(store: &mut ObjectStore, id: ObjectId) {
        let loads = store.get_field(id, "Loads").ok().and_then(Value::as_i64).unwrap_or(0);
        store.set_field(id, "Loads", (loads + 1) as i32).unwrap();
    }

    fn clamp_volume(value: &mut StructValue) {
        if value.get("Volume").and_then(Value::as_i64).unwrap_or(0) > 10 {
            value.set("Volume", 10).unwrap();
        }
    }

    fn store() -> ObjectStore {
        let mut types = TypeRegistry::new();
        types
            .register_class(
                ClassBuilder::new(WIDGET)
                    .field("Label", FieldKind::Str)
                    .field("Loads", FieldKind::I32)
                    .field("Inner", FieldKind::object(WIDGET))
                    .post_load(bump_loads),
            )
            .unwrap();
        types
            .register_class(ClassBuilder::new(FANCY).parent(WIDGET).field("Glow", FieldKind::F32))
            .unwrap();
        types
            .register_class(ClassBuilder::new(PROP).parent(ACTOR_CLASS).field("Mass", FieldKind::F64))
            .unwrap();
        types
            .register_struct(
                StructBuilder::new(SETTINGS)
                    .field("Volume", FieldKind::I32)
                    .post_construct(clamp_volume),
            )
            .unwrap();
        ObjectStore::new(Arc::new(types))
    }

    fn widget(store: &mut ObjectStore) -> ObjectId {
        let package = store.new_object(OBJECT_CLASS, None, Some("/Game/Widgets")).unwrap();
        let root = store.new_object(FANCY, Some(package), Some("Root")).unwrap();
        let inner = store.new_object(WIDGET, Some(root), Some("Inner")).unwrap();
        store.set_field(root, "Label", "root").unwrap();
        store.set_field(root, "Glow", Value::F32(0.5)).unwrap();
        store.set_field(inner, "Label", "inner").unwrap();
        store.set_field(root, "Inner", Value::Object(Some(inner))).unwrap();
        root
    }

    #[test]
    fn test_create_object_runs_post_load_once_per_object() {
        let mut store = store();
        let root = widget(&mut store);
        let flake = create_flake(&BinaryProvider, &store, root, &ReadOptions::default()).unwrap();
        assert_eq!(flake.type_path().as_str(), FANCY);

        let copy = create_object(&BinaryProvider, &mut store, &flake, None, WIDGET).unwrap();
        assert_eq!(store.get(copy).unwrap().class().path().as_str(), FANCY);
        assert_eq!(store.get_field(copy, "Loads").unwrap(), &Value::I32(1));
        assert_eq!(store.get_field(copy, "Glow").unwrap(), &Value::F32(0.5));

        let inner = store.get_field(copy, "Inner").unwrap().as_object().unwrap();
        assert_eq!(store.outer(inner), Some(copy));
        assert_eq!(store.get_field(inner, "Label").unwrap().as_str(), Some("inner"));
        assert_eq!(store.get_field(inner, "Loads").unwrap(), &Value::I32(1));
    }

    #[test]
    fn test_write_object_into_derived_destination() {
        let mut store = store();
        let root = widget(&mut store);
        let inner = store.get_field(root, "Inner").unwrap().as_object().unwrap();
        let flake = create_flake(&BinaryProvider, &store, inner, &ReadOptions::default()).unwrap();

        let dest = store.new_object(FANCY, None, Some("/Game/Dest")).unwrap();
        store.set_field(dest, "Glow", Value::F32(2.0)).unwrap();
        let report = write_object(&BinaryProvider, &mut store, dest, &flake, &WriteOptions::default()).unwrap();
        assert!(report.is_clean());
        assert_eq!(store.get_field(dest, "Label").unwrap().as_str(), Some("inner"));
        assert_eq!(store.get_field(dest, "Glow").unwrap(), &Value::F32(2.0));
        assert_eq!(store.get_field(dest, "Loads").unwrap(), &Value::I32(0));
    }

    #[test]
    fn test_write_object_rejects_unrelated_destination() {
        let mut store = store();
        let root = widget(&mut store);
        let flake = create_flake(&BinaryProvider, &store, root, &ReadOptions::default()).unwrap();

        let plain = store.new_object(WIDGET, None, Some("/Game/Plain")).unwrap();
        let err = write_object(&BinaryProvider, &mut store, plain, &flake, &WriteOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
        assert_eq!(store.get_field(plain, "Label").unwrap().as_str(), Some(""));
    }

    #[test]
    fn test_create_object_type_checks() {
        let mut store = store();
        let root = widget(&mut store);
        let flake = create_flake(&BinaryProvider, &store, root, &ReadOptions::default()).unwrap();
        let before = store.len();

        for expected in [PROP, "/Script/Test.Missing", ACTOR_CLASS] {
            let err = create_object(&BinaryProvider, &mut store, &flake, None, expected).unwrap_err();
            assert_eq!(err.code(), ErrorCode::TypeMismatch, "{expected}");
        }

        let inner = store.get_field(root, "Inner").unwrap().as_object().unwrap();
        let base = create_flake(&BinaryProvider, &store, inner, &ReadOptions::default()).unwrap();
        let err = create_object(&BinaryProvider, &mut store, &base, None, FANCY).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);

        let orphan = Flake::new("/Script/Test.Gone", flake.payload().to_vec());
        let err = create_object(&BinaryProvider, &mut store, &orphan, None, WIDGET).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeNotFound);
        assert_eq!(store.len(), before);
    }

    #[test]
    fn test_corrupt_payload_destroys_new_object() {
        let mut store = store();
        let root = widget(&mut store);
        let before = store.len();

        let raw = BinaryProvider.serialize_object(&store, root).unwrap();
        let payload = compress(&raw[..raw.len() - 2], CompressionOptions::default()).unwrap();
        let broken = Flake::new(FANCY, payload);
        let err = create_object(&BinaryProvider, &mut store, &broken, None, WIDGET).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CorruptPayload);
        assert_eq!(store.len(), before);
    }

    #[test]
    fn test_actor_flakes() {
        let mut store = store();
        let world = store.new_object(OBJECT_CLASS, None, Some("/Game/World")).unwrap();
        let prop = store.types().class(PROP).cloned().unwrap();
        let transform = Transform::from_translation(Vec3::new(10.0, 0.0, -5.0));
        let actor = store.spawn_actor(&prop, world, transform).unwrap();
        store.set_field(actor, "Mass", 12.5).unwrap();

        let err = create_flake(&BinaryProvider, &store, actor, &ReadOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSource);

        let flake = create_actor_flake(&BinaryProvider, &store, actor, &ReadOptions::default()).unwrap();
        assert_eq!(flake.transform(), &transform);

        for expected in [PROP, OBJECT_CLASS] {
            let err = create_object(&BinaryProvider, &mut store, flake.flake(), None, expected).unwrap_err();
            assert_eq!(err.code(), ErrorCode::TypeMismatch);
        }

        let copy = construct_actor(&BinaryProvider, &mut store, &flake, world, ACTOR_CLASS).unwrap();
        assert_eq!(store.outer(copy), Some(world));
        assert_eq!(store.get(copy).unwrap().transform(), Some(&transform));
        assert_eq!(store.get_field(copy, "Mass").unwrap(), &Value::F64(12.5));

        let widget_root = widget(&mut store);
        let err = create_actor_flake(&BinaryProvider, &store, widget_root, &ReadOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSource);
    }

    #[test]
    fn test_struct_flakes() {
        let store = store();
        let value = store.types().new_struct(SETTINGS).unwrap().with("Volume", 42).unwrap();
        let flake = create_struct_flake(&BinaryProvider, &store, &value, &ReadOptions::default()).unwrap();

        let restored = create_struct(&BinaryProvider, &store, &flake, SETTINGS).unwrap();
        assert_eq!(restored.get("Volume"), Some(&Value::I32(10)));

        let mut plain = store.types().new_struct(SETTINGS).unwrap();
        write_struct(&BinaryProvider, &store, &mut plain, &flake, &WriteOptions::default()).unwrap();
        assert_eq!(plain.get("Volume"), Some(&Value::I32(42)));

        let err = create_struct(&BinaryProvider, &store, &flake, WIDGET).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_derived_struct_comes_back_through_base() {
        let mut types = TypeRegistry::new();
        types
            .register_struct(StructBuilder::new(SETTINGS).field("Volume", FieldKind::I32))
            .unwrap();
        types
            .register_struct(StructBuilder::new(AUDIO).parent(SETTINGS).field("Muted", FieldKind::Bool))
            .unwrap();
        let store = ObjectStore::new(Arc::new(types));

        let value = store
            .types()
            .new_struct(AUDIO)
            .unwrap()
            .with("Volume", 7)
            .unwrap()
            .with("Muted", true)
            .unwrap();
        let flake = create_struct_flake(&BinaryProvider, &store, &value, &ReadOptions::default()).unwrap();

        let restored = create_struct(&BinaryProvider, &store, &flake, SETTINGS).unwrap();
        assert_eq!(restored.type_path().as_str(), AUDIO);
        assert_eq!(restored, value);

        let base = store.types().new_struct(SETTINGS).unwrap();
        let base_flake = create_struct_flake(&BinaryProvider, &store, &base, &ReadOptions::default()).unwrap();
        let err = create_struct(&BinaryProvider, &store, &base_flake, AUDIO).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_unregistered_struct_is_invalid_source() {
        let store = store();
        let mut other = TypeRegistry::new();
        let desc = other.register_struct(StructBuilder::new("/Script/Other.Thing")).unwrap();
        let err = create_struct_flake(&BinaryProvider, &store, &StructValue::new(desc), &ReadOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSource);
    }

    #[test]
    fn test_dangling_source() {
        let mut store = store();
        let root = widget(&mut store);
        store.destroy(root);
        let err = create_flake(&BinaryProvider, &store, root, &ReadOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSource);
    }

    #[test]
    fn test_truncated_compressed_payload() {
        let mut store = store();
        let root = widget(&mut store);
        let flake = create_flake(&BinaryProvider, &store, root, &ReadOptions::default()).unwrap();
        let cut = Flake::new(FANCY, flake.payload()[..flake.num_bytes() / 2].to_vec());
        let err = create_object(&BinaryProvider, &mut store, &cut, None, WIDGET).unwrap_err();
        assert!(matches!(
            err,
            FlakeError::CorruptPayload(
                DecodeError::DecompressionFailed(_) | DecodeError::UncompressedSizeMismatch { .. }
            )
        ));
    }
}
