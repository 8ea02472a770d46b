//! Heart Flakes: object-graph snapshots.
//!
//! A [`Flake`] is a compact, compressed, self-describing byte value holding
//! one object (or struct value) together with every sub-object it owns.
//! Reconstructing a flake creates fresh sub-objects; references to objects
//! owned elsewhere are recorded as paths and resolved again on load.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use heart_flakes::{ClassBuilder, FieldKind, ObjectStore, ProviderRegistry, ReadOptions, TypeRegistry};
//!
//! let mut types = TypeRegistry::new();
//! types.register_class(
//!     ClassBuilder::new("/Script/Demo.Leaf").field("Value", FieldKind::I32),
//! ).unwrap();
//! types.register_class(
//!     ClassBuilder::new("/Script/Demo.Node")
//!         .field("Name", FieldKind::Str)
//!         .field("Child", FieldKind::object("/Script/Demo.Leaf")),
//! ).unwrap();
//!
//! let mut store = ObjectStore::new(Arc::new(types));
//! let node = store.new_object("/Script/Demo.Node", None, Some("/Game/Node1")).unwrap();
//! let leaf = store.new_object("/Script/Demo.Leaf", Some(node), None).unwrap();
//! store.set_field(leaf, "Value", 42).unwrap();
//! store.set_field(node, "Child", heart_flakes::Value::Object(Some(leaf))).unwrap();
//! store.set_field(node, "Name", "Node1").unwrap();
//!
//! let providers = ProviderRegistry::new();
//! let flake = providers.create_flake("Binary", &store, node, &ReadOptions::default()).unwrap();
//!
//! let copy = providers
//!     .create_object("Binary", &mut store, &flake, None, "/Script/Demo.Node")
//!     .unwrap();
//! let child = store.get_field(copy, "Child").unwrap().as_object().unwrap();
//! assert_ne!(child, leaf);
//! assert_eq!(store.outer(child), Some(copy));
//! ```
//!
//! # Modules
//!
//! - [`reflect`]: type paths, field kinds, class/struct descriptors, values
//! - [`object`]: the object store (identities, ownership, paths)
//! - [`codec`]: payload encoding/decoding and compression
//! - [`model`]: flake containers
//! - [`api`]: flake construction and reconstruction
//! - [`provider`]: named payload formats (Binary, NetBinary, JSON)
//! - [`save`]: save-file container
//! - [`error`]: error types
//! - [`limits`]: security limits for decoding
//!
//! # Ownership
//!
//! While writing, the writer keeps a stack of the objects being written. A
//! referenced object is inlined only when its outer is the top of that
//! stack; anything else is written as a path. The stack starts with the
//! source object itself, so exactly the sub-objects it owns (transitively)
//! are captured. Struct flakes start with an empty stack and never inline.
//!
//! # Security
//!
//! Payloads are untrusted input: lengths, counts and nesting depth are
//! bounded, the decompressed size is declared and checked, and a failed
//! read destroys whatever it created and leaves the destination untouched.

pub mod api;
pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod object;
pub mod provider;
pub mod reflect;
pub mod save;

// Re-export commonly used types at crate root
pub use api::{
    ReadOptions, WriteOptions, construct_actor, create_actor_flake, create_flake, create_object,
    create_struct, create_struct_flake, write_object, write_struct,
};
pub use codec::{CompressionLevel, CompressionOptions, Compressor, Diagnostic, ReadReport};
pub use error::{DecodeError, EncodeError, ErrorCode, FlakeError, ReflectError};
pub use model::{ActorFlake, Flake};
pub use object::{Object, ObjectId, ObjectStore};
pub use provider::{
    BinaryProvider, DEFAULT_PROVIDER, JsonProvider, NetBinaryProvider, ProviderRegistry, SerializationProvider,
};
pub use reflect::{
    ACTOR_CLASS, ClassBuilder, FieldKind, OBJECT_CLASS, Quat, SoftObjectPath, StructBuilder,
    StructValue, Transform, TypePath, TypeRegistry, Value, Vec2, Vec3,
};
pub use save::FlakeSaveFile;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
