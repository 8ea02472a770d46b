//! Inspects a flake save file.
//!
//! Usage: `cargo run --example inspect_flake [path]`. Without a path a small
//! demo graph is captured and inspected instead.

use std::fs;
use std::sync::Arc;

use heart_flakes::codec::decompress;
use heart_flakes::{
    ClassBuilder, CompressionLevel, CompressionOptions, FieldKind, FlakeSaveFile, ObjectStore, ProviderRegistry,
    ReadOptions, TypeRegistry, Value, Vec2,
};

fn demo_save() -> Vec<u8> {
    let mut types = TypeRegistry::new();
    types
        .register_class(ClassBuilder::new("/Script/Demo.Pin").field("Label", FieldKind::Str))
        .expect("register pin");
    types
        .register_class(
            ClassBuilder::new("/Script/Demo.Node")
                .field("Name", FieldKind::Str)
                .field("Position", FieldKind::Vec2)
                .field("Pins", FieldKind::array(FieldKind::object("/Script/Demo.Pin"))),
        )
        .expect("register node");

    let mut store = ObjectStore::new(Arc::new(types));
    let node = store
        .new_object("/Script/Demo.Node", None, Some("/Game/Demo"))
        .expect("node");
    let mut pins = Vec::new();
    for label in ["In", "Out", "Then"] {
        let pin = store.new_object("/Script/Demo.Pin", Some(node), Some(label)).expect("pin");
        store.set_field(pin, "Label", label).expect("label");
        pins.push(Value::Object(Some(pin)));
    }
    store.set_field(node, "Name", "Demo").expect("name");
    store.set_field(node, "Position", Vec2::new(3.0, 4.0)).expect("position");
    store.set_field(node, "Pins", Value::Array(pins)).expect("pins");

    let providers = ProviderRegistry::new();
    let options = ReadOptions::default()
        .with_compression(CompressionOptions::zstd(CompressionLevel::Normal))
        .with_logging();
    let binary = providers.get("Binary").expect("binary provider");
    FlakeSaveFile::from_object(binary, &store, node, &options)
        .expect("capture demo")
        .to_bytes()
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let data = match std::env::args().nth(1) {
        Some(path) => {
            println!("Reading: {}", path);
            fs::read(&path).expect("Failed to read file")
        }
        None => {
            println!("No path given; inspecting a demo capture");
            demo_save()
        }
    };
    println!("File size: {} bytes", data.len());

    let save = FlakeSaveFile::from_bytes(&data).expect("Failed to decode");
    let flake = &save.flake;
    println!("\n=== Flake ===");
    println!("Type: {}", flake.type_path());
    println!("Payload: {} bytes", flake.num_bytes());

    let raw = decompress(flake.payload()).expect("Failed to decompress");
    println!("Decompressed: {} bytes", raw.len());
    if !raw.is_empty() {
        println!("Ratio: {:.2}", flake.num_bytes() as f64 / raw.len() as f64);
    }

    println!("\n=== First 64 bytes ===");
    for (i, chunk) in raw.chunks(16).take(4).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let text: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!("{:04x}  {:<48} {}", i * 16, hex.join(" "), text);
    }
}
