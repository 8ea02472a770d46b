//! Flake containers.

pub mod flake;

pub use flake::{ActorFlake, Flake};
