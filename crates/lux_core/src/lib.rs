//! Lux Core - renderer-agnostic scene data.
//!
//! This crate provides:
//!
//! - **Geometry**: `Mesh`, an indexed triangle mesh with procedural
//!   generators and in-place transforms
//! - **Textures**: `Texture` with configurable repeat modes and image loading
//! - **OFF support**: `load_off` / `parse_off` for polygon mesh files
//!
//! # Example
//!
//! ```ignore
//! use lux_core::{load_off, Mesh};
//!
//! let mut mesh = load_off("models/suzanne.off")?;
//! mesh.center_and_scale_to_unit();
//! println!("{} triangles", mesh.triangle_count());
//! ```

pub mod mesh;
pub mod off;
pub mod texture;

// Re-export commonly used types
pub use mesh::{Mesh, MeshError, MeshResult, MeshVertex};
pub use off::{load_off, parse_off};
pub use texture::{RepeatMode, Texture, TextureError, TextureResult};
