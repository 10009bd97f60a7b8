//! CPU isosurface extraction: marching cubes over a density snapshot, split into terrain and tunnel lists.
#![forbid(unsafe_code)]

mod classify;
pub mod constants;
mod marching;
mod mesh;
mod tables;

pub use classify::{is_tunnel_at, split_tunnel_triangles};
pub use constants::{DEFAULT_ISO_LEVEL, DEFAULT_TUNNEL_THRESHOLD};
pub use marching::SurfaceExtractor;
pub use mesh::{ChunkMesh, Submesh, SurfaceBuild, SurfaceError};
