//! Shared constants for burrow-mesh-cpu.

/// Default isovalue: the zero crossing between air and solid.
pub const DEFAULT_ISO_LEVEL: f32 = 0.0;
/// Cells at or below this density mark a triangle as tunnel surface.
pub const DEFAULT_TUNNEL_THRESHOLD: f32 = -0.9;

// Below this endpoint difference an edge is treated as flat and split at its midpoint.
pub(crate) const EDGE_EPSILON: f32 = 1e-6;
