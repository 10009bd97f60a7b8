use burrow_geom::IVec3;

use crate::GridBounds;

/// Dense copy of a density window, detached from the live grid.
///
/// Workers mesh from this so edits can keep landing in the sparse grid
/// while an extraction is running.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    bounds: GridBounds,
    pub sx: usize,
    pub sy: usize,
    pub sz: usize,
    values: Vec<f32>,
}

impl DensityField {
    pub fn from_fn<F>(bounds: GridBounds, mut sample: F) -> Self
    where
        F: FnMut(IVec3) -> f32,
    {
        let (sx, sy, sz) = bounds.dims();
        let mut values = Vec::with_capacity(sx * sy * sz);
        // GridBounds::iter walks x, then z, then y, matching idx().
        for c in bounds.iter() {
            values.push(sample(c));
        }
        Self {
            bounds,
            sx,
            sy,
            sz,
            values,
        }
    }

    /// Field filled with one value; handy for tests and benches.
    pub fn filled(bounds: GridBounds, value: f32) -> Self {
        Self::from_fn(bounds, |_| value)
    }

    #[inline]
    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.sz + z) * self.sx + x
    }

    /// Reads by array index (0-based from `bounds.min`).
    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[self.idx(x, y, z)]
    }

    /// Reads by lattice coordinate; `None` outside the window.
    #[inline]
    pub fn get(&self, c: IVec3) -> Option<f32> {
        if !self.bounds.contains(c) {
            return None;
        }
        let d = c - self.bounds.min;
        Some(self.get_local(d.x as usize, d.y as usize, d.z as usize))
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
