use burrow_geom::IVec3;

/// Inclusive integer box `[min, max]` on every axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridBounds {
    pub min: IVec3,
    pub max: IVec3,
}

impl GridBounds {
    #[inline]
    pub const fn new(min: IVec3, max: IVec3) -> Self {
        Self { min, max }
    }

    /// Extraction window of a `width × height × depth` chunk: the interior
    /// `[0, w]` plus a one-cell halo on every face.
    #[inline]
    pub fn for_chunk(width: usize, height: usize, depth: usize) -> Self {
        Self {
            min: IVec3::splat(-1),
            max: IVec3::new(width as i32 + 1, height as i32 + 1, depth as i32 + 1),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Samples per axis.
    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        if self.is_empty() {
            return (0, 0, 0);
        }
        (
            (self.max.x - self.min.x + 1) as usize,
            (self.max.y - self.min.y + 1) as usize,
            (self.max.z - self.min.z + 1) as usize,
        )
    }

    #[inline]
    pub fn volume(&self) -> usize {
        let (sx, sy, sz) = self.dims();
        sx * sy * sz
    }

    #[inline]
    pub fn contains(&self, c: IVec3) -> bool {
        c.x >= self.min.x
            && c.x <= self.max.x
            && c.y >= self.min.y
            && c.y <= self.max.y
            && c.z >= self.min.z
            && c.z <= self.max.z
    }

    #[inline]
    pub fn on_boundary(&self, c: IVec3) -> bool {
        c.x == self.min.x
            || c.x == self.max.x
            || c.y == self.min.y
            || c.y == self.max.y
            || c.z == self.min.z
            || c.z == self.max.z
    }

    pub fn intersect(&self, other: &GridBounds) -> Option<GridBounds> {
        let b = GridBounds::new(self.min.max(other.min), self.max.min(other.max));
        if b.is_empty() { None } else { Some(b) }
    }

    /// Iterates x fastest, then z, then y.
    pub fn iter(&self) -> impl Iterator<Item = IVec3> + use<> {
        let GridBounds { min, max } = *self;
        (min.y..=max.y).flat_map(move |y| {
            (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| IVec3::new(x, y, z)))
        })
    }
}
