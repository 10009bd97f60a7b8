use burrow_geom::{IVec3, Vec3};

pub const DEFAULT_DECAY_PER_SEC: f32 = 0.1;

/// Scent left behind by digging, one value per lattice cell of the world.
///
/// Cells are addressed relative to `origin`; anything outside reads as 0 and
/// ignores deposits.
pub struct PheromoneField {
    origin: Vec3,
    sx: usize,
    sy: usize,
    sz: usize,
    decay_per_sec: f32,
    data: Vec<f32>,
}

impl PheromoneField {
    pub fn new(origin: Vec3, (sx, sy, sz): (usize, usize, usize)) -> Self {
        Self {
            origin,
            sx,
            sy,
            sz,
            decay_per_sec: DEFAULT_DECAY_PER_SEC,
            data: vec![0.0; sx * sy * sz],
        }
    }

    #[inline]
    fn idx(&self, c: IVec3) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.z < 0 {
            return None;
        }
        let (x, y, z) = (c.x as usize, c.y as usize, c.z as usize);
        if x >= self.sx || y >= self.sy || z >= self.sz {
            return None;
        }
        Some((y * self.sz + z) * self.sx + x)
    }

    /// Lattice cell holding a world position.
    #[inline]
    pub fn cell_of(&self, p: Vec3) -> IVec3 {
        (p - self.origin).floor_to_ivec()
    }

    pub fn deposit(&mut self, p: Vec3, amount: f32) -> bool {
        if !p.is_finite() {
            return false;
        }
        self.deposit_at(self.cell_of(p), amount)
    }

    pub fn deposit_at(&mut self, c: IVec3, amount: f32) -> bool {
        match self.idx(c) {
            Some(i) => {
                self.data[i] += amount;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn get(&self, c: IVec3) -> f32 {
        self.idx(c).map_or(0.0, |i| self.data[i])
    }

    /// Linear decay toward zero.
    pub fn tick(&mut self, dt: f32) {
        let step = self.decay_per_sec * dt.max(0.0);
        if step == 0.0 {
            return;
        }
        for v in &mut self.data {
            *v = (*v - step).max(0.0);
        }
    }

    /// Strongest cell, if any scent is left.
    pub fn peak(&self) -> Option<(IVec3, f32)> {
        let (mut best, mut best_v) = (None, 0.0);
        for y in 0..self.sy {
            for z in 0..self.sz {
                for x in 0..self.sx {
                    let v = self.data[(y * self.sz + z) * self.sx + x];
                    if v > best_v {
                        best = Some(IVec3::new(x as i32, y as i32, z as i32));
                        best_v = v;
                    }
                }
            }
        }
        best.map(|c| (c, best_v))
    }
}
