use burrow_geom::{IVec3, Vec3};
use burrow_grid::{AIR_DENSITY, GridBounds, SOLID_DENSITY, SparseVoxelGrid};
use fastnoise_lite::{FastNoiseLite, NoiseType};

/// How a chunk's grid is filled at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Seeding {
    /// Solid interior, one-cell air shell: an isolated floating block.
    FloatingBox,
    /// Ground plane at `surface_y` (world space), optionally roughened by
    /// 2D noise. Cells are classified by their global height, so stacked and
    /// adjacent chunks agree on their shared halo.
    Layered {
        surface_y: f32,
        noise_amplitude: f32,
        noise_frequency: f32,
        seed: i32,
    },
}

/// Column heights for layered seeding.
pub struct HeightField {
    surface_y: f32,
    amplitude: f32,
    noise: Option<FastNoiseLite>,
}

impl HeightField {
    pub fn new(surface_y: f32, amplitude: f32, frequency: f32, seed: i32) -> Self {
        let noise = (amplitude != 0.0).then(|| {
            let mut n = FastNoiseLite::with_seed(seed);
            n.set_noise_type(Some(NoiseType::OpenSimplex2));
            n.set_frequency(Some(frequency));
            n
        });
        Self {
            surface_y,
            amplitude,
            noise,
        }
    }

    #[inline]
    pub fn height_at(&self, wx: f32, wz: f32) -> f32 {
        match &self.noise {
            Some(n) => self.surface_y + self.amplitude * n.get_noise_2d(wx, wz),
            None => self.surface_y,
        }
    }

    /// Signed distance to the ground, clamped to the density range.
    #[inline]
    pub fn density_at(&self, world: Vec3) -> f32 {
        (self.height_at(world.x, world.z) - world.y).clamp(AIR_DENSITY, SOLID_DENSITY)
    }
}

impl Seeding {
    /// Fills every cell of `bounds`. `origin` is the chunk's world position.
    pub fn seed_grid(&self, grid: &mut SparseVoxelGrid, bounds: GridBounds, origin: Vec3) {
        match *self {
            Seeding::FloatingBox => grid.initialize_box(bounds, SOLID_DENSITY, AIR_DENSITY),
            Seeding::Layered {
                surface_y,
                noise_amplitude,
                noise_frequency,
                seed,
            } => {
                let heights = HeightField::new(surface_y, noise_amplitude, noise_frequency, seed);
                grid.initialize_with(bounds, |c: IVec3, _| {
                    heights.density_at(origin + Vec3::from(c))
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_layer_splits_at_surface() {
        let b = GridBounds::for_chunk(4, 8, 4);
        let mut grid = SparseVoxelGrid::new();
        let seeding = Seeding::Layered {
            surface_y: -3.0,
            noise_amplitude: 0.0,
            noise_frequency: 0.05,
            seed: 1,
        };
        seeding.seed_grid(&mut grid, b, Vec3::new(0.0, -8.0, 0.0));
        assert!(grid.covers(b));
        // local y = 2 -> world -6, three below the ground
        assert_eq!(grid.get(IVec3::new(1, 2, 1)), SOLID_DENSITY);
        // local y = 5 -> world -3, exactly on the ground
        assert_eq!(grid.get(IVec3::new(1, 5, 1)), 0.0);
        assert_eq!(grid.get(IVec3::new(1, 9, 1)), AIR_DENSITY);
        // the halo follows the same rule rather than an air shell
        assert_eq!(grid.get(IVec3::new(-1, 2, 1)), SOLID_DENSITY);
    }

    #[test]
    fn noisy_heights_stay_within_amplitude() {
        let h = HeightField::new(-5.0, 2.0, 0.1, 42);
        for i in 0..64 {
            let y = h.height_at(i as f32 * 1.7, i as f32 * -0.9);
            assert!((-7.0..=-3.0).contains(&y), "height {y}");
        }
    }

    #[test]
    fn box_seeding_has_air_shell() {
        let b = GridBounds::for_chunk(3, 3, 3);
        let mut grid = SparseVoxelGrid::new();
        Seeding::FloatingBox.seed_grid(&mut grid, b, Vec3::ZERO);
        assert_eq!(grid.get(IVec3::new(-1, 0, 0)), AIR_DENSITY);
        assert_eq!(grid.get(IVec3::new(0, 0, 0)), SOLID_DENSITY);
    }
}
