use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use burrow_mesh_cpu::{DEFAULT_ISO_LEVEL, DEFAULT_TUNNEL_THRESHOLD, SurfaceExtractor};
use serde::Deserialize;
use thiserror::Error;

use crate::seeding::Seeding;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse terrain config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid terrain config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TerrainConfig {
    #[serde(default)]
    pub chunk: ChunkDims,
    #[serde(default)]
    pub lattice: Lattice,
    #[serde(default)]
    pub surface: SurfaceParams,
    #[serde(default)]
    pub seeding: SeedingParams,
    #[serde(default)]
    pub rebuild: RebuildParams,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChunkDims {
    #[serde(default = "default_chunk_size")]
    pub width: usize,
    #[serde(default = "default_chunk_size")]
    pub height: usize,
    #[serde(default = "default_chunk_size")]
    pub depth: usize,
}
fn default_chunk_size() -> usize {
    16
}
impl Default for ChunkDims {
    fn default() -> Self {
        Self {
            width: default_chunk_size(),
            height: default_chunk_size(),
            depth: default_chunk_size(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Lattice {
    #[serde(default = "default_chunks_xz")]
    pub chunks_x: usize,
    #[serde(default = "default_chunks_y")]
    pub chunks_y: usize,
    #[serde(default = "default_chunks_xz")]
    pub chunks_z: usize,
}
fn default_chunks_xz() -> usize {
    2
}
fn default_chunks_y() -> usize {
    1
}
impl Default for Lattice {
    fn default() -> Self {
        Self {
            chunks_x: default_chunks_xz(),
            chunks_y: default_chunks_y(),
            chunks_z: default_chunks_xz(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SurfaceParams {
    #[serde(default = "default_iso_level")]
    pub iso_level: f32,
    #[serde(default = "default_tunnel_threshold")]
    pub tunnel_threshold: f32,
}
fn default_iso_level() -> f32 {
    DEFAULT_ISO_LEVEL
}
fn default_tunnel_threshold() -> f32 {
    DEFAULT_TUNNEL_THRESHOLD
}
impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            iso_level: default_iso_level(),
            tunnel_threshold: default_tunnel_threshold(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    Box,
    Layered,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SeedingParams {
    #[serde(default = "default_seed_mode")]
    pub mode: SeedMode,
    /// World-space height of the ground plane in layered mode.
    #[serde(default = "default_surface_y")]
    pub surface_y: f32,
    #[serde(default)]
    pub noise_amplitude: f32,
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f32,
    #[serde(default = "default_seed")]
    pub seed: i32,
}
fn default_seed_mode() -> SeedMode {
    SeedMode::Box
}
fn default_surface_y() -> f32 {
    -4.0
}
fn default_noise_frequency() -> f32 {
    0.05
}
fn default_seed() -> i32 {
    1337
}
impl Default for SeedingParams {
    fn default() -> Self {
        Self {
            mode: default_seed_mode(),
            surface_y: default_surface_y(),
            noise_amplitude: 0.0,
            noise_frequency: default_noise_frequency(),
            seed: default_seed(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RebuildParams {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}
fn default_debounce_ms() -> u64 {
    50
}
fn default_workers() -> usize {
    1
}
impl Default for RebuildParams {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            workers: default_workers(),
        }
    }
}

impl TerrainConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: TerrainConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ChunkDims {
            width,
            height,
            depth,
        } = self.chunk;
        if width == 0 || height == 0 || depth == 0 {
            return Err(ConfigError::Invalid(format!(
                "chunk dimensions must be positive, got {width}x{height}x{depth}"
            )));
        }
        let Lattice {
            chunks_x,
            chunks_y,
            chunks_z,
        } = self.lattice;
        if chunks_x == 0 || chunks_y == 0 || chunks_z == 0 {
            return Err(ConfigError::Invalid(format!(
                "lattice must hold at least one chunk, got {chunks_x}x{chunks_y}x{chunks_z}"
            )));
        }
        if self.rebuild.workers == 0 {
            return Err(ConfigError::Invalid("rebuild.workers must be at least 1".into()));
        }
        let s = &self.surface;
        let sd = &self.seeding;
        let numbers = [
            ("surface.iso_level", s.iso_level),
            ("surface.tunnel_threshold", s.tunnel_threshold),
            ("seeding.surface_y", sd.surface_y),
            ("seeding.noise_amplitude", sd.noise_amplitude),
            ("seeding.noise_frequency", sd.noise_frequency),
        ];
        if let Some((name, v)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::Invalid(format!("{name} must be finite, got {v}")));
        }
        if s.tunnel_threshold > s.iso_level {
            return Err(ConfigError::Invalid(format!(
                "surface.tunnel_threshold ({}) must not exceed surface.iso_level ({})",
                s.tunnel_threshold, s.iso_level
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild.debounce_ms)
    }

    pub fn extractor(&self) -> SurfaceExtractor {
        SurfaceExtractor::new(self.surface.iso_level)
            .with_tunnel_threshold(self.surface.tunnel_threshold)
    }

    pub fn seeding_policy(&self) -> Seeding {
        match self.seeding.mode {
            SeedMode::Box => Seeding::FloatingBox,
            SeedMode::Layered => Seeding::Layered {
                surface_y: self.seeding.surface_y,
                noise_amplitude: self.seeding.noise_amplitude,
                noise_frequency: self.seeding.noise_frequency,
                seed: self.seeding.seed,
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<TerrainConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    TerrainConfig::from_toml_str(&s)
}
