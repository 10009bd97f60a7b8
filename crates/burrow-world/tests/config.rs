use burrow_world::TerrainConfig;

#[test]
fn shipped_sample_matches_defaults() {
    let sample = include_str!("../../../terrain.toml");
    let cfg = TerrainConfig::from_toml_str(sample).unwrap();
    assert_eq!(cfg, TerrainConfig::default());
    cfg.validate().unwrap();
}
