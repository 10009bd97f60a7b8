use burrow_geom::{IVec3, Vec3};
use burrow_grid::{DensityField, GridBounds};
use burrow_mesh_cpu::{Submesh, SurfaceExtractor};
use proptest::prelude::*;

fn field_strategy() -> impl Strategy<Value = DensityField> {
    (1usize..=4, 1usize..=4, 1usize..=4).prop_flat_map(|(w, h, d)| {
        let b = GridBounds::for_chunk(w, h, d);
        prop::collection::vec(-1.0f32..=1.0, b.volume())
            .prop_map(move |vals| {
                let mut it = vals.into_iter();
                DensityField::from_fn(b, |_| it.next().unwrap_or(-1.0))
            })
    })
}

proptest! {
    // Any field either yields a valid mesh or is reported as degenerate.
    #[test]
    fn extraction_is_valid_or_degenerate(field in field_strategy()) {
        match SurfaceExtractor::default().extract(&field) {
            Ok(mesh) => {
                prop_assert_eq!(mesh.validate(), Ok(()));
                prop_assert_eq!(mesh.normals.len(), mesh.positions.len());
            }
            Err(e) => prop_assert!(e.is_degenerate(), "unexpected error {}", e),
        }
    }

    // Vertices never leave the snapshot window.
    #[test]
    fn vertices_stay_inside_window(field in field_strategy()) {
        let raw = SurfaceExtractor::default().march(&field);
        let b = field.bounds();
        let (lo, hi) = (Vec3::from(b.min), Vec3::from(b.max));
        for p in &raw.positions {
            prop_assert!(p.x >= lo.x && p.y >= lo.y && p.z >= lo.z);
            prop_assert!(p.x <= hi.x && p.y <= hi.y && p.z <= hi.z);
        }
    }

    // Classification partitions the marched triangles: nothing lost, nothing doubled.
    #[test]
    fn classification_partitions_triangles(field in field_strategy(), threshold in -1.0f32..=0.0) {
        let ex = SurfaceExtractor::default().with_tunnel_threshold(threshold);
        let raw = ex.march(&field);
        if let Ok(mesh) = ex.extract(&field) {
            prop_assert_eq!(mesh.triangle_count(), raw.triangle_count());
            let mut all: Vec<[u32; 3]> = mesh.triangles(Submesh::Terrain).collect();
            all.extend(mesh.triangles(Submesh::Tunnel));
            all.sort_unstable();
            let mut want: Vec<[u32; 3]> =
                raw.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
            want.sort_unstable();
            prop_assert_eq!(all, want);
        }
    }

    // A single solid sample anywhere inside the window is enclosed.
    #[test]
    fn isolated_sample_yields_surface(x in 0i32..=3, y in 0i32..=3, z in 0i32..=3) {
        let b = GridBounds::for_chunk(3, 3, 3);
        let solid = IVec3::new(x, y, z);
        let field = DensityField::from_fn(b, |c| if c == solid { 1.0 } else { -1.0 });
        let mesh = SurfaceExtractor::default().extract(&field);
        prop_assert!(mesh.is_ok());
    }
}
