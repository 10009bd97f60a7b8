use std::time::{Duration, Instant};

use burrow_edit::{RebuildScheduler, RequestOutcome};
use burrow_geom::ChunkCoord;
use proptest::prelude::*;

proptest! {
    // N requests inside one window produce exactly one due rebuild, due one
    // debounce after the first request and carrying the last stamp.
    #[test]
    fn burst_inside_window_dispatches_once(offsets in prop::collection::vec(0u64..50, 1..20)) {
        let mut s = RebuildScheduler::new(Duration::from_millis(50));
        let t0 = Instant::now();
        let c = ChunkCoord::new(0, 0, 0);
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        let mut scheduled = 0;
        for off in &sorted {
            if s.request_at(c, t0 + Duration::from_millis(*off)) == RequestOutcome::Scheduled {
                scheduled += 1;
            }
        }
        prop_assert_eq!(scheduled, 1);
        let deadline = t0 + Duration::from_millis(sorted[0] + 50);
        prop_assert!(s.poll_due(deadline - Duration::from_millis(1)).is_empty());
        prop_assert_eq!(s.next_deadline(), Some(deadline));
        let due = s.poll_due(deadline);
        prop_assert_eq!(due.len(), 1);
        prop_assert_eq!(due[0].rev, s.get_rev(c));
        prop_assert!(s.poll_due(t0 + Duration::from_secs(10)).is_empty());
    }

    // Stamps grow with every request regardless of which chunk receives it.
    #[test]
    fn stamps_are_monotonic(coords in prop::collection::vec((0i32..3, 0i32..2, 0i32..3), 1..40)) {
        let mut s = RebuildScheduler::default();
        let mut last = 0;
        for (x, y, z) in coords {
            let c = ChunkCoord::new(x, y, z);
            s.request(c);
            let r = s.get_rev(c);
            prop_assert!(r > last);
            last = r;
        }
    }
}
