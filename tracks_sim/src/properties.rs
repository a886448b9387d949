//! Property checks of tracks_core over randomly configured catalogs.

use crate::catalog::{CatalogBuilder, CatalogConfig, SyntheticCatalog};
use ndarray::{s, Array2};
use proptest::prelude::*;
use std::collections::BTreeSet;
use tracks_core::{IncludeFn, Selector, Tracker, DEPTH_PROP, INDEX_KEY};

fn arb_config() -> impl Strategy<Value = CatalogConfig> {
    (any::<u64>(), 4usize..12, 0usize..4, 0usize..3, 0usize..3).prop_map(
        |(seed, snapshot_count, subhalo_count, subsubhalo_count, field_halo_count)| CatalogConfig {
            seed,
            snapshot_count,
            subhalo_count,
            subsubhalo_count,
            field_halo_count,
            ..Default::default()
        },
    )
}

fn build(config: CatalogConfig) -> SyntheticCatalog {
    CatalogBuilder::new(config).unwrap().build().unwrap()
}

fn index_of(trk: &Tracker) -> usize {
    trk.prop(INDEX_KEY).unwrap().scalar_at(0).unwrap() as usize
}

fn depth_of(trk: &Tracker) -> Vec<f64> {
    trk.prop(DEPTH_PROP).unwrap().to_f64().iter().copied().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_get_round_trips_source_arrays(config in arb_config(), snap in 0usize..4, pick in any::<usize>()) {
        let catalog = build(config);
        let storage = catalog.storage().unwrap();
        let positions = catalog.positions();

        let full = storage.get("x", &Selector::All, &Selector::All).unwrap();
        prop_assert_eq!(full.data().to_f64(), positions.clone().into_dyn());

        let obj = pick % catalog.halo_count();
        let cell = storage.get("x", &Selector::Index(snap), &Selector::Index(obj)).unwrap();
        prop_assert_eq!(
            cell.data().to_f64(),
            positions.slice(s![snap, obj, ..]).to_owned().into_dyn()
        );
    }

    #[test]
    fn test_liveness_follows_sentinel(config in arb_config()) {
        let catalog = build(config);
        let storage = catalog.storage().unwrap();
        for (h, halo) in catalog.halos().iter().enumerate() {
            let alive = storage.create_track(h).unwrap().get_alive();
            let expected: Vec<bool> = (0..alive.len()).map(|s| halo.is_alive(s)).collect();
            prop_assert_eq!(alive, expected);
        }
    }

    #[test]
    fn test_depth_zero_is_host_only(config in arb_config()) {
        let catalog = build(config);
        let tree = catalog.tree().unwrap();
        let trackers = tree.traverse_tree(0, 0, None).unwrap();
        prop_assert_eq!(trackers.len(), 1);
        prop_assert_eq!(index_of(&trackers[0]), 0);
        prop_assert!(depth_of(&trackers[0]).iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_depth_one_is_host_and_progenitors(config in arb_config()) {
        let catalog = build(config);
        let tree = catalog.tree().unwrap();
        let host = catalog.host_index();
        let trackers = tree.traverse_tree(host, 1, None).unwrap();

        let progenitors = tree.get_progenitors(host).unwrap();
        prop_assert_eq!(&progenitors, &catalog.expected_progenitors(host));
        prop_assert_eq!(trackers.len(), progenitors.len() + 1);
        prop_assert_eq!(index_of(&trackers[0]), host);

        let found: BTreeSet<usize> = trackers[1..].iter().map(index_of).collect();
        prop_assert_eq!(found, progenitors.into_iter().collect::<BTreeSet<_>>());
        for trk in &trackers[1..] {
            prop_assert!(depth_of(trk).iter().all(|&d| d == 1.0));
        }

        let reject: IncludeFn = &|_| false;
        let only_host = tree.traverse_tree(host, 1, Some(reject)).unwrap();
        prop_assert_eq!(only_host.len(), 1);
    }

    #[test]
    fn test_tracker_positions_do_not_alias_storage(config in arb_config(), pick in any::<usize>()) {
        let catalog = build(config);
        let storage = catalog.storage().unwrap();
        let obj = pick % catalog.halo_count();

        let mut trk = storage.create_track(obj).unwrap();
        let shape = trk.positions().dim();
        trk.set_pos(Array2::from_elem(shape, 7.0)).unwrap();

        let after = storage.get("x", &Selector::All, &Selector::All).unwrap();
        prop_assert_eq!(after.data().to_f64(), catalog.positions().clone().into_dyn());
    }
}
