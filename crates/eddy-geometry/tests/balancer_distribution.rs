//! Load-balancer properties across simulated ranks: every rank ends up
//! with the same table, every cuboid has exactly one owner, and the
//! result depends only on the decomposition.

use eddy_comm::Universe;
use eddy_core::{CuboidId, RankId};
use eddy_geometry::{
    greedy_assignment, Cuboid, CuboidDecomposition, HeuristicConfig, IndicatorSphere, LoadBalancer,
};
use proptest::prelude::*;

fn disc_decomposition(count: usize) -> CuboidDecomposition {
    let disc = IndicatorSphere::circle([0.0, 0.0], 10.0);
    CuboidDecomposition::from_indicator(&disc, 1.0, 2, count).unwrap()
}

#[test]
fn every_rank_agrees_on_the_assignment() {
    let tables = Universe::run(3, |comm| {
        let d = disc_decomposition(12);
        let lb = LoadBalancer::heuristic(&d, &comm, &HeuristicConfig::default()).unwrap();
        assert_eq!(lb.rank(), comm.rank());
        lb.owners().to_vec()
    });
    assert!(tables.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn local_sets_partition_the_cuboids() {
    let locals = Universe::run(4, |comm| {
        let d = disc_decomposition(16);
        let lb = LoadBalancer::heuristic(&d, &comm, &HeuristicConfig::default()).unwrap();
        for (l, g) in lb.local_ids().iter().enumerate() {
            assert_eq!(lb.loc(*g), Some(l));
            assert_eq!(lb.rank_of(*g), Some(comm.rank()));
        }
        lb.local_ids().to_vec()
    });
    let mut all: Vec<CuboidId> = locals.into_iter().flatten().collect();
    all.sort();
    assert_eq!(all, (0..16).map(CuboidId).collect::<Vec<_>>());
}

#[test]
fn single_rank_heuristic_is_degenerate() {
    let comm = eddy_comm::Comm::solo();
    let d = disc_decomposition(6);
    let lb = LoadBalancer::heuristic(&d, &comm, &HeuristicConfig::default()).unwrap();
    for i in 0..6 {
        assert_eq!(lb.loc(CuboidId(i)), Some(i as usize));
        assert_eq!(lb.rank_of(CuboidId(i)), Some(RankId(0)));
    }
}

#[test]
fn re_init_follows_geometry_changes() {
    Universe::run(2, |comm| {
        let mut d = CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, [8, 8, 1]), 2, 4).unwrap();
        let cfg = HeuristicConfig::default();
        let mut lb = LoadBalancer::heuristic(&d, &comm, &cfg).unwrap();
        assert_eq!(lb.local_count(), 2);

        d.get_mut(CuboidId(0)).unwrap().set_weight(16);
        for i in 1..4 {
            d.get_mut(CuboidId(i)).unwrap().set_weight(0);
        }
        lb.re_init(&d, &comm, &cfg).unwrap();
        // The full cuboid sits alone on rank 0; the three empty ones
        // (weight 16 / 3.7 each) all fit on rank 1.
        assert_eq!(lb.rank_of(CuboidId(0)), Some(RankId(0)));
        for i in 1..4 {
            assert_eq!(lb.rank_of(CuboidId(i)), Some(RankId(1)));
        }
    });
}

proptest! {
    #[test]
    fn greedy_is_deterministic_and_total(
        weights in prop::collection::vec(0.0f64..100.0, 1..40),
        ranks in 1usize..6,
    ) {
        let a = greedy_assignment(&weights, ranks);
        let b = greedy_assignment(&weights, ranks);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), weights.len());
        prop_assert!(a.iter().all(|r| r.index() < ranks));
    }

    #[test]
    fn decomposition_covers_domain_exactly(
        nx in 1i32..24, ny in 1i32..24, count in 1usize..9,
    ) {
        let mother = Cuboid::new([0.0; 3], 1.0, [nx, ny, 1]);
        if let Ok(d) = CuboidDecomposition::new(mother.clone(), 2, count) {
            prop_assert_eq!(d.len(), count);
            let total: u64 = d.iter().map(|(_, c)| c.lattice_volume()).sum();
            prop_assert_eq!(total, mother.lattice_volume());
            for g in mother.bounds().iter() {
                let owners = d.iter().filter(|(_, c)| c.contains_global(g)).count();
                prop_assert_eq!(owners, 1);
            }
        }
    }
}
