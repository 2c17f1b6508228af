// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios and randomized law checks for the octagon domain.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use octava_core::lincons::LinCons;
use octava_core::linexpr::LinExpr;

use octava_domain_oct::{Oct, OctManager};

fn upper(dim: u32, c: f64) -> LinCons {
    LinCons::leq(LinExpr::constant(-c).with_term(dim, 1.0))
}

fn lower(dim: u32, c: f64) -> LinCons {
    LinCons::leq(LinExpr::constant(c).with_term(dim, -1.0))
}

fn diff_leq(hi: u32, lo: u32, c: f64) -> LinCons {
    LinCons::leq(LinExpr::constant(-c).with_term(hi, 1.0).with_term(lo, -1.0))
}

#[test]
fn pure_differences_leave_variables_unbounded() {
    let mut man = OctManager::new();

    let mut a = man.top(2);
    man.meet_lincons_array(&mut a, &[diff_leq(0, 1, 3.0), diff_leq(1, 0, -1.0)]);

    assert!(man.sat_lincons(&mut a, &diff_leq(0, 1, 3.0)));
    let bx = man.to_box(&mut a);
    assert!(bx[0].is_top());
    assert!(bx[1].is_top());
}

#[test]
fn closure_entails_transitive_bounds() {
    let mut man = OctManager::new();

    let mut a = man.top(2);
    man.meet_lincons_array(
        &mut a,
        &[upper(0, 5.0), lower(0, 0.0), upper(1, 7.0), diff_leq(0, 1, -3.0)],
    );

    assert!(man.sat_lincons(&mut a, &lower(1, 3.0)));
}

#[test]
fn unary_constraints_track_single_component() {
    let mut man = OctManager::new();

    let mut a = man.top(3);
    man.meet_lincons_array(&mut a, &[upper(0, 1.0), lower(0, 1.0)]);

    assert!(!man.is_dimension_unconstrained(&mut a, 0));
    assert!(man.is_dimension_unconstrained(&mut a, 1));
    assert!(man.is_dimension_unconstrained(&mut a, 2));

    let dump = a.dump_decomposed();
    assert!(dump.contains("component: 0\n"));
    assert!(!dump.contains("component: 0 "));
}

#[test]
fn negative_cycle_collapses_to_bottom() {
    let mut man = OctManager::new();

    let mut a = man.top(3);
    man.meet_lincons_array(
        &mut a,
        &[diff_leq(0, 1, 0.0), diff_leq(1, 2, 0.0), diff_leq(2, 0, -1.0)],
    );

    assert!(man.is_bottom(&mut a));
}

#[test]
fn join_of_two_points_is_their_hull() {
    let mut man = OctManager::new();

    let mut a = man.top(1);
    man.meet_lincons_array(&mut a, &[upper(0, 0.0), lower(0, 0.0)]);
    let mut b = man.top(1);
    man.meet_lincons_array(&mut b, &[upper(0, 2.0), lower(0, 2.0)]);

    let mut j = man.join(&mut a, &mut b);
    assert!(man.sat_lincons(&mut j, &upper(0, 2.0)));
    assert!(man.sat_lincons(&mut j, &lower(0, 0.0)));
    assert!(!man.sat_lincons(&mut j, &upper(0, 1.9)));
}

#[test]
fn widening_drops_the_growing_bound() {
    let mut man = OctManager::new();

    let mut a = man.top(1);
    man.meet_lincons_array(&mut a, &[lower(0, 0.0), upper(0, 1.0)]);
    let mut b = man.top(1);
    man.meet_lincons_array(&mut b, &[lower(0, 0.0), upper(0, 2.0)]);

    let mut w = man.widening(&a, &mut b);
    let itv = man.bound_dimension(&mut w, 0);
    assert_eq!(itv.lo, 0.0);
    assert_eq!(itv.up, f64::INFINITY);
}

#[test]
fn widening_chain_stabilizes() {
    let mut man = OctManager::new();

    let mut acc = man.top(1);
    man.meet_lincons_array(&mut acc, &[lower(0, 0.0), upper(0, 0.0)]);

    let mut steps = 0;
    for k in 1..100 {
        let mut next = man.top(1);
        man.meet_lincons_array(&mut next, &[lower(0, 0.0), upper(0, k as f64)]);

        let widened = man.widening(&acc, &mut next);
        if !man.is_equal(&mut widened.clone(), &mut acc) {
            steps += 1;
            acc = widened;
        }
    }

    // One unstable bound escapes once; afterwards the iterate is a fixpoint.
    assert_eq!(steps, 1);
    let itv = man.bound_dimension(&mut acc, 0);
    assert_eq!(itv.up, f64::INFINITY);
    assert_eq!(itv.lo, 0.0);
}

fn random_cons(rng: &mut SmallRng, dim: u32) -> LinCons {
    let i = rng.random_range(0..dim);
    let si = if rng.random::<bool>() { 1.0 } else { -1.0 };
    let c = rng.random_range(-8..=8) as f64;

    if rng.random::<bool>() || dim < 2 {
        LinCons::leq(LinExpr::constant(-c).with_term(i, si))
    }
    else {
        let mut j = rng.random_range(0..dim);
        if j == i {
            j = (j + 1) % dim;
        }
        let sj = if rng.random::<bool>() { 1.0 } else { -1.0 };
        LinCons::leq(LinExpr::constant(-c).with_term(i, si).with_term(j, sj))
    }
}

fn random_oct(man: &mut OctManager, rng: &mut SmallRng, dim: u32, ncons: usize) -> Oct {
    let mut a = man.top(dim as usize);
    for _ in 0..ncons {
        man.meet_lincons_array(&mut a, &[random_cons(rng, dim)]);
    }
    a
}

#[test]
fn lattice_laws_on_random_octagons() {
    let mut man = OctManager::new();
    let mut rng = SmallRng::seed_from_u64(0x0c7a);

    for round in 0..40 {
        let dim = 1 + round % 4;
        let mut a = random_oct(&mut man, &mut rng, dim, 4);
        let mut b = random_oct(&mut man, &mut rng, dim, 4);

        let mut top = man.top(dim as usize);
        let mut bot = man.bottom(dim as usize);
        assert!(man.is_leq(&mut a, &mut top));
        assert!(man.is_leq(&mut bot, &mut a));

        // Commutativity and the sandwich laws.
        let mut jab = man.join(&mut a, &mut b);
        let mut jba = man.join(&mut b, &mut a);
        assert!(man.is_equal(&mut jab, &mut jba));

        let mut mab = man.meet(&a, &b);
        assert!(man.is_leq(&mut mab, &mut a));
        assert!(man.is_leq(&mut a, &mut jab));

        // Antisymmetry of the order.
        let leq = man.is_leq(&mut a, &mut b);
        let geq = man.is_leq(&mut b, &mut a);
        assert_eq!(leq && geq, man.is_equal(&mut a, &mut b));

        // Join idempotence.
        let mut jaa = man.join(&mut a.clone(), &mut a);
        assert!(man.is_equal(&mut jaa, &mut a));
    }
}

#[test]
fn dense_and_decomposed_agree() {
    let mut man = OctManager::new();
    let mut rng = SmallRng::seed_from_u64(0xdec0);

    for round in 0..30 {
        let dim = 2 + round % 3;
        let mut a = random_oct(&mut man, &mut rng, dim, 3);
        let mut b = random_oct(&mut man, &mut rng, dim, 3);

        let mut ad = a.clone();
        ad.densify();
        let mut bd = b.clone();
        bd.densify();

        let mut j = man.join(&mut a, &mut b);
        let mut jd = man.join(&mut ad, &mut bd);
        jd.sparsify();
        assert!(man.is_equal(&mut j, &mut jd));

        let mut m = man.meet(&a, &b);
        let mut md = man.meet(&ad, &bd);
        md.sparsify();
        assert!(man.is_equal(&mut m, &mut md));

        let mut w = man.widening(&a, &mut b);
        let mut wd = man.widening(&ad, &mut bd);
        assert!(man.is_equal(&mut w, &mut wd));
    }
}

#[test]
fn lincons_round_trip_rebuilds_the_octagon() {
    let mut man = OctManager::new();
    let mut rng = SmallRng::seed_from_u64(0x0407);

    for round in 0..30 {
        let dim = 1 + round % 4;
        let mut a = random_oct(&mut man, &mut rng, dim, 5);
        if man.is_bottom(&mut a) {
            continue;
        }

        let cons = man.to_lincons_array(&mut a);
        let mut back = man.top(dim as usize);
        man.meet_lincons_array(&mut back, &cons);
        assert!(man.is_equal(&mut back, &mut a), "round {}", round);
    }
}

#[test]
fn to_box_contains_known_points() {
    let mut man = OctManager::new();
    let mut rng = SmallRng::seed_from_u64(0xb0c5);

    for _ in 0..30 {
        let dim = 2 + rng.random_range(0..3u32) as usize;
        let point: Vec<f64> = (0..dim).map(|_| rng.random_range(-5..=5) as f64).collect();

        // Constraints that hold at `point` by construction, so the point stays in the octagon.
        let mut a = man.top(dim);
        for _ in 0..6 {
            let i = rng.random_range(0..dim as u32);
            let si = if rng.random::<bool>() { 1.0 } else { -1.0 };
            let j = rng.random_range(0..dim as u32);
            let slack = rng.random_range(0..4) as f64;

            let cons = if i == j {
                let val = si * point[i as usize];
                LinCons::leq(LinExpr::constant(-val - slack).with_term(i, si))
            }
            else {
                let sj = if rng.random::<bool>() { 1.0 } else { -1.0 };
                let val = si * point[i as usize] + sj * point[j as usize];
                LinCons::leq(LinExpr::constant(-val - slack).with_term(i, si).with_term(j, sj))
            };
            man.meet_lincons_array(&mut a, &[cons]);
        }

        let bx = man.to_box(&mut a);
        for v in 0..dim {
            assert!(bx[v].contains_point(point[v]), "x{} = {} not in {}", v, point[v], bx[v]);
        }
    }
}

#[test]
fn dump_matrix_is_line_oriented() {
    let mut man = OctManager::new();

    let mut a = man.top(2);
    man.meet_lincons_array(&mut a, &[diff_leq(0, 1, 3.0)]);

    let dump = a.dump_matrix();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], "2");
    assert_eq!(lines.len(), 1 + 4);
    for row in &lines[1..] {
        assert_eq!(row.split(' ').count(), 4);
    }
    assert!(dump.contains("inf"));
}
