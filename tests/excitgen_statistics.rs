use assert::close;
use fciqmc::excitgen::gen_excit;
use fciqmc::lattice::LatticeSpec;
use fciqmc::system::{DetCache, MolecularIntegrals, System};
use fciqmc::Det;
use rand_mt::Mt64;
use std::collections::HashMap;

const NDRAWS: usize = 1_000_000;

/// Key of one generated excitation: the target determinant's occupation.
fn outcome_key(d: &Det) -> Vec<u32> {
    d.occ_list()
}

#[test]
fn real_space_generator_uniform_with_exact_pgen() {
    env_logger::init();
    // 3x3 periodic square lattice, three electrons well apart: sites 0
    // and 4 spin up, site 8 spin down. Every electron sees its four
    // lattice neighbours free, so every (i, a) carries pgen = 1/12.
    let spec = LatticeSpec::rectangular(&[3, 3]).unwrap();
    let sys = System::hubbard_real(&spec, 2, 1, 4.0, 1.0).unwrap();
    let d = Det::from_occ(&[0, 8, 17], sys.n_basis);
    let mut cache = DetCache::new();
    cache.decode(&d);
    let mut rng = Mt64::new(20_200_101);

    let mut counts: HashMap<Vec<u32>, (usize, f64)> = HashMap::new();
    for _ in 0..NDRAWS {
        let res = gen_excit(&sys, &d, &cache, 0.0, true, &mut rng);
        let det = res.det.expect("no draw is blocked on this lattice");
        close(res.p_gen, 1.0 / 12.0, 1e-14);
        let entry = counts.entry(outcome_key(&det)).or_insert((0, res.p_gen));
        entry.0 += 1;
        close(entry.1, res.p_gen, 1e-14);
    }

    assert_eq!(counts.len(), 12);
    let pgen_sum: f64 = counts.values().map(|&(_, p)| p).sum();
    close(pgen_sum, 1.0, 1e-9);
    for &(n, p) in counts.values() {
        // Empirical frequency against the reported probability, well
        // inside the 5-sigma band of a binomial at these draw counts.
        close(n as f64 / NDRAWS as f64, p, 0.0025);
    }
}

#[test]
fn momentum_space_pgen_sums_to_one() {
    // 4x4 momentum-space Hubbard cell, four electrons on an arbitrary
    // determinant: alpha at k-points 0 and 5, beta at 3 and 10.
    let sys = System::hubbard_k(&[4, 4], 2, 2, 4.0, 1.0).unwrap();
    let d = Det::from_occ(&[0, 7, 10, 21], sys.n_basis);
    let mut cache = DetCache::new();
    cache.decode(&d);
    let mut rng = Mt64::new(77);

    let mut counts: HashMap<Vec<u32>, (usize, f64)> = HashMap::new();
    let mut forbidden = 0usize;
    for _ in 0..NDRAWS {
        let res = gen_excit(&sys, &d, &cache, 0.0, true, &mut rng);
        match res.det {
            Some(det) => {
                assert_eq!(det.count_ones(), 4);
                close(res.h_ij.abs(), sys.hubbard_u / 16.0, 1e-12);
                let entry = counts.entry(outcome_key(&det)).or_insert((0, res.p_gen));
                entry.0 += 1;
                close(entry.1, res.p_gen, 1e-14);
            }
            None => forbidden += 1,
        }
    }

    // Every occupied pair has valid targets on this cell.
    assert_eq!(forbidden, 0);
    let pgen_sum: f64 = counts.values().map(|&(_, p)| p).sum();
    close(pgen_sum, 1.0, 1e-9);
    for &(n, p) in counts.values() {
        if p > 1e-4 {
            let ratio = n as f64 / NDRAWS as f64 / p;
            close(ratio, 1.0, 0.05);
        }
    }
}

/// Four spatial orbitals alternating between two irreps; the integral
/// values are irrelevant to the draw statistics.
fn fake_molecule() -> System {
    let ints = MolecularIntegrals::new(4, 0.0, vec![0, 1, 0, 1]);
    System::molecular(ints, 2, 1).unwrap()
}

#[test]
fn molecular_renormalised_pgen_sums_to_one() {
    let sys = fake_molecule();
    // Alpha on spatial orbitals 0 and 2, beta on 0: no symmetry-allowed
    // pick is ever blocked on this filling, so the renormalised draws
    // conserve the whole attempt mass.
    let d = Det::from_occ(&[0, 1, 4], sys.n_basis);
    let mut cache = DetCache::new();
    cache.decode(&d);
    let mut rng = Mt64::new(4242);
    let pattempt_single = 0.3;

    let mut counts: HashMap<Vec<u32>, (usize, f64)> = HashMap::new();
    let n_draws = 400_000;
    for _ in 0..n_draws {
        let res = gen_excit(&sys, &d, &cache, pattempt_single, true, &mut rng);
        let det = res.det.expect("renormalised draws never block here");
        let entry = counts.entry(outcome_key(&det)).or_insert((0, res.p_gen));
        entry.0 += 1;
        close(entry.1, res.p_gen, 1e-14);
    }

    let pgen_sum: f64 = counts.values().map(|&(_, p)| p).sum();
    close(pgen_sum, 1.0, 1e-9);
    for &(n, p) in counts.values() {
        close(n as f64 / n_draws as f64 / p, 1.0, 0.05);
    }
}

#[test]
fn molecular_no_renorm_matches_reported_pgen() {
    let sys = fake_molecule();
    let d = Det::from_occ(&[0, 1, 4], sys.n_basis);
    let mut cache = DetCache::new();
    cache.decode(&d);
    let mut rng = Mt64::new(999);
    let pattempt_single = 0.3;

    let mut counts: HashMap<Vec<u32>, (usize, f64)> = HashMap::new();
    let mut forbidden = 0usize;
    let n_draws = 400_000;
    for _ in 0..n_draws {
        let res = gen_excit(&sys, &d, &cache, pattempt_single, false, &mut rng);
        match res.det {
            Some(det) => {
                let entry = counts.entry(outcome_key(&det)).or_insert((0, res.p_gen));
                entry.0 += 1;
                close(entry.1, res.p_gen, 1e-14);
            }
            None => forbidden += 1,
        }
    }

    // The cheap variant loses attempt mass to forbidden draws but must
    // still report the true probability of everything it does produce.
    assert!(forbidden > 0);
    for &(n, p) in counts.values() {
        close(n as f64 / n_draws as f64 / p, 1.0, 0.05);
    }
    let pgen_sum: f64 = counts.values().map(|&(_, p)| p).sum();
    assert!(pgen_sum < 1.0);
}
