use assert::close;
use fciqmc::csr::{csrpgemv, csrpsymv};
use fciqmc::diagonalisation::{
    build_hamiltonian, enumerate_space, ground_state_energy, ground_state_energy_dense,
    lanczos_ground_state,
};
use fciqmc::lattice::LatticeSpec;
use fciqmc::system::System;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const CONS_U: f64 = 4.0;
const CONS_T: f64 = 1.0;

#[test]
fn open_dimer_matches_analytic_ground_state() {
    env_logger::init();
    // Half-filled two-site Hubbard cluster:
    // E_0 = (U - sqrt(U^2 + 16 t^2)) / 2
    let mut spec = LatticeSpec::chain(2).unwrap();
    spec.finite_cluster = true;
    let sys = System::hubbard_real(&spec, 1, 1, CONS_U, CONS_T).unwrap();
    let exact = (CONS_U - <f64>::sqrt(CONS_U * CONS_U + 16.0 * CONS_T * CONS_T)) / 2.0;
    let e_lanczos = ground_state_energy(&sys, 50).unwrap();
    close(e_lanczos, exact, 1e-6);
    let e_dense = ground_state_energy_dense(&sys).unwrap();
    close(e_dense, exact, 1e-10);
}

#[test]
fn periodic_chain_lanczos_agrees_with_dense() {
    // 4-site half-filled ring at U = 4: the Lanczos recursion through the
    // symmetric CSR kernel and the dense LAPACK path are independent
    // routes to the same ground state.
    let spec = LatticeSpec::chain(4).unwrap();
    let sys = System::hubbard_real(&spec, 2, 2, CONS_U, CONS_T).unwrap();
    let e_lanczos = ground_state_energy(&sys, 100).unwrap();
    let e_dense = ground_state_energy_dense(&sys).unwrap();
    close(e_lanczos, e_dense, 1e-8);
    // Physical bracket: below the Heisenberg limit estimate, above the
    // non-interacting filling energy.
    assert!(e_lanczos > -4.0 && e_lanczos < -1.0);
}

#[test]
fn momentum_space_spectrum_matches_real_space() {
    // The same ring in either single-particle basis has the same
    // spectrum.
    let spec = LatticeSpec::chain(4).unwrap();
    let real = System::hubbard_real(&spec, 2, 2, CONS_U, CONS_T).unwrap();
    let kspace = System::hubbard_k(&[4], 2, 2, CONS_U, CONS_T).unwrap();
    let e_real = ground_state_energy_dense(&real).unwrap();
    let e_k = ground_state_energy_dense(&kspace).unwrap();
    close(e_real, e_k, 1e-8);
}

#[test]
fn assembled_hamiltonian_passes_symmetry_law() {
    let spec = LatticeSpec::chain(4).unwrap();
    let sys = System::hubbard_real(&spec, 2, 2, CONS_U, CONS_T).unwrap();
    let dets = enumerate_space(&sys);
    let ham = build_hamiltonian(&sys, &dets).unwrap();
    let full = ham.to_general().unwrap();
    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..10 {
        let x: Vec<f64> = (0..dets.len()).map(|_| rng.gen::<f64>() - 0.5).collect();
        let mut y_sym = vec![0.0; dets.len()];
        let mut y_gen = vec![0.0; dets.len()];
        csrpsymv(&ham, &x, &mut y_sym).unwrap();
        csrpgemv(&full, &x, &mut y_gen).unwrap();
        for (a, b) in y_sym.iter().zip(y_gen.iter()) {
            close(*a, *b, 1e-12);
        }
    }
}

#[test]
fn lanczos_handles_diagonal_matrix() {
    // Three steps on a tiny diagonal matrix span the full space.
    let m = fciqmc::csr::CsrMatrix::from_triplets(
        3,
        3,
        &[(0, 0, -1.5), (1, 1, 2.0), (2, 2, 5.0)],
        true,
    )
    .unwrap();
    let e = lanczos_ground_state(&m, 50).unwrap();
    close(e, -1.5, 1e-10);
}
