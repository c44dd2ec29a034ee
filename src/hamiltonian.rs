use crate::excitation::{connecting_excitation, Excitation};
use crate::lattice::ConnectivityTables;
use crate::system::{Spin, System, SystemKind};
use crate::{andnot_count, andnot_select, Det};

/// Kinetic matrix element between two sites of the lattice.
/// # Arguments
/// * __`conn`__ - The connectivity tables of the cell.
/// * __`t`__ - The hopping amplitude.
/// # Definition
/// Both directions of the asymmetric `tmat` encoding are tested
/// independently, so a doubly bonded pair contributes $-2t$ and a site
/// bonded to its own periodic image carries the full $-2t$ on the
/// diagonal.
#[inline(always)]
pub fn one_e_int(conn: &ConnectivityTables, t: f64, i: u32, j: u32) -> f64 {
    let mut x = 0.0;
    if conn.tmat[i as usize].check(j) {
        x -= t;
    }
    if conn.tmat[j as usize].check(i) {
        x -= t;
    }
    x
}

/// On-site repulsion of a determinant.
/// # Definition
/// $$
/// \langle D|\hat H_U|D\rangle=U\sum_s n_{s\uparrow}n_{s\downarrow}
/// $$
#[inline(always)]
pub fn coulomb_diagonal(d: &Det, u: f64) -> f64 {
    u * d.double_occupancy() as f64
}

/// Diagonal Hamiltonian element $\langle D|\hat H|D\rangle$.
pub fn diagonal_element(sys: &System, d: &Det) -> f64 {
    match sys.kind {
        SystemKind::HubbardReal => {
            let conn = sys.lattice.as_ref().unwrap();
            let kin: f64 = d
                .ones()
                .map(|p| one_e_int(conn, sys.hubbard_t, p, p))
                .sum();
            kin + coulomb_diagonal(d, sys.hubbard_u)
        }
        SystemKind::HubbardK => {
            let kin: f64 = d.ones().map(|p| sys.eps_k(p)).sum();
            kin + sys.hubbard_u * (sys.n_alpha * sys.n_beta) as f64 / sys.n_k() as f64
        }
        SystemKind::Molecular => {
            let ints = sys.integrals.as_ref().unwrap();
            let occ = d.occ_list();
            let mut e = ints.e_core;
            for (n, &p) in occ.iter().enumerate() {
                let sp = p as usize / 2;
                e += ints.one_e(sp, sp);
                for &q in occ.iter().take(n) {
                    let sq = q as usize / 2;
                    e += ints.two_e(sp, sp, sq, sq);
                    if Spin::of_orb(p) == Spin::of_orb(q) {
                        e -= ints.two_e(sp, sq, sp, sq);
                    }
                }
            }
            e
        }
    }
}

/// Matrix element of a single excitation $i\to a$.
pub fn slater_condon1(sys: &System, d: &Det, exc: &Excitation) -> f64 {
    let i = exc.from_orb[0];
    let a = exc.to_orb[0];
    if Spin::of_orb(i) != Spin::of_orb(a) {
        return 0.0;
    }
    match sys.kind {
        SystemKind::HubbardReal => {
            let conn = sys.lattice.as_ref().unwrap();
            exc.sign() * one_e_int(conn, sys.hubbard_t, i, a)
        }
        // Momentum is a good quantum number: no single excitations.
        SystemKind::HubbardK => 0.0,
        SystemKind::Molecular => {
            let ints = sys.integrals.as_ref().unwrap();
            let (si, sa) = (i as usize / 2, a as usize / 2);
            let mut h = ints.one_e(si, sa);
            for p in d.ones() {
                if p == i {
                    continue;
                }
                let sp = p as usize / 2;
                h += ints.two_e(si, sa, sp, sp);
                if Spin::of_orb(p) == Spin::of_orb(i) {
                    h -= ints.two_e(si, sp, sp, sa);
                }
            }
            exc.sign() * h
        }
    }
}

/// Matrix element of a double excitation $ij\to ab$, the orbital pairs
/// ascending as stored in the excitation record.
pub fn slater_condon2(sys: &System, exc: &Excitation) -> f64 {
    let [i, j] = exc.from_orb;
    let [a, b] = exc.to_orb;
    match sys.kind {
        SystemKind::HubbardReal => 0.0,
        SystemKind::HubbardK => {
            // Only the momentum-conserving Coulomb or exchange term of
            // U/N survives the spin deltas.
            if sys
                .sym
                .conserving(sys.orb_sym(i), sys.orb_sym(j), sys.orb_sym(a))
                != sys.orb_sym(b)
            {
                return 0.0;
            }
            let u_nk = sys.hubbard_u / sys.n_k() as f64;
            let mut h = 0.0;
            if Spin::of_orb(i) == Spin::of_orb(a) && Spin::of_orb(j) == Spin::of_orb(b) {
                h += u_nk;
            }
            if Spin::of_orb(i) == Spin::of_orb(b) && Spin::of_orb(j) == Spin::of_orb(a) {
                h -= u_nk;
            }
            exc.sign() * h
        }
        SystemKind::Molecular => {
            let ints = sys.integrals.as_ref().unwrap();
            let (si, sj, sa, sb) = (
                i as usize / 2,
                j as usize / 2,
                a as usize / 2,
                b as usize / 2,
            );
            let mut h = 0.0;
            if Spin::of_orb(i) == Spin::of_orb(a) && Spin::of_orb(j) == Spin::of_orb(b) {
                h += ints.two_e(si, sa, sj, sb);
            }
            if Spin::of_orb(i) == Spin::of_orb(b) && Spin::of_orb(j) == Spin::of_orb(a) {
                h -= ints.two_e(si, sb, sj, sa);
            }
            exc.sign() * h
        }
    }
}

/// General matrix element $\langle D|\hat H|D'\rangle$, dispatching on the
/// excitation level. Total over any pair of valid determinants.
pub fn ham_element(sys: &System, d1: &Det, d2: &Det) -> f64 {
    match d1.excitation_level(d2) {
        0 => diagonal_element(sys, d1),
        1 => {
            let exc = connecting_excitation(d1, d2);
            slater_condon1(sys, d1, &exc)
        }
        2 => {
            let exc = connecting_excitation(d1, d2);
            slater_condon2(sys, &exc)
        }
        _ => 0.0,
    }
}

/// Deterministically enumerate every connected determinant with a nonzero
/// matrix element. Drives the exact-diagonalisation companion and the
/// generator cross-checks; the stochastic loop never calls this.
pub fn connected_determinants(sys: &System, d: &Det) -> Vec<(Det, f64)> {
    let mut out = Vec::new();
    match sys.kind {
        SystemKind::HubbardReal => {
            let conn = sys.lattice.as_ref().unwrap();
            for i in d.ones() {
                let mask = &conn.connected_orbs[i as usize];
                let n_avail = andnot_count(mask, d);
                for rank in 0..n_avail {
                    let a = andnot_select(mask, d, rank);
                    let mut exc = Excitation::single(i, a);
                    let d2 = exc.apply(d);
                    let h = slater_condon1(sys, d, &exc);
                    if h != 0.0 {
                        out.push((d2, h));
                    }
                }
            }
        }
        SystemKind::HubbardK => {
            let occ: Vec<u32> = d.occ_list();
            for &i in occ.iter().filter(|&&p| p % 2 == 0) {
                for &j in occ.iter().filter(|&&p| p % 2 == 1) {
                    // One alpha virtual fixes its beta partner, so each
                    // unordered pair appears exactly once.
                    for ik in 0..sys.n_k() as u32 {
                        let a = 2 * ik;
                        if d.check(a) {
                            continue;
                        }
                        let kb = sys.sym.conserving(sys.orb_sym(i), sys.orb_sym(j), ik);
                        let b = 2 * kb + 1;
                        if d.check(b) {
                            continue;
                        }
                        let mut exc = Excitation::double(i, j, a, b);
                        let d2 = exc.apply(d);
                        let h = slater_condon2(sys, &exc);
                        if h != 0.0 {
                            out.push((d2, h));
                        }
                    }
                }
            }
        }
        SystemKind::Molecular => {
            let occ: Vec<u32> = d.occ_list();
            for &i in occ.iter() {
                for a in 0..sys.n_basis as u32 {
                    if d.check(a) || Spin::of_orb(a) != Spin::of_orb(i) {
                        continue;
                    }
                    if sys.orb_sym(a) != sys.orb_sym(i) {
                        continue;
                    }
                    let mut exc = Excitation::single(i, a);
                    let d2 = exc.apply(d);
                    let h = slater_condon1(sys, d, &exc);
                    if h != 0.0 {
                        out.push((d2, h));
                    }
                }
            }
            for (n, &i) in occ.iter().enumerate() {
                for &j in occ.iter().skip(n + 1) {
                    let ij_sym = sys.sym.product(sys.orb_sym(i), sys.orb_sym(j));
                    for a in 0..sys.n_basis as u32 {
                        if d.check(a) {
                            continue;
                        }
                        for b in a + 1..sys.n_basis as u32 {
                            if d.check(b) {
                                continue;
                            }
                            if sys.sym.product(sys.orb_sym(a), sys.orb_sym(b)) != ij_sym {
                                continue;
                            }
                            let mut exc = Excitation::double(i, j, a, b);
                            let d2 = exc.apply(d);
                            let h = slater_condon2(sys, &exc);
                            if h != 0.0 {
                                out.push((d2, h));
                            }
                        }
                    }
                }
            }
        }
    }
    out
}
