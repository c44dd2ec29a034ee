use rand::Rng;

use crate::excitation::Excitation;
use crate::hamiltonian::{slater_condon1, slater_condon2};
use crate::system::{DetCache, Spin, System, SystemKind};
use crate::{andnot_count, andnot_select, Det};

/// Outcome of one excitation draw.
/// # Definition
/// A forbidden draw carries no target determinant, a zero matrix element
/// and a generation probability of one, so the spawning step downstream
/// never divides by zero and the single/double split needs no
/// renormalisation.
#[derive(Debug, Clone)]
pub struct GenResult {
    pub det: Option<Det>,
    pub exc: Excitation,
    pub p_gen: f64,
    pub h_ij: f64,
}

impl GenResult {
    #[inline(always)]
    pub fn forbidden() -> GenResult {
        GenResult {
            det: None,
            exc: Excitation::null(),
            p_gen: 1.0,
            h_ij: 0.0,
        }
    }
}

/// Draw a connected determinant from `d`, dispatching on the system kind.
/// # Arguments
/// * __`cache`__ - The decoded occupied lists of `d`.
/// * __`pattempt_single`__ - Probability of attempting a single rather
///   than a double excitation. Molecular systems only.
/// * __`renorm`__ - Use the renormalised molecular generators, which
///   pre-scan for allowed draws at $O(N)$ cost instead of rejecting.
pub fn gen_excit<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    pattempt_single: f64,
    renorm: bool,
    rng: &mut R,
) -> GenResult {
    match sys.kind {
        SystemKind::HubbardReal => gen_excit_hub_real(sys, d, cache, rng),
        SystemKind::HubbardK => gen_excit_hub_k(sys, d, cache, rng),
        SystemKind::Molecular => {
            if rng.gen::<f64>() < pattempt_single {
                if renorm {
                    gen_single_mol(sys, d, cache, pattempt_single, rng)
                } else {
                    gen_single_mol_no_renorm(sys, d, cache, pattempt_single, rng)
                }
            } else if renorm {
                gen_double_mol(sys, d, cache, 1.0 - pattempt_single, rng)
            } else {
                gen_double_mol_no_renorm(sys, d, cache, 1.0 - pattempt_single, rng)
            }
        }
    }
}

/// Real-space Hubbard: biased draw of a single excitation along a bond.
/// # Definition
/// An occupied orbital $i$ is drawn uniformly and redrawn while it has no
/// free neighbour; the target is drawn uniformly by rank over
/// `connected_orbs[i] & !D`, giving
/// $$
/// p_\text{gen}=\frac{1}{N_e\\,n_v(i)}
/// $$
fn gen_excit_hub_real<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    rng: &mut R,
) -> GenResult {
    let conn = sys.lattice.as_ref().unwrap();
    let blocked = cache
        .occ
        .iter()
        .all(|&i| andnot_count(&conn.connected_orbs[i as usize], d) == 0);
    if blocked {
        return GenResult::forbidden();
    }
    loop {
        let i = cache.occ[rng.gen_range(0..cache.occ.len())];
        let mask = &conn.connected_orbs[i as usize];
        let n_avail = andnot_count(mask, d);
        if n_avail == 0 {
            continue;
        }
        let a = andnot_select(mask, d, rng.gen_range(0..n_avail));
        let mut exc = Excitation::single(i, a);
        let det = exc.apply(d);
        let h_ij = slater_condon1(sys, d, &exc);
        let p_gen = 1.0 / (cache.occ.len() as f64 * n_avail as f64);
        return GenResult {
            det: Some(det),
            exc,
            p_gen,
            h_ij,
        };
    }
}

/// The momentum- and spin-conserving partner of a first virtual pick.
#[inline(always)]
fn k_partner(sys: &System, ij_sym: u32, x: u32) -> u32 {
    let kb = sys.sym.product(ij_sym, sys.sym.inverse(sys.orb_sym(x)));
    if x % 2 == 0 {
        2 * kb + 1
    } else {
        2 * kb
    }
}

/// Momentum-space Hubbard: symmetry-constrained opposite-spin doubles.
/// # Definition
/// The occupied pair is decoded rectangularly from a single uniform draw
/// over (alpha, beta) pairs; the first virtual is drawn uniformly among
/// the picks whose conservation partner is also empty. Both orderings of
/// the pair reach the same excitation:
/// $$
/// p_\text{gen}=\frac{2}{n_\alpha n_\beta N_\text{valid}}
/// $$
fn gen_excit_hub_k<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    rng: &mut R,
) -> GenResult {
    let na = cache.alpha.len();
    let nb = cache.beta.len();
    if na == 0 || nb == 0 {
        return GenResult::forbidden();
    }
    let pair = rng.gen_range(0..na * nb);
    let i = cache.alpha[pair / nb];
    let j = cache.beta[pair % nb];
    let ij_sym = sys.sym.product(sys.orb_sym(i), sys.orb_sym(j));

    let mut n_valid = 0u32;
    for x in 0..sys.n_basis as u32 {
        if !d.check(x) && !d.check(k_partner(sys, ij_sym, x)) {
            n_valid += 1;
        }
    }
    if n_valid == 0 {
        return GenResult::forbidden();
    }
    let mut rank = rng.gen_range(0..n_valid);
    let mut a = u32::MAX;
    for x in 0..sys.n_basis as u32 {
        if !d.check(x) && !d.check(k_partner(sys, ij_sym, x)) {
            if rank == 0 {
                a = x;
                break;
            }
            rank -= 1;
        }
    }
    let b = k_partner(sys, ij_sym, a);
    let mut exc = Excitation::double(i, j, a, b);
    let det = exc.apply(d);
    let h_ij = slater_condon2(sys, &exc);
    let p_gen = 2.0 / (na as f64 * nb as f64 * n_valid as f64);
    GenResult {
        det: Some(det),
        exc,
        p_gen,
        h_ij,
    }
}

/// Unoccupied spin-orbitals of the given irrep and spin, `exclude` left
/// out. Counting pass and selection pass share this walk over the
/// per-irrep orbital list.
fn count_sym_virt(sys: &System, d: &Det, sym: u32, spin: Spin, exclude: u32) -> u32 {
    let bit = if spin == Spin::Up { 0 } else { 1 };
    sys.spatial_orbs_of_sym(sym)
        .iter()
        .filter(|&&m| {
            let p = 2 * m as u32 + bit;
            !d.check(p) && p != exclude
        })
        .count() as u32
}

fn select_sym_virt(sys: &System, d: &Det, sym: u32, spin: Spin, exclude: u32, rank: u32) -> u32 {
    let bit = if spin == Spin::Up { 0 } else { 1 };
    let mut rank = rank;
    for &m in sys.spatial_orbs_of_sym(sym) {
        let p = 2 * m as u32 + bit;
        if !d.check(p) && p != exclude {
            if rank == 0 {
                return p;
            }
            rank -= 1;
        }
    }
    panic!("rank out of range in select_sym_virt");
}

/// Molecular single excitation, renormalised variant: only orbitals with
/// at least one symmetry-allowed empty target enter the first draw.
fn gen_single_mol<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    pattempt: f64,
    rng: &mut R,
) -> GenResult {
    let n_allowed = cache
        .occ
        .iter()
        .filter(|&&i| count_sym_virt(sys, d, sys.orb_sym(i), Spin::of_orb(i), u32::MAX) > 0)
        .count();
    if n_allowed == 0 {
        return GenResult::forbidden();
    }
    let mut rank = rng.gen_range(0..n_allowed);
    let mut i = u32::MAX;
    for &p in cache.occ.iter() {
        if count_sym_virt(sys, d, sys.orb_sym(p), Spin::of_orb(p), u32::MAX) > 0 {
            if rank == 0 {
                i = p;
                break;
            }
            rank -= 1;
        }
    }
    let n_avail = count_sym_virt(sys, d, sys.orb_sym(i), Spin::of_orb(i), u32::MAX);
    let a = select_sym_virt(
        sys,
        d,
        sys.orb_sym(i),
        Spin::of_orb(i),
        u32::MAX,
        rng.gen_range(0..n_avail),
    );
    let mut exc = Excitation::single(i, a);
    let det = exc.apply(d);
    let h_ij = slater_condon1(sys, d, &exc);
    let p_gen = pattempt / (n_allowed as f64 * n_avail as f64);
    GenResult {
        det: Some(det),
        exc,
        p_gen,
        h_ij,
    }
}

/// Molecular single excitation without the pre-scan: the target is drawn
/// from the full symmetry-compatible orbital list and an occupied pick is
/// simply forbidden. O(1) per attempt.
fn gen_single_mol_no_renorm<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    pattempt: f64,
    rng: &mut R,
) -> GenResult {
    let i = cache.occ[rng.gen_range(0..cache.occ.len())];
    let list = sys.spatial_orbs_of_sym(sys.orb_sym(i));
    let bit = i % 2;
    let a = 2 * list[rng.gen_range(0..list.len())] as u32 + bit;
    if d.check(a) {
        return GenResult::forbidden();
    }
    let mut exc = Excitation::single(i, a);
    let det = exc.apply(d);
    let h_ij = slater_condon1(sys, d, &exc);
    let p_gen = pattempt / (cache.occ.len() as f64 * list.len() as f64);
    GenResult {
        det: Some(det),
        exc,
        p_gen,
        h_ij,
    }
}

/// Decode a uniform draw over lower-triangular electron pairs into the
/// indices of two distinct occupied electrons, first strictly below the
/// second.
#[inline(always)]
fn decode_pair(t: usize) -> (usize, usize) {
    // Largest ej with ej(ej-1)/2 <= t.
    let mut ej = 1usize;
    while (ej + 1) * ej / 2 <= t {
        ej += 1;
    }
    (t - ej * (ej - 1) / 2, ej)
}

/// Spin classes a double excitation must preserve.
#[derive(Clone, Copy, PartialEq, Eq)]
enum PairSpin {
    BothUp,
    BothDown,
    Mixed,
}

impl PairSpin {
    fn of(i: u32, j: u32) -> PairSpin {
        match (Spin::of_orb(i), Spin::of_orb(j)) {
            (Spin::Up, Spin::Up) => PairSpin::BothUp,
            (Spin::Down, Spin::Down) => PairSpin::BothDown,
            _ => PairSpin::Mixed,
        }
    }

    /// May `x` serve as the first virtual pick?
    #[inline(always)]
    fn admits(self, x: u32) -> bool {
        match self {
            PairSpin::BothUp => x % 2 == 0,
            PairSpin::BothDown => x % 2 == 1,
            PairSpin::Mixed => true,
        }
    }

    /// Spin the second virtual must carry once the first is fixed.
    #[inline(always)]
    fn partner_spin(self, a: u32) -> Spin {
        match self {
            PairSpin::BothUp => Spin::Up,
            PairSpin::BothDown => Spin::Down,
            PairSpin::Mixed => {
                if a % 2 == 0 {
                    Spin::Down
                } else {
                    Spin::Up
                }
            }
        }
    }
}

/// Molecular double excitation, renormalised variant.
/// # Definition
/// The electron pair comes from one triangular-decoded uniform draw. The
/// first virtual is drawn uniformly among the picks that leave a nonempty
/// compatible set for the second; the same ordered excitation can arise
/// with the roles of the two targets swapped, whence
/// $$
/// p_\text{gen}=p_d\\,\frac{2}{N_e(N_e-1)}\\,
/// \frac{p(b|ija)+p(a|ijb)}{n_a(ij)}
/// $$
fn gen_double_mol<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    pattempt: f64,
    rng: &mut R,
) -> GenResult {
    let n_el = cache.occ.len();
    if n_el < 2 {
        return GenResult::forbidden();
    }
    let (ei, ej) = decode_pair(rng.gen_range(0..n_el * (n_el - 1) / 2));
    let i = cache.occ[ei];
    let j = cache.occ[ej];
    let ij_sym = sys.sym.product(sys.orb_sym(i), sys.orb_sym(j));
    let pair_spin = PairSpin::of(i, j);

    let valid = |x: u32| -> Option<u32> {
        if d.check(x) || !pair_spin.admits(x) {
            return None;
        }
        let b_sym = sys.sym.product(ij_sym, sys.sym.inverse(sys.orb_sym(x)));
        let n_b = count_sym_virt(sys, d, b_sym, pair_spin.partner_spin(x), x);
        if n_b > 0 {
            Some(n_b)
        } else {
            None
        }
    };

    let n_a = (0..sys.n_basis as u32).filter(|&x| valid(x).is_some()).count();
    if n_a == 0 {
        return GenResult::forbidden();
    }
    let mut rank = rng.gen_range(0..n_a);
    let mut a = u32::MAX;
    let mut n_b = 0u32;
    for x in 0..sys.n_basis as u32 {
        if let Some(nb) = valid(x) {
            if rank == 0 {
                a = x;
                n_b = nb;
                break;
            }
            rank -= 1;
        }
    }
    let b_sym = sys.sym.product(ij_sym, sys.sym.inverse(sys.orb_sym(a)));
    let b = select_sym_virt(
        sys,
        d,
        b_sym,
        pair_spin.partner_spin(a),
        a,
        rng.gen_range(0..n_b),
    );
    // Reverse route: b drawn first, a from its compatible set.
    let a_sym = sys.sym.product(ij_sym, sys.sym.inverse(sys.orb_sym(b)));
    let n_b_rev = count_sym_virt(sys, d, a_sym, pair_spin.partner_spin(b), b);
    let p_gen = pattempt * 2.0 / (n_el * (n_el - 1)) as f64
        * (1.0 / n_b as f64 + 1.0 / n_b_rev as f64)
        / n_a as f64;

    let mut exc = Excitation::double(i, j, a, b);
    let det = exc.apply(d);
    let h_ij = slater_condon2(sys, &exc);
    GenResult {
        det: Some(det),
        exc,
        p_gen,
        h_ij,
    }
}

/// Molecular double excitation without the pre-scans: both targets come
/// from full orbital lists, disallowed picks forbid the draw. Trades
/// sampling efficiency for O(1) generator cost.
fn gen_double_mol_no_renorm<R: Rng + ?Sized>(
    sys: &System,
    d: &Det,
    cache: &DetCache,
    pattempt: f64,
    rng: &mut R,
) -> GenResult {
    let n_el = cache.occ.len();
    if n_el < 2 {
        return GenResult::forbidden();
    }
    let (ei, ej) = decode_pair(rng.gen_range(0..n_el * (n_el - 1) / 2));
    let i = cache.occ[ei];
    let j = cache.occ[ej];
    let ij_sym = sys.sym.product(sys.orb_sym(i), sys.orb_sym(j));
    let pair_spin = PairSpin::of(i, j);

    let norb = sys.n_basis / 2;
    let n_first = if pair_spin == PairSpin::Mixed {
        sys.n_basis
    } else {
        norb
    };
    let a = match pair_spin {
        PairSpin::Mixed => rng.gen_range(0..sys.n_basis as u32),
        PairSpin::BothUp => 2 * rng.gen_range(0..norb as u32),
        PairSpin::BothDown => 2 * rng.gen_range(0..norb as u32) + 1,
    };
    if d.check(a) {
        return GenResult::forbidden();
    }
    let b_sym = sys.sym.product(ij_sym, sys.sym.inverse(sys.orb_sym(a)));
    let b_list = sys.spatial_orbs_of_sym(b_sym);
    if b_list.is_empty() {
        return GenResult::forbidden();
    }
    let b_bit = if pair_spin.partner_spin(a) == Spin::Up { 0 } else { 1 };
    let b = 2 * b_list[rng.gen_range(0..b_list.len())] as u32 + b_bit;
    if d.check(b) || b == a {
        return GenResult::forbidden();
    }
    // Reverse route through the other target's symmetry list.
    let a_sym = sys.sym.product(ij_sym, sys.sym.inverse(sys.orb_sym(b)));
    let a_list_len = sys.spatial_orbs_of_sym(a_sym).len();
    let p_gen = pattempt * 2.0 / (n_el * (n_el - 1)) as f64 / n_first as f64
        * (1.0 / b_list.len() as f64 + 1.0 / a_list_len as f64);

    let mut exc = Excitation::double(i, j, a, b);
    let det = exc.apply(d);
    let h_ij = slater_condon2(sys, &exc);
    GenResult {
        det: Some(det),
        exc,
        p_gen,
        h_ij,
    }
}
