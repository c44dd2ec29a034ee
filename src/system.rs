use derive_more::{Constructor, Error};
use log::info;
use std::fmt;

use crate::lattice::{ConnectivityTables, LatticeSpec};
use crate::symmetry::{k_vector, SymmetryTables};
use crate::Det;

type Result<T> = std::result::Result<T, SystemError>;

/// Error in the system parameters.
#[derive(Debug, Clone, Error, Constructor)]
pub struct SystemError {
    pub details: String,
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid system parameters: {}", self.details)
    }
}

impl From<crate::lattice::LatticeError> for SystemError {
    fn from(err: crate::lattice::LatticeError) -> Self {
        SystemError::new(err.details)
    }
}

impl From<crate::symmetry::SymmetryError> for SystemError {
    fn from(err: crate::symmetry::SymmetryError) -> Self {
        SystemError::new(err.details)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Up,
    Down,
}

impl Spin {
    /// Spin channel of a spin-orbital index: even bits are up, odd down.
    #[inline(always)]
    pub fn of_orb(p: u32) -> Spin {
        if p % 2 == 0 {
            Spin::Up
        } else {
            Spin::Down
        }
    }
}

/// Which Hamiltonian the engine propagates. The walker loop and the
/// excitation generators dispatch on this variant; there is no mutable
/// per-system function state anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    HubbardReal,
    HubbardK,
    Molecular,
}

/// One single-particle basis function.
#[derive(Debug, Clone)]
pub struct BasisFn {
    pub k: [i32; 3],
    pub spin: Spin,
    pub sym: u32,
}

/// Spatial one- and two-electron integrals of a molecular system, stored
/// with the full 8-fold permutational symmetry in the Mulliken $(ij|kl)$
/// convention, together with the core energy and the irrep label of each
/// spatial orbital. The values are exactly what an FCIDUMP would supply;
/// reading one is the caller's business.
#[derive(Debug, Clone)]
pub struct MolecularIntegrals {
    pub norb: usize,
    pub e_core: f64,
    pub orbsym: Vec<u32>,
    one_e: Vec<f64>,
    two_e: Vec<f64>,
}

#[inline(always)]
fn tri(i: usize, j: usize) -> usize {
    if i >= j {
        i * (i + 1) / 2 + j
    } else {
        j * (j + 1) / 2 + i
    }
}

impl MolecularIntegrals {
    pub fn new(norb: usize, e_core: f64, orbsym: Vec<u32>) -> MolecularIntegrals {
        let npair = tri(norb, 0);
        MolecularIntegrals {
            norb,
            e_core,
            orbsym,
            one_e: vec![0.0; npair],
            two_e: vec![0.0; tri(npair, 0)],
        }
    }

    /// Store $\langle i|\hat h|j\rangle$ for spatial orbitals.
    pub fn set_one_e(&mut self, i: usize, j: usize, v: f64) {
        self.one_e[tri(i, j)] = v;
    }

    #[inline(always)]
    pub fn one_e(&self, i: usize, j: usize) -> f64 {
        self.one_e[tri(i, j)]
    }

    /// Store the chemists' integral $(ij|kl)$ for spatial orbitals.
    pub fn set_two_e(&mut self, i: usize, j: usize, k: usize, l: usize, v: f64) {
        self.two_e[tri(tri(i, j), tri(k, l))] = v;
    }

    #[inline(always)]
    pub fn two_e(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        self.two_e[tri(tri(i, j), tri(k, l))]
    }
}

/// Immutable description of the system being sampled: particle counts, the
/// Hamiltonian parameters, and whichever of the lattice tables, momentum
/// tables and molecular integrals the system kind needs.
#[derive(Debug)]
pub struct System {
    pub kind: SystemKind,
    pub n_el: usize,
    pub n_basis: usize,
    pub n_alpha: usize,
    pub n_beta: usize,
    pub hubbard_u: f64,
    pub hubbard_t: f64,
    pub lattice: Option<ConnectivityTables>,
    pub dims: Vec<usize>,
    pub sym: SymmetryTables,
    pub basis_fns: Vec<BasisFn>,
    pub integrals: Option<MolecularIntegrals>,
    kinetic_k: Vec<f64>,
    sym_spatial: Vec<Vec<usize>>,
    pub reference: Det,
}

fn check_filling(n_basis: usize, n_alpha: usize, n_beta: usize) -> Result<()> {
    if n_alpha + n_beta == 0 {
        return Err(SystemError::new("no electrons".to_owned()));
    }
    if 2 * n_alpha > n_basis || 2 * n_beta > n_basis {
        return Err(SystemError::new(format!(
            "cannot place {} alpha / {} beta electrons in {} spin-orbitals",
            n_alpha, n_beta, n_basis
        )));
    }
    Ok(())
}

impl System {
    /// Real-space Hubbard model on the given cell.
    pub fn hubbard_real(
        spec: &LatticeSpec,
        n_alpha: usize,
        n_beta: usize,
        u: f64,
        t: f64,
    ) -> Result<System> {
        let lattice = spec.build()?;
        let n_basis = lattice.n_basis;
        check_filling(n_basis, n_alpha, n_beta)?;
        let basis_fns = (0..n_basis as u32)
            .map(|p| BasisFn {
                k: spec.site_positions[p as usize / 2],
                spin: Spin::of_orb(p),
                sym: 0,
            })
            .collect();
        let reference = aufbau_reference(&(0..n_basis / 2).collect::<Vec<_>>(), n_alpha, n_beta, n_basis);
        info!(
            "Real-space Hubbard system: {} sites, {}+{} electrons, U={}, t={}",
            lattice.n_sites, n_alpha, n_beta, u, t
        );
        Ok(System {
            kind: SystemKind::HubbardReal,
            n_el: n_alpha + n_beta,
            n_basis,
            n_alpha,
            n_beta,
            hubbard_u: u,
            hubbard_t: t,
            lattice: Some(lattice),
            dims: Vec::new(),
            sym: SymmetryTables::point_group(1)?,
            basis_fns,
            integrals: None,
            kinetic_k: Vec::new(),
            sym_spatial: Vec::new(),
            reference,
        })
    }

    /// Momentum-space Hubbard model on a non-tilted cell. The dispersion
    /// $$
    /// \epsilon_k=-2t\sum_d\cos\left(\frac{2\pi k_d}{L_d}\right)
    /// $$
    /// fixes the Fermi-sea reference determinant.
    pub fn hubbard_k(
        dims: &[usize],
        n_alpha: usize,
        n_beta: usize,
        u: f64,
        t: f64,
    ) -> Result<System> {
        let sym = SymmetryTables::translational(dims)?;
        let n_k = sym.nsym;
        let n_basis = 2 * n_k;
        check_filling(n_basis, n_alpha, n_beta)?;
        let mut kinetic_k = Vec::with_capacity(n_k);
        let mut basis_fns = Vec::with_capacity(n_basis);
        for ik in 0..n_k {
            let k = k_vector(ik, dims);
            let eps: f64 = dims
                .iter()
                .enumerate()
                .map(|(d, &l)| {
                    -2.0 * t * <f64>::cos(2.0 * std::f64::consts::PI * k[d] as f64 / l as f64)
                })
                .sum();
            kinetic_k.push(eps);
            basis_fns.push(BasisFn {
                k,
                spin: Spin::Up,
                sym: ik as u32,
            });
            basis_fns.push(BasisFn {
                k,
                spin: Spin::Down,
                sym: ik as u32,
            });
        }
        let mut order: Vec<usize> = (0..n_k).collect();
        order.sort_by(|&a, &b| kinetic_k[a].partial_cmp(&kinetic_k[b]).unwrap().then(a.cmp(&b)));
        let reference = aufbau_reference(&order, n_alpha, n_beta, n_basis);
        info!(
            "Momentum-space Hubbard system: {} k-points, {}+{} electrons, U={}, t={}",
            n_k, n_alpha, n_beta, u, t
        );
        Ok(System {
            kind: SystemKind::HubbardK,
            n_el: n_alpha + n_beta,
            n_basis,
            n_alpha,
            n_beta,
            hubbard_u: u,
            hubbard_t: t,
            lattice: None,
            dims: dims.to_vec(),
            sym,
            basis_fns,
            integrals: None,
            kinetic_k,
            sym_spatial: Vec::new(),
            reference,
        })
    }

    /// Molecular system over a stored integral set.
    pub fn molecular(
        integrals: MolecularIntegrals,
        n_alpha: usize,
        n_beta: usize,
    ) -> Result<System> {
        let n_basis = 2 * integrals.norb;
        check_filling(n_basis, n_alpha, n_beta)?;
        if integrals.orbsym.len() != integrals.norb {
            return Err(SystemError::new(format!(
                "{} irrep labels for {} orbitals",
                integrals.orbsym.len(),
                integrals.norb
            )));
        }
        let max_sym = integrals.orbsym.iter().copied().max().unwrap_or(0) as usize;
        let nsym = (max_sym + 1).next_power_of_two();
        let basis_fns = (0..n_basis as u32)
            .map(|p| BasisFn {
                k: [0; 3],
                spin: Spin::of_orb(p),
                sym: integrals.orbsym[p as usize / 2],
            })
            .collect();
        let reference = aufbau_reference(
            &(0..integrals.norb).collect::<Vec<_>>(),
            n_alpha,
            n_beta,
            n_basis,
        );
        let mut sym_spatial = vec![Vec::new(); nsym];
        for (m, &s) in integrals.orbsym.iter().enumerate() {
            sym_spatial[s as usize].push(m);
        }
        info!(
            "Molecular system: {} spatial orbitals, {}+{} electrons, {} irreps",
            integrals.norb, n_alpha, n_beta, nsym
        );
        Ok(System {
            kind: SystemKind::Molecular,
            n_el: n_alpha + n_beta,
            n_basis,
            n_alpha,
            n_beta,
            hubbard_u: 0.0,
            hubbard_t: 0.0,
            lattice: None,
            dims: Vec::new(),
            sym: SymmetryTables::point_group(nsym)?,
            basis_fns,
            integrals: Some(integrals),
            kinetic_k: Vec::new(),
            sym_spatial,
            reference,
        })
    }

    /// Single-particle energy of the k-point that spin-orbital `p` belongs
    /// to. Momentum-space systems only.
    #[inline(always)]
    pub fn eps_k(&self, p: u32) -> f64 {
        self.kinetic_k[p as usize / 2]
    }

    #[inline(always)]
    pub fn orb_sym(&self, p: u32) -> u32 {
        self.basis_fns[p as usize].sym
    }

    /// Number of k-points of a momentum-space system.
    #[inline(always)]
    pub fn n_k(&self) -> usize {
        self.kinetic_k.len()
    }

    /// Spatial orbitals carrying the given irrep. Molecular systems only.
    #[inline(always)]
    pub fn spatial_orbs_of_sym(&self, sym: u32) -> &[usize] {
        &self.sym_spatial[sym as usize]
    }
}

/// Fill the lowest `n_alpha` up and `n_beta` down orbitals following the
/// given spatial-orbital order.
fn aufbau_reference(order: &[usize], n_alpha: usize, n_beta: usize, n_basis: usize) -> Det {
    let mut d = Det::empty(n_basis);
    for &s in order.iter().take(n_alpha) {
        d.set(2 * s as u32);
    }
    for &s in order.iter().take(n_beta) {
        d.set(2 * s as u32 + 1);
    }
    d
}

/// Scratch decode of a determinant into occupied-orbital lists. One cache
/// lives per walker loop and is refilled for every determinant visited.
#[derive(Debug, Default)]
pub struct DetCache {
    pub occ: Vec<u32>,
    pub alpha: Vec<u32>,
    pub beta: Vec<u32>,
}

impl DetCache {
    pub fn new() -> DetCache {
        DetCache::default()
    }

    pub fn decode(&mut self, d: &Det) {
        self.occ.clear();
        self.alpha.clear();
        self.beta.clear();
        for p in d.ones() {
            self.occ.push(p);
            if p % 2 == 0 {
                self.alpha.push(p);
            } else {
                self.beta.push(p);
            }
        }
    }
}
