use derive_more::{Constructor, Error};
use log::trace;
use std::fmt;

use crate::Det;

type Result<T> = std::result::Result<T, LatticeError>;

/// Error in the lattice description.
#[derive(Debug, Clone, Error, Constructor)]
pub struct LatticeError {
    pub details: String,
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid lattice description: {}", self.details)
    }
}

/// Real-space description of the simulation cell.
/// # Definition
/// The cell holds `site_positions` (integer coordinates of the unit-cell
/// basis) and up to three integer lattice vectors spanning the supercell.
/// `finite_cluster` drops all periodic images; `triangular` adds the
/// $(1,1)$ diagonal bond on a 2-D lattice.
#[derive(Debug, Clone)]
pub struct LatticeSpec {
    pub dim: usize,
    pub site_positions: Vec<[i32; 3]>,
    pub lattice_vectors: [[i32; 3]; 3],
    pub triangular: bool,
    pub finite_cluster: bool,
    pub track_next_nearest: bool,
}

impl LatticeSpec {
    /// A non-tilted cell of the given side lengths, sites enumerated in
    /// row-major order.
    pub fn rectangular(dims: &[usize]) -> Result<LatticeSpec> {
        if dims.is_empty() || dims.len() > 3 {
            return Err(LatticeError::new(format!(
                "expected 1 to 3 cell dimensions, got {}",
                dims.len()
            )));
        }
        if dims.iter().any(|&l| l == 0) {
            return Err(LatticeError::new("cell dimension of length zero".to_owned()));
        }
        let dim = dims.len();
        let mut lattice_vectors = [[0i32; 3]; 3];
        for (d, &l) in dims.iter().enumerate() {
            lattice_vectors[d][d] = l as i32;
        }
        let mut site_positions = Vec::with_capacity(dims.iter().product());
        let full = [
            dims[0],
            dims.get(1).copied().unwrap_or(1),
            dims.get(2).copied().unwrap_or(1),
        ];
        for z in 0..full[2] {
            for y in 0..full[1] {
                for x in 0..full[0] {
                    site_positions.push([x as i32, y as i32, z as i32]);
                }
            }
        }
        Ok(LatticeSpec {
            dim,
            site_positions,
            lattice_vectors,
            triangular: false,
            finite_cluster: false,
            track_next_nearest: false,
        })
    }

    /// A periodic chain of `l` sites.
    pub fn chain(l: usize) -> Result<LatticeSpec> {
        LatticeSpec::rectangular(&[l])
    }

    /// Build the connectivity tables for this cell.
    pub fn build(&self) -> Result<ConnectivityTables> {
        build_connectivity(self)
    }
}

/// Nearest-neighbour tables of the cell, indexed by spin-orbital.
/// # Definition
/// `tmat[p]` uses the asymmetric encoding: an intra-cell bond between sites
/// $i \le j$ sets bit $j$ of `tmat[i]`, a periodic-image bond sets bit $i$
/// of `tmat[j]`. Both directions are therefore independent, which keeps a
/// site bonded to its own periodic copy distinguishable from a plain bond.
/// `connected_orbs[p]` is the symmetric adjacency without self-images;
/// `connected_sites[p]` its decoded neighbour list. Tables are immutable
/// after construction.
#[derive(Debug)]
pub struct ConnectivityTables {
    pub n_sites: usize,
    pub n_basis: usize,
    pub tmat: Vec<Det>,
    pub connected_orbs: Vec<Det>,
    pub connected_sites: Vec<Box<[u32]>>,
    pub next_nearest_orbs: Option<Box<[u32]>>,
    pub t_self_images: bool,
}

#[inline(always)]
fn l1_norm(v: &[i32; 3]) -> i32 {
    v[0].abs() + v[1].abs() + v[2].abs()
}

#[inline(always)]
fn sub(a: &[i32; 3], b: &[i32; 3]) -> [i32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Enumerate the $3^d$ image offsets of the nearest shell of neighbouring
/// supercells, the zero offset included.
fn image_offsets(spec: &LatticeSpec) -> Vec<[i32; 3]> {
    let mut offsets = Vec::new();
    let coeffs: [i32; 3] = [-1, 0, 1];
    let ranges: Vec<&[i32]> = (0..3)
        .map(|d| if d < spec.dim { &coeffs[..] } else { &coeffs[1..2] })
        .collect();
    for &c0 in ranges[0] {
        for &c1 in ranges[1] {
            for &c2 in ranges[2] {
                let mut delta = [0i32; 3];
                for k in 0..3 {
                    delta[k] = c0 * spec.lattice_vectors[0][k]
                        + c1 * spec.lattice_vectors[1][k]
                        + c2 * spec.lattice_vectors[2][k];
                }
                offsets.push(delta);
            }
        }
    }
    offsets
}

/// Set the bond bit for a site pair in both spin channels at once.
#[inline(always)]
fn set_site_pair(table: &mut [Det], i: usize, j: usize) {
    table[2 * i].set(2 * j as u32);
    table[2 * i + 1].set(2 * j as u32 + 1);
}

fn build_connectivity(spec: &LatticeSpec) -> Result<ConnectivityTables> {
    if spec.site_positions.is_empty() {
        return Err(LatticeError::new("no sites in the cell".to_owned()));
    }
    if spec.dim == 0 || spec.dim > 3 {
        return Err(LatticeError::new(format!(
            "dimensionality {} out of range",
            spec.dim
        )));
    }
    let n_sites = spec.site_positions.len();
    let n_basis = 2 * n_sites;
    let mut tmat = vec![Det::empty(n_basis); n_basis];
    let mut connected_orbs = vec![Det::empty(n_basis); n_basis];
    let offsets = image_offsets(spec);

    for i in 0..n_sites {
        for j in i..n_sites {
            let r = sub(&spec.site_positions[i], &spec.site_positions[j]);
            for delta in &offsets {
                let rr = sub(&r, delta);
                let mut hit = l1_norm(&rr) == 1;
                if spec.triangular && spec.dim == 2 {
                    hit |= rr == [1, 1, 0] || rr == [-1, -1, 0];
                }
                if !hit {
                    continue;
                }
                let intra = *delta == [0, 0, 0];
                if intra {
                    set_site_pair(&mut tmat, i, j);
                } else if !spec.finite_cluster {
                    set_site_pair(&mut tmat, j, i);
                }
                if i != j && (intra || !spec.finite_cluster) {
                    set_site_pair(&mut connected_orbs, i, j);
                    set_site_pair(&mut connected_orbs, j, i);
                }
            }
        }
    }

    let connected_sites: Vec<Box<[u32]>> = connected_orbs
        .iter()
        .map(|d| d.occ_list().into_boxed_slice())
        .collect();

    let next_nearest_orbs = if spec.track_next_nearest {
        let mut nn = vec![0u32; n_basis * n_basis].into_boxed_slice();
        for p in 0..n_basis {
            for &q in connected_sites[p].iter() {
                for &r in connected_sites[q as usize].iter() {
                    nn[p * n_basis + r as usize] += 1;
                }
            }
            nn[p * n_basis + p] = 0;
        }
        Some(nn)
    } else {
        None
    };

    let t_self_images = !spec.finite_cluster
        && (0..spec.dim).any(|d| l1_norm(&spec.lattice_vectors[d]) == 1);
    trace!(
        "Built connectivity for {} sites, self images: {}",
        n_sites,
        t_self_images
    );

    Ok(ConnectivityTables {
        n_sites,
        n_basis,
        tmat,
        connected_orbs,
        connected_sites,
        next_nearest_orbs,
        t_self_images,
    })
}
