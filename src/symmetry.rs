use derive_more::{Constructor, Error};
use std::fmt;

type Result<T> = std::result::Result<T, SymmetryError>;

/// Error in the symmetry setup.
#[derive(Debug, Clone, Error, Constructor)]
pub struct SymmetryError {
    pub details: String,
}

impl fmt::Display for SymmetryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid symmetry setup: {}", self.details)
    }
}

/// Product and inverse tables of an Abelian symmetry group.
/// # Definition
/// For the molecular point groups (D2h and subgroups) the product of two
/// irreducible representations is the XOR of their labels and every element
/// is its own inverse. For the translation group of the supercell the
/// elements are crystal momenta and the product is wavevector addition
/// modulo the reciprocal lattice.
#[derive(Debug, Clone)]
pub struct SymmetryTables {
    pub nsym: usize,
    sym_table: Box<[u32]>,
    inv_sym: Box<[u32]>,
}

impl SymmetryTables {
    /// Cross-product table of a D2h subgroup with `nsym` irreps.
    pub fn point_group(nsym: usize) -> Result<SymmetryTables> {
        if nsym == 0 || !nsym.is_power_of_two() {
            return Err(SymmetryError::new(format!(
                "a D2h subgroup has a power-of-two irrep count, got {}",
                nsym
            )));
        }
        let mut sym_table = vec![0u32; nsym * nsym].into_boxed_slice();
        for a in 0..nsym {
            for b in 0..nsym {
                sym_table[a * nsym + b] = (a ^ b) as u32;
            }
        }
        let inv_sym = (0..nsym as u32).collect::<Vec<_>>().into_boxed_slice();
        Ok(SymmetryTables {
            nsym,
            sym_table,
            inv_sym,
        })
    }

    /// Translation group of a non-tilted supercell with the given side
    /// lengths; element $k$ indexes a crystal momentum, first coordinate
    /// fastest, matching the site enumeration order. Raw wavevector sums
    /// and negations are folded back into the reciprocal cell through the
    /// enumerated [`symmetry_vectors`].
    pub fn translational(dims: &[usize]) -> Result<SymmetryTables> {
        if dims.is_empty() || dims.len() > 3 || dims.iter().any(|&l| l == 0) {
            return Err(SymmetryError::new(
                "expected 1 to 3 nonzero cell dimensions".to_owned(),
            ));
        }
        let nsym: usize = dims.iter().product();
        let sym_vecs = symmetry_vectors(dims);
        let fold = |k: &[i32; 3]| -> Result<u32> {
            match fold_k(k, &sym_vecs, dims) {
                Some(kk) => Ok(k_index(&kk, dims) as u32),
                None => Err(SymmetryError::new(format!(
                    "momentum {:?} not reachable from the reciprocal cell",
                    &k[..dims.len()]
                ))),
            }
        };
        let mut sym_table = vec![0u32; nsym * nsym].into_boxed_slice();
        let mut inv_sym = vec![0u32; nsym].into_boxed_slice();
        for a in 0..nsym {
            let ka = k_vector(a, dims);
            let mut neg = [0i32; 3];
            for d in 0..dims.len() {
                neg[d] = -ka[d];
            }
            inv_sym[a] = fold(&neg)?;
            for b in 0..nsym {
                let kb = k_vector(b, dims);
                let mut sum = [0i32; 3];
                for d in 0..dims.len() {
                    sum[d] = ka[d] + kb[d];
                }
                sym_table[a * nsym + b] = fold(&sum)?;
            }
        }
        Ok(SymmetryTables {
            nsym,
            sym_table,
            inv_sym,
        })
    }

    #[inline(always)]
    pub fn product(&self, a: u32, b: u32) -> u32 {
        self.sym_table[a as usize * self.nsym + b as usize]
    }

    #[inline(always)]
    pub fn inverse(&self, a: u32) -> u32 {
        self.inv_sym[a as usize]
    }

    /// Symmetry label of $k_i + k_j - k_a$, the momentum the remaining
    /// orbital of a double excitation must carry.
    #[inline(always)]
    pub fn conserving(&self, ki: u32, kj: u32, ka: u32) -> u32 {
        self.product(self.product(ki, kj), self.inverse(ka))
    }
}

/// Decode a momentum index into integer coordinates.
pub fn k_vector(idx: usize, dims: &[usize]) -> [i32; 3] {
    let mut k = [0i32; 3];
    let mut rest = idx;
    for (d, &l) in dims.iter().enumerate() {
        k[d] = (rest % l) as i32;
        rest /= l;
    }
    k
}

/// Encode in-cell integer momentum coordinates, first coordinate fastest.
/// Out-of-cell coordinates go through [`fold_k`] first.
pub fn k_index(k: &[i32; 3], dims: &[usize]) -> usize {
    let mut idx = 0usize;
    for (d, &l) in dims.iter().enumerate().rev() {
        debug_assert!(k[d] >= 0 && k[d] < l as i32);
        idx = idx * l + k[d] as usize;
    }
    idx
}

#[inline(always)]
fn in_reciprocal_cell(k: &[i32; 3], dims: &[usize]) -> bool {
    dims.iter()
        .enumerate()
        .all(|(d, &l)| k[d] >= 0 && k[d] < l as i32)
}

/// Map integer momentum coordinates back into the reciprocal cell by
/// searching the symmetry-vector list for the translation that lands
/// inside it. The deduplicated list makes the match unique; coordinates a
/// lattice translation cannot reach return `None`.
fn fold_k(k: &[i32; 3], sym_vecs: &[[i32; 3]], dims: &[usize]) -> Option<[i32; 3]> {
    if in_reciprocal_cell(k, dims) {
        return Some(*k);
    }
    sym_vecs.iter().find_map(|v| {
        let shifted = [k[0] - v[0], k[1] - v[1], k[2] - v[2]];
        if in_reciprocal_cell(&shifted, dims) {
            Some(shifted)
        } else {
            None
        }
    })
}

/// Enumerate the symmetry vectors of the supercell translation group: all
/// signed sums of single, paired and tripled reciprocal basis vectors. The
/// list is deduplicated and drops the identity, so a vector appears once
/// regardless of how many coefficient combinations reach it.
pub fn symmetry_vectors(dims: &[usize]) -> Vec<[i32; 3]> {
    let mut vecs = Vec::new();
    let coeffs: [i32; 3] = [-1, 0, 1];
    let ranges: Vec<&[i32]> = (0..3)
        .map(|d| if d < dims.len() { &coeffs[..] } else { &coeffs[1..2] })
        .collect();
    for &c0 in ranges[0] {
        for &c1 in ranges[1] {
            for &c2 in ranges[2] {
                let c = [c0, c1, c2];
                let mut v = [0i32; 3];
                for (d, &l) in dims.iter().enumerate() {
                    v[d] = c[d] * l as i32;
                }
                if v != [0, 0, 0] {
                    vecs.push(v);
                }
            }
        }
    }
    vecs.sort_unstable();
    vecs.dedup();
    vecs
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_point_group_self_inverse() {
        let pg = SymmetryTables::point_group(8).unwrap();
        for a in 0..8u32 {
            assert_eq!(pg.inverse(a), a);
            assert_eq!(pg.product(a, a), 0);
            for b in 0..8u32 {
                assert_eq!(pg.product(a, b), pg.product(b, a));
            }
        }
        assert!(SymmetryTables::point_group(3).is_err());
    }

    #[test]
    fn test_translational_group_laws() {
        let tr = SymmetryTables::translational(&[4, 4]).unwrap();
        assert_eq!(tr.nsym, 16);
        for a in 0..16u32 {
            // a + (-a) = identity
            assert_eq!(tr.product(a, tr.inverse(a)), 0);
            for b in 0..16u32 {
                assert_eq!(tr.product(a, b), tr.product(b, a));
            }
        }
    }

    #[test]
    fn test_momentum_conservation_index() {
        let dims = [4usize, 4];
        let tr = SymmetryTables::translational(&dims).unwrap();
        let ki = k_index(&[1, 2, 0], &dims) as u32;
        let kj = k_index(&[3, 3, 0], &dims) as u32;
        let ka = k_index(&[2, 1, 0], &dims) as u32;
        // k_b = k_i + k_j - k_a = (2, 0) mod (4, 4)
        assert_eq!(tr.conserving(ki, kj, ka), k_index(&[2, 0, 0], &dims) as u32);
    }

    #[test]
    fn test_folded_table_agrees_with_modular_sum() {
        let dims = [3usize, 2];
        let tr = SymmetryTables::translational(&dims).unwrap();
        for a in 0..tr.nsym {
            let ka = k_vector(a, &dims);
            for b in 0..tr.nsym {
                let kb = k_vector(b, &dims);
                let modular = [
                    (ka[0] + kb[0]).rem_euclid(3),
                    (ka[1] + kb[1]).rem_euclid(2),
                    0,
                ];
                assert_eq!(
                    tr.product(a as u32, b as u32),
                    k_index(&modular, &dims) as u32
                );
            }
        }
    }

    #[test]
    fn test_symmetry_vectors_deduplicated() {
        let vecs = symmetry_vectors(&[2, 2]);
        let mut sorted = vecs.clone();
        sorted.dedup();
        assert_eq!(vecs.len(), sorted.len());
        assert!(!vecs.contains(&[0, 0, 0]));
        assert_eq!(vecs.len(), 8);
    }
}
