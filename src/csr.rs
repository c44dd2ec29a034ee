use derive_more::{Constructor, Error};
use rayon::prelude::*;
use std::fmt;

type Result<T> = std::result::Result<T, CsrError>;

/// Domain error of the sparse kernels.
#[derive(Debug, Clone, Error, Constructor)]
pub struct CsrError {
    pub details: String,
}

impl fmt::Display for CsrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CSR kernel error: {}", self.details)
    }
}

/// Compressed sparse row matrix.
/// # Definition
/// `row_ptr[0] == 0`, `row_ptr[nrow] == nnz`, and `col_ind` is strictly
/// ascending within each row. A `symmetric` matrix stores the upper
/// triangle only and is valid input to [`csrpsymv`] alone; a general
/// matrix to [`csrpgemv`] alone.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pub nrow: usize,
    pub ncol: usize,
    pub values: Vec<f64>,
    pub col_ind: Vec<usize>,
    pub row_ptr: Vec<usize>,
    pub symmetric: bool,
}

impl CsrMatrix {
    /// Assemble from (row, col, value) triplets. Triplets may arrive in
    /// any order; duplicates are rejected.
    pub fn from_triplets(
        nrow: usize,
        ncol: usize,
        triplets: &[(usize, usize, f64)],
        symmetric: bool,
    ) -> Result<CsrMatrix> {
        if symmetric && nrow != ncol {
            return Err(CsrError::new(
                "symmetric storage needs a square matrix".to_owned(),
            ));
        }
        let mut entries: Vec<(usize, usize, f64)> = Vec::with_capacity(triplets.len());
        for &(i, j, v) in triplets {
            if i >= nrow || j >= ncol {
                return Err(CsrError::new(format!(
                    "entry ({}, {}) outside a {}x{} matrix",
                    i, j, nrow, ncol
                )));
            }
            if symmetric && j < i {
                return Err(CsrError::new(format!(
                    "entry ({}, {}) below the stored triangle",
                    i, j
                )));
            }
            entries.push((i, j, v));
        }
        entries.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        for pair in entries.windows(2) {
            if pair[0].0 == pair[1].0 && pair[0].1 == pair[1].1 {
                return Err(CsrError::new(format!(
                    "duplicate entry ({}, {})",
                    pair[0].0, pair[0].1
                )));
            }
        }
        let mut row_ptr = vec![0usize; nrow + 1];
        let mut values = Vec::with_capacity(entries.len());
        let mut col_ind = Vec::with_capacity(entries.len());
        for &(i, j, v) in &entries {
            row_ptr[i + 1] += 1;
            values.push(v);
            col_ind.push(j);
        }
        for i in 0..nrow {
            row_ptr[i + 1] += row_ptr[i];
        }
        Ok(CsrMatrix {
            nrow,
            ncol,
            values,
            col_ind,
            row_ptr,
            symmetric,
        })
    }

    #[inline(always)]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Expand a symmetric matrix into full general storage; handy for
    /// cross-checking the two product kernels against each other.
    pub fn to_general(&self) -> Result<CsrMatrix> {
        if !self.symmetric {
            return Err(CsrError::new("matrix is already general".to_owned()));
        }
        let mut triplets = Vec::with_capacity(2 * self.nnz());
        for i in 0..self.nrow {
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_ind[idx];
                triplets.push((i, j, self.values[idx]));
                if j != i {
                    triplets.push((j, i, self.values[idx]));
                }
            }
        }
        CsrMatrix::from_triplets(self.nrow, self.ncol, &triplets, false)
    }
}

fn check_dims(m: &CsrMatrix, x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != m.ncol || y.len() != m.nrow {
        return Err(CsrError::new(format!(
            "vector lengths {}/{} against a {}x{} matrix",
            x.len(),
            y.len(),
            m.nrow,
            m.ncol
        )));
    }
    Ok(())
}

/// Symmetric matrix-vector product over one stored triangle, accumulated
/// into `y`.
/// # Definition
/// Row $i$ scatters $M_{ij}x_i$ onto $y_j$ for every stored non-zero and
/// gathers $M_{ij}x_j$ for $j\neq i$ into a private row accumulator added
/// to $y_i$ afterwards. Rows are distributed over the rayon pool; every
/// worker scatters into its own output buffer and the buffers are summed
/// at the end, so no two threads ever write the same element.
pub fn csrpsymv(m: &CsrMatrix, x: &[f64], y: &mut [f64]) -> Result<()> {
    if !m.symmetric {
        return Err(CsrError::new(
            "csrpsymv needs symmetric (triangular) storage".to_owned(),
        ));
    }
    check_dims(m, x, y)?;
    let partial = (0..m.nrow)
        .into_par_iter()
        .fold(
            || vec![0.0f64; m.nrow],
            |mut acc, i| {
                let mut rowx = 0.0;
                for idx in m.row_ptr[i]..m.row_ptr[i + 1] {
                    let j = m.col_ind[idx];
                    let v = m.values[idx];
                    acc[j] += v * x[i];
                    if j != i {
                        rowx += v * x[j];
                    }
                }
                acc[i] += rowx;
                acc
            },
        )
        .reduce(
            || vec![0.0f64; m.nrow],
            |mut a, b| {
                for (ai, bi) in a.iter_mut().zip(b.iter()) {
                    *ai += bi;
                }
                a
            },
        );
    for (yi, pi) in y.iter_mut().zip(partial.iter()) {
        *yi += pi;
    }
    Ok(())
}

/// General matrix-vector product, accumulated into `y`. Single threaded.
pub fn csrpgemv(m: &CsrMatrix, x: &[f64], y: &mut [f64]) -> Result<()> {
    if m.symmetric {
        return Err(CsrError::new(
            "csrpgemv needs general storage; use csrpsymv".to_owned(),
        ));
    }
    check_dims(m, x, y)?;
    for i in 0..m.nrow {
        let mut acc = 0.0;
        for idx in m.row_ptr[i]..m.row_ptr[i + 1] {
            acc += m.values[idx] * x[m.col_ind[idx]];
        }
        y[i] += acc;
    }
    Ok(())
}

/// Product of a single row of a general matrix with `x`.
pub fn csrpgemv_single_row(m: &CsrMatrix, x: &[f64], i: usize) -> Result<f64> {
    if m.symmetric {
        return Err(CsrError::new(
            "csrpgemv_single_row needs general storage".to_owned(),
        ));
    }
    if i >= m.nrow || x.len() != m.ncol {
        return Err(CsrError::new(format!(
            "row {} of a {}x{} matrix against a length-{} vector",
            i,
            m.nrow,
            m.ncol,
            x.len()
        )));
    }
    let mut acc = 0.0;
    for idx in m.row_ptr[i]..m.row_ptr[i + 1] {
        acc += m.values[idx] * x[m.col_ind[idx]];
    }
    Ok(acc)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_triplets_validation() {
        assert!(CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)], true).is_err());
        assert!(CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (0, 1, 2.0)], false).is_err());
        assert!(CsrMatrix::from_triplets(2, 2, &[(2, 0, 1.0)], false).is_err());
        let m = CsrMatrix::from_triplets(2, 2, &[(1, 1, 2.0), (0, 0, 1.0)], true).unwrap();
        assert_eq!(m.row_ptr, vec![0, 1, 2]);
        assert_eq!(m.col_ind, vec![0, 1]);
    }

    #[test]
    fn test_kernel_storage_contract() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0)], true).unwrap();
        let x = [1.0, 1.0];
        let mut y = [0.0, 0.0];
        assert!(csrpgemv(&m, &x, &mut y).is_err());
        assert!(csrpgemv_single_row(&m, &x, 0).is_err());
        let g = m.to_general().unwrap();
        assert!(csrpsymv(&g, &x, &mut y).is_err());
        assert!(csrpgemv(&g, &x, &mut y).is_ok());
    }
}
