use blas::{daxpy, ddot, dnrm2, dscal};
use derive_more::{Constructor, Error};
use lapack::dsyev;
use log::{error, info, trace};
use std::fmt;

use crate::csr::{csrpsymv, CsrError, CsrMatrix};
use crate::hamiltonian::{connected_determinants, diagonal_element};
use crate::system::System;
use crate::Det;

type Result<T> = std::result::Result<T, DiagError>;

/// Error in the exact-diagonalisation companion.
#[derive(Debug, Clone, Error, Constructor)]
pub struct DiagError {
    pub details: String,
}

impl fmt::Display for DiagError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Diagonalisation error: {}", self.details)
    }
}

impl From<CsrError> for DiagError {
    fn from(err: CsrError) -> Self {
        DiagError::new(err.details)
    }
}

/// Enumerate the full determinant space at the system's (alpha, beta)
/// filling, sorted so the Hamiltonian rows can be looked up by binary
/// search.
pub fn enumerate_space(sys: &System) -> Vec<Det> {
    let norb = sys.n_basis / 2;
    let alpha_sets = combinations(norb, sys.n_alpha);
    let beta_sets = combinations(norb, sys.n_beta);
    let mut dets = Vec::with_capacity(alpha_sets.len() * beta_sets.len());
    for al in &alpha_sets {
        for be in &beta_sets {
            let mut d = Det::empty(sys.n_basis);
            for &s in al {
                d.set(2 * s as u32);
            }
            for &s in be {
                d.set(2 * s as u32 + 1);
            }
            dets.push(d);
        }
    }
    dets.sort_unstable();
    info!("Enumerated {} determinants.", dets.len());
    dets
}

fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(k);
    fn rec(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for s in start..n {
            current.push(s);
            rec(s + 1, n, k, current, out);
            current.pop();
        }
    }
    rec(0, n, k, &mut current, &mut out);
    out
}

/// Assemble the Hamiltonian over the given (sorted) determinant list in
/// upper-triangular symmetric CSR storage.
pub fn build_hamiltonian(sys: &System, dets: &[Det]) -> Result<CsrMatrix> {
    let n = dets.len();
    let mut triplets = Vec::new();
    for (i, d) in dets.iter().enumerate() {
        triplets.push((i, i, diagonal_element(sys, d)));
        for (d2, h) in connected_determinants(sys, d) {
            if let Ok(j) = dets.binary_search(&d2) {
                if j > i {
                    triplets.push((i, j, h));
                }
            }
        }
    }
    trace!("Hamiltonian with {} stored non-zeros.", triplets.len());
    Ok(CsrMatrix::from_triplets(n, n, &triplets, true)?)
}

/// Eigenvalues of a dense symmetric matrix, ascending. The matrix is
/// consumed as scratch.
pub fn dense_eigenvalues(a: &mut [f64], dim: i32) -> Vec<f64> {
    let jobz = b"N"[0];
    let uplo = b"U"[0];
    let mut w = vec![0.0; dim as usize];
    let lwork = 3 * dim;
    let mut work = vec![0.0; lwork as usize];
    let mut info = 0;
    unsafe {
        dsyev(jobz, uplo, dim, a, dim, &mut w, &mut work, lwork, &mut info);
    }
    if info < 0 {
        error!(
            "Parameter {} had an illegal value in call to lapack::dsyev.",
            <i32>::abs(info)
        );
    } else if info > 0 {
        error!(
            "Convergence was not achieved in lapack::dsyev; {} off-diagonal elements did not converge.",
            info
        );
    }
    w
}

/// Ground-state energy of a symmetric CSR Hamiltonian by the Lanczos
/// recursion.
/// # Definition
/// The Krylov basis starts from a fixed symmetry-breaking vector; each step
/// orthogonalises
/// $w = Hv_k - \beta_{k-1}v_{k-1}$ against $v_k$ only (no full
/// reorthogonalisation, which is harmless for the extremal eigenvalue at
/// these subspace sizes) and the tridiagonal matrix of the recursion
/// coefficients goes to `dsyev`.
pub fn lanczos_ground_state(m: &CsrMatrix, max_iter: usize) -> Result<f64> {
    let n = m.nrow;
    if n == 0 {
        return Err(DiagError::new("empty determinant space".to_owned()));
    }
    let steps = max_iter.min(n);
    // Fixed quasi-random start vector: overlaps every symmetry sector, so
    // the recursion cannot silently miss the ground state.
    let mut v: Vec<f64> = (0..n)
        .map(|i| <f64>::sin(1.0 + i as f64 * 0.7390851332151607) + 0.3)
        .collect();
    let norm = unsafe { dnrm2(n as i32, &v, 1) };
    unsafe {
        dscal(n as i32, 1.0 / norm, &mut v, 1);
    }
    let mut v_prev = vec![0.0; n];
    let mut beta_prev = 0.0;
    let mut alphas: Vec<f64> = Vec::with_capacity(steps);
    let mut betas: Vec<f64> = Vec::with_capacity(steps);

    for _ in 0..steps {
        let mut w = vec![0.0; n];
        csrpsymv(m, &v, &mut w)?;
        unsafe {
            daxpy(n as i32, -beta_prev, &v_prev, 1, &mut w, 1);
        }
        let alpha = unsafe { ddot(n as i32, &w, 1, &v, 1) };
        unsafe {
            daxpy(n as i32, -alpha, &v, 1, &mut w, 1);
        }
        alphas.push(alpha);
        let beta = unsafe { dnrm2(n as i32, &w, 1) };
        if beta < 1e-12 {
            // Exhausted an invariant subspace.
            break;
        }
        unsafe {
            dscal(n as i32, 1.0 / beta, &mut w, 1);
        }
        betas.push(beta);
        v_prev = std::mem::replace(&mut v, w);
        beta_prev = beta;
    }

    let k = alphas.len();
    let mut t = vec![0.0; k * k];
    for i in 0..k {
        t[i + i * k] = alphas[i];
        if i + 1 < k {
            t[i + (i + 1) * k] = betas[i];
            t[(i + 1) + i * k] = betas[i];
        }
    }
    let evals = dense_eigenvalues(&mut t, k as i32);
    Ok(evals[0])
}

/// Exact ground-state energy of the system: enumerate, assemble, Lanczos.
pub fn ground_state_energy(sys: &System, max_iter: usize) -> Result<f64> {
    let dets = enumerate_space(sys);
    let ham = build_hamiltonian(sys, &dets)?;
    lanczos_ground_state(&ham, max_iter)
}

/// Ground-state energy through the dense path; cross-checks the sparse
/// kernels on small spaces.
pub fn ground_state_energy_dense(sys: &System) -> Result<f64> {
    let dets = enumerate_space(sys);
    let n = dets.len();
    let mut a = vec![0.0; n * n];
    for (i, d) in dets.iter().enumerate() {
        a[i + i * n] = diagonal_element(sys, d);
        for (d2, h) in connected_determinants(sys, d) {
            if let Ok(j) = dets.binary_search(&d2) {
                a[i + j * n] = h;
            }
        }
    }
    let evals = dense_eigenvalues(&mut a, n as i32);
    Ok(evals[0])
}
