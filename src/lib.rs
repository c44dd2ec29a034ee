// Link the BLAS/LAPACK backend.
extern crate openblas_src as _openblas_src;

// Have the Det struct and the bit-string primitives at the root.
include!("determinant.rs");

/// The excitation record connecting two determinants.
/// # Definition
/// A 1- or 2-electron substitution
/// $$
/// |D'\rangle=\pm\\,c^\dagger_{a}c_{i}|D\rangle
/// \quad\text{or}\quad
/// |D'\rangle=\pm\\,c^\dagger_{b}c^\dagger_{a}c_{j}c_{i}|D\rangle
/// $$
/// with the sign of the permutation that restores the ascending orbital
/// order carried alongside.
pub mod excitation;

/// Real-space connectivity tables of the simulation cell: the asymmetric
/// `tmat` bond encoding, the symmetric adjacency, the decoded neighbour
/// lists and the two-bond path counts.
pub mod lattice;

/// Abelian symmetry tables: point-group irrep products and the
/// translation group of the supercell.
pub mod symmetry;

/// System descriptions: real- and momentum-space Hubbard cells and
/// molecular integral sets.
/// # Definition
/// The Hubbard model Hamiltonian is defined
/// $$
/// H=U\sum_i n_{i\uparrow}n_{i\downarrow}
/// -t\sum_{<i,j>,\sigma}c^\dagger_{i\sigma}c_{j\sigma}+c^\dagger_{j\sigma}c_{i\sigma}
/// $$
/// while molecular systems take their matrix elements from stored one- and
/// two-electron integrals.
pub mod system;

/// Slater-Condon rules specialised per system kind.
pub mod hamiltonian;

/// Biased random draws of connected determinants, with the generation
/// probability reported exactly.
pub mod excitgen;

/// The spawn and death/clone kernels of the walker dynamics.
pub mod spawning;

/// The annihilation sweep: sort, compress and merge the spawn buffer into
/// the main walker list.
pub mod annihilation;

/// The FCIQMC walker loop and its Hellmann-Feynman extension.
pub mod propagation;

/// Compressed-sparse-row kernels for the deterministic companion.
pub mod csr;

/// Exact diagonalisation of small model Hamiltonians through the sparse
/// kernels: space enumeration, assembly, Lanczos.
pub mod diagonalisation;

pub use excitation::{connecting_excitation, Excitation};
pub use system::{Spin, System, SystemKind};
