pub mod annihilation;
pub mod excitgen;
