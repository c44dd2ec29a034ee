use crate::{Det, WORD_BITS};

/// A 1- or 2-electron connection between determinants.
/// # Definition
/// `from_orb[..nexcit]` and `to_orb[..nexcit]` are ascending lists of the
/// source and target spin-orbitals; `perm` records the sign of the
/// permutation that lines the target orbitals up with the determinant's
/// ascending order, accumulated while the excitation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Excitation {
    pub nexcit: usize,
    pub from_orb: [u32; 2],
    pub to_orb: [u32; 2],
    pub perm: bool,
}

impl Excitation {
    /// The null excitation. Returned by a generator when the draw is
    /// forbidden; downstream the matrix element is zero and `p_gen` one.
    pub fn null() -> Excitation {
        Excitation {
            nexcit: 0,
            from_orb: [0; 2],
            to_orb: [0; 2],
            perm: false,
        }
    }

    pub fn single(i: u32, a: u32) -> Excitation {
        Excitation {
            nexcit: 1,
            from_orb: [i, 0],
            to_orb: [a, 0],
            perm: false,
        }
    }

    /// A double excitation; both orbital pairs are stored ascending.
    pub fn double(i: u32, j: u32, a: u32, b: u32) -> Excitation {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Excitation {
            nexcit: 2,
            from_orb: [i, j],
            to_orb: [a, b],
            perm: false,
        }
    }

    /// Build the excited determinant and record the permutation parity.
    /// The substitutions are applied in ascending source order, each one
    /// picking up the parity of the occupied range it crosses.
    pub fn apply(&mut self, d: &Det) -> Det {
        let mut out = d.clone();
        let mut perm = false;
        for k in 0..self.nexcit {
            perm ^= out.parity_between(self.from_orb[k], self.to_orb[k]);
            out.clear(self.from_orb[k]);
            out.set(self.to_orb[k]);
        }
        self.perm = perm;
        out
    }

    /// The inverse connection. Its parity, evaluated on the excited
    /// determinant, equals `perm`, so the round trip carries total sign $+1$.
    pub fn reverse(&self) -> Excitation {
        Excitation {
            nexcit: self.nexcit,
            from_orb: self.to_orb,
            to_orb: self.from_orb,
            perm: false,
        }
    }

    #[inline(always)]
    pub fn sign(&self) -> f64 {
        if self.perm {
            -1.0
        } else {
            1.0
        }
    }
}

/// Extract the excitation connecting two determinants, parity included.
/// # Arguments
/// * __`d1`__ - The source determinant.
/// * __`d2`__ - The target determinant, at most two substitutions away.
pub fn connecting_excitation(d1: &Det, d2: &Det) -> Excitation {
    let mut from = [0u32; 2];
    let mut to = [0u32; 2];
    let mut nf = 0;
    let mut nt = 0;
    for (iw, (w1, w2)) in d1.words().iter().zip(d2.words().iter()).enumerate() {
        let mut lost = w1 & !w2;
        while lost != 0 {
            from[nf] = iw as u32 * WORD_BITS as u32 + lost.trailing_zeros();
            lost &= lost - 1;
            nf += 1;
        }
        let mut gained = w2 & !w1;
        while gained != 0 {
            to[nt] = iw as u32 * WORD_BITS as u32 + gained.trailing_zeros();
            gained &= gained - 1;
            nt += 1;
        }
    }
    debug_assert_eq!(nf, nt);
    let mut exc = Excitation {
        nexcit: nf,
        from_orb: from,
        to_orb: to,
        perm: false,
    };
    let _ = exc.apply(d1);
    exc
}
