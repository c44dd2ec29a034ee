use rand::Rng;

use crate::excitgen::GenResult;
use crate::system::System;
use crate::Det;

/// Round a non-negative amplitude to an integer progeny count: keep the
/// floor, promote by one with probability equal to the remainder.
#[inline(always)]
pub fn stochastic_round<R: Rng + ?Sized>(x: f64, rng: &mut R) -> i32 {
    let floor = <f64>::floor(x);
    let mut n = floor as i32;
    if rng.gen::<f64>() < x - floor {
        n += 1;
    }
    n
}

/// Attempt to spawn progeny onto the drawn determinant.
/// # Arguments
/// * __`gen`__ - The generator draw; a forbidden draw never spawns.
/// * __`parent_sign`__ - Sign of the parent walker population.
/// * __`tau`__ - The imaginary timestep.
/// # Returns
/// The target determinant and the signed progeny count, or `None` when no
/// particle is created.
/// # Definition
/// The spawning amplitude is $\tau|H_{ij}|/p_\text{gen}$; a positive
/// matrix element flips the progeny sign against the parent:
/// $$
/// n_s=-\operatorname{sgn}(H_{ij})\operatorname{sgn}(n_p)
/// \left\lfloor\frac{\tau|H_{ij}|}{p_\text{gen}}\right\rceil
/// $$
pub fn attempt_spawn<R: Rng + ?Sized>(
    sys: &System,
    parent: &Det,
    gen: &GenResult,
    parent_sign: i32,
    tau: f64,
    rng: &mut R,
) -> Option<(Det, i32)> {
    let det = gen.det.as_ref()?;
    debug_assert!(
        (crate::hamiltonian::ham_element(sys, parent, det) - gen.h_ij).abs() < 1e-10,
        "generator matrix element disagrees with the Slater-Condon rules: {} vs {}",
        gen.h_ij,
        crate::hamiltonian::ham_element(sys, parent, det),
    );
    let p_spawn = tau * <f64>::abs(gen.h_ij) / gen.p_gen;
    let n = stochastic_round(p_spawn, rng);
    if n == 0 {
        return None;
    }
    let sign = if gen.h_ij > 0.0 {
        -parent_sign.signum()
    } else {
        parent_sign.signum()
    };
    Some((det.clone(), sign * n))
}

/// Death/clone step for a whole walker.
/// # Arguments
/// * __`pop`__ - Signed population on the determinant.
/// * __`h_ii`__ - Diagonal Hamiltonian element.
/// * __`shift`__ - Current energy shift $S$.
/// # Returns
/// The population after the step and the number of particles that died
/// (negative when the step cloned).
/// # Definition
/// Each particle dies with probability $\tau(H_{ii}-S)$; a negative
/// probability clones instead. All particles of the walker share one
/// floor-plus-Bernoulli draw on $\tau|H_{ii}-S|\\,|n|$.
pub fn death_step<R: Rng + ?Sized>(
    pop: i32,
    h_ii: f64,
    shift: f64,
    tau: f64,
    rng: &mut R,
) -> (i32, i32) {
    if pop == 0 {
        return (0, 0);
    }
    let p = tau * (h_ii - shift);
    let n = stochastic_round(<f64>::abs(p) * pop.abs() as f64, rng);
    if p >= 0.0 {
        // Overshooting through zero leaves anti-particles; annihilation
        // sorts the book-keeping out at the cycle boundary.
        (pop - pop.signum() * n, n)
    } else {
        (pop + pop.signum() * n, -n)
    }
}
