use log::{error, info, trace, warn};
use rand::Rng;
use std::time::Instant;

use crate::annihilation::annihilate;
use crate::excitgen::gen_excit;
use crate::hamiltonian::{diagonal_element, ham_element, one_e_int};
use crate::spawning::{attempt_spawn, death_step, stochastic_round};
use crate::system::{DetCache, System, SystemKind};
use crate::Det;

/// One record of the main walker list or the spawn buffer. Slot 0 holds
/// the Hamiltonian walkers; slot 1 holds the operator walkers of a
/// Hellmann-Feynman run and stays zero otherwise.
#[derive(Debug, Clone)]
pub struct Walker {
    pub det: Det,
    pub pops: [i32; 2],
}

/// Observable sampled by the Hellmann-Feynman walkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfOperator {
    DoubleOccupancy,
    Kinetic,
}

impl HfOperator {
    /// Diagonal operator element $\langle D|\hat O|D\rangle$.
    pub fn diagonal(&self, sys: &System, d: &Det) -> f64 {
        match self {
            HfOperator::DoubleOccupancy => d.double_occupancy() as f64,
            HfOperator::Kinetic => match sys.kind {
                SystemKind::HubbardReal => {
                    let conn = sys.lattice.as_ref().unwrap();
                    d.ones().map(|p| one_e_int(conn, sys.hubbard_t, p, p)).sum()
                }
                SystemKind::HubbardK => d.ones().map(|p| sys.eps_k(p)).sum(),
                SystemKind::Molecular => {
                    let ints = sys.integrals.as_ref().unwrap();
                    d.ones().map(|p| ints.one_e(p as usize / 2, p as usize / 2)).sum()
                }
            },
        }
    }

    /// Off-diagonal operator element along a generated single excitation.
    pub fn element(&self, sys: &System, exc: &crate::excitation::Excitation) -> f64 {
        match self {
            HfOperator::DoubleOccupancy => 0.0,
            HfOperator::Kinetic => {
                if exc.nexcit != 1 {
                    return 0.0;
                }
                match sys.kind {
                    SystemKind::HubbardReal => {
                        let conn = sys.lattice.as_ref().unwrap();
                        exc.sign()
                            * one_e_int(conn, sys.hubbard_t, exc.from_orb[0], exc.to_orb[0])
                    }
                    SystemKind::HubbardK => 0.0,
                    SystemKind::Molecular => {
                        let ints = sys.integrals.as_ref().unwrap();
                        exc.sign()
                            * ints.one_e(
                                exc.from_orb[0] as usize / 2,
                                exc.to_orb[0] as usize / 2,
                            )
                    }
                }
            }
        }
    }
}

/// Plain FCIQMC or Hellmann-Feynman sampling of an extra operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    Standard,
    HellmannFeynman(HfOperator),
}

impl SamplingMode {
    #[inline(always)]
    pub fn sampling_size(&self) -> usize {
        match self {
            SamplingMode::Standard => 1,
            SamplingMode::HellmannFeynman(_) => 2,
        }
    }
}

/// Run parameters of the walker loop.
#[derive(Debug, Clone)]
pub struct QmcParams {
    pub tau: f64,
    pub ncycles: usize,
    pub nreport: usize,
    pub pattempt_single: f64,
    pub renorm: bool,
    pub initial_shift: f64,
    pub shift_damping: f64,
    pub target_population: f64,
    pub initial_population: i32,
    pub spawn_cap: usize,
    pub walker_cap: usize,
    pub sampling: SamplingMode,
}

impl QmcParams {
    pub fn new(tau: f64, ncycles: usize, nreport: usize) -> QmcParams {
        QmcParams {
            tau,
            ncycles,
            nreport,
            pattempt_single: 0.5,
            renorm: true,
            initial_shift: 0.0,
            shift_damping: 0.05,
            target_population: 1e4,
            initial_population: 10,
            spawn_cap: 1 << 20,
            walker_cap: 1 << 20,
            sampling: SamplingMode::Standard,
        }
    }
}

/// Mutable state of a run. The loop owns every accumulator here; nothing
/// lives at module scope.
#[derive(Debug)]
pub struct WalkerState {
    pub walkers: Vec<Walker>,
    pub spawned: Vec<Walker>,
    scratch: Vec<Walker>,
    /// Reset point of the spawn buffer at the start of each cycle; block
    /// boundaries beyond it belong to the (external) exchange step.
    pub spawning_block_start: usize,
    pub shift: f64,
    pub vary_shift: bool,
    pub nparticles: i64,
    pub nparticles_old: i64,
    pub ncycles_done: usize,
    pub proj_energy: f64,
    pub d0_population: f64,
    pub rspawn: f64,
    pub ndeath: i64,
}

impl WalkerState {
    /// Seed the initial population on the reference determinant.
    pub fn new(sys: &System, params: &QmcParams) -> WalkerState {
        let mut pops = [0i32; 2];
        pops[0] = params.initial_population;
        WalkerState {
            walkers: vec![Walker {
                det: sys.reference.clone(),
                pops,
            }],
            spawned: Vec::with_capacity(params.spawn_cap.min(1 << 16)),
            scratch: Vec::new(),
            spawning_block_start: 0,
            shift: params.initial_shift,
            vary_shift: false,
            nparticles: params.initial_population.abs() as i64,
            nparticles_old: params.initial_population.abs() as i64,
            ncycles_done: 0,
            proj_energy: 0.0,
            d0_population: 0.0,
            rspawn: 0.0,
            ndeath: 0,
        }
    }

    /// Total absolute Hamiltonian-walker population.
    pub fn total_population(&self) -> i64 {
        self.walkers.iter().map(|w| w.pops[0].abs() as i64).sum()
    }

    /// Total absolute operator-walker population (Hellmann-Feynman runs).
    pub fn hf_population(&self) -> i64 {
        self.walkers.iter().map(|w| w.pops[1].abs() as i64).sum()
    }
}

/// One line of the report stream.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub ireport: usize,
    pub ncycles_done: usize,
    pub nparticles: i64,
    pub proj_energy: f64,
    pub d0_population: f64,
    pub shift: f64,
    pub seconds: f64,
}

/// Answer of the interactivity hook polled between reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Continue,
    SoftExit,
}

/// Owned copy of the run state emitted at termination; serialising it is
/// the caller's business.
#[derive(Debug, Clone)]
pub struct RestartSnapshot {
    pub walkers: Vec<Walker>,
    pub ncycles_done: usize,
    pub nparticles_old: i64,
    pub shift: f64,
}

/// Population-control update of the shift, applied once per report after
/// the variable-shift trigger population is reached:
/// $$
/// S\leftarrow S-\frac{\zeta}{A\tau}\ln\frac{N_w}{N_w^{\text{old}}}
/// $$
pub fn update_shift(state: &mut WalkerState, params: &QmcParams) {
    if !state.vary_shift && state.nparticles as f64 >= params.target_population {
        state.vary_shift = true;
        info!(
            "Population {} crossed the target, shift now varies.",
            state.nparticles
        );
    }
    if state.vary_shift && state.nparticles_old > 0 && state.nparticles > 0 {
        state.shift -= params.shift_damping
            / (params.ncycles as f64 * params.tau)
            * <f64>::ln(state.nparticles as f64 / state.nparticles_old as f64);
    }
    state.nparticles_old = state.nparticles;
}

fn push_spawn(state: &mut WalkerState, det: Det, slot: usize, n: i32, cap: usize) {
    let mut pops = [0i32; 2];
    pops[slot] = n;
    state.spawned.push(Walker { det, pops });
    if state.spawned.len() > cap {
        error!(
            "Spawn buffer overflow at {} records; relaunch with a larger cap.",
            cap
        );
        panic!("spawn buffer exhausted");
    }
}

/// The FCIQMC walker loop.
/// # Arguments
/// * __`hook`__ - Polled after every report; returning
///   [`LoopSignal::SoftExit`] finishes the current report and terminates
///   cleanly.
/// # Definition
/// For every cycle, every particle of every walker attempts one spawn
/// onto a connected determinant with probability
/// $\tau|H_{ij}|/p_\text{gen}$, each walker then dies or clones with
/// probability $\tau(H_{ii}-S)$ per particle, and the cycle ends with the
/// annihilation sweep. Reports accumulate the projected-energy numerator
/// $\sum_{D\neq D_0}N_D\langle D_0|\hat H|D\rangle$ and the reference
/// population, then update the shift with the old particle count.
pub fn run_fciqmc<R, F>(
    sys: &System,
    params: &QmcParams,
    state: &mut WalkerState,
    rng: &mut R,
    hook: &mut F,
) -> RestartSnapshot
where
    R: Rng + ?Sized,
    F: FnMut(&ReportRow) -> LoopSignal,
{
    let start = Instant::now();
    let mut cache = DetCache::new();
    let h00 = diagonal_element(sys, &sys.reference);
    info!(
        "Starting FCIQMC: tau={}, {} cycles per report, {} reports, E_ref={:.6}",
        params.tau, params.ncycles, params.nreport, h00
    );

    for ireport in 1..=params.nreport {
        state.proj_energy = 0.0;
        state.d0_population = 0.0;
        state.rspawn = 0.0;

        for _icycle in 0..params.ncycles {
            state.spawned.truncate(state.spawning_block_start);
            state.ndeath = 0;
            let nattempts = 2 * state.nparticles.max(1);
            let mut nspawn_events = 0i64;

            for iw in 0..state.walkers.len() {
                let det = state.walkers[iw].det.clone();
                let pops = state.walkers[iw].pops;
                cache.decode(&det);

                // Projected-energy accumulators against the reference.
                if det == sys.reference {
                    state.d0_population += pops[0] as f64;
                } else if det.excitation_level(&sys.reference) <= 2 {
                    state.proj_energy += ham_element(sys, &sys.reference, &det) * pops[0] as f64;
                }

                for slot in 0..params.sampling.sampling_size() {
                    let pop = pops[slot];
                    for _ in 0..pop.abs() {
                        let gen =
                            gen_excit(sys, &det, &cache, params.pattempt_single, params.renorm, rng);
                        if let Some((child, n)) =
                            attempt_spawn(sys, &det, &gen, pop.signum(), params.tau, rng)
                        {
                            nspawn_events += n.abs() as i64;
                            push_spawn(state, child, slot, n, params.spawn_cap);
                        }
                    }
                }

                // Hellmann-Feynman source: operator walkers spawned from
                // the Hamiltonian population through the operator's own
                // matrix elements.
                if let SamplingMode::HellmannFeynman(op) = params.sampling {
                    for _ in 0..pops[0].abs() {
                        let gen =
                            gen_excit(sys, &det, &cache, params.pattempt_single, params.renorm, rng);
                        if let Some(child) = gen.det.as_ref() {
                            let o_ij = op.element(sys, &gen.exc);
                            let n =
                                stochastic_round(params.tau * <f64>::abs(o_ij) / gen.p_gen, rng);
                            if n != 0 {
                                let sign = if o_ij < 0.0 {
                                    -pops[0].signum()
                                } else {
                                    pops[0].signum()
                                };
                                push_spawn(state, child.clone(), 1, sign * n, params.spawn_cap);
                            }
                        }
                    }
                    let o_ii = op.diagonal(sys, &det);
                    let n = stochastic_round(
                        params.tau * <f64>::abs(o_ii) * pops[0].abs() as f64,
                        rng,
                    );
                    if n != 0 {
                        let sign = if o_ii < 0.0 {
                            -pops[0].signum()
                        } else {
                            pops[0].signum()
                        };
                        push_spawn(state, det.clone(), 1, sign * n, params.spawn_cap);
                    }
                }

                // Death after the spawns, once per walker and slot.
                let h_ii = diagonal_element(sys, &det);
                for slot in 0..params.sampling.sampling_size() {
                    let (new_pop, nd) =
                        death_step(state.walkers[iw].pops[slot], h_ii, state.shift, params.tau, rng);
                    state.walkers[iw].pops[slot] = new_pop;
                    if slot == 0 {
                        state.ndeath += nd as i64;
                    }
                }
            }

            annihilate(&mut state.walkers, &mut state.spawned, &mut state.scratch);
            if state.walkers.len() > params.walker_cap {
                error!(
                    "Main walker list overflow at {} records; relaunch with a larger cap.",
                    params.walker_cap
                );
                panic!("walker list exhausted");
            }
            state.nparticles = state.total_population();
            state.rspawn += nspawn_events as f64 / nattempts as f64;
            state.ncycles_done += 1;
            trace!(
                "Cycle {}: {} walkers on {} determinants, {} deaths",
                state.ncycles_done,
                state.nparticles,
                state.walkers.len(),
                state.ndeath
            );
        }

        update_shift(state, params);
        let row = ReportRow {
            ireport,
            ncycles_done: state.ncycles_done,
            nparticles: state.nparticles,
            proj_energy: state.proj_energy,
            d0_population: state.d0_population,
            shift: state.shift,
            seconds: start.elapsed().as_secs_f64(),
        };
        if state.nparticles == 0 {
            warn!("Population died out at report {}.", ireport);
        }
        if hook(&row) == LoopSignal::SoftExit {
            info!("Soft exit requested; finishing after report {}.", ireport);
            break;
        }
    }

    RestartSnapshot {
        walkers: state.walkers.clone(),
        ncycles_done: state.ncycles_done,
        nparticles_old: state.nparticles_old,
        shift: state.shift,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lattice::LatticeSpec;
    use rand_mt::Mt64;

    #[test]
    fn test_population_conserves_electron_number() {
        let spec = LatticeSpec::chain(4).unwrap();
        let sys = System::hubbard_real(&spec, 2, 2, 4.0, 1.0).unwrap();
        let mut params = QmcParams::new(0.01, 10, 5);
        params.initial_population = 50;
        params.initial_shift = 8.0;
        params.target_population = 200.0;
        let mut state = WalkerState::new(&sys, &params);
        let mut rng = Mt64::new(1234);
        let snap = run_fciqmc(&sys, &params, &mut state, &mut rng, &mut |_row| {
            LoopSignal::Continue
        });
        assert_eq!(snap.ncycles_done, 50);
        for w in &state.walkers {
            assert_eq!(w.det.count_ones(), 4);
            assert!(w.pops[0] != 0 || w.pops[1] != 0);
        }
        // The list stays sorted and duplicate free after annihilation.
        for pair in state.walkers.windows(2) {
            assert!(pair[0].det < pair[1].det);
        }
    }

    #[test]
    fn test_soft_exit_stops_early() {
        let spec = LatticeSpec::chain(4).unwrap();
        let sys = System::hubbard_real(&spec, 2, 2, 4.0, 1.0).unwrap();
        let params = QmcParams::new(0.01, 5, 100);
        let mut state = WalkerState::new(&sys, &params);
        let mut rng = Mt64::new(99);
        let mut seen = 0usize;
        let snap = run_fciqmc(&sys, &params, &mut state, &mut rng, &mut |row| {
            seen = row.ireport;
            if row.ireport == 3 {
                LoopSignal::SoftExit
            } else {
                LoopSignal::Continue
            }
        });
        assert_eq!(seen, 3);
        assert_eq!(snap.ncycles_done, 15);
    }

    #[test]
    fn test_hf_mode_builds_operator_population() {
        let spec = LatticeSpec::chain(4).unwrap();
        let sys = System::hubbard_real(&spec, 2, 2, 4.0, 1.0).unwrap();
        let mut params = QmcParams::new(0.01, 10, 10);
        params.initial_population = 100;
        params.initial_shift = 8.0;
        params.target_population = 500.0;
        params.sampling = SamplingMode::HellmannFeynman(HfOperator::DoubleOccupancy);
        let mut state = WalkerState::new(&sys, &params);
        let mut rng = Mt64::new(7);
        run_fciqmc(&sys, &params, &mut state, &mut rng, &mut |_row| {
            LoopSignal::Continue
        });
        // The double-occupancy source feeds slot 1 from slot 0.
        assert!(state.hf_population() > 0);
    }
}
