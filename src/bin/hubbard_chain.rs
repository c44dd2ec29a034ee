use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand_mt::Mt64;
use std::fs::File;
use std::io::Write;

use fciqmc::diagonalisation::ground_state_energy;
use fciqmc::hamiltonian::diagonal_element;
use fciqmc::lattice::LatticeSpec;
use fciqmc::propagation::{run_fciqmc, LoopSignal, QmcParams, WalkerState};
use fciqmc::system::System;

const SEED: u64 = 1434;
const SIZE: usize = 8;
const NELEC_UP: usize = 4;
const NELEC_DOWN: usize = 4;
const CONS_U: f64 = 4.0;
const CONS_T: f64 = 1.0;
const TAU: f64 = 0.002;
const NCYCLES: usize = 50;
const NREPORT: usize = 400;
const TARGET_POPULATION: f64 = 20_000.0;
const INITIAL_POPULATION: i32 = 200;
const LANCZOS_ITER: usize = 200;

fn main() {
    // Initialize logger
    env_logger::init();
    let mut report_fp = File::create("reports").unwrap();

    let spec = LatticeSpec::chain(SIZE).unwrap();
    let sys = System::hubbard_real(&spec, NELEC_UP, NELEC_DOWN, CONS_U, CONS_T).unwrap();
    let e_exact = ground_state_energy(&sys, LANCZOS_ITER).unwrap();
    info!("Lanczos reference energy: {:.8}", e_exact);

    let mut params = QmcParams::new(TAU, NCYCLES, NREPORT);
    params.initial_population = INITIAL_POPULATION;
    params.initial_shift = diagonal_element(&sys, &sys.reference);
    params.target_population = TARGET_POPULATION;
    let mut state = WalkerState::new(&sys, &params);
    let mut rng = Mt64::new(SEED);

    let progress_bar = ProgressBar::new(NREPORT as u64);
    progress_bar.set_prefix("FCIQMC Progress: ");
    progress_bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
        )
        .unwrap()
        .progress_chars("##-"),
    );

    let h00 = diagonal_element(&sys, &sys.reference);
    let mut num = 0.0;
    let mut den = 0.0;
    run_fciqmc(&sys, &params, &mut state, &mut rng, &mut |row| {
        writeln!(
            report_fp,
            "{} {} {} {:.8e} {:.8e} {:.8e} {:.3}",
            row.ireport,
            row.ncycles_done,
            row.nparticles,
            row.proj_energy,
            row.d0_population,
            row.shift,
            row.seconds
        )
        .unwrap();
        if row.ireport > NREPORT / 2 {
            num += row.proj_energy;
            den += row.d0_population;
        }
        progress_bar.inc(1);
        progress_bar.set_message(format!("N = {}", row.nparticles));
        LoopSignal::Continue
    });
    progress_bar.finish();

    let e_proj = h00 + num / den;
    println!(
        "{} {:.6}",
        "Projected FCIQMC energy:".green().bold(),
        e_proj
    );
    println!("{} {:.6}", "Lanczos energy:".cyan().bold(), e_exact);
    println!(
        "{} {:.2e}",
        "Absolute deviation:".yellow(),
        <f64>::abs(e_proj - e_exact)
    );
}
