use crate::propagation::Walker;

/// Drain the spawn buffer into the main walker list.
/// # Definition
/// The buffer is sorted by determinant, runs of equal determinants are
/// compressed to one record with summed signed counts, and the compressed
/// buffer is merge-joined with the (sorted) main list. Matching records
/// add their populations, unmatched spawns are inserted, and records whose
/// populations all cancel are dropped. The whole sweep is
/// $O(M\log M + N)$ in the buffer and main sizes.
/// # Invariants
/// On return the main list is sorted, every determinant appears exactly
/// once and no record carries an all-zero population.
pub fn annihilate(main: &mut Vec<Walker>, spawned: &mut Vec<Walker>, scratch: &mut Vec<Walker>) {
    spawned.sort_unstable_by(|a, b| a.det.cmp(&b.det));

    // Compress equal-determinant runs in place.
    let mut write = 0usize;
    for read in 0..spawned.len() {
        if write > 0 && spawned[write - 1].det == spawned[read].det {
            let pops = spawned[read].pops;
            for (acc, p) in spawned[write - 1].pops.iter_mut().zip(pops.iter()) {
                *acc += p;
            }
        } else {
            spawned.swap(write, read);
            write += 1;
        }
    }
    spawned.truncate(write);

    scratch.clear();
    scratch.reserve(main.len() + spawned.len());
    let mut im = 0usize;
    let mut is = 0usize;
    while im < main.len() || is < spawned.len() {
        let take_main = is >= spawned.len()
            || (im < main.len() && main[im].det <= spawned[is].det);
        let mut rec = if take_main {
            im += 1;
            main[im - 1].clone()
        } else {
            is += 1;
            spawned[is - 1].clone()
        };
        if take_main && is < spawned.len() && rec.det == spawned[is].det {
            for (acc, p) in rec.pops.iter_mut().zip(spawned[is].pops.iter()) {
                *acc += p;
            }
            is += 1;
        }
        if rec.pops.iter().any(|&p| p != 0) {
            scratch.push(rec);
        }
    }
    std::mem::swap(main, scratch);
    scratch.clear();
    spawned.clear();
}
