use assert::close;
use fciqmc::csr::{csrpgemv, csrpgemv_single_row, csrpsymv, CsrMatrix};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[test]
fn fixed_symmetric_product() {
    // M = diag(1,2,3,4) + e_{1,2} + e_{2,1}, upper triangle stored.
    let m = CsrMatrix::from_triplets(
        4,
        4,
        &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 2.0), (2, 2, 3.0), (3, 3, 4.0)],
        true,
    )
    .unwrap();
    let x = [1.0, 1.0, 1.0, 1.0];
    let mut y = [0.0; 4];
    csrpsymv(&m, &x, &mut y).unwrap();
    let expected = [2.0, 3.0, 3.0, 4.0];
    for (yi, ei) in y.iter().zip(expected.iter()) {
        close(*yi, *ei, 1e-14);
    }
}

#[test]
fn symmetric_equals_general_on_random_matrices() {
    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..50 {
        let n = rng.gen_range(1..30usize);
        let mut triplets = Vec::new();
        for i in 0..n {
            for j in i..n {
                if rng.gen::<f64>() < 0.4 {
                    triplets.push((i, j, rng.gen::<f64>() - 0.5));
                }
            }
        }
        let m = CsrMatrix::from_triplets(n, n, &triplets, true).unwrap();
        let full = m.to_general().unwrap();
        let x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
        let mut y_sym = vec![0.0; n];
        let mut y_gen = vec![0.0; n];
        csrpsymv(&m, &x, &mut y_sym).unwrap();
        csrpgemv(&full, &x, &mut y_gen).unwrap();
        for (a, b) in y_sym.iter().zip(y_gen.iter()) {
            close(*a, *b, 1e-12);
        }
        // The row kernel agrees with the assembled product.
        for i in 0..n {
            close(csrpgemv_single_row(&full, &x, i).unwrap(), y_gen[i], 1e-12);
        }
    }
}

#[test]
fn products_accumulate_into_y() {
    let m = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)], true).unwrap();
    let x = [1.0, 2.0];
    let mut y = [10.0, 20.0];
    csrpsymv(&m, &x, &mut y).unwrap();
    close(y[0], 11.0, 1e-14);
    close(y[1], 22.0, 1e-14);
}

#[test]
fn storage_contract_is_enforced() {
    let sym = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0)], true).unwrap();
    let gen = sym.to_general().unwrap();
    let x = [1.0, 1.0];
    let mut y = [0.0, 0.0];
    assert!(csrpgemv(&sym, &x, &mut y).is_err());
    assert!(csrpsymv(&gen, &x, &mut y).is_err());
    assert!(csrpgemv_single_row(&sym, &x, 0).is_err());
    assert!(csrpsymv(&sym, &x, &mut [0.0]).is_err());
}
