use mcmodels::homogeneous::{
    ConditioningError, backward_subset_selection_conditioning, condition_number,
    forward_subset_selection_conditioning, svd_subset_selection,
};
use ndarray::{Array2, Axis, concatenate};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

type Driver = fn(&Array2<f64>, f64) -> Result<(Array2<f64>, Vec<usize>), ConditioningError>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.sample(Standard))
}

/// A 10x9 random matrix with a tenth column equal to 2*col2 - 3*col8.
fn matrix_with_dependent_column(seed: u64) -> Array2<f64> {
    let x = random_matrix(10, 9, seed);
    let combination = &x.column(2) * 2.0 - &x.column(8) * 3.0;
    concatenate(Axis(1), &[x.view(), combination.view().insert_axis(Axis(1))])
        .expect("shapes agree")
}

/// `eye(10)` with its second column appended again: 11 columns, rank 10.
fn identity_with_duplicate() -> Array2<f64> {
    let identity = Array2::<f64>::eye(10);
    concatenate(
        Axis(1),
        &[identity.view(), identity.column(1).insert_axis(Axis(1))],
    )
    .expect("shapes agree")
}

fn removed_columns(columns: &[usize], total: usize) -> Vec<usize> {
    let kept: HashSet<usize> = columns.iter().copied().collect();
    (0..total).filter(|column| !kept.contains(column)).collect()
}

fn assert_columns_match(x: &Array2<f64>, conditioned: &Array2<f64>, columns: &[usize]) {
    assert_eq!(conditioned.ncols(), columns.len());
    assert!(columns.windows(2).all(|pair| pair[0] < pair[1]));
    for (position, &original) in columns.iter().enumerate() {
        assert_eq!(conditioned.column(position), x.column(original));
    }
}

#[test]
fn subset_selection_rejects_out_of_range_sizes() {
    let x = random_matrix(10, 9, 7);

    for n in [0, 9, 10] {
        match svd_subset_selection(&x, n) {
            Err(ConditioningError::InvalidSubsetSize {
                requested,
                available,
            }) => {
                assert_eq!(requested, n);
                assert_eq!(available, 9);
            }
            other => panic!("Expected InvalidSubsetSize for n = {n}, got {other:?}"),
        }
    }
}

#[test]
fn subset_selection_drops_a_dependent_column() {
    for seed in [1_u64, 2, 3, 4, 5] {
        let x = matrix_with_dependent_column(seed);
        assert!(condition_number(&x).unwrap() > 1e10);

        let columns = svd_subset_selection(&x, 9).unwrap();
        assert_eq!(columns.len(), 9);

        let removed = removed_columns(&columns, 10);
        assert_eq!(removed.len(), 1);
        assert!(
            [2, 8, 9].contains(&removed[0]),
            "seed {seed}: removed column {} is not part of the dependency",
            removed[0]
        );

        let kept = x.select(Axis(1), &columns);
        assert!(condition_number(&kept).unwrap().is_finite());
    }
}

#[test]
fn infinite_threshold_returns_a_copy_of_everything() {
    init_logging();
    let x = random_matrix(10, 10, 11);

    let (backward, backward_columns) =
        backward_subset_selection_conditioning(&x, f64::INFINITY).unwrap();
    assert_ne!(backward.as_ptr(), x.as_ptr());
    assert_eq!(backward, x);
    assert_eq!(backward_columns, (0..10).collect::<Vec<_>>());

    let (forward, forward_columns) =
        forward_subset_selection_conditioning(&x, f64::INFINITY).unwrap();
    assert_ne!(forward.as_ptr(), x.as_ptr());
    assert_eq!(forward, x);
    assert_eq!(forward_columns, (0..10).collect::<Vec<_>>());
}

#[test]
fn infinite_threshold_accepts_singular_input() {
    let x = matrix_with_dependent_column(3);
    let (backward, backward_columns) =
        backward_subset_selection_conditioning(&x, f64::INFINITY).unwrap();
    assert_eq!(backward, x);
    assert_eq!(backward_columns.len(), 10);
}

#[test]
fn backward_conditioning_removes_duplicated_column() {
    init_logging();
    let x = identity_with_duplicate();

    let (conditioned, columns) = backward_subset_selection_conditioning(&x, 1.2).unwrap();

    assert_eq!(conditioned.ncols(), x.ncols() - 1);
    assert_columns_match(&x, &conditioned, &columns);
    let removed = removed_columns(&columns, 11);
    assert!(removed == vec![1] || removed == vec![10]);
    assert!(condition_number(&conditioned).unwrap() <= 1.2);
}

#[test]
fn forward_conditioning_removes_duplicated_column() {
    init_logging();
    let x = identity_with_duplicate();

    let (conditioned, columns) = forward_subset_selection_conditioning(&x, 1.2).unwrap();

    assert_eq!(conditioned.ncols(), x.ncols() - 1);
    assert_columns_match(&x, &conditioned, &columns);
    let removed = removed_columns(&columns, 11);
    assert!(removed == vec![1] || removed == vec![10]);
    assert!(condition_number(&conditioned).unwrap() <= 1.2);
}

#[test]
fn both_drivers_drop_a_dependent_column() {
    let x = matrix_with_dependent_column(5);

    for (name, result) in [
        ("backward", backward_subset_selection_conditioning(&x, 1e8)),
        ("forward", forward_subset_selection_conditioning(&x, 1e8)),
    ] {
        let (conditioned, columns) = result.unwrap();
        assert_eq!(columns.len(), 9, "{name} kept {columns:?}");
        assert_columns_match(&x, &conditioned, &columns);
        let removed = removed_columns(&columns, 10);
        assert!([2, 8, 9].contains(&removed[0]), "{name} removed {removed:?}");
        assert!(condition_number(&conditioned).unwrap() <= 1e8);
    }
}

#[test]
fn conditioning_meets_threshold_and_is_idempotent() {
    init_logging();
    // Near-collinear columns push the condition number far above the target.
    let mut x = random_matrix(30, 8, 23);
    let noise = random_matrix(30, 3, 29);
    for (target, source) in [(5, 0), (6, 1), (7, 2)] {
        let near_copy = &x.column(source) + &(&noise.column(target - 5) * 1e-6);
        x.column_mut(target).assign(&near_copy);
    }
    let kappa = 100.0;
    assert!(condition_number(&x).unwrap() > kappa);

    let drivers: [(&str, Driver); 2] = [
        ("backward", backward_subset_selection_conditioning),
        ("forward", forward_subset_selection_conditioning),
    ];

    for (name, driver) in drivers {
        let (conditioned, columns) = driver(&x, kappa).unwrap();
        assert!(columns.len() < x.ncols(), "{name} kept every column");
        assert!(columns.len() >= 5, "{name} kept only {columns:?}");
        assert_columns_match(&x, &conditioned, &columns);
        assert!(condition_number(&conditioned).unwrap() <= kappa);

        let (again, again_columns) = driver(&conditioned, kappa).unwrap();
        assert_eq!(again, conditioned, "{name} is not idempotent");
        assert_eq!(again_columns, (0..conditioned.ncols()).collect::<Vec<_>>());
    }
}

#[test]
fn drivers_leave_the_input_untouched() {
    let x = identity_with_duplicate();
    let snapshot = x.clone();

    backward_subset_selection_conditioning(&x, 1.2).unwrap();
    forward_subset_selection_conditioning(&x, 1.2).unwrap();
    svd_subset_selection(&x, 5).unwrap();

    assert_eq!(x, snapshot);
}

#[test]
fn drivers_accept_non_contiguous_views() {
    let x = identity_with_duplicate();
    let transposed = x.t().to_owned();
    let view = transposed.t();

    let (conditioned, columns) = backward_subset_selection_conditioning(&view, 1.2).unwrap();
    assert_eq!(conditioned.ncols(), 10);
    assert_columns_match(&x, &conditioned, &columns);
}
