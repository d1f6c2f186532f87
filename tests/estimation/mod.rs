use sequest::linalg::{DMatrix, DVector};
use sequest::prelude::*;

mod propagation;

/// Constant-velocity cart with a position measurement, the work horse of these tests.
pub fn cart_setup(dt: f64, q: f64, r: f64) -> (FilterSetup, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
    let stm = DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]);
    let control = DMatrix::zeros(2, 1);
    let measurement = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);

    let setup = FilterSetup::builder()
        .system_uncertainty(DMatrix::from_diagonal(&DVector::from_vec(vec![q, q])))
        .measurement_uncertainty(DMatrix::from_element(1, 1, r))
        .initial_time(0.0)
        .initial_state(DVector::zeros(2))
        .initial_covariance(DMatrix::identity(2, 2))
        .build();

    (setup, stm, control, measurement)
}

#[test]
fn histories_and_dimensions_invariants() {
    let (setup, stm, control, measurement) = cart_setup(0.1, 1e-4, 0.25);
    let mut kf = LinearKalmanFilter::from_matrices(setup, stm, control, measurement).unwrap();

    for step in 1..=50 {
        let time = 0.1 * step as f64;
        kf.update_filter(time, &DVector::zeros(1), &DVector::from_element(1, time))
            .unwrap();

        assert_eq!(kf.current_state_estimate().len(), 2);
        assert_eq!(kf.current_covariance_estimate().shape(), (2, 2));
        assert_eq!(kf.estimated_state_history().len(), step);
        assert_eq!(kf.estimated_covariance_history().len(), step);
    }

    let (system_noise, measurement_noise) = kf.noise_history();
    assert!(system_noise.is_empty() && measurement_noise.is_empty());
}
