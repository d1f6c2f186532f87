use approx::assert_abs_diff_eq;
use sequest::linalg::{DMatrix, DVector};
use sequest::prelude::*;
use snafu::prelude::*;
use std::sync::{Arc, Mutex};

/// Decay rate of the exponential plant used throughout these tests.
const LAMBDA: f64 = 0.3;

/// Analytic propagator for an exponentially decaying scalar state. Stands in for a full
/// numerical propagator: it owns its state and epoch like one, and rejects bad step sizes.
struct DecayPropagator {
    time: f64,
    state: DVector<f64>,
}

impl StatePropagator for DecayPropagator {
    fn integrate_to(
        &mut self,
        target_time: f64,
        initial_step: f64,
        _tolerance: f64,
    ) -> Result<DVector<f64>, PropagationError> {
        ensure!(initial_step > 0.0, StepSizeSnafu { step: initial_step });

        let dt = target_time - self.time;
        self.state *= (-LAMBDA * dt).exp();
        self.time = target_time;
        Ok(self.state.clone())
    }
}

/// A scalar filter variant whose prediction is delegated to the external propagator, the
/// pattern the linear filter rejects by construction.
struct DecayKalmanFilter {
    base: FilterBase,
    /// Typed handle onto the same propagator the base delegates to, used to re-anchor the
    /// collaborator on the corrected estimate after each update.
    collaborator: Arc<Mutex<DecayPropagator>>,
    last_time: f64,
}

impl DecayKalmanFilter {
    fn new(setup: FilterSetup, collaborator: Arc<Mutex<DecayPropagator>>) -> Result<Self, FilterError> {
        let last_time = setup.initial_time;
        Ok(Self {
            base: FilterBase::from_setup(setup)?,
            collaborator,
            last_time,
        })
    }
}

impl KalmanFilter for DecayKalmanFilter {
    fn filter_base(&self) -> &FilterBase {
        &self.base
    }

    fn filter_base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn update_filter(
        &mut self,
        time: f64,
        _control: &DVector<f64>,
        measurement: &DVector<f64>,
    ) -> Result<(), FilterError> {
        let dt = time - self.last_time;
        let phi = (-LAMBDA * dt).exp();

        let state_bar = self.base.integrate_state(time, dt / 10.0, None)?;
        let covar_bar =
            phi * phi * self.base.covariance_estimate()[(0, 0)] + self.base.uncertainty().system()[(0, 0)];

        let innovation_covar = covar_bar + self.base.uncertainty().measurement()[(0, 0)];
        if innovation_covar.abs() < f64::EPSILON {
            return Err(FilterError::SingularKalmanGain);
        }
        let gain = covar_bar / innovation_covar;

        let state_hat = state_bar[0] + gain * (measurement[0] - state_bar[0]);
        let covar_hat = (1.0 - gain).powi(2) * covar_bar
            + gain * gain * self.base.uncertainty().measurement()[(0, 0)];

        self.base.commit_estimate(
            DVector::from_element(1, state_hat),
            DMatrix::from_element(1, 1, covar_hat),
        );
        self.last_time = time;

        // The collaborator restarts each prediction from the corrected estimate.
        let mut collaborator = self.collaborator.lock().unwrap();
        collaborator.state = DVector::from_element(1, state_hat);
        collaborator.time = time;

        Ok(())
    }

    fn system_model(&self, time: f64, state: &DVector<f64>, _control: &DVector<f64>) -> DVector<f64> {
        state * (-LAMBDA * (time - self.last_time)).exp()
    }

    fn measurement_model(&self, _time: f64, state: &DVector<f64>) -> DVector<f64> {
        state.clone()
    }
}

fn decay_setup(collaborator: &Arc<Mutex<DecayPropagator>>) -> FilterSetup {
    FilterSetup::builder()
        .system_uncertainty(DMatrix::from_element(1, 1, 1e-6))
        .measurement_uncertainty(DMatrix::from_element(1, 1, 0.01))
        .initial_time(0.0)
        .initial_state(DVector::from_element(1, 8.0))
        .initial_covariance(DMatrix::from_element(1, 1, 1.0))
        .integrate_state(true)
        .propagator(collaborator.clone())
        .build()
}

#[test]
fn delegated_prediction_tracks_decay() {
    let collaborator = Arc::new(Mutex::new(DecayPropagator {
        time: 0.0,
        state: DVector::from_element(1, 8.0),
    }));

    let mut kf = DecayKalmanFilter::new(decay_setup(&collaborator), collaborator.clone()).unwrap();

    // Truth starts off the initial estimate and decays freely.
    let mut truth = 10.0;
    let dt = 0.5;
    for step in 1..=30 {
        let time = dt * step as f64;
        truth *= (-LAMBDA * dt).exp();

        let observation = DVector::from_element(1, truth) + kf.produce_measurement_noise();
        kf.update_filter(time, &DVector::zeros(0), &observation)
            .unwrap();
    }

    assert_eq!(kf.estimated_state_history().len(), 30);

    let error = (kf.current_state_estimate()[0] - truth).abs();
    let sigma = kf.current_covariance_estimate()[(0, 0)].sqrt();
    assert!(
        error < 4.0 * sigma + 0.05,
        "estimate error {error} exceeds tolerance (sigma {sigma})"
    );
}

#[test]
fn propagator_failure_leaves_filter_untouched() {
    let collaborator = Arc::new(Mutex::new(DecayPropagator {
        time: 0.0,
        state: DVector::from_element(1, 8.0),
    }));

    let mut kf = DecayKalmanFilter::new(decay_setup(&collaborator), collaborator.clone()).unwrap();

    // A negative step size is rejected by this propagator, and the failure must surface
    // unchanged through the filter layer.
    match kf.update_filter(-1.0, &DVector::zeros(0), &DVector::from_element(1, 1.0)) {
        Err(FilterError::Propagation { source }) => {
            assert_eq!(source, PropagationError::StepSizeError { step: -0.1 })
        }
        other => panic!("expected the propagation failure to surface, got {other:?}"),
    }

    assert_eq!(kf.current_state_estimate()[0], 8.0);
    assert!(kf.estimated_state_history().is_empty());
}

#[test]
fn direct_propagation_requests() {
    let collaborator = Arc::new(Mutex::new(DecayPropagator {
        time: 0.0,
        state: DVector::from_element(1, 8.0),
    }));

    let mut kf = DecayKalmanFilter::new(decay_setup(&collaborator), collaborator.clone()).unwrap();

    // One half-life worth of free propagation, requested without any measurement update.
    let target = 2.0;
    let propagated = kf.integrate_state(target, 0.1, Some(1e-12)).unwrap();
    assert_abs_diff_eq!(
        propagated[0],
        8.0 * (-LAMBDA * target).exp(),
        epsilon = 1e-12
    );

    // Free propagation is a delegation, not an update: the estimate is unchanged.
    assert_eq!(kf.current_state_estimate()[0], 8.0);
}
