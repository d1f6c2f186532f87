/*
    Sequest, sequential estimation for dynamical systems
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::{
    FilterError, NonSquareUncertaintySnafu, PropagationSnafu, PropagatorNotConfiguredSnafu,
};
use crate::linalg::{DMatrix, DVector};
use crate::noise::{NoiseGenerator, DEFAULT_MEASUREMENT_NOISE_SEED, DEFAULT_SYSTEM_NOISE_SEED};
use crate::propagators::SharedPropagator;
use snafu::prelude::*;
use typed_builder::TypedBuilder;

/// The stochastic model of a filter: the process noise covariance (usually noted Q) and the
/// measurement noise covariance (usually noted R).
///
/// Both matrices must be square. Positive semi-definiteness is a precondition left to the
/// caller: it is not checked at runtime, and an indefinite matrix will corrupt the estimate
/// rather than raise an error.
#[derive(Clone, Debug, PartialEq)]
pub struct UncertaintyModel {
    system: DMatrix<f64>,
    measurement: DMatrix<f64>,
}

impl UncertaintyModel {
    /// Validates that both uncertainty matrices are square.
    pub fn new(system: DMatrix<f64>, measurement: DMatrix<f64>) -> Result<Self, FilterError> {
        ensure!(
            system.is_square(),
            NonSquareUncertaintySnafu {
                which: "system",
                rows: system.nrows(),
                cols: system.ncols(),
            }
        );
        ensure!(
            measurement.is_square(),
            NonSquareUncertaintySnafu {
                which: "measurement",
                rows: measurement.nrows(),
                cols: measurement.ncols(),
            }
        );

        Ok(Self {
            system,
            measurement,
        })
    }

    /// Process noise covariance (Q).
    pub fn system(&self) -> &DMatrix<f64> {
        &self.system
    }

    /// Measurement noise covariance (R).
    pub fn measurement(&self) -> &DMatrix<f64> {
        &self.measurement
    }
}

/// The construction options recognized by every filter variant.
#[derive(Clone, TypedBuilder)]
#[builder(doc)]
pub struct FilterSetup {
    /// Process noise covariance matrix (Q); must be square.
    pub system_uncertainty: DMatrix<f64>,
    /// Measurement noise covariance matrix (R); must be square.
    pub measurement_uncertainty: DMatrix<f64>,
    /// Time stamp associated with the initial estimate.
    pub initial_time: f64,
    /// First a-priori estimate of the state.
    pub initial_state: DVector<f64>,
    /// First a-priori estimate of the covariance.
    pub initial_covariance: DMatrix<f64>,
    /// Whether the state must be propagated numerically between updates.
    #[builder(default = false)]
    pub integrate_state: bool,
    /// Propagator to delegate state propagation to; required iff `integrate_state` is set.
    #[builder(default, setter(strip_option))]
    pub propagator: Option<SharedPropagator>,
    /// Seed of the process noise generators.
    #[builder(default = DEFAULT_SYSTEM_NOISE_SEED)]
    pub system_noise_seed: u128,
    /// Seed of the measurement noise generators.
    #[builder(default = DEFAULT_MEASUREMENT_NOISE_SEED)]
    pub measurement_noise_seed: u128,
}

/// The bookkeeping shared by every filter variant: the running a-posteriori estimate, the
/// uncertainty model, the estimate histories, the noise generators, and the optional
/// propagator.
///
/// Variants own a `FilterBase` and expose it through [super::KalmanFilter::filter_base].
#[derive(Clone)]
pub struct FilterBase {
    uncertainty: UncertaintyModel,
    initial_time: f64,
    a_posteriori_state: DVector<f64>,
    a_posteriori_covar: DMatrix<f64>,
    state_history: Vec<DVector<f64>>,
    covar_history: Vec<DMatrix<f64>>,
    system_noise: NoiseGenerator,
    measurement_noise: NoiseGenerator,
    propagator: Option<SharedPropagator>,
}

impl FilterBase {
    /// Validates the provided setup and initializes the filter bookkeeping from it.
    ///
    /// The initial state and covariance are the first a-priori estimate; the histories
    /// start empty and only grow on successful updates.
    pub fn from_setup(setup: FilterSetup) -> Result<Self, FilterError> {
        let uncertainty =
            UncertaintyModel::new(setup.system_uncertainty, setup.measurement_uncertainty)?;

        ensure!(
            !setup.integrate_state || setup.propagator.is_some(),
            PropagatorNotConfiguredSnafu
        );

        let system_noise =
            NoiseGenerator::from_diagonal(uncertainty.system(), setup.system_noise_seed);
        let measurement_noise =
            NoiseGenerator::from_diagonal(uncertainty.measurement(), setup.measurement_noise_seed);

        Ok(Self {
            uncertainty,
            initial_time: setup.initial_time,
            a_posteriori_state: setup.initial_state,
            a_posteriori_covar: setup.initial_covariance,
            state_history: Vec::new(),
            covar_history: Vec::new(),
            system_noise,
            measurement_noise,
            propagator: setup.propagator,
        })
    }

    /// The uncertainty model of this filter.
    pub fn uncertainty(&self) -> &UncertaintyModel {
        &self.uncertainty
    }

    /// Time stamp of the initial estimate.
    pub fn initial_time(&self) -> f64 {
        self.initial_time
    }

    /// The current a-posteriori state estimate.
    pub fn state_estimate(&self) -> &DVector<f64> {
        &self.a_posteriori_state
    }

    /// The current a-posteriori covariance estimate.
    pub fn covariance_estimate(&self) -> &DMatrix<f64> {
        &self.a_posteriori_covar
    }

    /// History of a-posteriori state estimates, one entry per successful update.
    pub fn state_history(&self) -> &[DVector<f64>] {
        &self.state_history
    }

    /// History of a-posteriori covariance estimates, one entry per successful update.
    pub fn covariance_history(&self) -> &[DMatrix<f64>] {
        &self.covar_history
    }

    /// History of the system noise drawn so far.
    pub fn system_noise_history(&self) -> &[DVector<f64>] {
        self.system_noise.history()
    }

    /// History of the measurement noise drawn so far.
    pub fn measurement_noise_history(&self) -> &[DVector<f64>] {
        self.measurement_noise.history()
    }

    /// Draws one system noise vector and records it.
    pub fn produce_system_noise(&mut self) -> DVector<f64> {
        self.system_noise.produce()
    }

    /// Draws one measurement noise vector and records it.
    pub fn produce_measurement_noise(&mut self) -> DVector<f64> {
        self.measurement_noise.produce()
    }

    /// Replaces the current a-posteriori estimate and appends it to both histories.
    ///
    /// Variants call this exactly once per successful update, after all of the update
    /// arithmetic has succeeded, so that a failed update leaves the filter untouched.
    pub fn commit_estimate(&mut self, state: DVector<f64>, covar: DMatrix<f64>) {
        self.state_history.push(state.clone());
        self.covar_history.push(covar.clone());
        self.a_posteriori_state = state;
        self.a_posteriori_covar = covar;
    }

    /// Delegates propagation of the current state to the configured propagator and returns
    /// the propagated state.
    ///
    /// The final time tolerance defaults to the machine epsilon when `None`.
    pub fn integrate_state(
        &mut self,
        target_time: f64,
        initial_step: f64,
        tolerance: Option<f64>,
    ) -> Result<DVector<f64>, FilterError> {
        let propagator = self
            .propagator
            .as_ref()
            .context(PropagatorNotConfiguredSnafu)?;
        let tolerance = tolerance.unwrap_or(f64::EPSILON);

        debug!("delegating propagation to t={target_time} (step {initial_step}, tolerance {tolerance:e})");

        propagator
            .lock()
            .map_err(|_| FilterError::PropagatorPoisoned)?
            .integrate_to(target_time, initial_step, tolerance)
            .context(PropagationSnafu)
    }
}
