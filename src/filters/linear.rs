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
    ensure_dimensions, FilterBase, FilterError, FilterSetup, KalmanFilter,
    SingularKalmanGainSnafu, UnsupportedStatePropagationSnafu,
};
use crate::linalg::{DMatrix, DVector};
use snafu::prelude::*;

/// Function returning the state transition or control matrix as a function of time, state,
/// and control input.
pub type SystemMatrixFn = Box<dyn Fn(f64, &DVector<f64>, &DVector<f64>) -> DMatrix<f64> + Send + Sync>;

/// Function returning the measurement matrix as a function of time and state.
pub type MeasurementMatrixFn = Box<dyn Fn(f64, &DVector<f64>) -> DMatrix<f64> + Send + Sync>;

/// Wraps a constant matrix into a constant-valued system matrix function.
pub fn constant_system_matrix(matrix: DMatrix<f64>) -> SystemMatrixFn {
    Box::new(move |_, _, _| matrix.clone())
}

/// Wraps a constant matrix into a constant-valued measurement matrix function.
pub fn constant_measurement_matrix(matrix: DMatrix<f64>) -> MeasurementMatrixFn {
    Box::new(move |_, _| matrix.clone())
}

/// The classical linear Kalman filter.
///
/// The system is modeled by (possibly time and state varying) state transition, control,
/// and measurement matrices, and the state is always propagated algebraically through
/// those matrices. Requesting numerical state propagation at construction is therefore
/// rejected instead of silently ignored.
pub struct LinearKalmanFilter {
    base: FilterBase,
    stm_fn: SystemMatrixFn,
    control_fn: SystemMatrixFn,
    measurement_fn: MeasurementMatrixFn,
}

impl LinearKalmanFilter {
    /// Initializes a linear Kalman filter from matrix-valued model functions.
    pub fn new(
        setup: FilterSetup,
        stm_fn: SystemMatrixFn,
        control_fn: SystemMatrixFn,
        measurement_fn: MeasurementMatrixFn,
    ) -> Result<Self, FilterError> {
        ensure!(
            !setup.integrate_state && setup.propagator.is_none(),
            UnsupportedStatePropagationSnafu
        );

        Ok(Self {
            base: FilterBase::from_setup(setup)?,
            stm_fn,
            control_fn,
            measurement_fn,
        })
    }

    /// Initializes a linear Kalman filter from constant model matrices.
    pub fn from_matrices(
        setup: FilterSetup,
        stm: DMatrix<f64>,
        control: DMatrix<f64>,
        measurement: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        Self::new(
            setup,
            constant_system_matrix(stm),
            constant_system_matrix(control),
            constant_measurement_matrix(measurement),
        )
    }
}

impl KalmanFilter for LinearKalmanFilter {
    fn filter_base(&self) -> &FilterBase {
        &self.base
    }

    fn filter_base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn update_filter(
        &mut self,
        time: f64,
        control: &DVector<f64>,
        measurement: &DVector<f64>,
    ) -> Result<(), FilterError> {
        let state_dim = self.base.state_estimate().len();

        // Evaluate the model at the current time and a-posteriori estimate.
        let stm = (self.stm_fn)(time, self.base.state_estimate(), control);
        let control_mat = (self.control_fn)(time, self.base.state_estimate(), control);
        let msr_mat = (self.measurement_fn)(time, self.base.state_estimate());
        let msr_dim = msr_mat.nrows();

        // Every operand is checked before the arithmetic so that a failed update leaves the
        // filter untouched.
        ensure_dimensions("state transition matrix", (state_dim, state_dim), stm.shape())?;
        ensure_dimensions("control matrix", (state_dim, control.len()), control_mat.shape())?;
        ensure_dimensions("measurement matrix", (msr_dim, state_dim), msr_mat.shape())?;
        ensure_dimensions(
            "covariance",
            (state_dim, state_dim),
            self.base.covariance_estimate().shape(),
        )?;
        ensure_dimensions(
            "system uncertainty",
            (state_dim, state_dim),
            self.base.uncertainty().system().shape(),
        )?;
        ensure_dimensions(
            "measurement uncertainty",
            (msr_dim, msr_dim),
            self.base.uncertainty().measurement().shape(),
        )?;
        ensure_dimensions("measurement", (msr_dim, 1), (measurement.len(), 1))?;

        // Prediction step.
        let state_bar = self.system_model(time, self.base.state_estimate(), control);
        let covar_bar = &stm * self.base.covariance_estimate() * stm.transpose()
            + self.base.uncertainty().system();
        let msr_estimate = &msr_mat * &state_bar;

        // Compute the Kalman gain.
        let innovation_covar = &msr_mat * &covar_bar * msr_mat.transpose()
            + self.base.uncertainty().measurement();
        let innovation_covar_inv = innovation_covar
            .try_inverse()
            .context(SingularKalmanGainSnafu)?;
        let gain = &covar_bar * msr_mat.transpose() * innovation_covar_inv;

        // Correction step, with the Joseph form for the covariance so that it stays
        // symmetric under repeated updates.
        let prefit = measurement - &msr_estimate;
        let state_hat = &state_bar + &gain * &prefit;
        let identity_minus_kh = DMatrix::<f64>::identity(state_dim, state_dim) - &gain * &msr_mat;
        let covar_hat = &identity_minus_kh * covar_bar * identity_minus_kh.transpose()
            + &gain * self.base.uncertainty().measurement() * gain.transpose();

        debug!("t={time}: prefit residual norm = {:.3e}", prefit.norm());

        self.base.commit_estimate(state_hat, covar_hat);
        Ok(())
    }

    fn system_model(
        &self,
        time: f64,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> DVector<f64> {
        (self.stm_fn)(time, state, control) * state + (self.control_fn)(time, state, control) * control
    }

    fn measurement_model(&self, time: f64, state: &DVector<f64>) -> DVector<f64> {
        (self.measurement_fn)(time, state) * state
    }
}
