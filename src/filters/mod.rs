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

use crate::linalg::{DMatrix, DVector};
use crate::propagators::PropagationError;
use snafu::prelude::*;

mod base;
pub use base::{FilterBase, FilterSetup, UncertaintyModel};

pub mod linear;
pub use linear::LinearKalmanFilter;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FilterError {
    #[snafu(display("the {which} uncertainty matrix must be square, got {rows}x{cols}"))]
    NonSquareUncertainty {
        which: &'static str,
        rows: usize,
        cols: usize,
    },
    #[snafu(display("state propagation is not supported by this filter"))]
    UnsupportedStatePropagation,
    #[snafu(display("state propagation requested but no propagator was provided"))]
    PropagatorNotConfigured,
    #[snafu(display("the shared state propagator lock is poisoned"))]
    PropagatorPoisoned,
    #[snafu(display("incompatible dimensions for the {operation}: expected {expected}, got {got}"))]
    DimensionMismatch {
        operation: &'static str,
        expected: String,
        got: String,
    },
    #[snafu(display("Kalman gain is singular"))]
    SingularKalmanGain,
    #[snafu(display("during state propagation, encountered {source}"))]
    Propagation { source: PropagationError },
}

/// The contract of every sequential filter variant.
///
/// The provided methods implement the bookkeeping that every variant shares, routed through
/// [KalmanFilter::filter_base]. Implementors supply the predict/correct arithmetic in
/// [KalmanFilter::update_filter] and bind their own model representation through
/// [KalmanFilter::system_model] and [KalmanFilter::measurement_model].
///
/// A filter instance is single-writer: it must not be updated concurrently from several
/// threads, and updates must be fed in strictly increasing time order.
pub trait KalmanFilter {
    /// Returns the bookkeeping shared by all filter variants.
    fn filter_base(&self) -> &FilterBase;

    /// Returns the mutable bookkeeping shared by all filter variants.
    fn filter_base_mut(&mut self) -> &mut FilterBase;

    /// Ingests one synchronous time step: predicts the a-priori estimate from the system
    /// model, then corrects it with the provided measurement.
    ///
    /// On success, the a-posteriori state and covariance are replaced and exactly one entry
    /// is appended to each estimate history. On error, the filter is left untouched, and no
    /// further updates should be fed.
    fn update_filter(
        &mut self,
        time: f64,
        control: &DVector<f64>,
        measurement: &DVector<f64>,
    ) -> Result<(), FilterError>;

    /// Evaluates the system model, returning the estimated state at `time` given the
    /// provided state and control input.
    fn system_model(&self, time: f64, state: &DVector<f64>, control: &DVector<f64>)
        -> DVector<f64>;

    /// Evaluates the measurement model, returning the estimated measurement at `time` given
    /// the provided state.
    fn measurement_model(&self, time: f64, state: &DVector<f64>) -> DVector<f64>;

    /// Returns the current a-posteriori state estimate.
    fn current_state_estimate(&self) -> &DVector<f64> {
        self.filter_base().state_estimate()
    }

    /// Returns the current a-posteriori covariance estimate.
    fn current_covariance_estimate(&self) -> &DMatrix<f64> {
        self.filter_base().covariance_estimate()
    }

    /// Returns the history of a-posteriori state estimates, in update order.
    fn estimated_state_history(&self) -> &[DVector<f64>] {
        self.filter_base().state_history()
    }

    /// Returns the history of a-posteriori covariance estimates, in update order.
    fn estimated_covariance_history(&self) -> &[DMatrix<f64>] {
        self.filter_base().covariance_history()
    }

    /// Returns the histories of the produced system and measurement noise, as a pair.
    fn noise_history(&self) -> (&[DVector<f64>], &[DVector<f64>]) {
        (
            self.filter_base().system_noise_history(),
            self.filter_base().measurement_noise_history(),
        )
    }

    /// Draws one system noise vector for simulation purposes and records it.
    fn produce_system_noise(&mut self) -> DVector<f64> {
        self.filter_base_mut().produce_system_noise()
    }

    /// Draws one measurement noise vector for simulation purposes and records it.
    fn produce_measurement_noise(&mut self) -> DVector<f64> {
        self.filter_base_mut().produce_measurement_noise()
    }

    /// Propagates the current state to `target_time` through the external propagator.
    ///
    /// The final time tolerance defaults to the machine epsilon when `None`. Any propagator
    /// failure is surfaced unchanged as the source of [FilterError::Propagation].
    fn integrate_state(
        &mut self,
        target_time: f64,
        initial_step: f64,
        tolerance: Option<f64>,
    ) -> Result<DVector<f64>, FilterError> {
        self.filter_base_mut()
            .integrate_state(target_time, initial_step, tolerance)
    }
}

/// Checks that an operand matches its expected shape before it enters the filter arithmetic.
pub(crate) fn ensure_dimensions(
    operation: &'static str,
    expected: (usize, usize),
    got: (usize, usize),
) -> Result<(), FilterError> {
    ensure!(
        expected == got,
        DimensionMismatchSnafu {
            operation,
            expected: format!("{}x{}", expected.0, expected.1),
            got: format!("{}x{}", got.0, got.1),
        }
    );
    Ok(())
}
