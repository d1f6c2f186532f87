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

use crate::linalg::DVector;
use snafu::prelude::*;
use std::sync::{Arc, Mutex};

/// The contract of an external numerical propagator used when a filter's system model
/// cannot be expressed algebraically.
///
/// A propagator owns its equations of motion and its current state; the filter layer only
/// requests propagation and forwards the result (or the failure) to its caller.
pub trait StatePropagator {
    /// Propagates the current state until `target_time` and returns the propagated state.
    ///
    /// The `initial_step` is the first (or constant) step size of the propagation, and
    /// `tolerance` defines when `target_time` is considered reached.
    fn integrate_to(
        &mut self,
        target_time: f64,
        initial_step: f64,
        tolerance: f64,
    ) -> Result<DVector<f64>, PropagationError>;
}

/// A propagator shared between the caller and one or more filters.
///
/// Propagation mutates the propagator's internal state, hence the lock: the same
/// propagator configuration may reasonably serve several filters.
pub type SharedPropagator = Arc<Mutex<dyn StatePropagator + Send>>;

/// Convenience to wrap a propagator into a [SharedPropagator].
pub fn share_propagator<P: StatePropagator + Send + 'static>(propagator: P) -> SharedPropagator {
    Arc::new(Mutex::new(propagator))
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum PropagationError {
    #[snafu(display("propagation did not converge after {attempts} attempts"))]
    DidNotConverge { attempts: u32 },
    #[snafu(display("invalid step size: {step}"))]
    StepSizeError { step: f64 },
    #[snafu(display("propagation failed because {reason}"))]
    PropagationFailed { reason: String },
}
