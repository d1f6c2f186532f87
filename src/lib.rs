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

/*! # sequest

Sequential estimation for dynamical systems: a recursive Bayesian (Kalman) filter family
with pluggable system models, deterministic synthetic noise generation for simulation
studies, and delegation of nonlinear state propagation to an external numerical propagator.
*/

/// Provides the sequential filter contract, its shared bookkeeping, and the linear Kalman filter.
pub mod filters;

/// Provides deterministic Gaussian noise generation for simulation studies.
pub mod noise;

/// Provides the boundary to the external numerical propagators.
pub mod propagators;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub mod prelude {
    pub use crate::filters::linear::*;
    pub use crate::filters::*;
    pub use crate::linalg::{DMatrix, DVector};
    pub use crate::noise::*;
    pub use crate::propagators::*;
}
