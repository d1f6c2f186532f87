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
use rand::Rng;
use rand_distr::Normal;
use rand_pcg::Pcg64Mcg;
use serde_derive::{Deserialize, Serialize};

/// Default seed of the process noise generators.
pub const DEFAULT_SYSTEM_NOISE_SEED: u128 = 12345;

/// Default seed of the measurement noise generators.
///
/// Distinct from [DEFAULT_SYSTEM_NOISE_SEED] so that the process and measurement noise
/// streams of a filter are statistically independent while remaining reproducible.
pub const DEFAULT_MEASUREMENT_NOISE_SEED: u128 = 54321;

/// A Gaussian random variable, zero-mean by default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GaussianNoise {
    /// Mean value of this noise
    pub mean: f64,
    /// One-sigma of the Normal distribution.
    pub sigma: f64,
}

impl GaussianNoise {
    /// Initializes a new zero-mean Gaussian noise with the provided standard deviation.
    pub fn zero_mean(sigma: f64) -> Self {
        Self {
            sigma,
            ..Default::default()
        }
    }

    /// Returns a new sample of this random variable.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.sample(Normal::new(self.mean, self.sigma).unwrap())
    }
}

/// A bank of independent Gaussian samplers, one per dimension of an uncertainty matrix,
/// driven by a single deterministically seeded PRNG.
///
/// Used to perturb synthetic truth models when exercising a filter in simulation. Every
/// draw is recorded in an owned history, in chronological order.
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    samplers: Vec<GaussianNoise>,
    rng: Pcg64Mcg,
    history: Vec<DVector<f64>>,
}

impl NoiseGenerator {
    /// Builds one zero-mean sampler per dimension of the provided uncertainty matrix, each
    /// using its diagonal entry as the standard deviation of that dimension.
    ///
    /// The diagonal entries must be non-negative: sampling a dimension whose entry is
    /// negative will panic.
    pub fn from_diagonal(uncertainty: &DMatrix<f64>, seed: u128) -> Self {
        let samplers: Vec<GaussianNoise> = (0..uncertainty.nrows())
            .map(|i| GaussianNoise::zero_mean(uncertainty[(i, i)]))
            .collect();

        for (i, sampler) in samplers.iter().enumerate() {
            if sampler.sigma < 0.0 {
                warn!(
                    "uncertainty diagonal entry ({i}, {i}) = {} is negative, sampling this dimension will panic",
                    sampler.sigma
                );
            }
        }

        Self {
            samplers,
            rng: Pcg64Mcg::new(seed),
            history: Vec::new(),
        }
    }

    /// Dimension of the produced noise vectors.
    pub fn dim(&self) -> usize {
        self.samplers.len()
    }

    /// Draws one vector whose components are independent samples of their dimension's
    /// distribution, and appends that draw to the history.
    pub fn produce(&mut self) -> DVector<f64> {
        let mut noise = DVector::zeros(self.samplers.len());
        for (i, sampler) in self.samplers.iter().enumerate() {
            noise[i] = sampler.sample(&mut self.rng);
        }

        self.history.push(noise.clone());
        noise
    }

    /// All draws produced so far, in chronological order.
    pub fn history(&self) -> &[DVector<f64>] {
        &self.history
    }
}
