/*
    Nyx, blazing fast astrodynamics
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

use super::{Stochastics, WhiteNoise};
use crate::io::{epochs_from_str, epochs_to_str, ConfigRepr};
use crate::linalg::DMatrix;
use crate::od::adapter::AdapterSettings;
use crate::od::msr::{DerivativeTable, MeasurementSample, MeasurementType};
use crate::od::{ConflictingBiasSolveForsSnafu, InvalidErrorModelSnafu, ODError};
use crate::time::Epoch;
use rand_pcg::Pcg64Mcg;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use typed_builder::TypedBuilder;

fn default_noise_sigma() -> f64 {
    103.0
}

fn default_bias_sigma() -> f64 {
    1e70
}

/// Error model parameters which may be estimated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiasSolveFor {
    Bias,
    PassBiases,
}

/// How the bias is injected in simulated measurements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BiasKind {
    /// A single bias for all measurements
    Constant,
    /// One bias per tracking pass
    Pass,
}

/// The noise and bias actually added to a measurement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InjectedErrors {
    /// Noise sample added to each signal path, empty if no noise was added
    pub noise: Vec<f64>,
    /// Bias added to each signal path, zero if no bias was added
    pub bias: f64,
}

/// Measurement error model of a tracking strand for a given measurement type.
///
/// All values are in the unit of the measurement type, e.g. Hz for relay Doppler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct ErrorModel {
    pub measurement_type: MeasurementType,
    /// Participants of the strand this error model applies to
    #[builder(default)]
    #[serde(default)]
    pub participants: Vec<String>,
    #[builder(default = default_noise_sigma())]
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,
    #[builder(default)]
    #[serde(default)]
    pub bias: f64,
    #[builder(default = default_bias_sigma())]
    #[serde(default = "default_bias_sigma")]
    pub bias_sigma: f64,
    /// One bias per pass; if empty, the constant bias is the only pass bias.
    #[builder(default)]
    #[serde(default)]
    pub pass_biases: Vec<f64>,
    /// Start epoch of each pass, in increasing order.
    #[builder(default)]
    #[serde(
        default,
        serialize_with = "epochs_to_str",
        deserialize_with = "epochs_from_str"
    )]
    pub pass_start_epochs: Vec<Epoch>,
    #[builder(default)]
    #[serde(default)]
    pub solve_fors: Vec<BiasSolveFor>,
}

impl ConfigRepr for ErrorModel {}

impl ErrorModel {
    /// Builds an error model with default values for the provided measurement type.
    pub fn from_type(measurement_type: MeasurementType) -> Self {
        Self::builder().measurement_type(measurement_type).build()
    }

    pub fn validate(&self) -> Result<(), ODError> {
        ensure!(
            !(self.solve_fors.contains(&BiasSolveFor::Bias)
                && self.solve_fors.contains(&BiasSolveFor::PassBiases)),
            ConflictingBiasSolveForsSnafu {
                msr_type: self.measurement_type.name()
            }
        );
        ensure!(
            self.noise_sigma.is_finite() && self.noise_sigma >= 0.0,
            InvalidErrorModelSnafu {
                msr_type: self.measurement_type.name(),
                details: format!("noise sigma must be non-negative, got {}", self.noise_sigma),
            }
        );
        ensure!(
            self.pass_start_epochs.is_empty()
                || self.pass_start_epochs.len() == self.pass_biases().len(),
            InvalidErrorModelSnafu {
                msr_type: self.measurement_type.name(),
                details: format!(
                    "{} pass start epochs for {} pass biases",
                    self.pass_start_epochs.len(),
                    self.pass_biases().len()
                ),
            }
        );
        ensure!(
            self.pass_start_epochs.windows(2).all(|w| w[0] <= w[1]),
            InvalidErrorModelSnafu {
                msr_type: self.measurement_type.name(),
                details: "pass start epochs must be sorted",
            }
        );
        Ok(())
    }

    pub fn bias_kind(&self) -> BiasKind {
        if self.solve_fors.contains(&BiasSolveFor::PassBiases) {
            BiasKind::Pass
        } else {
            BiasKind::Constant
        }
    }

    /// Returns the pass biases, which is the constant bias if none were set.
    pub fn pass_biases(&self) -> Vec<f64> {
        if self.pass_biases.is_empty() {
            vec![self.bias]
        } else {
            self.pass_biases.clone()
        }
    }

    /// Returns the index of the pass containing this epoch, i.e. `start[i] <= epoch < start[i+1]`, or the last pass.
    pub fn pass_number(&self, epoch: Epoch) -> usize {
        let starts = &self.pass_start_epochs;
        if starts.is_empty() {
            return 0;
        }
        for (i, window) in starts.windows(2).enumerate() {
            if window[0] <= epoch && epoch < window[1] {
                return i;
            }
        }
        starts.len() - 1
    }

    pub fn pass_bias(&self, epoch: Epoch) -> f64 {
        self.pass_biases()
            .get(self.pass_number(epoch))
            .copied()
            .unwrap_or(self.bias)
    }

    pub fn white_noise(&self) -> WhiteNoise {
        WhiteNoise::constant_white_noise(self.noise_sigma)
    }

    /// Measurement error covariance of a measurement with `signal_paths` values.
    pub fn covariance(&self, signal_paths: usize) -> DMatrix<f64> {
        DMatrix::from_diagonal_element(signal_paths, signal_paths, self.noise_sigma.powi(2))
    }

    pub fn estimation_parameter_size(&self, param: BiasSolveFor) -> usize {
        match param {
            BiasSolveFor::Bias => 1,
            BiasSolveFor::PassBiases => self.pass_biases().len(),
        }
    }

    /// Returns whether this error model is the one of a measurement of type `msr_type` between these participants.
    pub fn applies_to(&self, msr_type: MeasurementType, participants: &[String]) -> bool {
        self.measurement_type == msr_type
            && !self.participants.is_empty()
            && self
                .participants
                .iter()
                .all(|name| participants.contains(name))
    }

    /// Partials of the measurement with respect to the constant bias.
    pub fn bias_derivative(&self, signal_paths: usize) -> DerivativeTable {
        DerivativeTable::new(vec![vec![1.0]; signal_paths])
    }

    /// Partials of the measurement with respect to every pass bias: only the bias of the pass containing the epoch contributes.
    pub fn pass_bias_derivative(&self, signal_paths: usize, epoch: Epoch) -> DerivativeTable {
        let mut row = vec![0.0; self.pass_biases().len()];
        let last = row.len().saturating_sub(1);
        if let Some(slot) = row.get_mut(self.pass_number(epoch).min(last)) {
            *slot = 1.0;
        }
        DerivativeTable::new(vec![row; signal_paths])
    }

    /// Attaches the covariance to the sample and, if enabled and the sample is feasible, adds the noise and then the bias.
    pub fn corrupt(
        &self,
        sample: &mut MeasurementSample,
        settings: &AdapterSettings,
        rng: Option<&mut Pcg64Mcg>,
    ) -> InjectedErrors {
        let mut injected = InjectedErrors::default();
        sample.covariance = Some(self.covariance(sample.signal_paths()));

        if settings.range_only || !sample.is_feasible {
            return injected;
        }

        if settings.add_noise {
            if rng.is_none() {
                warn!(
                    "{} noise enabled but no random number generator provided @ {}",
                    self.measurement_type, sample.epoch
                );
            }
            if let Some(rng) = rng {
                let mut white_noise = self.white_noise();
                for (value, correction) in sample.value.iter_mut().zip(sample.correction.iter_mut()) {
                    let noise = white_noise.sample(sample.epoch, rng);
                    *value += noise;
                    *correction += noise;
                    injected.noise.push(noise);
                }
            }
        }

        // Bias after the noise so that it does not carry any noise.
        if settings.add_bias {
            let bias = match self.bias_kind() {
                BiasKind::Pass => self.pass_bias(sample.epoch),
                BiasKind::Constant => self.bias,
            };
            for (value, correction) in sample.value.iter_mut().zip(sample.correction.iter_mut()) {
                *value += bias;
                *correction += bias;
            }
            injected.bias = bias;
        }

        debug!(
            "{} @ {}: injected noise {:?} and bias {}",
            self.measurement_type, sample.epoch, injected.noise, injected.bias
        );

        injected
    }
}
