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

use super::FrequencyBand;
use crate::io::{epoch_from_str, epoch_to_str, ConfigRepr};
use crate::linalg::DMatrix;
use crate::od::{
    CoefficientSigmaMismatchSnafu, EmptyCoefficientsSnafu, FrequencyModelNotImplementedSnafu,
    ODError,
};
use crate::polyfit::Polynomial;
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

/// Sigma used for parameters which are effectively unconstrained.
pub const UNCONSTRAINED_SIGMA: f64 = 1e35;

fn default_frequency_mhz() -> f64 {
    2000.0
}

fn default_sigma() -> f64 {
    UNCONSTRAINED_SIGMA
}

/// J2000 in TAI
fn default_initial_epoch() -> Epoch {
    Epoch::from_mjd_tai(51_544.5)
}

/// Functional form of the oscillator frequency.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyModel {
    #[default]
    TaylorSeries,
    FourierSeries,
}

impl fmt::Display for FrequencyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaylorSeries => write!(f, "Taylor's series"),
            Self::FourierSeries => write!(f, "Fourier series"),
        }
    }
}

/// Oscillator parameters which may be estimated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OscillatorSolveFor {
    FrequencyDrift,
    FrequencyPolynomialCoefficients,
}

/// Frequency model of a transmitting node.
///
/// # Algorithm
/// The frequency at an epoch is the Taylor series `f(t) = Σ c_k t^k` in MHz, where `t` is the number of seconds
/// elapsed since the initial epoch, offset by the frequency drift (also in seconds).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Oscillator {
    pub name: String,
    /// Nominal frequency in MHz, used as the constant coefficient if no coefficients are provided.
    #[serde(default = "default_frequency_mhz")]
    pub frequency_mhz: f64,
    #[serde(default)]
    pub frequency_band: FrequencyBand,
    /// Time offset added to the elapsed time, in seconds.
    #[serde(default)]
    pub frequency_drift_s: f64,
    #[serde(default = "default_sigma")]
    pub frequency_drift_sigma_s: f64,
    /// Coefficients by increasing power, in MHz, MHz/s, MHz/s^2, etc.
    #[serde(default)]
    pub polynomial_coefficients: Vec<f64>,
    #[serde(default)]
    pub coefficient_sigmas: Vec<f64>,
    #[serde(
        default = "default_initial_epoch",
        serialize_with = "epoch_to_str",
        deserialize_with = "epoch_from_str"
    )]
    pub initial_epoch: Epoch,
    #[serde(default)]
    pub frequency_model: FrequencyModel,
    #[serde(default)]
    pub solve_fors: Vec<OscillatorSolveFor>,
}

impl ConfigRepr for Oscillator {}

impl Oscillator {
    pub fn new<S: Into<String>>(name: S, frequency_mhz: f64, frequency_band: FrequencyBand) -> Self {
        Self {
            name: name.into(),
            frequency_mhz,
            frequency_band,
            frequency_drift_s: 0.0,
            frequency_drift_sigma_s: UNCONSTRAINED_SIGMA,
            polynomial_coefficients: Vec::new(),
            coefficient_sigmas: Vec::new(),
            initial_epoch: default_initial_epoch(),
            frequency_model: FrequencyModel::TaylorSeries,
            solve_fors: Vec::new(),
        }
    }

    /// Sets the Taylor series coefficients (MHz, MHz/s, ...) and their sigmas.
    pub fn with_coefficients(mut self, coefficients: Vec<f64>, sigmas: Vec<f64>) -> Self {
        self.polynomial_coefficients = coefficients;
        self.coefficient_sigmas = sigmas;
        self
    }

    pub fn with_drift(mut self, drift_s: f64, sigma_s: f64) -> Self {
        self.frequency_drift_s = drift_s;
        self.frequency_drift_sigma_s = sigma_s;
        self
    }

    pub fn with_initial_epoch(mut self, epoch: Epoch) -> Self {
        self.initial_epoch = epoch;
        self
    }

    pub fn with_solve_for(mut self, param: OscillatorSolveFor) -> Self {
        if !self.solve_fors.contains(&param) {
            self.solve_fors.push(param);
        }
        self
    }

    /// Validates the coefficients, defaulting to a constant frequency if none were provided.
    pub fn initialize(&mut self) -> Result<(), ODError> {
        if self.polynomial_coefficients.is_empty() && self.coefficient_sigmas.is_empty() {
            self.polynomial_coefficients = vec![self.frequency_mhz];
            self.coefficient_sigmas = vec![UNCONSTRAINED_SIGMA];
        }

        ensure!(
            self.polynomial_coefficients.len() == self.coefficient_sigmas.len(),
            CoefficientSigmaMismatchSnafu {
                name: self.name.clone(),
                coefficients: self.polynomial_coefficients.len(),
                sigmas: self.coefficient_sigmas.len(),
            }
        );

        info!(
            "{}: {} with {} coefficient(s) from {}",
            self.name,
            self.frequency_model,
            self.polynomial_coefficients.len(),
            self.initial_epoch
        );

        Ok(())
    }

    /// Seconds elapsed since the initial epoch, including the drift offset.
    pub fn elapsed_s(&self, epoch: Epoch) -> f64 {
        (epoch - self.initial_epoch).to_seconds() + self.frequency_drift_s
    }

    fn taylor_series(&self) -> Result<Polynomial, ODError> {
        ensure!(
            self.frequency_model == FrequencyModel::TaylorSeries,
            FrequencyModelNotImplementedSnafu {
                model: self.frequency_model.to_string()
            }
        );
        ensure!(
            !self.polynomial_coefficients.is_empty(),
            EmptyCoefficientsSnafu {
                name: self.name.clone()
            }
        );
        Ok(Polynomial::new(self.polynomial_coefficients.clone()))
    }

    /// Returns the frequency in MHz at the provided epoch.
    pub fn frequency_mhz_at(&self, epoch: Epoch) -> Result<f64, ODError> {
        Ok(self.taylor_series()?.eval(self.elapsed_s(epoch)))
    }

    /// Returns the partial of the frequency with respect to the frequency drift, in Hz/s.
    pub fn frequency_drift_derivative(&self, epoch: Epoch) -> Result<f64, ODError> {
        Ok(self.taylor_series()?.deriv(self.elapsed_s(epoch)) * 1e6)
    }

    /// Returns the partials of the frequency with respect to each polynomial coefficient, in Hz per coefficient unit.
    pub fn polynomial_coefficients_derivative(&self, epoch: Epoch) -> Result<Vec<f64>, ODError> {
        let series = self.taylor_series()?;
        Ok(series
            .basis(self.elapsed_s(epoch))
            .into_iter()
            .map(|partial| partial * 1e6)
            .collect())
    }

    /// Partials of the frequency with respect to the requested parameter, one entry per scalar component.
    pub fn derivative(&self, param: OscillatorSolveFor, epoch: Epoch) -> Result<Vec<f64>, ODError> {
        match param {
            OscillatorSolveFor::FrequencyDrift => Ok(vec![self.frequency_drift_derivative(epoch)?]),
            OscillatorSolveFor::FrequencyPolynomialCoefficients => {
                self.polynomial_coefficients_derivative(epoch)
            }
        }
    }

    pub fn estimation_parameter_size(&self, param: OscillatorSolveFor) -> usize {
        match param {
            OscillatorSolveFor::FrequencyDrift => 1,
            OscillatorSolveFor::FrequencyPolynomialCoefficients => {
                self.polynomial_coefficients.len()
            }
        }
    }

    /// A priori covariance of the requested parameter.
    pub fn covariance(&self, param: OscillatorSolveFor) -> DMatrix<f64> {
        match param {
            OscillatorSolveFor::FrequencyDrift => {
                DMatrix::from_element(1, 1, self.frequency_drift_sigma_s.powi(2))
            }
            OscillatorSolveFor::FrequencyPolynomialCoefficients => DMatrix::from_diagonal(
                &crate::linalg::DVector::from_iterator(
                    self.coefficient_sigmas.len(),
                    self.coefficient_sigmas.iter().map(|s| s.powi(2)),
                ),
            ),
        }
    }
}
