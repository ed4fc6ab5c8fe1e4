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

use crate::io::ConfigError;
use crate::od::hardware::FrequencyBand;
use crate::od::relay::ServiceAccess;
use crate::time::{Duration, Epoch};
use snafu::prelude::Snafu;

/// Provides the tracking adapters: the primitive adapter interface, the geometric range adapter, and the relay and differenced composites.
pub mod adapter;

/// Provides the ephemeris interface consumed by the adapters.
pub mod ephemeris;

/// Provides the frequency bands and the oscillator frequency model.
pub mod hardware;

/// Provides the measurement types, samples, observations and derivative tables.
pub mod msr;

/// Provides noise modeling and the measurement error model.
pub mod noise;

/// Provides the relay satellite domain data: service access, frequency parameters, multipliers and pilot frequencies.
pub mod relay;

/// Provides the functionality to simulate relay measurements over a schedule of epochs.
pub mod simulator;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::adapter::*;
    pub use super::ephemeris::*;
    pub use super::hardware::*;
    pub use super::msr::*;
    pub use super::noise::{ErrorModel, Stochastics, WhiteNoise};
    pub use super::relay::*;
    pub use super::simulator::*;
    pub use super::ODError;
    pub use crate::io::ConfigRepr;

    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ODError {
    #[snafu(display("Doppler count interval must be strictly positive, got {interval}"))]
    InvalidCountInterval { interval: Duration },
    #[snafu(display("node frequency must be strictly positive, got {frequency_mhz} MHz"))]
    InvalidNodeFrequency { frequency_mhz: f64 },
    #[snafu(display("frequency band {band} is not specified for {action}"))]
    UnsupportedBand {
        band: FrequencyBand,
        action: &'static str,
    },
    #[snafu(display("no service access is specified for {adapter}, add at least one to its list"))]
    NoServiceAccess { adapter: String },
    #[snafu(display("service access index {index} out of range for {len} candidates"))]
    ServiceAccessIndex { index: usize, len: usize },
    #[snafu(display("unknown service access `{name}`"))]
    UnknownServiceAccess { name: String },
    #[snafu(display("invalid data flag {data_flag} for {service} pilot frequency"))]
    InvalidDataFlag {
        data_flag: u8,
        service: ServiceAccess,
    },
    #[snafu(display("no pilot frequency for service {service} in band {band}"))]
    PilotFrequencyUndefined {
        service: ServiceAccess,
        band: FrequencyBand,
    },
    #[snafu(display("{adapter}: {details}"))]
    DerivativeSize { adapter: String, details: String },
    #[snafu(display("measurement derivative data was requested for {adapter} before the measurement was set"))]
    MeasurementNotSet { adapter: String },
    #[snafu(display("{adapter} cannot provide {parameter} derivatives: {reason}"))]
    DerivativesUnavailable {
        adapter: String,
        parameter: String,
        reason: &'static str,
    },
    #[snafu(display("{adapter} has {found} signal paths in {path} but expected {expected}"))]
    SignalPathMismatch {
        adapter: String,
        path: &'static str,
        expected: usize,
        found: usize,
    },
    #[snafu(display("{adapter} has no ephemeris attached"))]
    MissingEphemeris { adapter: String },
    #[snafu(display("{adapter} has no simulation epoch, set one before simulating"))]
    NoSimulationEpoch { adapter: String },
    #[snafu(display("{adapter} has no frequency model attached to its transmitter"))]
    MissingFrequencyModel { adapter: String },
    #[snafu(display("observation @ {epoch} is missing {field}"))]
    MissingObservationField { epoch: Epoch, field: &'static str },
    #[snafu(display("failed to initialize {adapter} because {source}"))]
    ChildInitialization {
        adapter: String,
        #[snafu(source(from(ODError, Box::new)))]
        source: Box<ODError>,
    },
    #[snafu(display("{adapter} was not initialized"))]
    NotInitialized { adapter: String },
    #[snafu(display("{name}: {coefficients} polynomial coefficients but {sigmas} sigmas"))]
    CoefficientSigmaMismatch {
        name: String,
        coefficients: usize,
        sigmas: usize,
    },
    #[snafu(display("{name} has no polynomial coefficients"))]
    EmptyCoefficients { name: String },
    #[snafu(display("frequency model {model} is not implemented"))]
    FrequencyModelNotImplemented { model: String },
    #[snafu(display("error model for {msr_type} cannot solve for both Bias and PassBiases"))]
    ConflictingBiasSolveFors { msr_type: String },
    #[snafu(display("error model for {msr_type} is invalid: {details}"))]
    InvalidErrorModel { msr_type: String, details: String },
    #[snafu(display("measurement failed because {source}"))]
    ODConfigError { source: ConfigError },
}
