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

use crate::od::ephemeris::EphemerisProvider;
use crate::od::hardware::{FrequencyBand, Oscillator, OscillatorSolveFor};
use crate::od::msr::{
    DerivativeTable, MeasurementSample, MeasurementType, Observation, RampRecord,
};
use crate::od::noise::{BiasSolveFor, ErrorModel};
use crate::od::ODError;
use crate::time::{Duration, Epoch};
use rand_pcg::Pcg64Mcg;
use serde_derive::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use typed_builder::TypedBuilder;

mod config;
mod differenced;
mod geometric;
mod relay_doppler;

pub use config::{DifferencedDopplerConfig, RelayDopplerConfig};
pub use differenced::{DifferencedCallContext, DifferencedDopplerAdapter};
pub use geometric::GeometricRangeAdapter;
pub use relay_doppler::{RelayCallContext, RelayCombination, RelayDopplerAdapter, RelayPaths};

/// Toggles of a tracking adapter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct AdapterSettings {
    #[builder(default)]
    #[serde(default)]
    pub add_noise: bool,
    #[builder(default)]
    #[serde(default)]
    pub add_bias: bool,
    /// Only compute the range, without any noise or bias
    #[builder(default)]
    #[serde(default)]
    pub range_only: bool,
    #[builder(default)]
    #[serde(default)]
    pub with_media_correction: bool,
}

/// A parameter with respect to which measurement partials are requested.
#[derive(Copy, Clone, Debug)]
pub enum SolveFor<'a> {
    /// Constant bias of an error model
    Bias(&'a ErrorModel),
    /// Pass biases of an error model
    PassBiases(&'a ErrorModel),
    /// Frequency drift of an oscillator
    FrequencyDrift(&'a Oscillator),
    /// Polynomial coefficients of an oscillator
    FrequencyPolynomialCoefficients(&'a Oscillator),
    /// Position of the named object
    Position(&'a str),
    /// Velocity of the named object
    Velocity(&'a str),
    /// Position and velocity of the named object
    CartesianX(&'a str),
    /// Any other parameter, attached to a signal path
    Other {
        object: &'a str,
        parameter: &'a str,
        size: usize,
    },
}

impl<'a> SolveFor<'a> {
    pub fn parameter(&self) -> &'a str {
        match self {
            Self::Bias(_) => "Bias",
            Self::PassBiases(_) => "PassBiases",
            Self::FrequencyDrift(_) => "FrequencyDrift",
            Self::FrequencyPolynomialCoefficients(_) => "FrequencyPolynomialCoefficients",
            Self::Position(_) => "Position",
            Self::Velocity(_) => "Velocity",
            Self::CartesianX(_) => "CartesianX",
            Self::Other { parameter, .. } => *parameter,
        }
    }

    /// Number of scalar components of this parameter, i.e. the number of columns of its partials.
    pub fn size(&self) -> usize {
        match self {
            Self::Bias(em) => em.estimation_parameter_size(BiasSolveFor::Bias),
            Self::PassBiases(em) => em.estimation_parameter_size(BiasSolveFor::PassBiases),
            Self::FrequencyDrift(osc) => {
                osc.estimation_parameter_size(OscillatorSolveFor::FrequencyDrift)
            }
            Self::FrequencyPolynomialCoefficients(osc) => {
                osc.estimation_parameter_size(OscillatorSolveFor::FrequencyPolynomialCoefficients)
            }
            Self::Position(_) | Self::Velocity(_) => 3,
            Self::CartesianX(_) => 6,
            Self::Other { size, .. } => *size,
        }
    }

    /// Returns true for the position and velocity parameters, whose partials are combined across signal paths.
    pub fn is_geometric(&self) -> bool {
        matches!(self, Self::Position(_) | Self::Velocity(_) | Self::CartesianX(_))
    }
}

/// A tracking adapter computes a measurement along one or more signal paths, and its partials.
///
/// Primitive adapters compute the range along a single path, while composite adapters combine the
/// measurements of the adapters they own. Adapters are not reentrant: computing the partials uses
/// the state of the last measurement computation.
pub trait TrackingAdapter: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn measurement_type(&self) -> MeasurementType;

    /// Participants of this measurement, in signal order.
    fn participants(&self) -> &[String];

    /// Validates the configuration. Must be called once before any measurement.
    fn initialize(&mut self) -> Result<(), ODError>;

    /// Sets which participant supplies the measurement time tag.
    fn set_measurement_participant(&mut self, index: usize);

    fn set_ephemeris(&mut self, ephemeris: Arc<dyn EphemerisProvider>);

    /// Sets the current epoch of the space object participants, used when simulating.
    fn set_simulation_epoch(&mut self, epoch: Epoch);

    /// Computes the measurement, either for the provided tracking data record or, if None, for simulation.
    ///
    /// Noise is only sampled if a generator is provided.
    fn calculate_measurement(
        &mut self,
        with_events: bool,
        observation: Option<&Observation>,
        ramp_table: Option<&[RampRecord]>,
        for_simulation: bool,
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<MeasurementSample, ODError>;

    /// Computes the partials of the last measurement with respect to the parameter.
    ///
    /// Range adapters return their partials in km per parameter unit, regardless of their multiplier factor.
    fn calculate_measurement_derivatives(
        &mut self,
        wrt: &SolveFor<'_>,
    ) -> Result<DerivativeTable, ODError>;

    /// Returns the last computed measurement.
    fn measurement(&self) -> Option<&MeasurementSample>;

    fn settings(&self) -> AdapterSettings;

    fn add_noise(&mut self, enabled: bool);

    fn add_bias(&mut self, enabled: bool);

    fn set_range_only(&mut self, enabled: bool);

    fn add_media_correction(&mut self, enabled: bool);

    /// Factor applied to the range in km to obtain the value of this adapter.
    fn multiplier_factor(&self) -> f64;

    fn iono_correction(&self) -> f64;

    fn tropo_correction(&self) -> f64;

    /// Sets the Doppler count interval: the adapter is evaluated this long before the time tag.
    fn set_count_interval(&mut self, interval: Duration);

    /// Transmit frequency in MHz of the node which owns the frequency model of this signal path.
    fn transmit_frequency_mhz(&self, epoch: Epoch) -> Result<f64, ODError>;

    fn transmit_frequency_band(&self) -> Result<FrequencyBand, ODError>;

    /// Deep copy of this adapter, including any adapter it owns.
    fn clone_box(&self) -> Box<dyn TrackingAdapter>;
}

impl Clone for Box<dyn TrackingAdapter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
