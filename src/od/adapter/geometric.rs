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

use super::config::invalid_config;
use super::{AdapterSettings, SolveFor, TrackingAdapter};
use crate::linalg::Vector3;
use crate::od::ephemeris::EphemerisProvider;
use crate::od::hardware::{FrequencyBand, Oscillator};
use crate::od::msr::{
    DerivativeTable, MeasurementSample, MeasurementType, Observation, RampRecord,
    UnfeasibleReason,
};
use crate::od::noise::ErrorModel;
use crate::od::{
    DerivativesUnavailableSnafu, MeasurementNotSetSnafu, MissingEphemerisSnafu,
    MissingFrequencyModelSnafu, NoSimulationEpochSnafu, NotInitializedSnafu, ODError,
};
use crate::time::{Duration, Epoch};
use rand_pcg::Pcg64Mcg;
use snafu::{ensure, OptionExt};
use std::sync::Arc;

/// Earth equatorial radius in km, used as the default occulting body.
const EARTH_RADIUS_KM: f64 = 6378.1363;

/// Instantaneous geometric range along a signal path, e.g. ground station to relay to spacecraft.
///
/// # Algorithm
/// The range is the sum of the leg lengths between consecutive participants, all evaluated at the
/// time tag minus the count interval. A leg passing through the central body sphere blocks the path.
/// The velocity partials follow from extrapolating the state linearly over the count interval.
#[derive(Clone, Debug)]
pub struct GeometricRangeAdapter {
    name: String,
    path: Vec<String>,
    settings: AdapterSettings,
    measurement_participant: usize,
    count_interval: Duration,
    multiplier_factor: f64,
    body_radius_km: f64,
    iono_correction_km: f64,
    tropo_correction_km: f64,
    error_model: Option<ErrorModel>,
    transmitter: Option<Oscillator>,
    ephemeris: Option<Arc<dyn EphemerisProvider>>,
    simulation_epoch: Option<Epoch>,
    initialized: bool,
    last: Option<Evaluation>,
}

#[derive(Clone, Debug)]
struct Evaluation {
    sample: MeasurementSample,
    /// Positions along the path, empty if outside of the ephemeris coverage
    positions: Vec<Vector3<f64>>,
    shift_s: f64,
}

impl GeometricRangeAdapter {
    pub fn new<S: Into<String>>(name: S, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path,
            settings: AdapterSettings::default(),
            measurement_participant: 0,
            count_interval: Duration::ZERO,
            multiplier_factor: 1.0,
            body_radius_km: EARTH_RADIUS_KM,
            iono_correction_km: 0.0,
            tropo_correction_km: 0.0,
            error_model: None,
            transmitter: None,
            ephemeris: None,
            simulation_epoch: None,
            initialized: false,
            last: None,
        }
    }

    pub fn with_multiplier_factor(mut self, factor: f64) -> Self {
        self.multiplier_factor = factor;
        self
    }

    pub fn with_body_radius(mut self, radius_km: f64) -> Self {
        self.body_radius_km = radius_km;
        self
    }

    /// Sets the ionospheric and tropospheric delays of this path, in km, applied when media corrections are enabled.
    pub fn with_media(mut self, iono_km: f64, tropo_km: f64) -> Self {
        self.iono_correction_km = iono_km;
        self.tropo_correction_km = tropo_km;
        self
    }

    pub fn with_error_model(mut self, error_model: ErrorModel) -> Self {
        self.error_model = Some(error_model);
        self
    }

    /// Attaches the frequency model of the transmitting node of this path.
    pub fn with_transmitter(mut self, oscillator: Oscillator) -> Self {
        self.transmitter = Some(oscillator);
        self
    }

    pub fn with_ephemeris(mut self, ephemeris: Arc<dyn EphemerisProvider>) -> Self {
        self.ephemeris = Some(ephemeris);
        self
    }

    pub fn count_interval(&self) -> Duration {
        self.count_interval
    }

    /// Partial of the range with respect to the position of the object, at the last evaluation.
    fn position_partial(&self, object: &str, positions: &[Vector3<f64>]) -> Vector3<f64> {
        let mut partial = Vector3::zeros();
        for (i, leg) in positions.windows(2).enumerate() {
            let los = leg[1] - leg[0];
            let range = los.norm();
            if range <= f64::EPSILON {
                continue;
            }
            let unit = los / range;
            if self.path[i + 1] == object {
                partial += unit;
            }
            if self.path[i] == object {
                partial -= unit;
            }
        }
        partial
    }
}

/// Distance from the origin to the closest point of the segment between a and b.
fn segment_clearance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON {
        return a.norm();
    }
    let t = (-a.dot(&ab) / len2).clamp(0.0, 1.0);
    (a + ab * t).norm()
}

impl TrackingAdapter for GeometricRangeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measurement_type(&self) -> MeasurementType {
        MeasurementType::Range
    }

    fn participants(&self) -> &[String] {
        &self.path
    }

    fn initialize(&mut self) -> Result<(), ODError> {
        if self.path.len() < 2 {
            return Err(invalid_config(format!(
                "{} needs at least two participants, got {:?}",
                self.name, self.path
            )));
        }
        if let Some(oscillator) = self.transmitter.as_mut() {
            oscillator.initialize()?;
        }
        if let Some(error_model) = &self.error_model {
            error_model.validate()?;
        }
        self.initialized = true;
        debug!("{} initialized along {}", self.name, self.path.join(" -> "));
        Ok(())
    }

    fn set_measurement_participant(&mut self, index: usize) {
        self.measurement_participant = index;
    }

    fn set_ephemeris(&mut self, ephemeris: Arc<dyn EphemerisProvider>) {
        self.ephemeris = Some(ephemeris);
    }

    fn set_simulation_epoch(&mut self, epoch: Epoch) {
        self.simulation_epoch = Some(epoch);
    }

    fn calculate_measurement(
        &mut self,
        _with_events: bool,
        observation: Option<&Observation>,
        _ramp_table: Option<&[RampRecord]>,
        _for_simulation: bool,
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<MeasurementSample, ODError> {
        self.last = None;
        ensure!(
            self.initialized,
            NotInitializedSnafu {
                adapter: &self.name
            }
        );
        let epoch = match observation {
            Some(obs) => obs.epoch,
            None => self.simulation_epoch.context(NoSimulationEpochSnafu {
                adapter: &self.name,
            })?,
        };
        let ephemeris = self.ephemeris.as_ref().context(MissingEphemerisSnafu {
            adapter: &self.name,
        })?;

        let shift_s = self.count_interval.to_seconds();
        let eval_epoch = epoch - self.count_interval;

        let positions = self
            .path
            .iter()
            .map(|object| ephemeris.position(object, eval_epoch))
            .collect::<Option<Vec<Vector3<f64>>>>();

        let Some(positions) = positions else {
            warn!("{} @ {eval_epoch}: no ephemeris for all of {:?}", self.name, self.path);
            let mut sample = MeasurementSample::infeasible(
                MeasurementType::Range,
                epoch,
                UnfeasibleReason::EphemerisGap,
            );
            sample.value = vec![0.0];
            sample.correction = vec![0.0];
            self.last = Some(Evaluation {
                sample: sample.clone(),
                positions: Vec::new(),
                shift_s,
            });
            return Ok(sample);
        };

        let mut range_km = 0.0;
        let mut min_clearance_km = f64::INFINITY;
        for leg in positions.windows(2) {
            range_km += (leg[1] - leg[0]).norm();
            min_clearance_km =
                min_clearance_km.min(segment_clearance(&leg[0], &leg[1]) - self.body_radius_km);
        }

        let (iono_km, tropo_km) = if self.settings.with_media_correction {
            (self.iono_correction_km, self.tropo_correction_km)
        } else {
            (0.0, 0.0)
        };

        let mut sample = MeasurementSample::new(MeasurementType::Range, epoch);
        sample.value = vec![self.multiplier_factor * (range_km + iono_km + tropo_km)];
        sample.correction = vec![self.multiplier_factor * (iono_km + tropo_km)];
        sample.iono_correction = iono_km;
        sample.tropo_correction = tropo_km;
        sample.feasibility_value = min_clearance_km;
        if min_clearance_km < 0.0 {
            sample.is_feasible = false;
            sample.unfeasible_reason = UnfeasibleReason::Blocked;
        }

        if let Some(error_model) = &self.error_model {
            if error_model.measurement_type == MeasurementType::Range {
                error_model.corrupt(&mut sample, &self.settings, rng);
            }
        }

        trace!("{} @ {eval_epoch}: {range_km:.6} km", self.name);

        self.last = Some(Evaluation {
            sample: sample.clone(),
            positions,
            shift_s,
        });

        Ok(sample)
    }

    fn calculate_measurement_derivatives(
        &mut self,
        wrt: &SolveFor<'_>,
    ) -> Result<DerivativeTable, ODError> {
        let last = self.last.as_ref().context(MeasurementNotSetSnafu {
            adapter: &self.name,
        })?;
        let rows = last.sample.signal_paths().max(1);

        match wrt {
            SolveFor::Bias(error_model) => {
                if error_model.applies_to(MeasurementType::Range, &self.path) {
                    Ok(error_model.bias_derivative(rows))
                } else {
                    Ok(DerivativeTable::zeros(rows, wrt.size()))
                }
            }
            SolveFor::PassBiases(error_model) => {
                if error_model.measurement_type == MeasurementType::Range {
                    Ok(error_model.pass_bias_derivative(rows, last.sample.epoch))
                } else {
                    Ok(DerivativeTable::zeros(rows, wrt.size()))
                }
            }
            SolveFor::FrequencyDrift(_)
            | SolveFor::FrequencyPolynomialCoefficients(_)
            | SolveFor::Other { .. } => Ok(DerivativeTable::zeros(rows, wrt.size())),
            SolveFor::Position(object) | SolveFor::Velocity(object) | SolveFor::CartesianX(object) => {
                ensure!(
                    !last.positions.is_empty(),
                    DerivativesUnavailableSnafu {
                        adapter: &self.name,
                        parameter: wrt.parameter(),
                        reason: "the path is outside of the ephemeris coverage",
                    }
                );
                let dpos = self.position_partial(object, &last.positions);
                let dvel = dpos * -last.shift_s;
                let row = match wrt {
                    SolveFor::Position(_) => dpos.as_slice().to_vec(),
                    SolveFor::Velocity(_) => dvel.as_slice().to_vec(),
                    _ => dpos.iter().chain(dvel.iter()).copied().collect(),
                };
                Ok(DerivativeTable::from_row(row))
            }
        }
    }

    fn measurement(&self) -> Option<&MeasurementSample> {
        self.last.as_ref().map(|last| &last.sample)
    }

    fn settings(&self) -> AdapterSettings {
        self.settings
    }

    fn add_noise(&mut self, enabled: bool) {
        self.settings.add_noise = enabled;
    }

    fn add_bias(&mut self, enabled: bool) {
        self.settings.add_bias = enabled;
    }

    fn set_range_only(&mut self, enabled: bool) {
        self.settings.range_only = enabled;
    }

    fn add_media_correction(&mut self, enabled: bool) {
        self.settings.with_media_correction = enabled;
    }

    fn multiplier_factor(&self) -> f64 {
        self.multiplier_factor
    }

    fn iono_correction(&self) -> f64 {
        self.last.as_ref().map_or(0.0, |last| last.sample.iono_correction)
    }

    fn tropo_correction(&self) -> f64 {
        self.last.as_ref().map_or(0.0, |last| last.sample.tropo_correction)
    }

    fn set_count_interval(&mut self, interval: Duration) {
        self.count_interval = interval;
    }

    fn transmit_frequency_mhz(&self, epoch: Epoch) -> Result<f64, ODError> {
        self.transmitter
            .as_ref()
            .context(MissingFrequencyModelSnafu {
                adapter: &self.name,
            })?
            .frequency_mhz_at(epoch)
    }

    fn transmit_frequency_band(&self) -> Result<FrequencyBand, ODError> {
        Ok(self
            .transmitter
            .as_ref()
            .context(MissingFrequencyModelSnafu {
                adapter: &self.name,
            })?
            .frequency_band)
    }

    fn clone_box(&self) -> Box<dyn TrackingAdapter> {
        Box::new(self.clone())
    }
}
