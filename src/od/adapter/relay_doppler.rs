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

use super::config::RelayDopplerConfig;
use super::{AdapterSettings, SolveFor, TrackingAdapter};
use crate::od::ephemeris::EphemerisProvider;
use crate::od::hardware::FrequencyBand;
use crate::od::msr::{
    DerivativeTable, MeasurementSample, MeasurementType, Observation, RampRecord,
    UnfeasibleReason,
};
use crate::od::noise::{ErrorModel, InjectedErrors};
use crate::od::relay::{
    relay_number, FrequencyParameters, Multipliers, PilotFrequency, PilotKey, ServiceAccess,
    ServiceAccessState, SpaceNetworkPilots,
};
use crate::od::{
    ChildInitializationSnafu, DerivativesUnavailableSnafu, MeasurementNotSetSnafu,
    MissingEphemerisSnafu, NoSimulationEpochSnafu, NotInitializedSnafu, ODError,
    SignalPathMismatchSnafu,
};
use crate::time::{Duration, Epoch};
use anise::constants::SPEED_OF_LIGHT_KM_S;
use rand_pcg::Pcg64Mcg;
use snafu::{ensure, OptionExt, ResultExt};
use std::sync::Arc;

pub(crate) const END_SPACECRAFT: &str = "End-Spacecraft";
pub(crate) const END_GROUND_STATION: &str = "End-GroundStation";
pub(crate) const START_SPACECRAFT: &str = "Start-Spacecraft";
pub(crate) const START_GROUND_STATION: &str = "Start-GroundStation";

/// The four signal paths of a relay Doppler measurement, each computing a range.
///
/// The end paths are evaluated at the time tag, and the start paths one Doppler count interval earlier.
#[derive(Clone, Debug)]
pub struct RelayPaths {
    /// Relay to user spacecraft, at the end of the count interval
    pub end_spacecraft: Box<dyn TrackingAdapter>,
    /// Ground station to relay, at the end of the count interval
    pub end_ground_station: Box<dyn TrackingAdapter>,
    /// Relay to user spacecraft, at the start of the count interval
    pub start_spacecraft: Box<dyn TrackingAdapter>,
    /// Ground station to relay, at the start of the count interval
    pub start_ground_station: Box<dyn TrackingAdapter>,
}

impl RelayPaths {
    pub fn new(
        end_spacecraft: Box<dyn TrackingAdapter>,
        end_ground_station: Box<dyn TrackingAdapter>,
        start_spacecraft: Box<dyn TrackingAdapter>,
        start_ground_station: Box<dyn TrackingAdapter>,
    ) -> Self {
        Self {
            end_spacecraft,
            end_ground_station,
            start_spacecraft,
            start_ground_station,
        }
    }

    /// Paths in evaluation order.
    fn in_order_mut(&mut self) -> [(&'static str, &mut Box<dyn TrackingAdapter>); 4] {
        [
            (END_SPACECRAFT, &mut self.end_spacecraft),
            (END_GROUND_STATION, &mut self.end_ground_station),
            (START_SPACECRAFT, &mut self.start_spacecraft),
            (START_GROUND_STATION, &mut self.start_ground_station),
        ]
    }
}

/// Frequencies and multipliers resolved for one relay Doppler measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayCombination {
    pub frequency: FrequencyParameters,
    pub service: ServiceAccessState,
    /// Effective frequency, in MHz
    pub effective_frequency_mhz: f64,
    /// Pilot frequency, in MHz
    pub pilot_frequency_mhz: f64,
    /// Partial of the pilot frequency with respect to the effective frequency
    pub pilot_derivative: f64,
    pub multipliers: Multipliers,
    /// Range rate of the spacecraft paths over the speed of light
    pub spacecraft_range_rate_ratio: f64,
    /// Range rate of the ground station paths over the speed of light
    pub ground_range_rate_ratio: f64,
}

/// Everything computed by one call to [RelayDopplerAdapter::calculate_measurement_with_context].
#[derive(Clone, Debug, PartialEq)]
pub struct RelayCallContext {
    pub sample: MeasurementSample,
    /// None if the paths were not combined, e.g. outside of the ephemeris coverage
    pub combination: Option<RelayCombination>,
    pub injected: InjectedErrors,
}

/// Three-leg return Doppler through a relay satellite, built from the ranges of its four signal paths.
///
/// # Algorithm
/// Each path computes the range (km) at either end of the count interval Δt. The Doppler (Hz) is
/// ```text
/// f_eff / (Δt c) (ρ_start,sc - ρ_end,sc) + f_pilot / (Δt c) (ρ_start,gs - ρ_end,gs)
/// ```
/// where the effective frequency comes from the frequency model of the end spacecraft path and the
/// pilot frequency from the relay pilot table.
#[derive(Clone, Debug)]
pub struct RelayDopplerAdapter {
    name: String,
    measurement_type: MeasurementType,
    participants: Vec<String>,
    relay_id: String,
    service_access: Vec<ServiceAccess>,
    frequency: FrequencyParameters,
    mixer_gain: f64,
    settings: AdapterSettings,
    measurement_participant: usize,
    error_model: ErrorModel,
    pilots: Arc<dyn PilotFrequency>,
    paths: RelayPaths,
    ephemeris: Option<Arc<dyn EphemerisProvider>>,
    simulation_epoch: Option<Epoch>,
    initialized: bool,
    context: Option<RelayCallContext>,
}

impl RelayDopplerAdapter {
    pub fn new<S: Into<String>, R: Into<String>>(
        name: S,
        measurement_type: MeasurementType,
        participants: Vec<String>,
        relay_id: R,
        paths: RelayPaths,
    ) -> Self {
        let error_model = ErrorModel::builder()
            .measurement_type(measurement_type)
            .participants(participants.clone())
            .build();
        Self {
            name: name.into(),
            measurement_type,
            participants,
            relay_id: relay_id.into(),
            service_access: Vec::new(),
            frequency: FrequencyParameters::default(),
            mixer_gain: 1.0,
            settings: AdapterSettings::default(),
            measurement_participant: 2,
            error_model,
            pilots: Arc::new(SpaceNetworkPilots),
            paths,
            ephemeris: None,
            simulation_epoch: None,
            initialized: false,
            context: None,
        }
    }

    pub fn from_config(config: RelayDopplerConfig, paths: RelayPaths) -> Result<Self, ODError> {
        config.validate()?;
        let error_model = config.error_model();
        let frequency = config.frequency_parameters();
        let mut me = Self::new(
            config.name,
            config.measurement_type,
            config.participants,
            config.relay_id,
            paths,
        );
        me.service_access = config.service_access;
        me.frequency = frequency;
        me.mixer_gain = config.mixer_gain;
        me.settings = config.settings;
        me.error_model = error_model;
        Ok(me)
    }

    pub fn with_service_access(mut self, candidates: Vec<ServiceAccess>) -> Self {
        self.service_access = candidates;
        self
    }

    pub fn with_frequency_parameters(mut self, frequency: FrequencyParameters) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_mixer_gain(mut self, mixer_gain: f64) -> Self {
        self.mixer_gain = mixer_gain;
        self
    }

    pub fn with_error_model(mut self, error_model: ErrorModel) -> Self {
        self.error_model = error_model;
        self
    }

    pub fn with_settings(mut self, settings: AdapterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the pilot frequency table.
    pub fn with_pilots(mut self, pilots: Arc<dyn PilotFrequency>) -> Self {
        self.pilots = pilots;
        self
    }

    pub fn relay_id(&self) -> &str {
        &self.relay_id
    }

    pub fn service_access(&self) -> &[ServiceAccess] {
        &self.service_access
    }

    pub fn set_service_access(&mut self, candidates: Vec<ServiceAccess>) {
        self.service_access = candidates;
    }

    /// Configured frequency parameters, before any resolution from a measurement.
    pub fn frequency_parameters(&self) -> FrequencyParameters {
        self.frequency
    }

    pub fn error_model(&self) -> &ErrorModel {
        &self.error_model
    }

    pub fn paths(&self) -> &RelayPaths {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut RelayPaths {
        &mut self.paths
    }

    /// Context of the last measurement.
    pub fn last_context(&self) -> Option<&RelayCallContext> {
        self.context.as_ref()
    }

    /// Transponder turnaround ratio of the configured node 4 band.
    ///
    /// Measurements resolve their band from the end spacecraft path on every call and leave the configured one untouched.
    pub fn turnaround_ratio(&self) -> Result<f64, ODError> {
        self.frequency.band.turnaround_ratio()
    }

    /// Computes the relay Doppler and returns it with the frequencies and errors used to build it.
    pub fn calculate_measurement_with_context(
        &mut self,
        with_events: bool,
        observation: Option<&Observation>,
        ramp_table: Option<&[RampRecord]>,
        for_simulation: bool,
        mut rng: Option<&mut Pcg64Mcg>,
    ) -> Result<RelayCallContext, ODError> {
        // A failed call must not leave the previous epoch behind for the derivatives.
        self.context = None;
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

        if !ephemeris.check_epoch_validity(epoch) {
            warn!("{} @ {epoch}: outside of the ephemeris coverage", self.name);
            let context = RelayCallContext {
                sample: MeasurementSample::infeasible(
                    self.measurement_type,
                    epoch,
                    UnfeasibleReason::EphemerisGap,
                ),
                combination: None,
                injected: InjectedErrors::default(),
            };
            self.context = Some(context.clone());
            return Ok(context);
        }

        let mut frequency = self.frequency;
        let service = match observation {
            Some(obs) => {
                let fields = obs.relay_fields()?;
                frequency.count_interval = fields.doppler_count_interval;
                frequency.smar_id = fields.smar_id;
                frequency.data_flag = fields.data_flag;
                ServiceAccessState::from_observation(fields.service_access)
            }
            None => ServiceAccessState::select(&self.service_access, rng.as_deref_mut(), &self.name)?,
        };
        frequency.validate_count_interval()?;

        // Noise and bias are only added to the combined Doppler.
        let with_media = self.settings.with_media_correction;
        for (_, path) in self.paths.in_order_mut() {
            path.add_noise(false);
            path.add_bias(false);
            path.set_range_only(true);
            path.add_media_correction(with_media);
        }
        self.paths
            .start_spacecraft
            .set_count_interval(frequency.count_interval);
        self.paths
            .start_ground_station
            .set_count_interval(frequency.count_interval);

        let evaluate = |path: &mut Box<dyn TrackingAdapter>, epoch: Epoch| {
            if observation.is_none() {
                path.set_simulation_epoch(epoch);
            }
            path.calculate_measurement(with_events, observation, ramp_table, for_simulation, None)
        };

        // The end spacecraft path sets the time tag of the other three.
        let end_sc = evaluate(&mut self.paths.end_spacecraft, epoch)?;
        let tag = end_sc.epoch;
        let end_gs = evaluate(&mut self.paths.end_ground_station, tag)?;
        let start_sc = evaluate(&mut self.paths.start_spacecraft, tag)?;
        let start_gs = evaluate(&mut self.paths.start_ground_station, tag)?;

        let effective_frequency_mhz = self.paths.end_spacecraft.transmit_frequency_mhz(tag)?;
        frequency.node_frequency_mhz = effective_frequency_mhz;
        frequency.band = self.paths.end_spacecraft.transmit_frequency_band()?;
        frequency.validate_frequency()?;

        let service_access = service.service()?;
        let key = PilotKey {
            effective_frequency_mhz,
            band: frequency.band,
            service: service_access,
            relay_number: relay_number(&self.relay_id),
            smar_id: frequency.smar_id,
            data_flag: frequency.data_flag,
        };
        let pilot_frequency_mhz = self.pilots.pilot_frequency_mhz(&key)?;
        let pilot_derivative = self.pilots.pilot_frequency_derivative(&key)?;
        let multipliers =
            Multipliers::new(effective_frequency_mhz, pilot_frequency_mhz, frequency.count_interval);

        debug!(
            "{} @ {tag}: {service_access} eff {effective_frequency_mhz} MHz pilot {pilot_frequency_mhz} MHz, {multipliers}",
            self.name
        );

        let factors = [
            self.paths.end_spacecraft.multiplier_factor(),
            self.paths.end_ground_station.multiplier_factor(),
            self.paths.start_spacecraft.multiplier_factor(),
            self.paths.start_ground_station.multiplier_factor(),
        ];
        let weights = [
            multipliers.end_spacecraft,
            multipliers.end_ground_station,
            multipliers.start_spacecraft,
            multipliers.start_ground_station,
        ];
        let samples = [
            (END_SPACECRAFT, &end_sc),
            (END_GROUND_STATION, &end_gs),
            (START_SPACECRAFT, &start_sc),
            (START_GROUND_STATION, &start_gs),
        ];

        let mut sample = MeasurementSample::new(self.measurement_type, tag);
        sample.feasibility_value = end_sc.feasibility_value;
        if let Some((path, infeasible)) = samples.iter().find(|(_, s)| !s.is_feasible) {
            warn!(
                "{} @ {tag}: {path} path is infeasible ({})",
                self.name, infeasible.unfeasible_reason
            );
            sample.adopt_feasibility(infeasible);
        }
        sample.relay = Some(frequency.metadata(service_access));

        let signal_paths = end_sc.signal_paths();
        let combination = if samples.iter().any(|(_, s)| s.value.is_empty()) {
            // A path without any value cannot be combined, and must explain why.
            if let Some((path, empty)) = samples.iter().find(|(_, s)| s.value.is_empty() && s.is_feasible) {
                return SignalPathMismatchSnafu {
                    adapter: &self.name,
                    path: *path,
                    expected: signal_paths.max(1),
                    found: empty.signal_paths(),
                }
                .fail();
            }
            None
        } else {
            for (path, path_sample) in &samples {
                ensure!(
                    path_sample.signal_paths() == signal_paths,
                    SignalPathMismatchSnafu {
                        adapter: &self.name,
                        path: *path,
                        expected: signal_paths,
                        found: path_sample.signal_paths(),
                    }
                );
            }

            sample.value = vec![0.0; signal_paths];
            sample.correction = vec![0.0; signal_paths];
            for (((_, path_sample), weight), factor) in
                samples.iter().zip(weights.iter()).zip(factors.iter())
            {
                for i in 0..signal_paths {
                    sample.value[i] += weight * path_sample.value[i] / factor;
                    sample.correction[i] += weight * path_sample.correction[i] / factor;
                }
            }

            let media = [
                &self.paths.end_spacecraft,
                &self.paths.end_ground_station,
                &self.paths.start_spacecraft,
                &self.paths.start_ground_station,
            ]
            .map(|path| (path.iono_correction(), path.tropo_correction()));
            for ((iono, tropo), weight) in media.iter().zip(weights.iter()) {
                sample.iono_correction += weight * iono;
                sample.tropo_correction += weight * tropo;
            }

            let denom = frequency.count_interval.to_seconds() * SPEED_OF_LIGHT_KM_S;
            let spacecraft_range_rate_ratio =
                -(end_sc.value[0] / factors[0] - start_sc.value[0] / factors[2]) / denom;
            let ground_range_rate_ratio =
                -(end_gs.value[0] / factors[1] - start_gs.value[0] / factors[3]) / denom;

            Some(RelayCombination {
                frequency,
                service,
                effective_frequency_mhz,
                pilot_frequency_mhz,
                pilot_derivative,
                multipliers,
                spacecraft_range_rate_ratio,
                ground_range_rate_ratio,
            })
        };

        let injected = self.error_model.corrupt(&mut sample, &self.settings, rng);

        debug!("{sample}");

        let context = RelayCallContext {
            sample,
            combination,
            injected,
        };
        self.context = Some(context.clone());
        Ok(context)
    }

    /// Combines the partials of the four paths, as the Doppler combines their ranges.
    fn path_derivatives(
        &mut self,
        wrt: &SolveFor<'_>,
        multipliers: &Multipliers,
    ) -> Result<DerivativeTable, ODError> {
        let end_sc = self.paths.end_spacecraft.calculate_measurement_derivatives(wrt)?;
        let end_gs = self
            .paths
            .end_ground_station
            .calculate_measurement_derivatives(wrt)?;
        let start_sc = self
            .paths
            .start_spacecraft
            .calculate_measurement_derivatives(wrt)?;
        let start_gs = self
            .paths
            .start_ground_station
            .calculate_measurement_derivatives(wrt)?;

        if wrt.is_geometric() {
            DerivativeTable::weighted_sum(
                &self.name,
                &[
                    (END_SPACECRAFT, &end_sc, multipliers.end_spacecraft),
                    (END_GROUND_STATION, &end_gs, multipliers.end_ground_station),
                    (START_SPACECRAFT, &start_sc, multipliers.start_spacecraft),
                    (START_GROUND_STATION, &start_gs, multipliers.start_ground_station),
                ],
            )
        } else {
            DerivativeTable::validate_siblings(
                &self.name,
                &[
                    (END_SPACECRAFT, &end_sc),
                    (END_GROUND_STATION, &end_gs),
                    (START_SPACECRAFT, &start_sc),
                    (START_GROUND_STATION, &start_gs),
                ],
            )?;
            Ok(end_sc)
        }
    }
}

impl TrackingAdapter for RelayDopplerAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measurement_type(&self) -> MeasurementType {
        self.measurement_type
    }

    fn participants(&self) -> &[String] {
        &self.participants
    }

    fn initialize(&mut self) -> Result<(), ODError> {
        self.error_model.validate()?;
        self.frequency.validate_count_interval()?;
        let index = self.measurement_participant;
        let name = self.name.clone();
        for (path_name, path) in self.paths.in_order_mut() {
            path.set_measurement_participant(index);
            path.initialize().context(ChildInitializationSnafu {
                adapter: format!("{name} {path_name}"),
            })?;
        }
        self.initialized = true;
        info!(
            "{} ({}) initialized for relay {} with service access candidates {:?}",
            self.name, self.measurement_type, self.relay_id, self.service_access
        );
        Ok(())
    }

    fn set_measurement_participant(&mut self, index: usize) {
        self.measurement_participant = index;
    }

    fn set_ephemeris(&mut self, ephemeris: Arc<dyn EphemerisProvider>) {
        for (_, path) in self.paths.in_order_mut() {
            path.set_ephemeris(ephemeris.clone());
        }
        self.ephemeris = Some(ephemeris);
    }

    fn set_simulation_epoch(&mut self, epoch: Epoch) {
        for (_, path) in self.paths.in_order_mut() {
            path.set_simulation_epoch(epoch);
        }
        self.simulation_epoch = Some(epoch);
    }

    fn calculate_measurement(
        &mut self,
        with_events: bool,
        observation: Option<&Observation>,
        ramp_table: Option<&[RampRecord]>,
        for_simulation: bool,
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<MeasurementSample, ODError> {
        self.calculate_measurement_with_context(
            with_events,
            observation,
            ramp_table,
            for_simulation,
            rng,
        )
        .map(|context| context.sample)
    }

    fn calculate_measurement_derivatives(
        &mut self,
        wrt: &SolveFor<'_>,
    ) -> Result<DerivativeTable, ODError> {
        let context = self.context.as_ref().context(MeasurementNotSetSnafu {
            adapter: &self.name,
        })?;
        let epoch = context.sample.epoch;
        // Bias partials keep one row even when no signal path was combined.
        let rows = context.sample.signal_paths().max(1);
        let combination = context.combination.clone();

        let table = match wrt {
            SolveFor::Bias(error_model) => {
                if error_model.applies_to(self.measurement_type, &self.participants) {
                    error_model.bias_derivative(rows)
                } else {
                    DerivativeTable::zeros(rows, wrt.size())
                }
            }
            SolveFor::PassBiases(error_model) => {
                if error_model.measurement_type == self.measurement_type {
                    error_model.pass_bias_derivative(rows, epoch)
                } else {
                    DerivativeTable::zeros(rows, wrt.size())
                }
            }
            _ => {
                let combination = combination.context(DerivativesUnavailableSnafu {
                    adapter: &self.name,
                    parameter: wrt.parameter(),
                    reason: "the signal paths were not combined at the last epoch",
                })?;
                let range_rate = combination.spacecraft_range_rate_ratio
                    + combination.pilot_derivative * combination.ground_range_rate_ratio;
                match wrt {
                    SolveFor::FrequencyDrift(oscillator) => {
                        let partial = self.mixer_gain
                            * oscillator.frequency_drift_derivative(epoch)?
                            * range_rate;
                        DerivativeTable::new(vec![vec![partial]; rows])
                    }
                    SolveFor::FrequencyPolynomialCoefficients(oscillator) => {
                        let row = oscillator
                            .polynomial_coefficients_derivative(epoch)?
                            .iter()
                            .map(|partial| self.mixer_gain * partial * range_rate)
                            .collect::<Vec<f64>>();
                        DerivativeTable::new(vec![row; rows])
                    }
                    _ => self.path_derivatives(wrt, &combination.multipliers)?,
                }
            }
        };

        trace!("{} d/d{}: {:?}", self.name, wrt.parameter(), table.rows());
        Ok(table)
    }

    fn measurement(&self) -> Option<&MeasurementSample> {
        self.context.as_ref().map(|context| &context.sample)
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
        1.0
    }

    fn iono_correction(&self) -> f64 {
        self.context
            .as_ref()
            .map_or(0.0, |context| context.sample.iono_correction)
    }

    fn tropo_correction(&self) -> f64 {
        self.context
            .as_ref()
            .map_or(0.0, |context| context.sample.tropo_correction)
    }

    fn set_count_interval(&mut self, interval: Duration) {
        self.frequency.count_interval = interval;
    }

    fn transmit_frequency_mhz(&self, epoch: Epoch) -> Result<f64, ODError> {
        self.paths.end_spacecraft.transmit_frequency_mhz(epoch)
    }

    fn transmit_frequency_band(&self) -> Result<FrequencyBand, ODError> {
        self.paths.end_spacecraft.transmit_frequency_band()
    }

    fn clone_box(&self) -> Box<dyn TrackingAdapter> {
        Box::new(self.clone())
    }
}
