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

use super::config::DifferencedDopplerConfig;
use super::relay_doppler::{RelayCallContext, RelayDopplerAdapter, RelayPaths};
use super::{AdapterSettings, SolveFor, TrackingAdapter};
use crate::od::ephemeris::EphemerisProvider;
use crate::od::hardware::FrequencyBand;
use crate::od::msr::{DerivativeTable, MeasurementSample, MeasurementType, Observation, RampRecord};
use crate::od::noise::{ErrorModel, InjectedErrors};
use crate::od::{
    ChildInitializationSnafu, DerivativesUnavailableSnafu, MeasurementNotSetSnafu,
    NoServiceAccessSnafu, NoSimulationEpochSnafu, NotInitializedSnafu, ODError,
    SignalPathMismatchSnafu,
};
use crate::time::{Duration, Epoch};
use rand_pcg::Pcg64Mcg;
use snafu::{ensure, OptionExt, ResultExt};
use std::sync::Arc;

const COMPARISON: &str = "Comparison";
const REFERENCE: &str = "Reference";

/// Everything computed by one call to [DifferencedDopplerAdapter::calculate_measurement_with_context].
#[derive(Clone, Debug, PartialEq)]
pub struct DifferencedCallContext {
    pub sample: MeasurementSample,
    pub comparison: RelayCallContext,
    pub reference: RelayCallContext,
    /// Whether both relay Doppler values were available and differenced
    pub combined: bool,
    pub injected: InjectedErrors,
}

/// Differenced one-way Doppler: the Doppler through a comparison relay minus the Doppler through a reference relay.
#[derive(Clone, Debug)]
pub struct DifferencedDopplerAdapter {
    name: String,
    participants: Vec<String>,
    settings: AdapterSettings,
    measurement_participant: usize,
    error_model: ErrorModel,
    comparison: RelayDopplerAdapter,
    reference: RelayDopplerAdapter,
    simulation_epoch: Option<Epoch>,
    initialized: bool,
    context: Option<DifferencedCallContext>,
}

impl DifferencedDopplerAdapter {
    pub fn new<S: Into<String>>(
        name: S,
        participants: Vec<String>,
        comparison: RelayDopplerAdapter,
        reference: RelayDopplerAdapter,
    ) -> Self {
        let error_model = ErrorModel::builder()
            .measurement_type(MeasurementType::SnDowd)
            .participants(participants.clone())
            .build();
        Self {
            name: name.into(),
            participants,
            settings: AdapterSettings::default(),
            measurement_participant: 4,
            error_model,
            comparison,
            reference,
            simulation_epoch: None,
            initialized: false,
            context: None,
        }
    }

    pub fn from_config(
        config: DifferencedDopplerConfig,
        comparison_paths: RelayPaths,
        reference_paths: RelayPaths,
    ) -> Result<Self, ODError> {
        config.validate()?;
        let error_model = config.error_model();
        let comparison = RelayDopplerAdapter::from_config(config.comparison, comparison_paths)?;
        let reference = RelayDopplerAdapter::from_config(config.reference, reference_paths)?;
        Ok(Self::new(config.name, config.participants, comparison, reference)
            .with_error_model(error_model)
            .with_settings(config.settings))
    }

    pub fn with_error_model(mut self, error_model: ErrorModel) -> Self {
        self.error_model = error_model;
        self
    }

    pub fn with_settings(mut self, settings: AdapterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn comparison(&self) -> &RelayDopplerAdapter {
        &self.comparison
    }

    pub fn reference(&self) -> &RelayDopplerAdapter {
        &self.reference
    }

    pub fn comparison_mut(&mut self) -> &mut RelayDopplerAdapter {
        &mut self.comparison
    }

    pub fn reference_mut(&mut self) -> &mut RelayDopplerAdapter {
        &mut self.reference
    }

    pub fn error_model(&self) -> &ErrorModel {
        &self.error_model
    }

    pub fn last_context(&self) -> Option<&DifferencedCallContext> {
        self.context.as_ref()
    }

    /// Computes the differenced Doppler with the contexts of both relay Doppler measurements.
    ///
    /// When replaying, the reference relay is evaluated on the reference fields of the observation.
    pub fn calculate_measurement_with_context(
        &mut self,
        with_events: bool,
        observation: Option<&Observation>,
        ramp_table: Option<&[RampRecord]>,
        for_simulation: bool,
        mut rng: Option<&mut Pcg64Mcg>,
    ) -> Result<DifferencedCallContext, ODError> {
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
            None => {
                for relay in [&self.comparison, &self.reference] {
                    ensure!(
                        !relay.service_access().is_empty(),
                        NoServiceAccessSnafu {
                            adapter: relay.name()
                        }
                    );
                }
                self.simulation_epoch.context(NoSimulationEpochSnafu {
                    adapter: &self.name,
                })?
            }
        };

        let with_media = self.settings.with_media_correction;
        for relay in [&mut self.comparison, &mut self.reference] {
            relay.add_noise(false);
            relay.add_bias(false);
            relay.set_range_only(true);
            relay.add_media_correction(with_media);
            if observation.is_none() {
                relay.set_simulation_epoch(epoch);
            }
        }

        let comparison = self.comparison.calculate_measurement_with_context(
            with_events,
            observation,
            ramp_table,
            for_simulation,
            rng.as_deref_mut(),
        )?;

        let reference_observation = observation.map(Observation::reference_view).transpose()?;
        let reference = self.reference.calculate_measurement_with_context(
            with_events,
            reference_observation.as_ref(),
            ramp_table,
            for_simulation,
            rng.as_deref_mut(),
        )?;

        let mut sample = MeasurementSample::new(MeasurementType::SnDowd, comparison.sample.epoch);
        sample.feasibility_value = comparison.sample.feasibility_value;
        if !comparison.sample.is_feasible {
            sample.adopt_feasibility(&comparison.sample);
        } else if !reference.sample.is_feasible {
            sample.adopt_feasibility(&reference.sample);
        }
        sample.relay = comparison.sample.relay;
        sample.reference_relay = reference.sample.relay;

        let combined = !comparison.sample.value.is_empty() && !reference.sample.value.is_empty();
        if combined {
            ensure!(
                reference.sample.signal_paths() == comparison.sample.signal_paths(),
                SignalPathMismatchSnafu {
                    adapter: &self.name,
                    path: REFERENCE,
                    expected: comparison.sample.signal_paths(),
                    found: reference.sample.signal_paths(),
                }
            );
            sample.value = comparison
                .sample
                .value
                .iter()
                .zip(&reference.sample.value)
                .map(|(comp, reference)| comp - reference)
                .collect();
            sample.correction = comparison
                .sample
                .correction
                .iter()
                .zip(&reference.sample.correction)
                .map(|(comp, reference)| comp - reference)
                .collect();
            sample.iono_correction =
                comparison.sample.iono_correction - reference.sample.iono_correction;
            sample.tropo_correction =
                comparison.sample.tropo_correction - reference.sample.tropo_correction;
        } else {
            warn!(
                "{} @ {}: not differenced ({})",
                self.name, sample.epoch, sample.unfeasible_reason
            );
        }

        let injected = self.error_model.corrupt(&mut sample, &self.settings, rng);

        debug!("{sample}");

        let context = DifferencedCallContext {
            sample,
            comparison,
            reference,
            combined,
            injected,
        };
        self.context = Some(context.clone());
        Ok(context)
    }
}

impl TrackingAdapter for DifferencedDopplerAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measurement_type(&self) -> MeasurementType {
        MeasurementType::SnDowd
    }

    fn participants(&self) -> &[String] {
        &self.participants
    }

    fn initialize(&mut self) -> Result<(), ODError> {
        self.error_model.validate()?;
        let index = self.measurement_participant;
        let name = self.name.clone();
        for (label, relay) in [
            (COMPARISON, &mut self.comparison),
            (REFERENCE, &mut self.reference),
        ] {
            relay.set_measurement_participant(index);
            relay.initialize().context(ChildInitializationSnafu {
                adapter: format!("{name} {label}"),
            })?;
        }
        self.initialized = true;
        info!(
            "{} initialized: {} minus {}",
            self.name,
            self.comparison.relay_id(),
            self.reference.relay_id()
        );
        Ok(())
    }

    fn set_measurement_participant(&mut self, index: usize) {
        self.measurement_participant = index;
    }

    fn set_ephemeris(&mut self, ephemeris: Arc<dyn EphemerisProvider>) {
        self.comparison.set_ephemeris(ephemeris.clone());
        self.reference.set_ephemeris(ephemeris);
    }

    fn set_simulation_epoch(&mut self, epoch: Epoch) {
        self.comparison.set_simulation_epoch(epoch);
        self.reference.set_simulation_epoch(epoch);
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
        let combined = context.combined;

        let table = match wrt {
            SolveFor::Bias(error_model) => {
                if error_model.applies_to(MeasurementType::SnDowd, &self.participants) {
                    error_model.bias_derivative(rows)
                } else {
                    DerivativeTable::zeros(rows, wrt.size())
                }
            }
            SolveFor::PassBiases(error_model) => {
                if error_model.measurement_type == MeasurementType::SnDowd {
                    error_model.pass_bias_derivative(rows, epoch)
                } else {
                    DerivativeTable::zeros(rows, wrt.size())
                }
            }
            _ => {
                ensure!(
                    combined,
                    DerivativesUnavailableSnafu {
                        adapter: &self.name,
                        parameter: wrt.parameter(),
                        reason: "the relay Doppler measurements were not differenced at the last epoch",
                    }
                );
                let comparison = self.comparison.calculate_measurement_derivatives(wrt)?;
                let reference = self.reference.calculate_measurement_derivatives(wrt)?;
                if wrt.is_geometric() {
                    DerivativeTable::weighted_sum(
                        &self.name,
                        &[(COMPARISON, &comparison, 1.0), (REFERENCE, &reference, -1.0)],
                    )?
                } else {
                    DerivativeTable::validate_siblings(
                        &self.name,
                        &[(COMPARISON, &comparison), (REFERENCE, &reference)],
                    )?;
                    comparison
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

    /// Sets the count interval of both relay Doppler measurements.
    fn set_count_interval(&mut self, interval: Duration) {
        self.comparison.set_count_interval(interval);
        self.reference.set_count_interval(interval);
    }

    fn transmit_frequency_mhz(&self, epoch: Epoch) -> Result<f64, ODError> {
        self.comparison.transmit_frequency_mhz(epoch)
    }

    fn transmit_frequency_band(&self) -> Result<FrequencyBand, ODError> {
        self.comparison.transmit_frequency_band()
    }

    fn clone_box(&self) -> Box<dyn TrackingAdapter> {
        Box::new(self.clone())
    }
}
