use nyx::od::prelude::*;
use nyx::od::relay::PilotKey;
use rand_pcg::Pcg64Mcg;
use std::sync::{Arc, Mutex};

/// Shared record of the calls made on scripted adapters.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A primitive adapter returning configured ranges, feasibility and partials.
#[derive(Clone, Debug)]
pub struct ScriptedAdapter {
    name: String,
    participants: Vec<String>,
    values: Vec<f64>,
    corrections: Vec<f64>,
    reason: UnfeasibleReason,
    feasibility_value: f64,
    factor: f64,
    iono: f64,
    tropo: f64,
    partials: Vec<Vec<f64>>,
    frequency: Option<(f64, FrequencyBand)>,
    settings: AdapterSettings,
    simulation_epoch: Option<Epoch>,
    last: Option<MeasurementSample>,
    log: CallLog,
}

impl ScriptedAdapter {
    pub fn new(name: &str, range_km: f64) -> Self {
        Self {
            name: name.to_string(),
            participants: vec![name.to_string()],
            values: vec![range_km],
            corrections: vec![0.0],
            reason: UnfeasibleReason::Normal,
            feasibility_value: 1.0,
            factor: 1.0,
            iono: 0.0,
            tropo: 0.0,
            partials: vec![vec![0.0; 3]],
            frequency: None,
            settings: AdapterSettings::default(),
            simulation_epoch: None,
            last: None,
            log: CallLog::default(),
        }
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.corrections = vec![0.0; values.len()];
        self.values = values;
        self
    }

    pub fn with_corrections(mut self, corrections: Vec<f64>) -> Self {
        self.corrections = corrections;
        self
    }

    pub fn infeasible(mut self, reason: &str, feasibility_value: f64) -> Self {
        self.reason = UnfeasibleReason::from(reason);
        self.feasibility_value = feasibility_value;
        self
    }

    pub fn with_feasibility_value(mut self, feasibility_value: f64) -> Self {
        self.feasibility_value = feasibility_value;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_media(mut self, iono: f64, tropo: f64) -> Self {
        self.iono = iono;
        self.tropo = tropo;
        self
    }

    pub fn with_partials(mut self, partials: Vec<Vec<f64>>) -> Self {
        self.partials = partials;
        self
    }

    pub fn with_frequency(mut self, frequency_mhz: f64, band: FrequencyBand) -> Self {
        self.frequency = Some((frequency_mhz, band));
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn boxed(self) -> Box<dyn TrackingAdapter> {
        Box::new(self)
    }
}

impl TrackingAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn measurement_type(&self) -> MeasurementType {
        MeasurementType::Range
    }

    fn participants(&self) -> &[String] {
        &self.participants
    }

    fn initialize(&mut self) -> Result<(), ODError> {
        self.log.push(format!("{} initialize", self.name));
        Ok(())
    }

    fn set_measurement_participant(&mut self, index: usize) {
        self.log.push(format!("{} participant {index}", self.name));
    }

    fn set_ephemeris(&mut self, _ephemeris: Arc<dyn EphemerisProvider>) {}

    fn set_simulation_epoch(&mut self, epoch: Epoch) {
        self.simulation_epoch = Some(epoch);
    }

    fn calculate_measurement(
        &mut self,
        _with_events: bool,
        observation: Option<&Observation>,
        _ramp_table: Option<&[RampRecord]>,
        _for_simulation: bool,
        _rng: Option<&mut Pcg64Mcg>,
    ) -> Result<MeasurementSample, ODError> {
        let epoch = match observation {
            Some(obs) => obs.epoch,
            None => self
                .simulation_epoch
                .ok_or_else(|| ODError::NoSimulationEpoch {
                    adapter: self.name.clone(),
                })?,
        };
        self.log.push(format!(
            "{} measure noise={} bias={} range_only={} media={}",
            self.name,
            self.settings.add_noise,
            self.settings.add_bias,
            self.settings.range_only,
            self.settings.with_media_correction
        ));

        let mut sample = MeasurementSample::new(MeasurementType::Range, epoch);
        sample.value = self.values.iter().map(|v| v * self.factor).collect();
        sample.correction = self.corrections.iter().map(|c| c * self.factor).collect();
        sample.is_feasible = self.reason == UnfeasibleReason::Normal;
        sample.unfeasible_reason = self.reason.clone();
        sample.feasibility_value = self.feasibility_value;
        sample.iono_correction = self.iono;
        sample.tropo_correction = self.tropo;
        self.last = Some(sample.clone());
        Ok(sample)
    }

    fn calculate_measurement_derivatives(
        &mut self,
        wrt: &SolveFor<'_>,
    ) -> Result<DerivativeTable, ODError> {
        if self.last.is_none() {
            return Err(ODError::MeasurementNotSet {
                adapter: self.name.clone(),
            });
        }
        self.log
            .push(format!("{} derivatives {}", self.name, wrt.parameter()));
        Ok(DerivativeTable::new(self.partials.clone()))
    }

    fn measurement(&self) -> Option<&MeasurementSample> {
        self.last.as_ref()
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
        self.factor
    }

    fn iono_correction(&self) -> f64 {
        self.iono
    }

    fn tropo_correction(&self) -> f64 {
        self.tropo
    }

    fn set_count_interval(&mut self, interval: Duration) {
        self.log
            .push(format!("{} count interval {interval}", self.name));
    }

    fn transmit_frequency_mhz(&self, _epoch: Epoch) -> Result<f64, ODError> {
        self.frequency
            .map(|(mhz, _)| mhz)
            .ok_or_else(|| ODError::MissingFrequencyModel {
                adapter: self.name.clone(),
            })
    }

    fn transmit_frequency_band(&self) -> Result<FrequencyBand, ODError> {
        self.frequency
            .map(|(_, band)| band)
            .ok_or_else(|| ODError::MissingFrequencyModel {
                adapter: self.name.clone(),
            })
    }

    fn clone_box(&self) -> Box<dyn TrackingAdapter> {
        Box::new(self.clone())
    }
}

/// A constant pilot frequency, whatever the service access.
#[derive(Copy, Clone, Debug)]
pub struct FixedPilot(pub f64);

impl PilotFrequency for FixedPilot {
    fn pilot_frequency_mhz(&self, _key: &PilotKey) -> Result<f64, ODError> {
        Ok(self.0)
    }

    fn pilot_frequency_derivative(&self, _key: &PilotKey) -> Result<f64, ODError> {
        Ok(0.0)
    }
}

pub fn epoch() -> Epoch {
    Epoch::from_gregorian_tai_at_midnight(2024, 1, 1)
}

/// Ephemerides covering a day around the test epoch, without any object.
pub fn coverage() -> Arc<dyn EphemerisProvider> {
    Arc::new(LinearEphemeris::new().with_coverage(epoch() - 1.days(), epoch() + 1.days()))
}

/// Four scripted paths, in the order end spacecraft, end ground station, start spacecraft, start ground station.
pub fn scripted_paths(paths: [ScriptedAdapter; 4]) -> RelayPaths {
    let [end_sc, end_gs, start_sc, start_gs] = paths;
    RelayPaths::new(end_sc.boxed(), end_gs.boxed(), start_sc.boxed(), start_gs.boxed())
}

/// The four paths of the documented scenario: the end spacecraft path transmits at 2000 MHz in S-band.
pub fn scenario_paths(log: &CallLog) -> [ScriptedAdapter; 4] {
    [
        ScriptedAdapter::new("ESC", 7000.0)
            .with_frequency(2000.0, FrequencyBand::S)
            .with_log(log),
        ScriptedAdapter::new("EGS", 7000.5).with_log(log),
        ScriptedAdapter::new("SSC", 6999.0).with_log(log),
        ScriptedAdapter::new("SGS", 6999.4).with_log(log),
    ]
}

/// Initialized relay Doppler adapter over the provided paths, with a 1000 MHz pilot and a 1 s count interval.
pub fn relay_adapter(paths: [ScriptedAdapter; 4]) -> RelayDopplerAdapter {
    let mut relay = RelayDopplerAdapter::new(
        "TDRS8 return",
        MeasurementType::SnDopplerRtn,
        vec!["GS".to_string(), "TDRS8".to_string(), "LEO".to_string()],
        "TDRS8",
        scripted_paths(paths),
    )
    .with_service_access(vec![ServiceAccess::SA1])
    .with_pilots(Arc::new(FixedPilot(1000.0)));
    relay.set_ephemeris(coverage());
    relay.initialize().unwrap();
    relay
}

pub fn relay_fields(count_interval: Duration, service: ServiceAccess) -> RelayTrackingFields {
    RelayTrackingFields {
        doppler_count_interval: count_interval,
        service_access: service,
        node4_frequency_hz: 2.0e9,
        node4_band: FrequencyBand::S,
        smar_id: 0,
        data_flag: 0,
    }
}
