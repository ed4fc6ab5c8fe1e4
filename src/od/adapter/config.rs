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

use super::AdapterSettings;
use crate::io::{duration_from_str, duration_to_str, ConfigError, ConfigRepr};
use crate::od::hardware::FrequencyBand;
use crate::od::msr::MeasurementType;
use crate::od::noise::ErrorModel;
use crate::od::relay::{FrequencyParameters, ServiceAccess};
use crate::od::ODError;
use crate::time::{Duration, TimeUnits};
use serde_derive::{Deserialize, Serialize};

fn default_relay_type() -> MeasurementType {
    MeasurementType::SnDopplerRtn
}

fn default_count_interval() -> Duration {
    1.seconds()
}

fn default_node_frequency() -> f64 {
    2000.0
}

fn default_mixer_gain() -> f64 {
    1.0
}

pub(super) fn invalid_config(msg: String) -> ODError {
    ODError::ODConfigError {
        source: ConfigError::InvalidConfig { msg },
    }
}

/// Configuration of a relay Doppler adapter, as loaded from YAML.
///
/// ```yaml
/// name: TDRS8 return
/// participants: [White Sands, TDRS8, LEO]
/// relay_id: TDRS8
/// service_access: [SA1, MA]
/// doppler_count_interval: 10 s
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayDopplerConfig {
    pub name: String,
    #[serde(default = "default_relay_type")]
    pub measurement_type: MeasurementType,
    /// Participants in signal order, from the ground station to the user spacecraft
    pub participants: Vec<String>,
    /// Relay identifier, whose trailing digits are the relay number
    pub relay_id: String,
    /// Service access candidates drawn from when simulating
    #[serde(default)]
    pub service_access: Vec<ServiceAccess>,
    #[serde(
        default = "default_count_interval",
        serialize_with = "duration_to_str",
        deserialize_with = "duration_from_str"
    )]
    pub doppler_count_interval: Duration,
    /// Configured node 4 frequency. Each measurement uses the transmit frequency of the end spacecraft path instead.
    #[serde(default = "default_node_frequency")]
    pub node4_frequency_mhz: f64,
    /// Configured node 4 band, only used for the turnaround ratio: measurements take the band of the end spacecraft path.
    #[serde(default)]
    pub node4_band: FrequencyBand,
    #[serde(default)]
    pub smar_id: u8,
    #[serde(default)]
    pub data_flag: u8,
    #[serde(default)]
    pub settings: AdapterSettings,
    #[serde(default = "default_mixer_gain")]
    pub mixer_gain: f64,
    /// Defaults to the error model of the measurement type on these participants
    #[serde(default)]
    pub error_model: Option<ErrorModel>,
}

impl ConfigRepr for RelayDopplerConfig {}

impl RelayDopplerConfig {
    pub fn validate(&self) -> Result<(), ODError> {
        if !matches!(
            self.measurement_type,
            MeasurementType::SnDopplerRtn | MeasurementType::BrtsDoppler
        ) {
            return Err(invalid_config(format!(
                "{}: {} is not a relay Doppler measurement",
                self.name, self.measurement_type
            )));
        }
        if self.participants.len() < 2 {
            return Err(invalid_config(format!(
                "{}: at least two participants are needed, got {:?}",
                self.name, self.participants
            )));
        }
        self.frequency_parameters().validate_count_interval()?;
        if let Some(error_model) = &self.error_model {
            error_model.validate()?;
            if error_model.measurement_type != self.measurement_type {
                return Err(invalid_config(format!(
                    "{}: error model is for {} but the measurement is {}",
                    self.name, error_model.measurement_type, self.measurement_type
                )));
            }
        }
        Ok(())
    }

    /// Frequency parameters used until they are resolved by a measurement.
    pub fn frequency_parameters(&self) -> FrequencyParameters {
        FrequencyParameters {
            node_frequency_mhz: self.node4_frequency_mhz,
            band: self.node4_band,
            smar_id: self.smar_id,
            data_flag: self.data_flag,
            count_interval: self.doppler_count_interval,
        }
    }

    pub fn error_model(&self) -> ErrorModel {
        self.error_model.clone().unwrap_or_else(|| {
            ErrorModel::builder()
                .measurement_type(self.measurement_type)
                .participants(self.participants.clone())
                .build()
        })
    }
}

/// Configuration of a differenced one-way Doppler adapter: two relay Doppler configurations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifferencedDopplerConfig {
    pub name: String,
    pub participants: Vec<String>,
    pub comparison: RelayDopplerConfig,
    pub reference: RelayDopplerConfig,
    #[serde(default)]
    pub settings: AdapterSettings,
    #[serde(default)]
    pub error_model: Option<ErrorModel>,
}

impl ConfigRepr for DifferencedDopplerConfig {}

impl DifferencedDopplerConfig {
    pub fn validate(&self) -> Result<(), ODError> {
        self.comparison.validate()?;
        self.reference.validate()?;
        if let Some(error_model) = &self.error_model {
            error_model.validate()?;
            if error_model.measurement_type != MeasurementType::SnDowd {
                return Err(invalid_config(format!(
                    "{}: error model is for {} instead of {}",
                    self.name,
                    error_model.measurement_type,
                    MeasurementType::SnDowd
                )));
            }
        }
        Ok(())
    }

    pub fn error_model(&self) -> ErrorModel {
        self.error_model.clone().unwrap_or_else(|| {
            ErrorModel::builder()
                .measurement_type(MeasurementType::SnDowd)
                .participants(self.participants.clone())
                .build()
        })
    }
}
