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

use super::MeasurementType;
use crate::io::{duration_from_str, duration_to_str, epoch_from_str, epoch_to_str, ConfigRepr};
use crate::od::hardware::FrequencyBand;
use crate::od::relay::ServiceAccess;
use crate::od::{MissingObservationFieldSnafu, ODError};
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};
use snafu::OptionExt;

/// Relay specific fields of a tracking data record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayTrackingFields {
    #[serde(serialize_with = "duration_to_str", deserialize_with = "duration_from_str")]
    pub doppler_count_interval: Duration,
    pub service_access: ServiceAccess,
    /// Node 4 frequency in Hz
    pub node4_frequency_hz: f64,
    pub node4_band: FrequencyBand,
    #[serde(default)]
    pub smar_id: u8,
    #[serde(default)]
    pub data_flag: u8,
}

/// A tracking data record, as read from tracking data when replaying real data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub epoch: Epoch,
    pub measurement_type: MeasurementType,
    pub participants: Vec<String>,
    pub value: Vec<f64>,
    #[serde(default)]
    pub relay: Option<RelayTrackingFields>,
    /// The "Ref" fields of differenced observables
    #[serde(default)]
    pub reference_relay: Option<RelayTrackingFields>,
}

impl ConfigRepr for Observation {}

impl Observation {
    pub fn new(
        epoch: Epoch,
        measurement_type: MeasurementType,
        participants: Vec<String>,
        value: Vec<f64>,
    ) -> Self {
        Self {
            epoch,
            measurement_type,
            participants,
            value,
            relay: None,
            reference_relay: None,
        }
    }

    pub fn with_relay(mut self, fields: RelayTrackingFields) -> Self {
        self.relay = Some(fields);
        self
    }

    pub fn with_reference_relay(mut self, fields: RelayTrackingFields) -> Self {
        self.reference_relay = Some(fields);
        self
    }

    pub fn relay_fields(&self) -> Result<&RelayTrackingFields, ODError> {
        self.relay.as_ref().context(MissingObservationFieldSnafu {
            epoch: self.epoch,
            field: "relay tracking fields",
        })
    }

    pub fn reference_relay_fields(&self) -> Result<&RelayTrackingFields, ODError> {
        self.reference_relay
            .as_ref()
            .context(MissingObservationFieldSnafu {
                epoch: self.epoch,
                field: "reference relay tracking fields",
            })
    }

    /// Returns a copy of this record where the relay fields are replaced by the reference relay fields.
    /// The epoch is unchanged.
    pub fn reference_view(&self) -> Result<Self, ODError> {
        let mut view = self.clone();
        view.relay = Some(self.reference_relay_fields()?.clone());
        Ok(view)
    }
}

/// An uplink frequency ramp record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RampRecord {
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub epoch: Epoch,
    pub frequency_hz: f64,
    pub ramp_rate_hz_s: f64,
    pub band: FrequencyBand,
    pub ramp_type: u8,
}
