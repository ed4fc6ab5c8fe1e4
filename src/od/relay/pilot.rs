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

use super::ServiceAccess;
use crate::od::hardware::FrequencyBand;
use crate::od::{InvalidDataFlagSnafu, ODError, PilotFrequencyUndefinedSnafu};
use std::fmt::Debug;

/// Inputs of the pilot frequency lookup.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PilotKey {
    /// Effective frequency in MHz
    pub effective_frequency_mhz: f64,
    pub band: FrequencyBand,
    pub service: ServiceAccess,
    /// Relay number, e.g. 8 for TDRS-8
    pub relay_number: Option<u32>,
    pub smar_id: u8,
    pub data_flag: u8,
}

/// Provides the relay pilot tone frequency used to compute the Doppler of the relay to ground leg.
pub trait PilotFrequency: Send + Sync + Debug {
    /// Pilot frequency in MHz
    fn pilot_frequency_mhz(&self, key: &PilotKey) -> Result<f64, ODError>;

    /// Partial of the pilot frequency with respect to the effective frequency
    fn pilot_frequency_derivative(&self, key: &PilotKey) -> Result<f64, ODError>;
}

/// Pilot frequencies of the Space Network relays.
///
/// # Table (MHz)
/// + SA1: S-band `13677.5 - Fix(2 eff + 0.5) / 2`, K-band `-1475.0`
/// + SA2: S-band `13697.5 - Fix(2 eff + 0.5) / 2`, K-band `-1075.0`
/// + MA (S-band only): relays 8 to 10 use the SMAR channel, other relays the data flag
///
/// The single access S-band pilots track the effective frequency, rounded to the 500 kHz channel,
/// so their partial with respect to the effective frequency is -1. All other entries are constant.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpaceNetworkPilots;

impl SpaceNetworkPilots {
    fn multiple_access_smar(smar_id: u8) -> f64 {
        match smar_id {
            2 => 13412.5,
            3 => 13420.0,
            4 => 13427.5,
            5 => 13435.0,
            6 => 13442.5,
            7 => 13450.0,
            8 => 13457.5,
            27 => 13600.0,
            28 => 13607.5,
            29 => 13615.0,
            30 => 13622.5,
            _ => 13405.0,
        }
    }
}

impl PilotFrequency for SpaceNetworkPilots {
    fn pilot_frequency_mhz(&self, key: &PilotKey) -> Result<f64, ODError> {
        let channel = (key.effective_frequency_mhz * 2.0 + 0.5).trunc() / 2.0;
        match (key.service, key.band) {
            (ServiceAccess::SA1, FrequencyBand::S) => Ok(13677.5 - channel),
            (ServiceAccess::SA1, FrequencyBand::K) => Ok(-1475.0),
            (ServiceAccess::SA2, FrequencyBand::S) => Ok(13697.5 - channel),
            (ServiceAccess::SA2, FrequencyBand::K) => Ok(-1075.0),
            (ServiceAccess::MA, FrequencyBand::S) => match key.relay_number {
                Some(8..=10) => Ok(Self::multiple_access_smar(key.smar_id)),
                _ => match key.data_flag {
                    0 => Ok(-2279.0),
                    1 => Ok(-2287.5),
                    data_flag => InvalidDataFlagSnafu {
                        data_flag,
                        service: key.service,
                    }
                    .fail(),
                },
            },
            (service, band) => PilotFrequencyUndefinedSnafu { service, band }.fail(),
        }
    }

    fn pilot_frequency_derivative(&self, key: &PilotKey) -> Result<f64, ODError> {
        // Same validity as the lookup itself.
        self.pilot_frequency_mhz(key)?;
        match (key.service, key.band) {
            (ServiceAccess::SA1 | ServiceAccess::SA2, FrequencyBand::S) => Ok(-1.0),
            _ => Ok(0.0),
        }
    }
}
