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

use crate::od::hardware::FrequencyBand;
use crate::od::{
    InvalidCountIntervalSnafu, InvalidNodeFrequencySnafu, NoServiceAccessSnafu, ODError,
    ServiceAccessIndexSnafu, UnknownServiceAccessSnafu, UnsupportedBandSnafu,
};
use crate::time::{Duration, TimeUnits};
use anise::constants::SPEED_OF_LIGHT_KM_S;
use rand::Rng;
use rand_pcg::Pcg64Mcg;
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use std::fmt;
use std::str::FromStr;

mod pilot;
pub use pilot::{PilotFrequency, PilotKey, SpaceNetworkPilots};

/// Relay service used to communicate with the user spacecraft.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceAccess {
    /// Single access 1
    SA1,
    /// Single access 2
    SA2,
    /// Multiple access
    MA,
}

impl fmt::Display for ServiceAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SA1 => write!(f, "SA1"),
            Self::SA2 => write!(f, "SA2"),
            Self::MA => write!(f, "MA"),
        }
    }
}

impl FromStr for ServiceAccess {
    type Err = ODError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SA1" => Ok(Self::SA1),
            "SA2" => Ok(Self::SA2),
            "MA" => Ok(Self::MA),
            _ => UnknownServiceAccessSnafu { name: s }.fail(),
        }
    }
}

/// Service access resolved for one measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceAccessState {
    candidates: Vec<ServiceAccess>,
    index: usize,
}

impl ServiceAccessState {
    /// The service access is the one of the tracking data record.
    pub fn from_observation(service: ServiceAccess) -> Self {
        Self {
            candidates: vec![service],
            index: 0,
        }
    }

    /// Picks one of the candidates, at random if a generator is provided, else the first one.
    pub fn select(
        candidates: &[ServiceAccess],
        rng: Option<&mut Pcg64Mcg>,
        adapter: &str,
    ) -> Result<Self, ODError> {
        ensure!(!candidates.is_empty(), NoServiceAccessSnafu { adapter });
        let index = match rng {
            Some(rng) if candidates.len() > 1 => rng.gen_range(0..candidates.len()),
            _ => 0,
        };
        Ok(Self {
            candidates: candidates.to_vec(),
            index,
        })
    }

    pub fn candidates(&self) -> &[ServiceAccess] {
        &self.candidates
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn service(&self) -> Result<ServiceAccess, ODError> {
        self.candidates
            .get(self.index)
            .copied()
            .context(ServiceAccessIndexSnafu {
                index: self.index,
                len: self.candidates.len(),
            })
    }
}

/// Frequency configuration of a relay measurement.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrequencyParameters {
    /// Node frequency, in MHz
    pub node_frequency_mhz: f64,
    pub band: FrequencyBand,
    pub smar_id: u8,
    pub data_flag: u8,
    /// Doppler count interval
    pub count_interval: Duration,
}

impl Default for FrequencyParameters {
    fn default() -> Self {
        Self {
            node_frequency_mhz: 2000.0,
            band: FrequencyBand::S,
            smar_id: 0,
            data_flag: 0,
            count_interval: 1.seconds(),
        }
    }
}

impl FrequencyParameters {
    pub fn validate_count_interval(&self) -> Result<(), ODError> {
        ensure!(
            self.count_interval > Duration::ZERO,
            InvalidCountIntervalSnafu {
                interval: self.count_interval
            }
        );
        Ok(())
    }

    /// Ensures that the node frequency and its band are usable to compute a pilot frequency.
    pub fn validate_frequency(&self) -> Result<(), ODError> {
        ensure!(
            self.node_frequency_mhz > 0.0,
            InvalidNodeFrequencySnafu {
                frequency_mhz: self.node_frequency_mhz
            }
        );
        ensure!(
            self.band != FrequencyBand::Unspecified,
            UnsupportedBandSnafu {
                band: self.band,
                action: "pilot frequency",
            }
        );
        Ok(())
    }

    pub fn metadata(&self, service_access: ServiceAccess) -> RelayMetadata {
        RelayMetadata {
            service_access,
            node_frequency_hz: self.node_frequency_mhz * 1e6,
            band: self.band,
            smar_id: self.smar_id,
            data_flag: self.data_flag,
            count_interval: self.count_interval,
        }
    }
}

/// Relay fields resolved for a measurement, reported alongside its value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RelayMetadata {
    pub service_access: ServiceAccess,
    /// Node 4 frequency, in Hz
    pub node_frequency_hz: f64,
    pub band: FrequencyBand,
    pub smar_id: u8,
    pub data_flag: u8,
    pub count_interval: Duration,
}

/// Conversion factors from the range of each path (km) to Doppler (Hz).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Multipliers {
    pub start_spacecraft: f64,
    pub start_ground_station: f64,
    pub end_spacecraft: f64,
    pub end_ground_station: f64,
}

impl Multipliers {
    /// Computes the multipliers in Hz/km from the effective and pilot frequencies in MHz.
    pub fn new(effective_frequency_mhz: f64, pilot_frequency_mhz: f64, count_interval: Duration) -> Self {
        let denom = count_interval.to_seconds() * SPEED_OF_LIGHT_KM_S;
        let effective = effective_frequency_mhz * 1e6 / denom;
        let pilot = pilot_frequency_mhz * 1e6 / denom;
        Self {
            start_spacecraft: effective,
            start_ground_station: pilot,
            end_spacecraft: -effective,
            end_ground_station: -pilot,
        }
    }
}

impl fmt::Display for Multipliers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SSC {:.12e} SGS {:.12e} ESC {:.12e} EGS {:.12e} Hz/km",
            self.start_spacecraft,
            self.start_ground_station,
            self.end_spacecraft,
            self.end_ground_station
        )
    }
}

/// Returns the relay number from its identifier, e.g. 10 for `TDRS10`.
pub fn relay_number(id: &str) -> Option<u32> {
    let prefix = id.trim_end_matches(|c: char| c.is_ascii_digit());
    id[prefix.len()..].parse().ok()
}
