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

use serde_derive::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum MeasurementType {
    /// Range along a single signal path, used by the primitive adapters
    #[serde(rename = "Range")]
    Range,
    /// Relay satellite three-leg return Doppler
    #[serde(rename = "SN_Doppler_Rtn")]
    SnDopplerRtn,
    /// Relay satellite Doppler with a ground-based transponder (BRTS)
    #[serde(rename = "BRTS_Doppler")]
    BrtsDoppler,
    /// Differenced (double) one-way Doppler between two relays
    #[serde(rename = "SN_DOWD")]
    SnDowd,
}

impl MeasurementType {
    /// Returns the expected unit of this measurement type
    pub fn unit(self) -> &'static str {
        match self {
            Self::Range => "km",
            Self::SnDopplerRtn | Self::BrtsDoppler | Self::SnDowd => "Hz",
        }
    }

    /// Returns the name of this type as it appears on tracking data.
    pub fn name(self) -> &'static str {
        match self {
            Self::Range => "Range",
            Self::SnDopplerRtn => "SN_Doppler_Rtn",
            Self::BrtsDoppler => "BRTS_Doppler",
            Self::SnDowd => "SN_DOWD",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.unit())
    }
}
